//! Line-based input for running a panel without an encoder attached.

use async_trait::async_trait;
use std::io::BufRead;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::sync::mpsc;
use tracing::debug;

use spindle_state::InputEvent;

use crate::client::InputSource;

/// Map one typed line to an input event.
///
/// | Line | Event |
/// |---|---|
/// | `+` | rotate forward |
/// | `-` | rotate back |
/// | `p` | press |
/// | `l` | long press |
/// | `t X Y` | touch at `X`,`Y` |
pub fn parse_key(line: &str) -> Option<InputEvent> {
    let mut parts = line.split_whitespace();
    let event = match parts.next()? {
        "+" => InputEvent::Rotate(1),
        "-" => InputEvent::Rotate(-1),
        "p" => InputEvent::Press,
        "l" => InputEvent::LongPress,
        "t" => {
            let x = parts.next()?.parse().ok()?;
            let y = parts.next()?.parse().ok()?;
            InputEvent::Touch { x, y }
        }
        _ => return None,
    };
    Some(event)
}

/// [`InputSource`] reading commands line by line, see [`parse_key`].
pub struct LineInput<R> {
    lines: Lines<R>,
}

impl<R: AsyncBufRead + Unpin + Send> LineInput<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> InputSource for LineInput<R> {
    async fn next_input_event(&mut self) -> Option<InputEvent> {
        loop {
            let line = self.lines.next_line().await.ok()??;
            match parse_key(&line) {
                Some(event) => return Some(event),
                None => debug!(line = %line.trim(), "Unrecognized input"),
            }
        }
    }
}

/// Interactive [`InputSource`] on the terminal.
///
/// Reads stdin on a dedicated thread: a blocking read cannot be cancelled,
/// and on the runtime's blocking pool it would hold up shutdown until the
/// next line.
pub struct KeyboardInput {
    events: mpsc::Receiver<InputEvent>,
}

impl KeyboardInput {
    pub fn spawn() -> Self {
        let (tx, events) = mpsc::channel(16);
        std::thread::spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if let Some(event) = parse_key(&line) {
                    if tx.blocking_send(event).is_err() {
                        break;
                    }
                }
            }
        });
        Self { events }
    }
}

#[async_trait]
impl InputSource for KeyboardInput {
    async fn next_input_event(&mut self) -> Option<InputEvent> {
        self.events.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tokio::io::BufReader;

    #[rstest]
    #[case("+", Some(InputEvent::Rotate(1)))]
    #[case("-", Some(InputEvent::Rotate(-1)))]
    #[case(" p ", Some(InputEvent::Press))]
    #[case("l", Some(InputEvent::LongPress))]
    #[case("t 10 20", Some(InputEvent::Touch { x: 10, y: 20 }))]
    #[case("t 10", None)]
    #[case("x", None)]
    #[case("", None)]
    fn test_parse_key(#[case] line: &str, #[case] expected: Option<InputEvent>) {
        assert_eq!(parse_key(line), expected);
    }

    #[tokio::test]
    async fn test_line_input_skips_unknown_lines() {
        let text: &[u8] = b"+\nhello\nl\n";
        let mut input = LineInput::new(BufReader::new(text));

        assert_eq!(input.next_input_event().await, Some(InputEvent::Rotate(1)));
        assert_eq!(input.next_input_event().await, Some(InputEvent::LongPress));
        assert_eq!(input.next_input_event().await, None);
    }
}
