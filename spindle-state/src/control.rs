//! Physical and touch input events, and the control channel wire format.
//!
//! Consumers send control messages upstream on the same socket that carries
//! domain events:
//!
//! ```text
//! {"type":"control","data":{"type":"rotate","value":-1,"x":null,"y":null}}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, StateError};

/// A decoded input event from a rotary encoder, button or touch surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// Rotate the display mode by `delta` positions
    Rotate(i64),
    /// Short button press
    Press,
    /// Long button press
    LongPress,
    /// Touch at panel coordinates
    Touch { x: i64, y: i64 },
}

/// Transport commands a source may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportCommand {
    PlayPause,
    Next,
    Previous,
}

impl TransportCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportCommand::PlayPause => "play_pause",
            TransportCommand::Next => "next",
            TransportCommand::Previous => "previous",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlKind {
    Rotate,
    Press,
    LongPress,
    Touch,
}

/// The `data` payload of a control message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlEvent {
    #[serde(rename = "type")]
    pub kind: ControlKind,
    #[serde(default)]
    pub value: Option<i64>,
    #[serde(default)]
    pub x: Option<i64>,
    #[serde(default)]
    pub y: Option<i64>,
}

impl From<ControlEvent> for InputEvent {
    fn from(event: ControlEvent) -> Self {
        match event.kind {
            // A rotation without a value moves one step forward
            ControlKind::Rotate => InputEvent::Rotate(event.value.unwrap_or(1)),
            ControlKind::Press => InputEvent::Press,
            ControlKind::LongPress => InputEvent::LongPress,
            ControlKind::Touch => InputEvent::Touch {
                x: event.x.unwrap_or_default(),
                y: event.y.unwrap_or_default(),
            },
        }
    }
}

impl From<InputEvent> for ControlEvent {
    fn from(event: InputEvent) -> Self {
        let (kind, value, x, y) = match event {
            InputEvent::Rotate(delta) => (ControlKind::Rotate, Some(delta), None, None),
            InputEvent::Press => (ControlKind::Press, None, None, None),
            InputEvent::LongPress => (ControlKind::LongPress, None, None, None),
            InputEvent::Touch { x, y } => (ControlKind::Touch, None, Some(x), Some(y)),
        };
        ControlEvent { kind, value, x, y }
    }
}

/// Messages a consumer may send to the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Control { data: ControlEvent },
}

impl ClientMessage {
    pub fn control(event: InputEvent) -> Self {
        ClientMessage::Control { data: event.into() }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Parse a text frame received from a consumer.
///
/// Returns `Ok(None)` for well-formed JSON messages that are not control
/// messages, so unknown message types can be ignored by the caller.
pub fn parse_client_message(text: &str) -> Result<Option<InputEvent>> {
    let value: serde_json::Value = serde_json::from_str(text)?;

    match value.get("type").and_then(|t| t.as_str()) {
        Some("control") => {
            let data = value
                .get("data")
                .cloned()
                .ok_or_else(|| StateError::InvalidControl("missing data".to_string()))?;
            let event: ControlEvent = serde_json::from_value(data)
                .map_err(|e| StateError::InvalidControl(e.to_string()))?;
            Ok(Some(event.into()))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DisplayMode;
    use rstest::rstest;

    #[rstest]
    #[case(r#"{"type":"control","data":{"type":"rotate","value":-2}}"#, InputEvent::Rotate(-2))]
    #[case(r#"{"type":"control","data":{"type":"rotate","value":null}}"#, InputEvent::Rotate(1))]
    #[case(r#"{"type":"control","data":{"type":"rotate","value":0}}"#, InputEvent::Rotate(0))]
    #[case(r#"{"type":"control","data":{"type":"press"}}"#, InputEvent::Press)]
    #[case(r#"{"type":"control","data":{"type":"long_press","value":null,"x":null,"y":null}}"#, InputEvent::LongPress)]
    #[case(r#"{"type":"control","data":{"type":"touch","x":12,"y":40}}"#, InputEvent::Touch { x: 12, y: 40 })]
    fn test_parse_control(#[case] text: &str, #[case] expected: InputEvent) {
        assert_eq!(parse_client_message(text).unwrap(), Some(expected));
    }

    #[test]
    fn test_non_control_messages_are_ignored() {
        assert_eq!(parse_client_message(r#"{"type":"ping"}"#).unwrap(), None);
        assert_eq!(parse_client_message(r#"{"hello":1}"#).unwrap(), None);
    }

    #[test]
    fn test_malformed_control_messages_error() {
        assert!(parse_client_message("not json").is_err());
        assert!(parse_client_message(r#"{"type":"control"}"#).is_err());
        assert!(parse_client_message(r#"{"type":"control","data":{"type":"wiggle"}}"#).is_err());
    }

    #[test]
    fn test_extreme_rotate_value_applies_without_overflow() {
        let text = r#"{"type":"control","data":{"type":"rotate","value":9223372036854775807}}"#;
        let event = parse_client_message(text).unwrap();
        assert_eq!(event, Some(InputEvent::Rotate(i64::MAX)));
        assert_eq!(DisplayMode::Lyrics.rotate(i64::MAX), DisplayMode::Visualizer);
    }

    #[test]
    fn test_client_message_encoding() {
        let text = ClientMessage::control(InputEvent::Rotate(-1)).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["type"], "control");
        assert_eq!(value["data"]["type"], "rotate");
        assert_eq!(value["data"]["value"], -1);
        assert_eq!(parse_client_message(&text).unwrap(), Some(InputEvent::Rotate(-1)));
    }
}
