//! The long-lived hub connection of a hardware display.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use spindle_state::{ClientMessage, DomainEvent, InputEvent};

use crate::backoff::Backoff;
use crate::config::PanelConfig;
use crate::error::{PanelError, Result};
use crate::renderer::PanelRenderer;
use crate::state::{PanelState, RenderAction};

/// Upper bound for a single connection attempt.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Physical input attached to the panel (rotary encoder, buttons, touch).
#[async_trait]
pub trait InputSource: Send {
    /// Next decoded input event, or `None` once the device is gone.
    async fn next_input_event(&mut self) -> Option<InputEvent>;
}

#[derive(Debug, Default)]
struct Counters {
    connections: AtomicU64,
    failed_attempts: AtomicU64,
    expensive_renders: AtomicU64,
    cheap_renders: AtomicU64,
    inputs_forwarded: AtomicU64,
    inputs_dropped: AtomicU64,
}

/// Snapshot of panel client counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PanelStats {
    pub connections: u64,
    pub failed_attempts: u64,
    pub expensive_renders: u64,
    pub cheap_renders: u64,
    pub inputs_forwarded: u64,
    pub inputs_dropped: u64,
}

impl fmt::Display for PanelStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Panel Stats:")?;
        writeln!(
            f,
            "  Connections: {} ({} failed attempts)",
            self.connections, self.failed_attempts
        )?;
        writeln!(
            f,
            "  Renders: {} expensive, {} cheap",
            self.expensive_renders, self.cheap_renders
        )?;
        write!(
            f,
            "  Input: {} forwarded, {} dropped",
            self.inputs_forwarded, self.inputs_dropped
        )
    }
}

impl Counters {
    fn snapshot(&self) -> PanelStats {
        PanelStats {
            connections: self.connections.load(Ordering::Relaxed),
            failed_attempts: self.failed_attempts.load(Ordering::Relaxed),
            expensive_renders: self.expensive_renders.load(Ordering::Relaxed),
            cheap_renders: self.cheap_renders.load(Ordering::Relaxed),
            inputs_forwarded: self.inputs_forwarded.load(Ordering::Relaxed),
            inputs_dropped: self.inputs_dropped.load(Ordering::Relaxed),
        }
    }
}

/// State shared by the client's loops.
struct Shared {
    config: PanelConfig,
    renderer: Arc<dyn PanelRenderer>,
    /// Held across renders so the renderer sees one redraw at a time
    state: Mutex<PanelState>,
    connected: AtomicBool,
    counters: Counters,
}

impl Shared {
    async fn handle_frame(&self, text: &str) {
        let event = match DomainEvent::from_json(text) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %PanelError::from(e), "Ignoring undecodable frame");
                return;
            }
        };

        let mut state = self.state.lock().await;
        for action in state.apply(&event) {
            self.render(action).await;
        }
    }

    async fn render(&self, action: RenderAction) {
        match action {
            RenderAction::Expensive(track) => {
                self.counters.expensive_renders.fetch_add(1, Ordering::Relaxed);
                debug!(id = %track.id, "Expensive render");
                self.renderer.render_expensive(&track).await;
            }
            RenderAction::Cheap {
                progress_ms,
                duration_ms,
                is_playing,
            } => {
                self.counters.cheap_renders.fetch_add(1, Ordering::Relaxed);
                self.renderer
                    .render_cheap(progress_ms, duration_ms, is_playing)
                    .await;
            }
        }
    }
}

enum SessionEnd {
    Shutdown,
    Closed,
    Failed(PanelError),
}

/// Client runtime for one physical display.
///
/// Keeps a connection to the hub forever: failures back off 1, 2, 4, 8, 16,
/// then 30 seconds between attempts, and the delay resets after every
/// successful connection. Every (re)connection starts from the hub's `init`
/// frame. Alongside, a tick loop advances progress locally and drives the
/// cheap renderer while a track is playing.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use spindle_panel::{LogRenderer, PanelClient, PanelConfig};
///
/// # #[tokio::main]
/// # async fn main() {
/// let handle = PanelClient::new(PanelConfig::from_env(), Arc::new(LogRenderer))
///     .start()
///     .expect("Invalid panel configuration");
///
/// tokio::signal::ctrl_c().await.unwrap();
/// println!("{}", handle.shutdown().await);
/// # }
/// ```
pub struct PanelClient {
    config: PanelConfig,
    renderer: Arc<dyn PanelRenderer>,
    input: Option<Box<dyn InputSource>>,
}

impl PanelClient {
    pub fn new(config: PanelConfig, renderer: Arc<dyn PanelRenderer>) -> Self {
        Self {
            config,
            renderer,
            input: None,
        }
    }

    /// Forward events from `input` to the hub as control messages.
    pub fn with_input(mut self, input: impl InputSource + 'static) -> Self {
        self.input = Some(Box::new(input));
        self
    }

    /// Spawn the connection, tick and input loops.
    pub fn start(self) -> Result<PanelHandle> {
        self.config.validate()?;

        let shared = Arc::new(Shared {
            config: self.config,
            renderer: self.renderer,
            state: Mutex::new(PanelState::new()),
            connected: AtomicBool::new(false),
            counters: Counters::default(),
        });

        let (shutdown_tx, _) = watch::channel(false);
        let (input_tx, input_rx) = mpsc::unbounded_channel();

        let mut tasks = vec![
            tokio::spawn(connection_loop(
                Arc::clone(&shared),
                input_rx,
                shutdown_tx.subscribe(),
            )),
            tokio::spawn(tick_loop(Arc::clone(&shared), shutdown_tx.subscribe())),
        ];
        if let Some(input) = self.input {
            tasks.push(tokio::spawn(input_loop(
                Arc::clone(&shared),
                input,
                input_tx,
                shutdown_tx.subscribe(),
            )));
        }

        Ok(PanelHandle {
            shared,
            shutdown_tx,
            tasks,
        })
    }
}

/// A running panel client.
pub struct PanelHandle {
    shared: Arc<Shared>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl PanelHandle {
    pub fn stats(&self) -> PanelStats {
        self.shared.counters.snapshot()
    }

    /// Whether the event channel is currently open.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Signal every loop, wait for them to stop, then sleep the panels.
    pub async fn shutdown(self) -> PanelStats {
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Panel task ended abnormally");
            }
        }
        {
            let _state = self.shared.state.lock().await;
            self.shared.renderer.sleep().await;
        }
        info!("Panel client stopped");
        self.shared.counters.snapshot()
    }
}

async fn connection_loop(
    shared: Arc<Shared>,
    mut input_rx: mpsc::UnboundedReceiver<InputEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let url = shared.config.backend_url.clone();
    let mut backoff = Backoff::new(shared.config.initial_backoff, shared.config.max_backoff);

    loop {
        let attempt = tokio::select! {
            _ = shutdown.changed() => break,
            attempt = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(url.as_str())) => attempt,
        };

        match attempt {
            Ok(Ok((socket, _))) => {
                backoff.reset();
                shared.counters.connections.fetch_add(1, Ordering::Relaxed);
                info!(%url, "Connected to hub");

                let ended = run_session(&shared, socket, &mut input_rx, &mut shutdown).await;
                shared.connected.store(false, Ordering::SeqCst);
                match ended {
                    SessionEnd::Shutdown => break,
                    SessionEnd::Closed => warn!(%url, "Connection closed by hub"),
                    SessionEnd::Failed(e) => warn!(%url, error = %e, "Connection lost"),
                }
            }
            Ok(Err(e)) => {
                shared.counters.failed_attempts.fetch_add(1, Ordering::Relaxed);
                warn!(%url, error = %PanelError::from(e), "Connection attempt failed");
            }
            Err(_) => {
                shared.counters.failed_attempts.fetch_add(1, Ordering::Relaxed);
                warn!(%url, timeout = ?CONNECT_TIMEOUT, "Connection attempt timed out");
            }
        }

        let delay = backoff.next_delay();
        warn!(delay = ?delay, "Reconnecting");
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    debug!("Connection loop stopped");
}

async fn run_session(
    shared: &Shared,
    socket: Socket,
    input_rx: &mut mpsc::UnboundedReceiver<InputEvent>,
    shutdown: &mut watch::Receiver<bool>,
) -> SessionEnd {
    let (mut sink, mut stream) = socket.split();

    // Input that raced the disconnect belongs to the old session
    while input_rx.try_recv().is_ok() {
        shared.counters.inputs_dropped.fetch_add(1, Ordering::Relaxed);
    }
    shared.connected.store(true, Ordering::SeqCst);

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                let _ = sink.close().await;
                return SessionEnd::Shutdown;
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => shared.handle_frame(&text).await,
                Some(Ok(Message::Close(_))) | None => return SessionEnd::Closed,
                Some(Ok(_)) => {}
                Some(Err(e)) => return SessionEnd::Failed(e.into()),
            },
            Some(event) = input_rx.recv() => {
                let frame = match ClientMessage::control(event).to_json() {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(error = %e, "Failed to encode input event");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(frame)).await {
                    return SessionEnd::Failed(PanelError::Send(e.to_string()));
                }
                shared.counters.inputs_forwarded.fetch_add(1, Ordering::Relaxed);
                debug!(?event, "Forwarded input");
            }
        }
    }
}

async fn tick_loop(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let period = shared.config.tick_interval;
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = interval.tick() => {
                let mut state = shared.state.lock().await;
                if let Some(action) = state.tick(period) {
                    shared.render(action).await;
                }
            }
        }
    }

    debug!("Tick loop stopped");
}

async fn input_loop(
    shared: Arc<Shared>,
    mut source: Box<dyn InputSource>,
    input_tx: mpsc::UnboundedSender<InputEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let next = tokio::select! {
            _ = shutdown.changed() => break,
            next = source.next_input_event() => next,
        };
        let Some(event) = next else {
            debug!("Input source ended");
            break;
        };

        if shared.connected.load(Ordering::SeqCst) && input_tx.send(event).is_ok() {
            continue;
        }
        shared.counters.inputs_dropped.fetch_add(1, Ordering::Relaxed);
        warn!(?event, "Not connected to hub, dropping input");
    }
}
