//! HTTP and WebSocket server in front of the broadcast hub.

use futures::{SinkExt, StreamExt};
use serde_json::json;
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr, TcpListener};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use warp::http::StatusCode;
use warp::ws::{Message, WebSocket};
use warp::{Filter, Rejection, Reply};

use spindle_state::{parse_client_message, DisplayMode, TransportCommand};

use crate::config::HubServerConfig;
use crate::control::ControlHandler;
use crate::error::{HubError, Result};
use crate::hub::BroadcastHub;

/// Name reported by `GET /`.
pub const SERVICE_NAME: &str = "spindle";

/// How long shutdown waits for in-flight HTTP requests.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// How long one frame may take to reach a consumer's socket.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Server exposing the hub to consumers.
///
/// Routes:
///
/// | Method | Path | Reply |
/// |---|---|---|
/// | GET | `/ws` | WebSocket: event channel out, control channel in |
/// | GET | `/` | service name, version, active source |
/// | GET | `/auth/status` | [`SourceStatus`](crate::SourceStatus) |
/// | GET | `/track/current` | current track or `null` |
/// | GET | `/display/state` | display state |
/// | POST | `/display/mode/{mode}` | `{"mode": ...}`, 400 on unknown mode |
/// | POST | `/control/{play-pause,next,previous}` | `{"success": bool}` |
///
/// CORS is open to any origin.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use spindle_hub::{BroadcastHub, ControlHandler, HubServer, HubServerConfig};
/// use spindle_state::DisplayStore;
///
/// # async fn run(handler: Arc<dyn ControlHandler>) {
/// let hub = BroadcastHub::new(DisplayStore::new());
/// let server = HubServer::start(&HubServerConfig::default(), hub, handler)
///     .await
///     .expect("Failed to start hub server");
///
/// println!("Consumers connect to {}", server.ws_url());
/// server.shutdown().await.unwrap();
/// # }
/// ```
pub struct HubServer {
    /// Address the server actually bound
    local_addr: SocketAddr,
    hub: BroadcastHub,
    /// Shutdown signal sender
    shutdown_tx: Option<mpsc::Sender<()>>,
    /// Server task handle
    server_handle: Option<JoinHandle<()>>,
}

impl HubServer {
    /// Bind and start serving.
    ///
    /// # Arguments
    ///
    /// * `config` - Host and port range to bind
    /// * `hub` - Registry that WebSocket consumers join
    /// * `handler` - Receives control input and REST commands
    ///
    /// # Returns
    ///
    /// The running server, or an error if no port in the range could be bound.
    pub async fn start(
        config: &HubServerConfig,
        hub: BroadcastHub,
        handler: Arc<dyn ControlHandler>,
    ) -> Result<Self> {
        config.validate()?;
        let (start, end) = config.port_range;
        let port = Self::find_available_port(config.host, start, end)
            .ok_or(HubError::NoAvailablePort { start, end })?;

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let (local_addr, server) = warp::serve(routes(hub.clone(), handler))
            .try_bind_with_graceful_shutdown(SocketAddr::new(config.host, port), async move {
                shutdown_rx.recv().await;
            })
            .map_err(|e| HubError::ServerStart(e.to_string()))?;

        let server_handle = tokio::spawn(server);
        info!(%local_addr, "Hub server listening");

        Ok(Self {
            local_addr,
            hub,
            shutdown_tx: Some(shutdown_tx),
            server_handle: Some(server_handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Base URL for the REST surface, e.g. `http://127.0.0.1:8000`.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    /// URL consumers open for the event channel.
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.local_addr)
    }

    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    /// Stop accepting requests, drop every consumer and wait for the server
    /// task to finish.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }

        self.hub.close_all().await;

        if let Some(mut handle) = self.server_handle.take() {
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await {
                Ok(joined) => joined.map_err(|e| HubError::Shutdown(e.to_string()))?,
                Err(_) => {
                    warn!(grace = ?SHUTDOWN_GRACE, "Hub server did not drain in time, aborting");
                    handle.abort();
                }
            }
        }

        info!(addr = %self.local_addr, "Hub server stopped");
        Ok(())
    }

    /// Find an available port in the given range.
    fn find_available_port(host: IpAddr, start: u16, end: u16) -> Option<u16> {
        (start..=end).find(|&port| Self::is_port_available(host, port))
    }

    /// Check if a port is available for binding.
    fn is_port_available(host: IpAddr, port: u16) -> bool {
        TcpListener::bind(SocketAddr::new(host, port)).is_ok()
    }
}

#[derive(Clone)]
struct ServerContext {
    hub: BroadcastHub,
    handler: Arc<dyn ControlHandler>,
}

fn with_context(
    ctx: ServerContext,
) -> impl Filter<Extract = (ServerContext,), Error = Infallible> + Clone {
    warp::any().map(move || ctx.clone())
}

/// All hub routes, with rejection handling and CORS applied.
pub fn routes(
    hub: BroadcastHub,
    handler: Arc<dyn ControlHandler>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let ctx = ServerContext { hub, handler };

    let ws = warp::path("ws")
        .and(warp::path::end())
        .and(warp::ws())
        .and(with_context(ctx.clone()))
        .map(|ws: warp::ws::Ws, ctx: ServerContext| {
            ws.on_upgrade(move |socket| serve_socket(socket, ctx))
        });

    let root = warp::path::end()
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .map(|ctx: ServerContext| {
            warp::reply::json(&json!({
                "name": SERVICE_NAME,
                "version": env!("CARGO_PKG_VERSION"),
                "active_source": ctx.handler.status().active_source,
            }))
        });

    let auth_status = warp::path!("auth" / "status")
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .map(|ctx: ServerContext| warp::reply::json(&ctx.handler.status()));

    let current_track = warp::path!("track" / "current")
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .map(|ctx: ServerContext| warp::reply::json(&ctx.hub.store().track()));

    let display_state = warp::path!("display" / "state")
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .map(|ctx: ServerContext| warp::reply::json(&ctx.hub.store().snapshot()));

    let set_mode = warp::path!("display" / "mode" / String)
        .and(warp::post())
        .and(with_context(ctx.clone()))
        .and_then(handle_set_mode);

    let control = warp::path!("control" / String)
        .and(warp::post())
        .and(with_context(ctx))
        .and_then(handle_control);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_headers(vec!["content-type"]);

    ws.or(root)
        .or(auth_status)
        .or(current_track)
        .or(display_state)
        .or(set_mode)
        .or(control)
        .recover(handle_rejection)
        .with(cors)
}

async fn handle_set_mode(mode: String, ctx: ServerContext) -> std::result::Result<impl Reply, Rejection> {
    let parsed: DisplayMode = mode
        .parse()
        .map_err(|_| warp::reject::custom(UnknownMode(mode.clone())))?;

    ctx.handler.set_mode(parsed).await;
    Ok(warp::reply::json(&json!({ "mode": parsed })))
}

async fn handle_control(action: String, ctx: ServerContext) -> std::result::Result<impl Reply, Rejection> {
    let command = match action.as_str() {
        "play-pause" => TransportCommand::PlayPause,
        "next" => TransportCommand::Next,
        "previous" => TransportCommand::Previous,
        _ => return Err(warp::reject::not_found()),
    };

    let success = ctx.handler.transport(command).await;
    Ok(warp::reply::json(&json!({ "success": success })))
}

/// One consumer session: a writer task drains the hub connection onto the
/// socket while this task reads control messages.
async fn serve_socket(socket: WebSocket, ctx: ServerContext) {
    let (mut sink, mut stream) = socket.split();

    let mut connection = match ctx.hub.connect().await {
        Ok(connection) => connection,
        Err(e) => {
            warn!(error = %e, "Failed to register consumer");
            let _ = sink.close().await;
            return;
        }
    };
    let id = connection.id();

    let writer = tokio::spawn(async move {
        while let Some(frame) = connection.recv().await {
            match tokio::time::timeout(SEND_TIMEOUT, sink.send(Message::text(frame.as_ref()))).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    debug!(connection = %id, error = %e, "Send failed");
                    // Dropping the connection here gets it pruned on the next broadcast
                    return;
                }
                Err(_) => {
                    warn!(connection = %id, "Send timed out, dropping consumer");
                    return;
                }
            }
        }
        let _ = sink.close().await;
    });

    while let Some(received) = stream.next().await {
        let message = match received {
            Ok(message) => message,
            Err(e) => {
                debug!(connection = %id, error = %e, "Receive failed");
                break;
            }
        };
        if message.is_close() {
            break;
        }
        let Ok(text) = message.to_str() else {
            continue;
        };

        match parse_client_message(text) {
            Ok(Some(event)) => {
                debug!(connection = %id, ?event, "Control event");
                ctx.handler.handle_input(event).await;
            }
            Ok(None) => debug!(connection = %id, "Ignoring non-control message"),
            Err(e) => warn!(connection = %id, error = %e, "Invalid control message"),
        }
    }

    ctx.hub.disconnect(id).await;
    let _ = writer.await;
}

/// Custom rejection for a display mode outside the closed set.
#[derive(Debug)]
struct UnknownMode(String);

impl warp::reject::Reject for UnknownMode {}

/// Handle rejections and convert them to JSON error responses.
async fn handle_rejection(err: Rejection) -> std::result::Result<impl Reply, Infallible> {
    let code;
    let message;

    if err.is_not_found() {
        code = StatusCode::NOT_FOUND;
        message = "Not found".to_string();
    } else if let Some(UnknownMode(mode)) = err.find::<UnknownMode>() {
        code = StatusCode::BAD_REQUEST;
        message = format!("Unknown display mode: {mode}");
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        code = StatusCode::METHOD_NOT_ALLOWED;
        message = "Method not allowed".to_string();
    } else {
        debug!(rejection = ?err, "Rejected request");
        code = StatusCode::BAD_REQUEST;
        message = "Bad request".to_string();
    }

    Ok(warp::reply::with_status(
        warp::reply::json(&json!({ "detail": message })),
        code,
    ))
}
