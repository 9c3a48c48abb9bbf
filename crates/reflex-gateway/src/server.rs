//! [`GatewayServer`] – WebSocket bridge between the [`EventBus`] and every
//! connected browser.
//!
//! Listens on `0.0.0.0:3001` (configurable via
//! [`GatewayServer::with_port`]). Binding the listener is the one fatal
//! operation in the process: everything past the bind degrades instead of
//! terminating.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use reflex_bridge::EventBus;
use reflex_types::{BridgeError, CommandMessage, TelemetryEvent};

/// Default TCP port for the gateway WebSocket server.
pub const DEFAULT_PORT: u16 = 3001;

/// Server → client channel carrying telemetry events.
pub const TELEMETRY_TOPIC: &str = "sensor-data";

/// Client → server channel carrying opaque command strings.
pub const COMMAND_TOPIC: &str = "send-command";

/// WebSocket fan-out server bridging the internal [`EventBus`] to every
/// connected client.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use reflex_bridge::EventBus;
/// use reflex_gateway::GatewayServer;
///
/// #[tokio::main]
/// async fn main() {
///     let bus = Arc::new(EventBus::default());
///     GatewayServer::new(Arc::clone(&bus))
///         .run()
///         .await
///         .expect("gateway failed to bind");
/// }
/// ```
pub struct GatewayServer {
    bus: Arc<EventBus>,
    port: u16,
}

impl GatewayServer {
    /// Create a server backed by `bus` on the [`DEFAULT_PORT`].
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            port: DEFAULT_PORT,
        }
    }

    /// Override the listening port (builder-style).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Return the configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Start the server and accept clients until the process ends.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Bind`] when the TCP listener cannot bind –
    /// the caller treats this as fatal.
    pub async fn run(self) -> Result<(), BridgeError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| BridgeError::Bind(format!("{addr}: {e}")))?;

        info!(port = self.port, "gateway listening");

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let bus = Arc::clone(&self.bus);
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, peer, bus).await {
                            warn!(%peer, error = %e, "client error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "accept error");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Per-client handler
// ---------------------------------------------------------------------------

async fn handle_client(
    stream: TcpStream,
    peer: SocketAddr,
    bus: Arc<EventBus>,
) -> Result<(), BridgeError> {
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| BridgeError::Channel(format!("ws handshake from {peer}: {e}")))?;
    info!(%peer, "client connected");

    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    let mut bus_rx = bus.subscribe_telemetry();

    loop {
        tokio::select! {
            // ── Downstream: telemetry lane → client ───────────────────────
            result = bus_rx.recv() => {
                match result {
                    Ok(event) => {
                        match serde_json::to_string(&telemetry_frame(&event)) {
                            Ok(frame) => {
                                if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!(error = %e, "telemetry serialization error");
                            }
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(%peer, lagged_by = n, "client lagged; events skipped");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            // ── Upstream: client → command lane ───────────────────────────
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_frame(text.as_str(), &bus);
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    info!(%peer, "client disconnected");
    Ok(())
}

/// Wrap a telemetry event in its wire envelope.
fn telemetry_frame(event: &TelemetryEvent) -> Value {
    json!({ "topic": TELEMETRY_TOPIC, "msg": event })
}

/// Parse one inbound text frame and, when it is a well-formed command,
/// publish the payload onto the command lane.
///
/// Recognised frames look like `{"topic": "send-command", "msg": "n"}`.
/// Any other topic, a non-string `msg`, or unparseable text is silently
/// ignored – clients have no error channel.
pub(crate) fn handle_client_frame(text: &str, bus: &EventBus) {
    let Ok(frame) = serde_json::from_str::<Value>(text) else {
        return;
    };

    let topic = frame.get("topic").and_then(|t| t.as_str()).unwrap_or("");
    if topic != COMMAND_TOPIC {
        return;
    }

    if let Some(cmd) = frame.get("msg").and_then(|m| m.as_str()) {
        debug!(command = cmd, "client command received");
        bus.publish_command(CommandMessage::from(cmd));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
