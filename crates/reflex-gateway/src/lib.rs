//! `reflex-gateway` – The Client-Facing WebSocket Server
//!
//! Boots a TCP listener (default port `3001`) that upgrades every
//! connection to a WebSocket and:
//!
//! 1. **Streams** every telemetry event on the bus to every connected
//!    client as a `{"topic": "sensor-data", "msg": …}` frame, the decoded
//!    device object passing through unchanged.
//!
//! 2. **Accepts** `{"topic": "send-command", "msg": "<string>"}` frames
//!    from any client and publishes the payload onto the command lane.
//!    Anything else – unknown topics, malformed JSON, non-text frames –
//!    is ignored.
//!
//! The gateway keeps no per-client state: connects and disconnects are
//! logged only, and a slow client simply misses frames.

pub mod server;

pub use server::{COMMAND_TOPIC, DEFAULT_PORT, GatewayServer, TELEMETRY_TOPIC};
