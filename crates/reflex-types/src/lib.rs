use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// One decoded record from the device stream, as relayed to every client.
///
/// The device emits newline-delimited JSON objects tagged by a `type` field.
/// Records whose tag and fields match a known shape decode into a typed
/// [`SensorEvent`]; any other well-formed JSON object is kept verbatim in
/// [`Raw`][TelemetryEvent::Raw] so that firmware additions flow through the
/// bridge without a code change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TelemetryEvent {
    /// A record with a recognised `type` tag and matching fields.
    Sensor(SensorEvent),
    /// Any other JSON object, relayed untouched.
    Raw(Map<String, Value>),
}

impl TelemetryEvent {
    /// Build the synthetic distance reading the simulator emits.
    pub fn simulated_distance(dist: f64) -> Self {
        TelemetryEvent::Sensor(SensorEvent::Distance {
            dist,
            state: Some("play".to_string()),
        })
    }

    /// The record's `type` tag, or `"?"` for a raw object without one.
    pub fn kind(&self) -> &str {
        match self {
            TelemetryEvent::Sensor(SensorEvent::Distance { .. }) => "distance",
            TelemetryEvent::Sensor(SensorEvent::Escape { .. }) => "escape",
            TelemetryEvent::Sensor(SensorEvent::RoundResult { .. }) => "result",
            TelemetryEvent::Sensor(SensorEvent::Ready { .. }) => "ready",
            TelemetryEvent::Raw(obj) => obj
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("?"),
        }
    }
}

/// The known record shapes produced by the training device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SensorEvent {
    /// Current measured distance in centimeters.
    Distance {
        dist: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        state: Option<String>,
    },
    /// Reaction time in milliseconds for an escape round.
    Escape { reaction: i64 },
    /// Outcome of a finished round.
    #[serde(rename = "result")]
    RoundResult {
        level: i64,
        result: RoundOutcome,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reaction: Option<i64>,
    },
    /// The device armed the next level.
    Ready { level: i64 },
}

/// How a round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundOutcome {
    Success,
    Fail,
    Invalid,
}

/// An opaque operator instruction flowing from a client to the device.
///
/// The bridge forwards the payload verbatim; it never interprets, validates,
/// or rate-limits it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandMessage(pub String);

impl CommandMessage {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl From<&str> for CommandMessage {
    fn from(raw: &str) -> Self {
        CommandMessage(raw.to_string())
    }
}

impl std::fmt::Display for CommandMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the bridge currently sources its telemetry from.
///
/// `DeviceConnected → Simulating` is a one-way transition: once the bridge
/// falls back to synthetic data it never returns to the device for the rest
/// of the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Startup window before the serial open attempt resolves.
    Uninitialized,
    /// Live device stream; commands are written to the serial port.
    DeviceConnected,
    /// Permanent fallback; commands are accepted but only logged.
    Simulating,
}

/// Global error type spanning device I/O, record decoding, and transport.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BridgeError {
    #[error("device open failed: {0}")]
    Open(String),

    #[error("device transport failed: {0}")]
    Transport(String),

    #[error("malformed record: {0}")]
    Decode(String),

    #[error("device write failed: {0}")]
    Write(String),

    #[error("device not open")]
    NotOpen,

    #[error("event bus channel error: {0}")]
    Channel(String),

    #[error("listener bind failed: {0}")]
    Bind(String),
}
