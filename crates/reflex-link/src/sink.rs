//! Traits at the device boundary.
//!
//! The link layer never talks to the orchestrator or the event bus
//! directly. Decoded telemetry flows out through a [`TelemetrySink`] and
//! operator commands flow in through a [`CommandSink`], so both sides can
//! be faked in tests without a serial port in sight.

use async_trait::async_trait;
use reflex_types::{BridgeError, CommandMessage, TelemetryEvent};

/// Consumer of decoded device telemetry.
///
/// Implemented by the bridge orchestrator; the [`DeviceReader`] calls it
/// once per decoded record and once, terminally, when the transport dies.
///
/// [`DeviceReader`]: crate::link::DeviceReader
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    /// One decoded record from the device stream.
    async fn telemetry(&self, event: TelemetryEvent);

    /// The device stream failed or closed; no further calls will follow.
    async fn transport_failed(&self, error: BridgeError);
}

/// Destination for operator commands.
///
/// A command is a single write attempt: completion is reported
/// asynchronously and failure is a normal return value, never a panic.
#[async_trait]
pub trait CommandSink: Send + Sync {
    /// Forward `cmd` verbatim to the device.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NotOpen`] when the transport reports itself closed
    /// (an expected state the caller logs and no-ops on), or
    /// [`BridgeError::Write`] for any other transport failure.
    async fn send(&self, cmd: &CommandMessage) -> Result<(), BridgeError>;
}
