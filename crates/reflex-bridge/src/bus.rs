//! Headless, typed publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.
//!
//! Traffic is partitioned into two typed lanes:
//!
//! | Lane | Direction | Payload |
//! |---|---|---|
//! | telemetry | bridge → every client | [`TelemetryEvent`] |
//! | commands | any client → bridge | [`CommandMessage`] |
//!
//! Delivery is at-most-once: subscribers that connect later miss earlier
//! broadcasts, and slow subscribers observe `Lagged` instead of exerting
//! back-pressure.

use reflex_types::{CommandMessage, TelemetryEvent};
use tokio::sync::broadcast;

/// Default lane capacity (buffered messages before old ones are dropped for
/// slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Shared event bus. Clone it cheaply – all clones share the same
/// underlying broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    telemetry: broadcast::Sender<TelemetryEvent>,
    commands: broadcast::Sender<CommandMessage>,
}

impl EventBus {
    /// Create a new bus; `capacity` applies to each lane independently.
    pub fn new(capacity: usize) -> Self {
        let (telemetry, _) = broadcast::channel(capacity);
        let (commands, _) = broadcast::channel(capacity);
        Self {
            telemetry,
            commands,
        }
    }

    /// Broadcast a telemetry event to every current subscriber.
    ///
    /// Returns the number of subscribers that were handed the event. Zero
    /// means no client is connected right now – a normal condition, not an
    /// error.
    pub fn publish_telemetry(&self, event: TelemetryEvent) -> usize {
        self.telemetry.send(event).unwrap_or(0)
    }

    /// Subscribe to the telemetry lane.
    pub fn subscribe_telemetry(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.telemetry.subscribe()
    }

    /// Publish an inbound client command toward the bridge.
    ///
    /// Returns the number of subscribers that were handed the command;
    /// zero when the command loop is not (yet) running.
    pub fn publish_command(&self, cmd: CommandMessage) -> usize {
        self.commands.send(cmd).unwrap_or(0)
    }

    /// Subscribe to the command lane.
    pub fn subscribe_commands(&self) -> broadcast::Receiver<CommandMessage> {
        self.commands.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
