//! [`BridgeCore`] – the single orchestration point.
//!
//! Owns the [`ConnectionState`] machine and the device command sink.
//! Telemetry from either source funnels through here onto the bus;
//! commands from the bus funnel through here toward the device. Nothing
//! else mutates the state, so the latch below needs no coordination beyond
//! its own locks:
//!
//! ```text
//! Uninitialized ──open ok──▶ DeviceConnected ──transport error──▶ Simulating
//!       └─────────────────────open failed────────────────────────────▲
//! ```
//!
//! The transition into `Simulating` is one-way and permanent for the
//! process lifetime; there is no reconnection attempt.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use reflex_link::{CommandSink, TelemetrySink};
use reflex_types::{BridgeError, CommandMessage, ConnectionState, TelemetryEvent};

use crate::bus::EventBus;
use crate::sim::Simulator;

/// Orchestrator deciding, at any instant, whether events originate from
/// the device or the simulator, and whether commands get written out or
/// swallowed.
pub struct BridgeCore {
    bus: Arc<EventBus>,
    simulator: Simulator,
    me: Weak<BridgeCore>,
    state: Mutex<ConnectionState>,
    sink: Mutex<Option<Arc<dyn CommandSink>>>,
    sim_started: AtomicBool,
}

impl BridgeCore {
    /// Create a core with the reference simulator cadence.
    pub fn new(bus: Arc<EventBus>) -> Arc<Self> {
        Self::with_simulator(bus, Simulator::default())
    }

    /// Create a core with a caller-supplied fallback simulator.
    pub fn with_simulator(bus: Arc<EventBus>, simulator: Simulator) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            bus,
            simulator,
            me: me.clone(),
            state: Mutex::new(ConnectionState::Uninitialized),
            sink: Mutex::new(None),
            sim_started: AtomicBool::new(false),
        })
    }

    /// Current position in the state machine.
    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap()
    }

    /// Register the opened device's write half; `Uninitialized →
    /// DeviceConnected`.
    pub fn attach_device(&self, sink: Arc<dyn CommandSink>) {
        *self.sink.lock().unwrap() = Some(sink);
        *self.state.lock().unwrap() = ConnectionState::DeviceConnected;
        info!("device attached; relaying live telemetry");
    }

    /// Latch into `Simulating` and engage the fallback simulator.
    ///
    /// Idempotent: the first call wins and returns `true`; any later call
    /// (a second transport error, a stray retry) is a no-op returning
    /// `false`. The device sink is dropped – in-flight state is abandoned,
    /// nothing is drained or flushed.
    pub fn fall_back(&self, reason: BridgeError) -> bool {
        {
            let mut state = self.state.lock().unwrap();
            if *state == ConnectionState::Simulating {
                debug!(error = %reason, "already simulating; fallback ignored");
                return false;
            }
            warn!(error = %reason, "device unavailable; switching to simulated telemetry");
            *state = ConnectionState::Simulating;
        }
        *self.sink.lock().unwrap() = None;

        if !self.sim_started.swap(true, Ordering::SeqCst)
            && let Some(core) = self.me.upgrade()
        {
            self.simulator.spawn(core);
        }
        true
    }

    /// Telemetry decoded from the live device stream.
    ///
    /// Broadcast only while `DeviceConnected`: once the latch has flipped,
    /// a stray late record from the dying reader is dropped, keeping the
    /// two sources mutually exclusive.
    pub fn device_event(&self, event: TelemetryEvent) {
        if self.state() != ConnectionState::DeviceConnected {
            debug!(kind = event.kind(), "dropping device event after fallback");
            return;
        }
        debug!(kind = event.kind(), "relaying device event");
        self.bus.publish_telemetry(event);
    }

    /// Telemetry synthesized by the simulator.
    pub fn simulator_event(&self, event: TelemetryEvent) {
        if self.state() != ConnectionState::Simulating {
            debug!("dropping simulator event outside simulation");
            return;
        }
        self.bus.publish_telemetry(event);
    }

    /// One write attempt for one client command.
    ///
    /// Without an open device (pre-open window or simulating) the command
    /// is acknowledged in the log and dropped; the client never sees a
    /// failure signal.
    pub async fn dispatch_command(&self, cmd: CommandMessage) {
        let sink = {
            if self.state() != ConnectionState::DeviceConnected {
                info!(command = %cmd, "no device; command received but not forwarded");
                return;
            }
            self.sink.lock().unwrap().clone()
        };

        let Some(sink) = sink else {
            info!(command = %cmd, "no device; command received but not forwarded");
            return;
        };

        match sink.send(&cmd).await {
            Ok(()) => debug!(command = %cmd, "command forwarded to device"),
            Err(BridgeError::NotOpen) => {
                info!(command = %cmd, "device not open; command dropped")
            }
            Err(e) => warn!(command = %cmd, error = %e, "command write failed"),
        }
    }

    /// Consume the command lane until the bus closes.
    pub async fn run_command_loop(self: Arc<Self>) {
        let mut rx = self.bus.subscribe_commands();
        loop {
            match rx.recv().await {
                Ok(cmd) => self.dispatch_command(cmd).await,
                Err(RecvError::Lagged(n)) => warn!(lagged_by = n, "command loop lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    }
}

#[async_trait]
impl TelemetrySink for BridgeCore {
    async fn telemetry(&self, event: TelemetryEvent) {
        self.device_event(event);
    }

    async fn transport_failed(&self, error: BridgeError) {
        self.fall_back(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reflex_types::{SensorEvent, TelemetryEvent};
    use std::time::Duration;

    /// A simulator slow enough to stay silent for the whole test.
    fn parked_simulator() -> Simulator {
        Simulator::new(Duration::from_secs(3600), 50.0..=150.0)
    }

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<CommandMessage>>,
        fail_with: Option<BridgeError>,
    }

    #[async_trait]
    impl CommandSink for RecordingSink {
        async fn send(&self, cmd: &CommandMessage) -> Result<(), BridgeError> {
            if let Some(e) = &self.fail_with {
                return Err(e.clone());
            }
            self.sent.lock().unwrap().push(cmd.clone());
            Ok(())
        }
    }

    fn distance(dist: f64) -> TelemetryEvent {
        TelemetryEvent::Sensor(SensorEvent::Distance { dist, state: None })
    }

    #[tokio::test]
    async fn device_events_are_broadcast_while_connected() {
        let bus = Arc::new(EventBus::default());
        let core = BridgeCore::with_simulator(Arc::clone(&bus), parked_simulator());
        let mut rx = bus.subscribe_telemetry();

        core.attach_device(Arc::new(RecordingSink::default()));
        assert_eq!(core.state(), ConnectionState::DeviceConnected);

        core.device_event(distance(42.5));
        assert_eq!(rx.recv().await.unwrap(), distance(42.5));
    }

    #[tokio::test]
    async fn uninitialized_core_forwards_nothing() {
        let bus = Arc::new(EventBus::default());
        let core = BridgeCore::with_simulator(Arc::clone(&bus), parked_simulator());
        let mut rx = bus.subscribe_telemetry();

        core.device_event(distance(10.0));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn latch_is_one_way_even_for_stray_late_events() {
        let bus = Arc::new(EventBus::default());
        let core = BridgeCore::with_simulator(Arc::clone(&bus), parked_simulator());
        let mut rx = bus.subscribe_telemetry();

        core.attach_device(Arc::new(RecordingSink::default()));
        assert!(core.fall_back(BridgeError::Transport("port vanished".into())));
        assert_eq!(core.state(), ConnectionState::Simulating);

        // A stray callback from the dying reader must be dropped.
        core.device_event(distance(99.0));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn fall_back_twice_engages_one_simulator() {
        let bus = Arc::new(EventBus::default());
        let core = BridgeCore::with_simulator(Arc::clone(&bus), parked_simulator());

        assert!(core.fall_back(BridgeError::Open("no port".into())));
        assert!(!core.fall_back(BridgeError::Transport("again".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn double_fallback_keeps_single_cadence() {
        let bus = Arc::new(EventBus::default());
        let sim = Simulator::new(Duration::from_millis(500), 50.0..=150.0);
        let core = BridgeCore::with_simulator(Arc::clone(&bus), sim);
        let mut rx = bus.subscribe_telemetry();

        core.fall_back(BridgeError::Open("no port".into()));
        core.fall_back(BridgeError::Open("no port".into()));

        // With exactly one timer, consecutive events arrive a full cadence
        // apart; a duplicate timer would deliver back-to-back events.
        rx.recv().await.unwrap();
        let first = tokio::time::Instant::now();
        rx.recv().await.unwrap();
        let gap = tokio::time::Instant::now() - first;
        assert!(gap >= Duration::from_millis(499), "gap was {gap:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn open_failure_broadcasts_simulated_distance_within_one_interval() {
        let bus = Arc::new(EventBus::default());
        let core = BridgeCore::new(Arc::clone(&bus));
        let mut rx = bus.subscribe_telemetry();

        core.fall_back(BridgeError::Open("no such port".into()));

        let event = tokio::time::timeout(Duration::from_millis(500), rx.recv())
            .await
            .expect("no event within one simulator interval")
            .unwrap();
        match event {
            TelemetryEvent::Sensor(SensorEvent::Distance { dist, state }) => {
                assert!((50.0..=150.0).contains(&dist));
                assert_eq!(state.as_deref(), Some("play"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn command_while_connected_issues_exactly_one_write() {
        let bus = Arc::new(EventBus::default());
        let core = BridgeCore::with_simulator(Arc::clone(&bus), parked_simulator());
        let sink = Arc::new(RecordingSink::default());

        core.attach_device(Arc::clone(&sink) as Arc<dyn CommandSink>);
        core.dispatch_command(CommandMessage::from("n")).await;

        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.as_slice(), &[CommandMessage::from("n")]);
    }

    #[tokio::test]
    async fn command_while_simulating_never_reaches_the_sink() {
        let bus = Arc::new(EventBus::default());
        let core = BridgeCore::with_simulator(Arc::clone(&bus), parked_simulator());
        let sink = Arc::new(RecordingSink::default());

        core.attach_device(Arc::clone(&sink) as Arc<dyn CommandSink>);
        core.fall_back(BridgeError::Transport("gone".into()));
        core.dispatch_command(CommandMessage::from("n")).await;

        assert!(sink.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn write_failure_is_swallowed() {
        let bus = Arc::new(EventBus::default());
        let core = BridgeCore::with_simulator(Arc::clone(&bus), parked_simulator());
        let sink = Arc::new(RecordingSink {
            sent: Mutex::new(Vec::new()),
            fail_with: Some(BridgeError::NotOpen),
        });

        core.attach_device(sink);
        // Must not panic or change state.
        core.dispatch_command(CommandMessage::from("n")).await;
        assert_eq!(core.state(), ConnectionState::DeviceConnected);
    }

    #[tokio::test]
    async fn command_loop_feeds_the_sink() {
        let bus = Arc::new(EventBus::default());
        let core = BridgeCore::with_simulator(Arc::clone(&bus), parked_simulator());
        let sink = Arc::new(RecordingSink::default());
        core.attach_device(Arc::clone(&sink) as Arc<dyn CommandSink>);

        tokio::spawn(Arc::clone(&core).run_command_loop());
        // Give the loop a beat to subscribe before publishing.
        tokio::task::yield_now().await;
        bus.publish_command(CommandMessage::from("n"));

        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        loop {
            if !sink.sent.lock().unwrap().is_empty() {
                break;
            }
            assert!(tokio::time::Instant::now() < deadline, "command never arrived");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(sink.sent.lock().unwrap().len(), 1);
    }
}
