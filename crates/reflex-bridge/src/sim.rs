//! Synthetic telemetry for device-less operation.
//!
//! When the serial port cannot be opened (or dies mid-session) the bridge
//! keeps serving clients from a [`Simulator`]: one plausible `distance`
//! reading on a fixed cadence, forever. There is no stop – the fallback is
//! permanent for the process lifetime.

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use reflex_types::TelemetryEvent;
use tokio::task::JoinHandle;
use tracing::info;

use crate::core::BridgeCore;

/// Reference cadence of the original firmware's mock feed.
const DEFAULT_CADENCE: Duration = Duration::from_millis(500);
/// Plausible distance range in centimeters.
const DEFAULT_RANGE: RangeInclusive<f64> = 50.0..=150.0;

/// Fallback event source emitting synthetic `distance` readings.
#[derive(Debug, Clone)]
pub struct Simulator {
    cadence: Duration,
    range: RangeInclusive<f64>,
}

impl Simulator {
    pub fn new(cadence: Duration, range: RangeInclusive<f64>) -> Self {
        Self { cadence, range }
    }

    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    /// One synthetic reading: `dist` uniform over the configured range,
    /// rounded to a tenth of a centimeter, tagged `state: "play"`.
    pub fn synth(&self) -> TelemetryEvent {
        let dist = rand::thread_rng().gen_range(self.range.clone());
        TelemetryEvent::simulated_distance((dist * 10.0).round() / 10.0)
    }

    /// Spawn the emitter task feeding `core` until process termination.
    ///
    /// Callers must not invoke this twice; [`BridgeCore::fall_back`] owns
    /// the single-start guard.
    pub fn spawn(&self, core: Arc<BridgeCore>) -> JoinHandle<()> {
        let sim = self.clone();
        info!(cadence_ms = sim.cadence.as_millis() as u64, "simulator engaged");
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sim.cadence);
            loop {
                ticker.tick().await;
                core.simulator_event(sim.synth());
            }
        })
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new(DEFAULT_CADENCE, DEFAULT_RANGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reflex_types::{SensorEvent, TelemetryEvent};

    #[test]
    fn synth_stays_in_range_with_play_state() {
        let sim = Simulator::default();
        for _ in 0..200 {
            match sim.synth() {
                TelemetryEvent::Sensor(SensorEvent::Distance { dist, state }) => {
                    assert!((50.0..=150.0).contains(&dist), "dist out of range: {dist}");
                    assert_eq!(state.as_deref(), Some("play"));
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[test]
    fn synth_rounds_to_tenths() {
        let sim = Simulator::default();
        for _ in 0..50 {
            if let TelemetryEvent::Sensor(SensorEvent::Distance { dist, .. }) = sim.synth() {
                let scaled = dist * 10.0;
                assert!((scaled - scaled.round()).abs() < 1e-9, "not tenths: {dist}");
            }
        }
    }
}
