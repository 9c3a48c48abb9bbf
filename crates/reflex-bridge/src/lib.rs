//! `reflex-bridge` – The Relay Core
//!
//! Routes telemetry from exactly one source (live device or simulator) to
//! every connected client, and operator commands back the other way,
//! without caring what the data means.
//!
//! # Modules
//!
//! - [`bus`] – [`EventBus`][bus::EventBus]: two typed broadcast lanes
//!   (telemetry out, commands in) built on Tokio broadcast channels.
//! - [`core`] – [`BridgeCore`][core::BridgeCore]: owns the connection
//!   state machine and decides, at any instant, where events come from and
//!   whether commands reach the device.
//! - [`sim`] – [`Simulator`][sim::Simulator]: synthetic distance telemetry
//!   at a fixed cadence, engaged permanently when no device is reachable.

pub mod bus;
pub mod core;
pub mod sim;

pub use crate::bus::EventBus;
pub use crate::core::BridgeCore;
pub use crate::sim::Simulator;
