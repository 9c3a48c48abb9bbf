//! `reflex-link` – The Device Layer
//!
//! Owns the single serial connection to the training device and turns its
//! raw byte stream into typed telemetry.
//!
//! # Modules
//!
//! - [`framer`] – [`LineFramer`][framer::LineFramer]: splits arbitrary byte
//!   chunks into newline-terminated records, carrying partial fragments
//!   across reads.
//! - [`decoder`] – classifies each record as a structured
//!   [`TelemetryEvent`][reflex_types::TelemetryEvent], a decode failure, or
//!   free-form device diagnostics.
//! - [`sink`] – the traits at the device boundary:
//!   [`TelemetrySink`][sink::TelemetrySink] (where decoded events go) and
//!   [`CommandSink`][sink::CommandSink] (where operator commands go).
//! - [`link`] – [`DeviceLink`][link::DeviceLink] /
//!   [`DeviceReader`][link::DeviceReader]: the open-once serial connection
//!   lifecycle.

pub mod decoder;
pub mod framer;
pub mod link;
pub mod sink;

pub use decoder::{Decoded, decode};
pub use framer::LineFramer;
pub use link::{DeviceLink, DeviceReader};
pub use sink::{CommandSink, TelemetrySink};
