//! Record classification: structured telemetry vs device diagnostics.
//!
//! The device interleaves plain-text debug output with JSON telemetry on
//! the same stream. A cheap structural filter (`{` first, `}` last) routes
//! the common diagnostic case away before the JSON parser is ever invoked,
//! so free-form firmware chatter costs neither parse time nor error noise.

use reflex_types::{BridgeError, TelemetryEvent};
use serde_json::Value;

/// Classification of one trimmed record.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// A well-formed JSON object, decoded into a [`TelemetryEvent`].
    Event(TelemetryEvent),
    /// Free-form device output; log it, emit nothing.
    Diagnostic,
}

/// Classify `record`.
///
/// Exactly one of three things happens:
///
/// * the record is object-shaped and parses → `Ok(Decoded::Event)`;
/// * the record is object-shaped but malformed → `Err(BridgeError::Decode)`
///   (the caller logs and drops it, the stream continues);
/// * anything else → `Ok(Decoded::Diagnostic)`.
pub fn decode(record: &str) -> Result<Decoded, BridgeError> {
    if !(record.starts_with('{') && record.ends_with('}')) {
        return Ok(Decoded::Diagnostic);
    }

    let value: Value = serde_json::from_str(record)
        .map_err(|e| BridgeError::Decode(format!("{e}: {record}")))?;
    if !value.is_object() {
        return Err(BridgeError::Decode(format!("not a JSON object: {record}")));
    }

    let event = serde_json::from_value(value)
        .map_err(|e| BridgeError::Decode(format!("{e}: {record}")))?;
    Ok(Decoded::Event(event))
}
