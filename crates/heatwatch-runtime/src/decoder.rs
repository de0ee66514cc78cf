//! Telemetry decoding at the link boundary.
//!
//! The field device interleaves structured records with free-form
//! diagnostic prints on the same serial line.  Anything that does not open
//! with `{` is diagnostic chatter and is skipped quietly; anything that does
//! must parse as a [`TelemetryRecord`] or is rejected as malformed.

use heatwatch_types::{HeatwatchError, TelemetryRecord};
use tracing::trace;

/// First character of every structured record on the wire.
pub const RECORD_OPEN: char = '{';

/// Result of decoding one inbound line.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Record(TelemetryRecord),
    /// Blank line or out-of-band diagnostic text from the peer.
    Skip,
}

/// Decode one raw line from the link.
///
/// # Errors
///
/// Returns [`HeatwatchError::MalformedInput`] when the line opens like a
/// record but is not a valid one: broken JSON, a wrongly typed field, or a
/// non-finite number.
pub fn decode(raw: &str) -> Result<Decoded, HeatwatchError> {
    let line = raw.trim();
    if line.is_empty() {
        return Ok(Decoded::Skip);
    }
    if !line.starts_with(RECORD_OPEN) {
        trace!(line, "peer diagnostic");
        return Ok(Decoded::Skip);
    }

    let record: TelemetryRecord = serde_json::from_str(line)
        .map_err(|e| HeatwatchError::MalformedInput(e.to_string()))?;

    if let Some((field, value)) = record.numeric_fields().find(|(_, v)| !v.is_finite()) {
        return Err(HeatwatchError::MalformedInput(format!(
            "field {field} is not finite: {value}"
        )));
    }

    Ok(Decoded::Record(record))
}
