//! Probability to reply conversion.

use heatwatch_types::{DecisionResponse, HeatwatchError};

pub const DEFAULT_THRESHOLD: f64 = 0.8;
pub const DEFAULT_DURATION_SECS: u64 = 60;

/// Fixed decision policy: alert threshold and alert duration.
///
/// Neither value is learned; both come from configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionPolicy {
    pub threshold: f64,
    pub duration_secs: u64,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            duration_secs: DEFAULT_DURATION_SECS,
        }
    }
}

impl DecisionPolicy {
    /// Alert (`1`) iff `probability >= threshold`.
    ///
    /// The comparison uses the exact probability; only the reported value is
    /// rounded.
    pub fn encode(&self, probability: f64) -> DecisionResponse {
        DecisionResponse {
            decision: u8::from(probability >= self.threshold),
            probability: round_probability(probability),
            duration_seconds: self.duration_secs,
        }
    }

    /// Reply used when no classifier is loaded, whatever the threshold.
    pub fn no_model(&self) -> DecisionResponse {
        DecisionResponse {
            decision: 0,
            probability: 0.0,
            duration_seconds: self.duration_secs,
        }
    }
}

/// Round to three decimals, as reported on the wire.
pub fn round_probability(probability: f64) -> f64 {
    (probability * 1000.0).round() / 1000.0
}

/// Serialize a reply into its single-line wire form (no terminator).
pub fn to_wire(response: &DecisionResponse) -> Result<String, HeatwatchError> {
    serde_json::to_string(response).map_err(|e| HeatwatchError::Serialization(e.to_string()))
}
