//! `heatwatch-types` – shared data model for the telemetry-to-decision loop.
//!
//! Every record here is scoped to a single loop iteration: a
//! [`TelemetryRecord`] arrives over the link, becomes a [`FeatureVector`],
//! and leaves as a [`DecisionResponse`].  [`HeatwatchError`] is the single
//! error taxonomy shared by the HAL, the runtime and the CLI.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Placeholder used when the field device does not identify itself.
pub const DEFAULT_STATION_ID: &str = "station";

/// Canonical feature order expected by every classifier artifact.
///
/// Changing this order invalidates all trained artifacts.
pub const FEATURE_NAMES: [&str; 6] = [
    "temperature",
    "humidity",
    "apparent_temperature",
    "heat_index_estimate",
    "hour_of_day",
    "temperature_delta",
];

/// Column names used by the offline training pipeline for the same six
/// features, in the same order.  Artifacts may declare either spelling.
pub const TRAINING_FEATURE_NAMES: [&str; 6] = [
    "temperature",
    "humidity",
    "apparent_temp",
    "wbgt_est",
    "hour",
    "temp_delta",
];

/// One structured sample received from the field device.
///
/// Remote readings come from the weather feed the device relays (`om_*` on
/// the wire); local readings come from the device's own sensors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    #[serde(
        default = "default_station_id",
        deserialize_with = "station_id_or_default"
    )]
    pub station_id: String,
    #[serde(default)]
    pub local_temp: Option<f64>,
    #[serde(default)]
    pub local_rh: Option<f64>,
    #[serde(default, rename = "om_temp")]
    pub remote_temp: Option<f64>,
    #[serde(default, rename = "om_rh")]
    pub remote_rh: Option<f64>,
    #[serde(default, rename = "om_apparent")]
    pub remote_apparent: Option<f64>,
}

impl Default for TelemetryRecord {
    fn default() -> Self {
        Self {
            station_id: default_station_id(),
            local_temp: None,
            local_rh: None,
            remote_temp: None,
            remote_rh: None,
            remote_apparent: None,
        }
    }
}

impl TelemetryRecord {
    /// Iterate over every numeric field that is present, paired with its
    /// wire name.
    pub fn numeric_fields(&self) -> impl Iterator<Item = (&'static str, f64)> {
        [
            ("local_temp", self.local_temp),
            ("local_rh", self.local_rh),
            ("om_temp", self.remote_temp),
            ("om_rh", self.remote_rh),
            ("om_apparent", self.remote_apparent),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
    }
}

fn default_station_id() -> String {
    DEFAULT_STATION_ID.to_string()
}

/// Treat an explicit JSON `null` station id the same as a missing one.
fn station_id_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_station_id))
}

/// The fixed-order numeric input to the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureVector {
    pub temperature: f64,
    pub humidity: f64,
    pub apparent_temperature: f64,
    pub heat_index_estimate: f64,
    pub hour_of_day: f64,
    pub temperature_delta: f64,
}

impl FeatureVector {
    /// Flatten into the order given by [`FEATURE_NAMES`].
    pub fn to_array(&self) -> [f64; 6] {
        [
            self.temperature,
            self.humidity,
            self.apparent_temperature,
            self.heat_index_estimate,
            self.hour_of_day,
            self.temperature_delta,
        ]
    }
}

/// The reply sent back to the field device.
///
/// Field names on the wire are `decision`, `prob` and `duration`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionResponse {
    pub decision: u8,
    #[serde(rename = "prob")]
    pub probability: f64,
    #[serde(rename = "duration")]
    pub duration_seconds: u64,
}

/// Error taxonomy for the whole workspace.
///
/// Only [`HeatwatchError::LinkUnavailable`] and [`HeatwatchError::Config`]
/// are fatal, and only at startup.  Everything else is recovered inside the
/// loop iteration that produced it.
#[derive(Error, Debug)]
pub enum HeatwatchError {
    #[error("Link unavailable at {address}: {details}")]
    LinkUnavailable { address: String, details: String },

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Link read failed: {0}")]
    ReadError(String),

    #[error("Link write failed: {0}")]
    WriteError(String),

    #[error("Invalid model artifact at {path}: {details}")]
    ArtifactInvalid { path: String, details: String },

    #[error("Scoring failed: {0}")]
    ScoringFailed(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl HeatwatchError {
    /// `true` for errors that must stop the process instead of the iteration.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HeatwatchError::LinkUnavailable { .. } | HeatwatchError::Config(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telemetry_record_reads_wire_names() {
        let raw = r#"{"station_id":"s-7","local_temp":29.5,"local_rh":61,"om_temp":32,"om_rh":40,"om_apparent":36}"#;
        let rec: TelemetryRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(rec.station_id, "s-7");
        assert_eq!(rec.local_temp, Some(29.5));
        assert_eq!(rec.local_rh, Some(61.0));
        assert_eq!(rec.remote_temp, Some(32.0));
        assert_eq!(rec.remote_rh, Some(40.0));
        assert_eq!(rec.remote_apparent, Some(36.0));
    }

    #[test]
    fn telemetry_record_defaults_missing_fields() {
        let rec: TelemetryRecord = serde_json::from_str("{}").unwrap();
        assert_eq!(rec, TelemetryRecord::default());
        assert_eq!(rec.station_id, DEFAULT_STATION_ID);
    }

    #[test]
    fn telemetry_record_null_means_absent() {
        let rec: TelemetryRecord =
            serde_json::from_str(r#"{"station_id":null,"om_temp":null,"local_rh":55}"#).unwrap();
        assert_eq!(rec.station_id, DEFAULT_STATION_ID);
        assert!(rec.remote_temp.is_none());
        assert_eq!(rec.local_rh, Some(55.0));
    }

    #[test]
    fn numeric_fields_skips_absent_values() {
        let rec = TelemetryRecord {
            remote_temp: Some(31.0),
            local_rh: Some(44.0),
            ..TelemetryRecord::default()
        };
        let fields: Vec<_> = rec.numeric_fields().collect();
        assert_eq!(fields, vec![("local_rh", 44.0), ("om_temp", 31.0)]);
    }

    #[test]
    fn decision_response_uses_wire_names() {
        let resp = DecisionResponse {
            decision: 1,
            probability: 0.85,
            duration_seconds: 60,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(json, r#"{"decision":1,"prob":0.85,"duration":60}"#);
    }

    #[test]
    fn feature_vector_array_follows_canonical_order() {
        let fv = FeatureVector {
            temperature: 1.0,
            humidity: 2.0,
            apparent_temperature: 3.0,
            heat_index_estimate: 4.0,
            hour_of_day: 5.0,
            temperature_delta: 6.0,
        };
        assert_eq!(fv.to_array(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(FEATURE_NAMES.len(), TRAINING_FEATURE_NAMES.len());
    }

    #[test]
    fn heatwatch_error_display_and_fatality() {
        let err = HeatwatchError::LinkUnavailable {
            address: "/dev/ttyUSB0".to_string(),
            details: "No such file or directory".to_string(),
        };
        assert!(err.to_string().contains("/dev/ttyUSB0"));
        assert!(err.is_fatal());

        let err2 = HeatwatchError::MalformedInput("expected value".to_string());
        assert!(err2.to_string().contains("Malformed input"));
        assert!(!err2.is_fatal());
    }

    #[test]
    fn broken_artifact_and_io_faults_are_recoverable() {
        let artifact = HeatwatchError::ArtifactInvalid {
            path: "heat_model.json".to_string(),
            details: "missing field `model`".to_string(),
        };
        assert!(!artifact.is_fatal());
        assert!(!HeatwatchError::ReadError("device reset".to_string()).is_fatal());
        assert!(!HeatwatchError::WriteError("broken pipe".to_string()).is_fatal());
        assert!(!HeatwatchError::ScoringFailed("NaN".to_string()).is_fatal());
        assert!(HeatwatchError::Config("threshold out of range".to_string()).is_fatal());
    }
}
