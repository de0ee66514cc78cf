//! [`FeatureDeriver`] – telemetry record to classifier input.
//!
//! Each sample carries up to two readings per quantity: a remote one from the
//! weather feed and a local one from the device's sensors.  Either may be
//! missing, and both sources report `0` when a read failed, so a zero is
//! treated exactly like a missing value.
//!
//! # Fallback order
//!
//! | Feature | Chain |
//! |---|---|
//! | temperature | remote → local → default (25.0) |
//! | humidity | remote → local → default (50.0) |
//! | apparent temperature | remote → resolved temperature |
//! | heat-index estimate | formula over the resolved values |
//! | hour of day | caller's wall clock |
//! | temperature delta | always 0.0 |
//!
//! The training pipeline computes `temperature_delta` against the next
//! sample in the series.  No such sample exists online, so it stays zero
//! here.

use heatwatch_types::{FeatureVector, TelemetryRecord};

pub const DEFAULT_TEMPERATURE: f64 = 25.0;
pub const DEFAULT_HUMIDITY: f64 = 50.0;

/// Values used when neither source supplies a reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivationDefaults {
    pub temperature: f64,
    pub humidity: f64,
}

impl Default for DerivationDefaults {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            humidity: DEFAULT_HUMIDITY,
        }
    }
}

/// Where a resolved feature value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Remote,
    Local,
    Default,
    /// Computed from other resolved features.
    Derived,
}

/// Provenance of the features that have a fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureSources {
    pub temperature: Source,
    pub humidity: Source,
    pub apparent_temperature: Source,
    pub heat_index_estimate: Source,
}

/// Weighted temperature/humidity/apparent blend used as a heat-stress proxy.
///
/// Not a standardised heat index; it matches the feature the classifier was
/// trained on.
pub fn heat_index_estimate(temperature: f64, humidity: f64, apparent: f64) -> f64 {
    0.7 * temperature + 0.2 * (humidity / 100.0 * temperature) + 0.1 * apparent
}

/// Pure, total mapping from [`TelemetryRecord`] to [`FeatureVector`].
#[derive(Debug, Clone, Default)]
pub struct FeatureDeriver {
    defaults: DerivationDefaults,
}

impl FeatureDeriver {
    pub fn new(defaults: DerivationDefaults) -> Self {
        Self { defaults }
    }

    /// Derive the feature vector for `record` at wall-clock hour `clock_hour`.
    pub fn derive(&self, record: &TelemetryRecord, clock_hour: u32) -> FeatureVector {
        self.derive_with_sources(record, clock_hour).0
    }

    /// Like [`derive`][Self::derive], also reporting which source each
    /// fallback feature was taken from.
    pub fn derive_with_sources(
        &self,
        record: &TelemetryRecord,
        clock_hour: u32,
    ) -> (FeatureVector, FeatureSources) {
        let (temperature, temperature_src) = resolve(
            record.remote_temp,
            record.local_temp,
            self.defaults.temperature,
        );
        let (humidity, humidity_src) =
            resolve(record.remote_rh, record.local_rh, self.defaults.humidity);

        let (apparent_temperature, apparent_src) = match available(record.remote_apparent) {
            Some(v) => (v, Source::Remote),
            None => (temperature, Source::Derived),
        };

        // The remote pair takes the raw remote humidity, zero included.
        // Resolved humidity is used only when no `om_rh` was sent.
        let remote_pair = match (available(record.remote_temp), available(record.remote_apparent)) {
            (Some(t), Some(app)) => Some((t, app)),
            _ => None,
        };
        let heat_index = match (remote_pair, record.remote_rh) {
            (Some((t, app)), Some(rh)) => heat_index_estimate(t, rh, app),
            _ => heat_index_estimate(temperature, humidity, apparent_temperature),
        };

        let features = FeatureVector {
            temperature,
            humidity,
            apparent_temperature,
            heat_index_estimate: heat_index,
            hour_of_day: f64::from(clock_hour % 24),
            temperature_delta: 0.0,
        };
        let sources = FeatureSources {
            temperature: temperature_src,
            humidity: humidity_src,
            apparent_temperature: apparent_src,
            heat_index_estimate: if remote_pair.is_some() {
                Source::Remote
            } else {
                Source::Derived
            },
        };
        (features, sources)
    }
}

/// A reading counts only if present and non-zero.
fn available(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0)
}

fn resolve(remote: Option<f64>, local: Option<f64>, default: f64) -> (f64, Source) {
    if let Some(v) = available(remote) {
        (v, Source::Remote)
    } else if let Some(v) = available(local) {
        (v, Source::Local)
    } else {
        (default, Source::Default)
    }
}
