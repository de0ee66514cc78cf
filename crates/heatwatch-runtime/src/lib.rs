//! `heatwatch-runtime` – the telemetry-to-decision engine.
//!
//! Turns framed telemetry from the field device into heat-stress alerts and
//! sends them back over the same link, indefinitely.
//!
//! # Modules
//!
//! - [`decoder`] – [`decode`][decoder::decode]: raw line to
//!   [`TelemetryRecord`][heatwatch_types::TelemetryRecord], skipping the
//!   device's diagnostic prints.
//! - [`features`] – [`FeatureDeriver`][features::FeatureDeriver]: the
//!   remote → local → default fallback chain that yields the fixed-order
//!   [`FeatureVector`][heatwatch_types::FeatureVector].
//! - [`classifier`] – [`ClassifierAdapter`][classifier::ClassifierAdapter]
//!   over the [`ProbabilisticClassifier`][classifier::ProbabilisticClassifier]
//!   and [`HardClassifier`][classifier::HardClassifier] capabilities, plus the
//!   supported model families.
//! - [`artifact`] – [`load_classifier`][artifact::load_classifier]: reads the
//!   JSON model artifact once at startup.  A missing artifact is valid.
//! - [`decision`] – [`DecisionPolicy`][decision::DecisionPolicy]: threshold
//!   and alert duration, and the wire encoding of the reply.
//! - [`inference_loop`] – [`InferenceLoop`][inference_loop::InferenceLoop]:
//!   the read → decode → derive → score → reply cycle with per-iteration
//!   fault isolation.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: global
//!   `tracing` subscriber with optional OTLP export.

pub mod artifact;
pub mod classifier;
pub mod decision;
pub mod decoder;
pub mod features;
pub mod inference_loop;
pub mod telemetry;

pub use artifact::{load_classifier, parse_classifier};
pub use classifier::{Classifier, ClassifierAdapter, HardClassifier, ProbabilisticClassifier, Score};
pub use decision::DecisionPolicy;
pub use decoder::{Decoded, decode};
pub use features::{DerivationDefaults, FeatureDeriver};
pub use inference_loop::{
    Clock, FixedClock, InferenceLoop, IterationOutcome, LocalClock, LoopConfig, LoopState, LoopStats,
};
pub use telemetry::{TracerProviderGuard, init_tracing};
