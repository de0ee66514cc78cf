//! [`InferenceLoop`] – the telemetry-to-decision cycle.
//!
//! Each iteration walks the same linear path:
//!
//! 1. **Idle** – ask the [`LinkChannel`] for a line (bounded by
//!    `read_timeout`).
//! 2. **Decoding** – [`decode`] the line.  Diagnostic chatter is skipped;
//!    malformed records are rejected without a reply.
//! 3. **Deriving** – build the [`FeatureVector`] with the wall-clock hour
//!    from the [`Clock`].
//! 4. **Scoring** – run the [`ClassifierAdapter`].  With no model the reply
//!    is the fixed `decision 0 / prob 0.0` fallback.
//! 5. **Replying** – encode and write exactly one line back.
//!
//! # Scheduling
//!
//! The loop has two suspension points and no others: the bounded read, and
//! the `poll_interval` sleep taken when no line was ready.  After a fault
//! the loop additionally pauses for `fault_pause` before returning to Idle.
//!
//! # Fault isolation
//!
//! [`run`][InferenceLoop::run] catches every error and panic raised by a
//! single iteration, logs it, and carries on.  Only the shutdown flag ends
//! the loop.
//!
//! # Example
//!
//! ```rust
//! use heatwatch_hal::MemoryLink;
//! use heatwatch_runtime::{ClassifierAdapter, FixedClock, InferenceLoop, IterationOutcome, LoopConfig};
//!
//! let link = MemoryLink::with_lines([r#"{"om_temp":32,"om_rh":40,"om_apparent":36}"#]);
//! let mut lp = InferenceLoop::new(link, ClassifierAdapter::without_model(), LoopConfig::default())
//!     .with_clock(FixedClock(14));
//! assert!(matches!(lp.step(), Ok(IterationOutcome::Replied(_))));
//! assert_eq!(lp.link().sent(), [r#"{"decision":0,"prob":0.0,"duration":60}"#.to_string()]);
//! ```

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use chrono::Timelike;
use heatwatch_hal::LinkChannel;
use heatwatch_types::{DecisionResponse, FeatureVector, HeatwatchError};
use tracing::{debug, error, info, instrument, warn};

use crate::classifier::{ClassifierAdapter, Score};
use crate::decision::{DecisionPolicy, to_wire};
use crate::decoder::{Decoded, decode};
use crate::features::{DerivationDefaults, FeatureDeriver};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Timing and policy bundle for [`InferenceLoop`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopConfig {
    /// Upper bound on a single link read.
    pub read_timeout: Duration,
    /// Sleep taken when no line was available.
    pub poll_interval: Duration,
    /// Sleep taken after a fault, before returning to Idle.
    pub fault_pause: Duration,
    pub defaults: DerivationDefaults,
    pub policy: DecisionPolicy,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(100),
            fault_pause: Duration::from_secs(1),
            defaults: DerivationDefaults::default(),
            policy: DecisionPolicy::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Clock
// ─────────────────────────────────────────────────────────────────────────────

/// Source of the wall-clock hour used as a feature.
pub trait Clock: Send {
    /// Current hour of day, 0–23.
    fn hour(&self) -> u32;
}

/// The host's local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn hour(&self) -> u32 {
        chrono::Local::now().hour()
    }
}

/// Always reports the same hour.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub u32);

impl Clock for FixedClock {
    fn hour(&self) -> u32 {
        self.0
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// State, outcome, stats
// ─────────────────────────────────────────────────────────────────────────────

/// Where the loop currently is within an iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Decoding,
    Deriving,
    Scoring,
    Replying,
}

/// What a single [`InferenceLoop::step`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum IterationOutcome {
    /// No complete line was available.
    NoData,
    /// Blank line or peer diagnostic text.
    Skipped,
    /// The sample could not be decoded or scored; no reply was sent.
    Rejected,
    Replied(DecisionResponse),
    /// A reply was produced but could not be written.
    WriteFailed,
}

/// Running counters, reported at shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub lines: u64,
    pub skipped: u64,
    pub rejected: u64,
    pub replied: u64,
    pub write_failures: u64,
    pub faults: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// InferenceLoop
// ─────────────────────────────────────────────────────────────────────────────

/// Owns the link, the model handle and the per-iteration pipeline.
pub struct InferenceLoop<L: LinkChannel, C: Clock = LocalClock> {
    link: L,
    classifier: ClassifierAdapter,
    deriver: FeatureDeriver,
    policy: DecisionPolicy,
    read_timeout: Duration,
    poll_interval: Duration,
    fault_pause: Duration,
    clock: C,
    state: LoopState,
    stats: LoopStats,
}

impl<L: LinkChannel> InferenceLoop<L, LocalClock> {
    /// Build a loop that reads the hour from the local clock.
    pub fn new(link: L, classifier: ClassifierAdapter, config: LoopConfig) -> Self {
        Self {
            link,
            classifier,
            deriver: FeatureDeriver::new(config.defaults),
            policy: config.policy,
            read_timeout: config.read_timeout,
            poll_interval: config.poll_interval,
            fault_pause: config.fault_pause,
            clock: LocalClock,
            state: LoopState::Idle,
            stats: LoopStats::default(),
        }
    }
}

impl<L: LinkChannel, C: Clock> InferenceLoop<L, C> {
    /// Replace the clock, e.g. with a [`FixedClock`] in tests.
    pub fn with_clock<C2: Clock>(self, clock: C2) -> InferenceLoop<L, C2> {
        InferenceLoop {
            link: self.link,
            classifier: self.classifier,
            deriver: self.deriver,
            policy: self.policy,
            read_timeout: self.read_timeout,
            poll_interval: self.poll_interval,
            fault_pause: self.fault_pause,
            clock,
            state: self.state,
            stats: self.stats,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn into_link(self) -> L {
        self.link
    }

    /// Run one iteration without sleeping.
    ///
    /// # Errors
    ///
    /// Returns `Err` only for faults that should be handled at the loop
    /// boundary: a failed link read or a reply that cannot be serialized.
    /// Malformed input, scoring failures and write failures are reported as
    /// [`IterationOutcome`]s.
    #[instrument(name = "inference_iteration", level = "debug", skip(self), fields(link = self.link.address()))]
    pub fn step(&mut self) -> Result<IterationOutcome, HeatwatchError> {
        self.state = LoopState::Idle;
        let Some(line) = self.link.read_line(self.read_timeout)? else {
            return Ok(IterationOutcome::NoData);
        };
        self.stats.lines += 1;

        // ── Decoding ──────────────────────────────────────────────────────
        self.state = LoopState::Decoding;
        let record = match decode(&line) {
            Ok(Decoded::Record(record)) => record,
            Ok(Decoded::Skip) => {
                self.stats.skipped += 1;
                return Ok(self.finish(IterationOutcome::Skipped));
            }
            Err(e) => {
                warn!(error = %e, "rejecting telemetry line");
                self.stats.rejected += 1;
                return Ok(self.finish(IterationOutcome::Rejected));
            }
        };
        debug!(station = %record.station_id, "telemetry received");

        // ── Deriving ──────────────────────────────────────────────────────
        self.state = LoopState::Deriving;
        let (features, sources) = self.deriver.derive_with_sources(&record, self.clock.hour());
        debug!(features = ?features, sources = ?sources, "features derived");

        // ── Scoring ───────────────────────────────────────────────────────
        self.state = LoopState::Scoring;
        let response = match self.score(&features) {
            Ok(response) => response,
            Err(e) => {
                warn!(station = %record.station_id, error = %e, "scoring failed; no reply");
                self.stats.rejected += 1;
                return Ok(self.finish(IterationOutcome::Rejected));
            }
        };

        // ── Replying ──────────────────────────────────────────────────────
        self.state = LoopState::Replying;
        let wire = to_wire(&response)?;
        let outcome = match self.link.write_line(&wire) {
            Ok(()) => {
                self.stats.replied += 1;
                info!(
                    station = %record.station_id,
                    decision = response.decision,
                    prob = response.probability,
                    duration = response.duration_seconds,
                    "reply sent"
                );
                IterationOutcome::Replied(response)
            }
            Err(e) => {
                warn!(station = %record.station_id, error = %e, "reply not delivered");
                self.stats.write_failures += 1;
                IterationOutcome::WriteFailed
            }
        };
        Ok(self.finish(outcome))
    }

    /// Loop until `shutdown` is raised, returning the final counters.
    pub fn run(&mut self, shutdown: &AtomicBool) -> LoopStats {
        info!(
            link = self.link.address(),
            model = self.classifier.capability(),
            threshold = self.policy.threshold,
            "inference loop started"
        );

        while !shutdown.load(Ordering::Acquire) {
            match panic::catch_unwind(AssertUnwindSafe(|| self.step())) {
                Ok(Ok(IterationOutcome::NoData)) => thread::sleep(self.poll_interval),
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    self.record_fault(&e.to_string());
                    thread::sleep(self.fault_pause);
                }
                Err(payload) => {
                    self.record_fault(&panic_message(payload.as_ref()));
                    thread::sleep(self.fault_pause);
                }
            }
        }

        let s = self.stats;
        info!(
            lines = s.lines,
            skipped = s.skipped,
            rejected = s.rejected,
            replied = s.replied,
            write_failures = s.write_failures,
            faults = s.faults,
            "inference loop stopped"
        );
        s
    }

    fn score(&self, features: &FeatureVector) -> Result<DecisionResponse, HeatwatchError> {
        match self.classifier.score(features)? {
            Score::Probability(p) => Ok(self.policy.encode(p)),
            Score::NoModel => {
                debug!("no model loaded; defaulting decision to 0");
                Ok(self.policy.no_model())
            }
        }
    }

    fn finish(&mut self, outcome: IterationOutcome) -> IterationOutcome {
        self.state = LoopState::Idle;
        outcome
    }

    fn record_fault(&mut self, message: &str) {
        self.stats.faults += 1;
        error!(state = ?self.state, error = message, "iteration fault; pausing");
        self.state = LoopState::Idle;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic with non-string payload".to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use heatwatch_hal::MemoryLink;

    use super::*;
    use crate::classifier::{Classifier, ProbabilisticClassifier};

    struct Stub(f64);

    impl ProbabilisticClassifier for Stub {
        fn predict_proba(&self, _features: &[f64; 6]) -> f64 {
            self.0
        }
    }

    struct Exploding;

    impl ProbabilisticClassifier for Exploding {
        fn predict_proba(&self, _features: &[f64; 6]) -> f64 {
            panic!("model blew up");
        }
    }

    fn fast_config() -> LoopConfig {
        LoopConfig {
            read_timeout: Duration::from_millis(1),
            poll_interval: Duration::from_millis(1),
            fault_pause: Duration::from_millis(1),
            ..LoopConfig::default()
        }
    }

    fn with_model(
        link: MemoryLink,
        model: Option<Box<dyn ProbabilisticClassifier>>,
    ) -> InferenceLoop<MemoryLink, FixedClock> {
        let adapter = ClassifierAdapter::new(model.map(Classifier::Probabilistic));
        InferenceLoop::new(link, adapter, fast_config()).with_clock(FixedClock(14))
    }

    #[test]
    fn no_data_returns_idle_outcome() {
        let mut lp = with_model(MemoryLink::new(), None);
        assert_eq!(lp.step().unwrap(), IterationOutcome::NoData);
        assert_eq!(lp.state(), LoopState::Idle);
        assert_eq!(lp.stats().lines, 0);
    }

    #[test]
    fn diagnostic_line_is_skipped_without_reply() {
        let mut lp = with_model(MemoryLink::with_lines(["MCU boot ok"]), None);
        assert_eq!(lp.step().unwrap(), IterationOutcome::Skipped);
        assert!(lp.link().sent().is_empty());
        assert_eq!(lp.stats().skipped, 1);
    }

    #[test]
    fn malformed_line_is_rejected_and_next_line_still_served() {
        let link = MemoryLink::with_lines(["{not valid json", r#"{"om_temp":30}"#]);
        let mut lp = with_model(link, Some(Box::new(Stub(0.2))));
        assert_eq!(lp.step().unwrap(), IterationOutcome::Rejected);
        assert!(lp.link().sent().is_empty());
        assert!(matches!(lp.step().unwrap(), IterationOutcome::Replied(_)));
        assert_eq!(lp.link().sent().len(), 1);
        assert_eq!(lp.state(), LoopState::Idle);
    }

    #[test]
    fn stub_model_above_threshold_alerts() {
        let link = MemoryLink::with_lines([r#"{"om_temp":32,"om_rh":40,"om_apparent":36}"#]);
        let mut lp = with_model(link, Some(Box::new(Stub(0.85))));
        lp.step().unwrap();
        assert_eq!(
            lp.link().sent(),
            [r#"{"decision":1,"prob":0.85,"duration":60}"#.to_string()]
        );
    }

    #[test]
    fn missing_model_still_replies_with_fallback() {
        let link = MemoryLink::with_lines([r#"{"om_temp":45,"om_rh":90,"om_apparent":55}"#]);
        let mut lp = with_model(link, None);
        lp.step().unwrap();
        assert_eq!(
            lp.link().sent(),
            [r#"{"decision":0,"prob":0.0,"duration":60}"#.to_string()]
        );
    }

    #[test]
    fn write_failure_is_reported_not_raised() {
        let mut link = MemoryLink::with_lines(["{}"]);
        link.set_write_fault(Some("port closed".to_string()));
        let mut lp = with_model(link, None);
        assert_eq!(lp.step().unwrap(), IterationOutcome::WriteFailed);
        assert_eq!(lp.stats().write_failures, 1);
    }

    #[test]
    fn read_fault_is_raised_to_the_boundary() {
        let mut link = MemoryLink::new();
        link.push_read_fault("device reset");
        let mut lp = with_model(link, None);
        assert!(matches!(lp.step(), Err(HeatwatchError::ReadError(_))));
    }

    #[test]
    fn non_finite_score_is_rejected_without_reply() {
        let link = MemoryLink::with_lines(["{}"]);
        let mut lp = with_model(link, Some(Box::new(Stub(f64::NAN))));
        assert_eq!(lp.step().unwrap(), IterationOutcome::Rejected);
        assert!(lp.link().sent().is_empty());
    }

    #[test]
    fn run_survives_faults_and_panics_until_shutdown() {
        let mut link = MemoryLink::new();
        link.push_read_fault("glitch");
        link.push_line("{}");
        link.push_line("MCU boot ok");
        let adapter = ClassifierAdapter::new(Some(Classifier::Probabilistic(Box::new(Exploding))));
        let mut lp = InferenceLoop::new(link, adapter, fast_config()).with_clock(FixedClock(3));

        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            flag.store(true, Ordering::Release);
        });

        let stats = lp.run(&shutdown);
        stopper.join().unwrap();

        assert_eq!(stats.faults, 2, "one read fault and one panic");
        assert_eq!(stats.lines, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.replied, 0);
        assert_eq!(lp.state(), LoopState::Idle);
        assert_eq!(lp.link().remaining(), 0);
    }

    #[test]
    fn run_returns_immediately_when_already_shut_down() {
        let mut lp = with_model(MemoryLink::with_lines(["{}"]), None);
        let stats = lp.run(&AtomicBool::new(true));
        assert_eq!(stats, LoopStats::default());
        assert_eq!(lp.into_link().remaining(), 1);
    }

    #[test]
    fn panic_message_extracts_text() {
        assert_eq!(panic_message(&"boom"), "panic: boom");
        assert_eq!(panic_message(&String::from("bang")), "panic: bang");
        assert_eq!(panic_message(&42_u8), "panic with non-string payload");
    }
}
