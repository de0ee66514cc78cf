//! Property tests for feature derivation and the decision threshold.

use heatwatch_runtime::decoder::{Decoded, decode};
use heatwatch_runtime::features::heat_index_estimate;
use heatwatch_runtime::{DecisionPolicy, FeatureDeriver};
use heatwatch_types::TelemetryRecord;
use proptest::prelude::*;

/// Optional reading that is sometimes absent and sometimes the zero sentinel.
fn reading() -> impl Strategy<Value = Option<f64>> {
    prop_oneof![
        Just(None),
        Just(Some(0.0)),
        (-40.0f64..60.0).prop_map(Some),
    ]
}

fn record() -> impl Strategy<Value = TelemetryRecord> {
    (reading(), reading(), reading(), reading(), reading()).prop_map(
        |(local_temp, local_rh, remote_temp, remote_rh, remote_apparent)| TelemetryRecord {
            local_temp,
            local_rh,
            remote_temp,
            remote_rh,
            remote_apparent,
            ..TelemetryRecord::default()
        },
    )
}

proptest! {
    #[test]
    fn remote_temperature_wins_when_available(rec in record(), hour in 0u32..24) {
        let fv = FeatureDeriver::default().derive(&rec, hour);
        if let Some(t) = rec.remote_temp.filter(|t| *t != 0.0) {
            prop_assert_eq!(fv.temperature, t);
        }
        if let Some(h) = rec.remote_rh.filter(|h| *h != 0.0) {
            prop_assert_eq!(fv.humidity, h);
        }
    }

    #[test]
    fn remote_pair_heat_index_uses_raw_remote_humidity(rec in record(), hour in 0u32..24) {
        let fv = FeatureDeriver::default().derive(&rec, hour);
        let t = rec.remote_temp.filter(|t| *t != 0.0);
        let app = rec.remote_apparent.filter(|a| *a != 0.0);
        if let (Some(t), Some(rh), Some(app)) = (t, rec.remote_rh, app) {
            prop_assert_eq!(fv.heat_index_estimate, heat_index_estimate(t, rh, app));
        }
    }

    #[test]
    fn derivation_is_bit_identical_on_repeat(rec in record(), hour in 0u32..24) {
        let d = FeatureDeriver::default();
        let a = d.derive(&rec, hour).to_array();
        let b = d.derive(&rec, hour).to_array();
        for (x, y) in a.iter().zip(b.iter()) {
            prop_assert_eq!(x.to_bits(), y.to_bits());
        }
    }

    #[test]
    fn derived_features_are_finite_and_fixed_tail(rec in record(), hour in 0u32..24) {
        let fv = FeatureDeriver::default().derive(&rec, hour);
        prop_assert!(fv.to_array().iter().all(|v| v.is_finite()));
        prop_assert_eq!(fv.hour_of_day, f64::from(hour));
        prop_assert_eq!(fv.temperature_delta, 0.0);
    }

    #[test]
    fn decision_is_one_iff_probability_reaches_threshold(p in 0.0f64..=1.0, t in 0.0f64..=1.0) {
        let policy = DecisionPolicy { threshold: t, duration_secs: 60 };
        let resp = policy.encode(p);
        prop_assert_eq!(resp.decision == 1, p >= t);
        prop_assert!((resp.probability - p).abs() <= 0.0005 + 1e-9);
    }

    #[test]
    fn text_without_opening_brace_is_always_skipped(s in "[^{\\s][^\\n]{0,40}") {
        prop_assert_eq!(decode(&s).unwrap(), Decoded::Skip);
    }
}

#[test]
fn empty_record_uses_default_constants() {
    let fv = FeatureDeriver::default().derive(&TelemetryRecord::default(), 0);
    assert_eq!(fv.temperature, 25.0);
    assert_eq!(fv.humidity, 50.0);
}

#[test]
fn threshold_boundary_is_inclusive() {
    let policy = DecisionPolicy::default();
    assert_eq!(policy.encode(policy.threshold).decision, 1);
    assert_eq!(policy.encode(policy.threshold - f64::EPSILON).decision, 0);
}
