//! Classifier artifact loading.
//!
//! The artifact is a JSON document produced by the offline training job:
//!
//! ```json
//! {
//!   "feature_names": ["temperature", "humidity", "apparent_temp", "wbgt_est", "hour", "temp_delta"],
//!   "model": {
//!     "kind": "decision_tree",
//!     "nodes": [
//!       { "feature": 3, "threshold": 30.0, "left": 1, "right": 2 },
//!       { "value": [120.0, 4.0] },
//!       { "value": [6.0, 58.0] }
//!     ]
//!   }
//! }
//! ```
//!
//! `kind` is one of `decision_tree`, `logistic_regression` or
//! `threshold_rule`.  `feature_names` is optional; when present it must
//! list the six features in canonical order.
//!
//! A missing file is not an error: [`load_classifier`] returns `Ok(None)`
//! and the loop runs without a model.

use std::io::ErrorKind;
use std::path::Path;

use heatwatch_types::{FEATURE_NAMES, HeatwatchError, TRAINING_FEATURE_NAMES};
use serde::Deserialize;
use tracing::{info, warn};

use crate::classifier::{
    Classifier, DEFAULT_APPARENT_LIMIT, DEFAULT_HEAT_INDEX_LIMIT, DecisionTree, LogisticRegression,
    ThresholdRule, TreeNode,
};

// ─────────────────────────────────────────────────────────────────────────────
// On-disk shapes
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ArtifactFile {
    #[serde(default)]
    feature_names: Option<Vec<String>>,
    model: ModelSpec,
}

#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ModelSpec {
    DecisionTree {
        nodes: Vec<NodeSpec>,
    },
    LogisticRegression {
        coefficients: [f64; 6],
        intercept: f64,
    },
    ThresholdRule {
        #[serde(default = "default_heat_index_limit")]
        heat_index_above: f64,
        #[serde(default = "default_apparent_limit")]
        apparent_above: f64,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NodeSpec {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: [f64; 2],
    },
}

fn default_heat_index_limit() -> f64 {
    DEFAULT_HEAT_INDEX_LIMIT
}
fn default_apparent_limit() -> f64 {
    DEFAULT_APPARENT_LIMIT
}

impl From<NodeSpec> for TreeNode {
    fn from(spec: NodeSpec) -> Self {
        match spec {
            NodeSpec::Split {
                feature,
                threshold,
                left,
                right,
            } => TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            },
            NodeSpec::Leaf { value } => TreeNode::Leaf { counts: value },
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

/// Load the classifier at `path`.
///
/// Returns `Ok(None)` when the file does not exist.
///
/// # Errors
///
/// Returns [`HeatwatchError::ArtifactInvalid`] when the file exists but
/// cannot be read, parsed, or validated.
pub fn load_classifier(path: &Path) -> Result<Option<Classifier>, HeatwatchError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(path = %path.display(), "model artifact not found; decisions default to 0");
            return Ok(None);
        }
        Err(e) => return Err(invalid(path, e.to_string())),
    };

    let classifier = parse_classifier(&raw).map_err(|details| invalid(path, details))?;
    info!(
        path = %path.display(),
        capability = classifier.capability(),
        "model artifact loaded"
    );
    Ok(Some(classifier))
}

/// Parse and validate an artifact document.
pub fn parse_classifier(raw: &str) -> Result<Classifier, String> {
    let file: ArtifactFile = serde_json::from_str(raw).map_err(|e| e.to_string())?;

    if let Some(names) = &file.feature_names {
        check_feature_names(names)?;
    }

    let classifier = match file.model {
        ModelSpec::DecisionTree { nodes } => {
            let tree = DecisionTree::new(nodes.into_iter().map(TreeNode::from).collect())?;
            Classifier::Probabilistic(Box::new(tree))
        }
        ModelSpec::LogisticRegression {
            coefficients,
            intercept,
        } => Classifier::Probabilistic(Box::new(LogisticRegression::new(
            coefficients,
            intercept,
        )?)),
        ModelSpec::ThresholdRule {
            heat_index_above,
            apparent_above,
        } => {
            if !heat_index_above.is_finite() || !apparent_above.is_finite() {
                return Err("threshold rule limits must be finite".to_string());
            }
            Classifier::Hard(Box::new(ThresholdRule {
                heat_index_above,
                apparent_above,
            }))
        }
    };
    Ok(classifier)
}

/// Accept either the runtime or the training spelling of each feature, but
/// never a different order.
fn check_feature_names(names: &[String]) -> Result<(), String> {
    if names.len() != FEATURE_NAMES.len() {
        return Err(format!(
            "artifact declares {} features, expected {}",
            names.len(),
            FEATURE_NAMES.len()
        ));
    }
    for (i, name) in names.iter().enumerate() {
        if name != FEATURE_NAMES[i] && name != TRAINING_FEATURE_NAMES[i] {
            return Err(format!(
                "feature {i} is {name:?}, expected {:?}",
                FEATURE_NAMES[i]
            ));
        }
    }
    Ok(())
}

fn invalid(path: &Path, details: String) -> HeatwatchError {
    HeatwatchError::ArtifactInvalid {
        path: path.display().to_string(),
        details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{HardClassifier, ProbabilisticClassifier};

    const TREE: &str = r#"{
        "feature_names": ["temperature","humidity","apparent_temp","wbgt_est","hour","temp_delta"],
        "model": {
            "kind": "decision_tree",
            "nodes": [
                {"feature": 3, "threshold": 30.0, "left": 1, "right": 2},
                {"value": [120.0, 4.0]},
                {"value": [6.0, 58.0]}
            ]
        }
    }"#;

    #[test]
    fn decision_tree_artifact_is_probabilistic() {
        let c = parse_classifier(TREE).unwrap();
        assert_eq!(c.capability(), "probabilistic");
        let Classifier::Probabilistic(m) = c else {
            panic!("expected probabilistic");
        };
        let p = m.predict_proba(&[32.0, 40.0, 36.0, 31.0, 14.0, 0.0]);
        assert!((p - 58.0 / 64.0).abs() < 1e-12);
    }

    #[test]
    fn logistic_artifact_parses() {
        let raw = r#"{"model":{"kind":"logistic_regression","coefficients":[0,0,0,0.5,0,0],"intercept":-15}}"#;
        assert_eq!(parse_classifier(raw).unwrap().capability(), "probabilistic");
    }

    #[test]
    fn threshold_rule_artifact_is_hard_with_defaults() {
        let c = parse_classifier(r#"{"model":{"kind":"threshold_rule"}}"#).unwrap();
        assert_eq!(c.capability(), "hard");
        let Classifier::Hard(rule) = c else {
            panic!("expected hard");
        };
        assert!(rule.predict(&[0.0, 0.0, 35.5, 0.0, 0.0, 0.0]));
        assert!(!rule.predict(&[0.0, 0.0, 35.0, 30.0, 0.0, 0.0]));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!(parse_classifier(r#"{"model":{"kind":"random_forest"}}"#).is_err());
    }

    #[test]
    fn reordered_feature_names_are_rejected() {
        let raw = r#"{
            "feature_names": ["humidity","temperature","apparent_temp","wbgt_est","hour","temp_delta"],
            "model": {"kind": "threshold_rule"}
        }"#;
        let err = parse_classifier(raw).unwrap_err();
        assert!(err.contains("feature 0"));
    }

    #[test]
    fn runtime_feature_names_are_accepted() {
        let raw = format!(
            r#"{{"feature_names": {}, "model": {{"kind": "threshold_rule"}}}}"#,
            serde_json::to_string(&FEATURE_NAMES).unwrap()
        );
        assert!(parse_classifier(&raw).is_ok());
    }

    #[test]
    fn missing_file_is_no_model() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let result = load_classifier(&dir.path().join("absent.json")).expect("no error");
        assert!(result.is_none());
    }

    #[test]
    fn corrupt_file_is_artifact_invalid() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("model.json");
        std::fs::write(&path, "{\"model\": ").unwrap();
        assert!(matches!(
            load_classifier(&path),
            Err(HeatwatchError::ArtifactInvalid { .. })
        ));
    }

    #[test]
    fn valid_file_loads() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("model.json");
        std::fs::write(&path, TREE).unwrap();
        let loaded = load_classifier(&path).unwrap().expect("some");
        assert_eq!(loaded.capability(), "probabilistic");
    }
}
