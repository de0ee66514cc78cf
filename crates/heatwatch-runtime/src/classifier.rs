//! [`ClassifierAdapter`] – the pretrained model behind a single call.
//!
//! Some artifacts produce a positive-class probability, others only a hard
//! label.  Which one is decided when the artifact is loaded and fixed in the
//! [`Classifier`] variant; scoring never re-inspects the model.
//!
//! The concrete model families the loader understands live here as well:
//! [`DecisionTree`], [`LogisticRegression`] and [`ThresholdRule`].

use heatwatch_types::{FeatureVector, HeatwatchError};

/// A model that estimates the probability of the positive (alert) class.
pub trait ProbabilisticClassifier: Send + Sync {
    fn predict_proba(&self, features: &[f64; 6]) -> f64;
}

/// A model that only outputs a hard alert / no-alert label.
pub trait HardClassifier: Send + Sync {
    fn predict(&self, features: &[f64; 6]) -> bool;
}

/// A loaded model together with its output capability.
pub enum Classifier {
    Probabilistic(Box<dyn ProbabilisticClassifier>),
    Hard(Box<dyn HardClassifier>),
}

impl Classifier {
    pub fn capability(&self) -> &'static str {
        match self {
            Classifier::Probabilistic(_) => "probabilistic",
            Classifier::Hard(_) => "hard",
        }
    }
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Classifier({})", self.capability())
    }
}

/// Outcome of scoring one feature vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Score {
    Probability(f64),
    /// No artifact was loaded; the caller replies with the fixed fallback.
    NoModel,
}

/// Process-wide, read-only handle on the optional model.
#[derive(Debug, Default)]
pub struct ClassifierAdapter {
    model: Option<Classifier>,
}

impl ClassifierAdapter {
    pub fn new(model: Option<Classifier>) -> Self {
        Self { model }
    }

    /// An adapter with no model; every score is [`Score::NoModel`].
    pub fn without_model() -> Self {
        Self { model: None }
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// `"probabilistic"`, `"hard"` or `"none"`.
    pub fn capability(&self) -> &'static str {
        self.model.as_ref().map_or("none", Classifier::capability)
    }

    /// Score `features`.
    ///
    /// Finite probabilities are clamped into `[0, 1]`; hard labels map to
    /// `0.0` / `1.0`.
    ///
    /// # Errors
    ///
    /// Returns [`HeatwatchError::ScoringFailed`] if the model produces a
    /// non-finite value.
    pub fn score(&self, features: &FeatureVector) -> Result<Score, HeatwatchError> {
        let Some(model) = &self.model else {
            return Ok(Score::NoModel);
        };
        let x = features.to_array();
        let p = match model {
            Classifier::Probabilistic(m) => m.predict_proba(&x),
            Classifier::Hard(m) => {
                if m.predict(&x) {
                    1.0
                } else {
                    0.0
                }
            }
        };
        if !p.is_finite() {
            return Err(HeatwatchError::ScoringFailed(format!(
                "model returned non-finite probability {p}"
            )));
        }
        Ok(Score::Probability(p.clamp(0.0, 1.0)))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Decision tree
// ─────────────────────────────────────────────────────────────────────────────

/// One node of a binary decision tree.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    /// Go `left` when `x[feature] <= threshold`, otherwise `right`.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Training-sample counts `[negative, positive]` that reached this leaf.
    Leaf { counts: [f64; 2] },
}

/// Axis-aligned binary decision tree; node 0 is the root.
#[derive(Debug, Clone)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Validate and build a tree.
    ///
    /// Children must have a larger index than their parent, which rules out
    /// cycles and guarantees every walk ends at a leaf.
    pub fn new(nodes: Vec<TreeNode>) -> Result<Self, String> {
        if nodes.is_empty() {
            return Err("decision tree has no nodes".to_string());
        }
        for (i, node) in nodes.iter().enumerate() {
            match *node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if feature >= 6 {
                        return Err(format!("node {i}: feature index {feature} out of range"));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {i}: threshold is not finite"));
                    }
                    for child in [left, right] {
                        if child <= i || child >= nodes.len() {
                            return Err(format!("node {i}: child index {child} is invalid"));
                        }
                    }
                }
                TreeNode::Leaf { counts } => {
                    if counts.iter().any(|c| !c.is_finite() || *c < 0.0) {
                        return Err(format!("node {i}: leaf counts must be finite and >= 0"));
                    }
                    if counts[0] + counts[1] <= 0.0 {
                        return Err(format!("node {i}: leaf has no samples"));
                    }
                }
            }
        }
        Ok(Self { nodes })
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl ProbabilisticClassifier for DecisionTree {
    fn predict_proba(&self, features: &[f64; 6]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if features[feature] <= threshold { left } else { right };
                }
                TreeNode::Leaf { counts } => return counts[1] / (counts[0] + counts[1]),
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logistic regression
// ─────────────────────────────────────────────────────────────────────────────

/// Linear model with a sigmoid link.
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticRegression {
    coefficients: [f64; 6],
    intercept: f64,
}

impl LogisticRegression {
    pub fn new(coefficients: [f64; 6], intercept: f64) -> Result<Self, String> {
        if coefficients.iter().chain([&intercept]).any(|w| !w.is_finite()) {
            return Err("logistic regression weights must be finite".to_string());
        }
        Ok(Self {
            coefficients,
            intercept,
        })
    }
}

impl ProbabilisticClassifier for LogisticRegression {
    fn predict_proba(&self, features: &[f64; 6]) -> f64 {
        let z: f64 = self
            .coefficients
            .iter()
            .zip(features)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.intercept;
        1.0 / (1.0 + (-z).exp())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Threshold rule
// ─────────────────────────────────────────────────────────────────────────────

pub const DEFAULT_HEAT_INDEX_LIMIT: f64 = 30.0;
pub const DEFAULT_APPARENT_LIMIT: f64 = 35.0;

/// Hard rule: alert when the heat-index estimate or the apparent
/// temperature exceeds its limit.  Same rule the training labels use.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdRule {
    pub heat_index_above: f64,
    pub apparent_above: f64,
}

impl Default for ThresholdRule {
    fn default() -> Self {
        Self {
            heat_index_above: DEFAULT_HEAT_INDEX_LIMIT,
            apparent_above: DEFAULT_APPARENT_LIMIT,
        }
    }
}

impl HardClassifier for ThresholdRule {
    fn predict(&self, features: &[f64; 6]) -> bool {
        features[3] > self.heat_index_above || features[2] > self.apparent_above
    }
}
