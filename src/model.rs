//! The pre-trained classifier.
//!
//! The artifact is a random forest exported to JSON by
//! `scripts/export_model.py`. Each tree is a flat list of nodes in pre-order:
//! a split sends a sample left when `x[feature] <= threshold`, a leaf holds
//! one weight per class. Loading checks the shape once so that inference
//! never has to.

use std::fmt;
use std::io;
use std::path::Path;

use log::info;
use serde::Deserialize;

use crate::features::{FeatureVector, FEATURE_COUNT};

pub const MODEL_FILE: &str = "heart_attack_model.json";

#[derive(Debug, Deserialize)]
pub struct Forest {
    n_features: usize,
    classes: Vec<i64>,
    trees: Vec<Tree>,
}

#[derive(Debug, Deserialize)]
struct Tree {
    nodes: Vec<Node>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: Vec<f64>,
    },
}

#[derive(Debug)]
pub enum LoadError {
    Io(io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "couldn't read model: {e}"),
            Self::Parse(e) => write!(f, "couldn't parse model: {e}"),
            Self::Invalid(why) => write!(f, "invalid model: {why}"),
        }
    }
}

impl Forest {
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let bytes = std::fs::read(path).map_err(LoadError::Io)?;
        let forest = Self::from_json(&bytes)?;

        info!(
            "loaded model {}: {} trees, classes {:?}",
            path.display(),
            forest.trees.len(),
            forest.classes,
        );

        Ok(forest)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, LoadError> {
        let forest: Self = serde_json::from_slice(bytes).map_err(LoadError::Parse)?;
        forest.validate().map_err(LoadError::Invalid)?;
        Ok(forest)
    }

    fn validate(&self) -> Result<(), String> {
        if self.n_features != FEATURE_COUNT {
            return Err(format!(
                "expects {} features, inputs have {FEATURE_COUNT}",
                self.n_features
            ));
        }
        if self.classes.is_empty() {
            return Err("no classes".into());
        }
        if self.trees.is_empty() {
            return Err("no trees".into());
        }

        for (t, tree) in self.trees.iter().enumerate() {
            tree.validate(self.classes.len())
                .map_err(|why| format!("tree {t}: {why}"))?;
        }

        Ok(())
    }

    /// Averages the trees' class distributions and returns the most likely
    /// class label.
    pub fn predict(&self, x: &FeatureVector) -> i64 {
        let mut proba = vec![0.0; self.classes.len()];

        for tree in &self.trees {
            let weights = tree.leaf(x);
            let total: f64 = weights.iter().sum();
            for (p, w) in proba.iter_mut().zip(weights) {
                *p += w / total;
            }
        }

        // first maximum wins on a tie
        let best = proba
            .iter()
            .enumerate()
            .fold(0, |best, (i, p)| if *p > proba[best] { i } else { best });

        self.classes[best]
    }
}

impl Tree {
    fn validate(&self, n_classes: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("no nodes".into());
        }

        for (i, node) in self.nodes.iter().enumerate() {
            match *node {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if feature >= FEATURE_COUNT {
                        return Err(format!("node {i}: feature {feature} out of range"));
                    }
                    if threshold.is_nan() {
                        return Err(format!("node {i}: threshold is NaN"));
                    }
                    for child in [left, right] {
                        // children come later in pre-order, so every walk terminates
                        if child <= i || child >= self.nodes.len() {
                            return Err(format!("node {i}: bad child index {child}"));
                        }
                    }
                }
                Node::Leaf { ref value } => {
                    if value.len() != n_classes {
                        return Err(format!(
                            "node {i}: {} leaf weights for {n_classes} classes",
                            value.len()
                        ));
                    }
                    if value.iter().any(|w| !w.is_finite() || *w < 0.0) {
                        return Err(format!("node {i}: negative or non-finite leaf weight"));
                    }
                    if value.iter().sum::<f64>() <= 0.0 {
                        return Err(format!("node {i}: empty leaf"));
                    }
                }
            }
        }

        Ok(())
    }

    fn leaf(&self, x: &FeatureVector) -> &[f64] {
        let mut i = 0;
        loop {
            match self.nodes[i] {
                Node::Leaf { ref value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    i = if x[feature] <= threshold { left } else { right };
                }
            }
        }
    }
}
