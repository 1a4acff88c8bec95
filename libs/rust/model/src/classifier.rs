use crate::dataset::Dataset;
use crate::features::N_FEATURES;
use crate::forest::{ForestParams, RandomForest};
use serde::{Deserialize, Serialize};

/// Baseline that ignores its input: always the majority training class,
/// with the class priors as its probability output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DummyClassifier {
    priors: Vec<f64>,
}

impl DummyClassifier {
    pub fn fit(y: &[usize], n_classes: usize) -> Self {
        let mut counts = vec![0usize; n_classes];
        for &c in y {
            counts[c] += 1;
        }
        let total = y.len().max(1) as f64;
        Self { priors: counts.iter().map(|&c| c as f64 / total).collect() }
    }

    pub fn priors(&self) -> &[f64] { &self.priors }
}

/// Hyperparameter preset for one of the supported algorithms.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifierConfig {
    MostFrequent,
    RandomForest(ForestParams),
}

impl ClassifierConfig {
    pub fn model_kind(&self) -> &'static str {
        match self {
            ClassifierConfig::MostFrequent => "DummyClassifier",
            ClassifierConfig::RandomForest(_) => "RandomForestClassifier",
        }
    }

    pub fn fit(&self, data: &Dataset) -> Classifier {
        match self {
            ClassifierConfig::MostFrequent => Classifier::Dummy(DummyClassifier::fit(data.targets(), data.n_classes())),
            ClassifierConfig::RandomForest(params) => Classifier::RandomForest(RandomForest::fit(
                params,
                data.features(),
                data.targets(),
                data.n_classes(),
            )),
        }
    }
}

/// A fitted model, serialized verbatim into artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum Classifier {
    Dummy(DummyClassifier),
    RandomForest(RandomForest),
}

impl Classifier {
    pub fn predict_proba(&self, x: &[f64; N_FEATURES]) -> Vec<f64> {
        match self {
            Classifier::Dummy(d) => d.priors.clone(),
            Classifier::RandomForest(f) => f.predict_proba(x),
        }
    }

    /// Predicted class index and its probability; ties go to the lowest index.
    pub fn predict(&self, x: &[f64; N_FEATURES]) -> (usize, f64) {
        argmax(&self.predict_proba(x))
    }

    /// Rejects a deserialized model whose shape does not fit `n_classes`.
    pub fn check(&self, n_classes: usize) -> Result<(), String> {
        match self {
            Classifier::Dummy(d) if d.priors.len() != n_classes => {
                Err(format!("dummy has {} priors, expected {n_classes}", d.priors.len()))
            }
            Classifier::Dummy(_) => Ok(()),
            Classifier::RandomForest(f) => f.check(n_classes),
        }
    }

    pub fn n_classes(&self) -> usize {
        match self {
            Classifier::Dummy(d) => d.priors.len(),
            Classifier::RandomForest(f) => f.n_classes(),
        }
    }
}

pub(crate) fn argmax(probs: &[f64]) -> (usize, f64) {
    probs
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, p)| if p > best.1 { (i, p) } else { best })
}
