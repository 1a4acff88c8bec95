//! Accuracy and per-class classification metrics.

use crate::classifier::Classifier;
use crate::dataset::Dataset;
use serde::Serialize;

pub fn predictions(model: &Classifier, data: &Dataset) -> Vec<usize> {
    data.features().iter().map(|x| model.predict(x).0).collect()
}

pub fn accuracy(truth: &[usize], predicted: &[usize]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let hits = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();
    hits as f64 / truth.len() as f64
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassMetrics {
    pub class: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub version: String,
    pub model_kind: String,
    pub train_samples: usize,
    pub test_samples: usize,
    pub accuracy: f64,
    pub per_class: Vec<ClassMetrics>,
    /// `confusion[truth][predicted]`
    pub confusion: Vec<Vec<usize>>,
}

fn ratio(num: usize, den: usize) -> f64 { if den == 0 { 0.0 } else { num as f64 / den as f64 } }

pub fn confusion_matrix(truth: &[usize], predicted: &[usize], n_classes: usize) -> Vec<Vec<usize>> {
    let mut m = vec![vec![0; n_classes]; n_classes];
    for (&t, &p) in truth.iter().zip(predicted) {
        m[t][p] += 1;
    }
    m
}

/// Precision/recall/F1 per class; undefined ratios are reported as 0.
pub fn class_metrics(confusion: &[Vec<usize>], class_names: &[String]) -> Vec<ClassMetrics> {
    (0..confusion.len())
        .map(|c| {
            let tp = confusion[c][c];
            let support: usize = confusion[c].iter().sum();
            let predicted: usize = confusion.iter().map(|row| row[c]).sum();
            let precision = ratio(tp, predicted);
            let recall = ratio(tp, support);
            let f1 = if precision + recall == 0.0 { 0.0 } else { 2.0 * precision * recall / (precision + recall) };
            ClassMetrics { class: class_names[c].clone(), precision, recall, f1, support }
        })
        .collect()
}
