//! Loader for the labeled Iris table.
//!
//! The CSV layout is fixed: four numeric measurement columns followed by the
//! species label. A copy ships inside the crate so training works without any
//! file on disk; an external path can be configured instead.

use crate::error::{ModelError, Result};
use crate::features::N_FEATURES;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use tracing::debug;

const EMBEDDED_CSV: &str = include_str!("../data/iris.csv");
const HEADER: [&str; 5] = ["sepal_length", "sepal_width", "petal_length", "petal_width", "species"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSource {
    Embedded,
    File(PathBuf),
}

impl DatasetSource {
    pub fn from_path(path: Option<PathBuf>) -> Self {
        path.map(DatasetSource::File).unwrap_or(DatasetSource::Embedded)
    }

    pub fn load(&self) -> Result<Dataset> {
        match self {
            DatasetSource::Embedded => Dataset::embedded(),
            DatasetSource::File(path) => Dataset::from_csv_path(path),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dataset {
    features: Vec<[f64; N_FEATURES]>,
    targets: Vec<usize>,
    class_names: Vec<String>,
}

impl Dataset {
    pub fn embedded() -> Result<Self> { Self::parse_csv(EMBEDDED_CSV, "embedded") }

    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ModelError::DatasetUnavailable(format!("{}: {e}", path.display())))?;
        Self::parse_csv(&text, &path.display().to_string())
    }

    /// Class indices follow first appearance of each label in the file.
    pub fn parse_csv(text: &str, origin: &str) -> Result<Self> {
        let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());
        let (_, header) = lines
            .next()
            .ok_or_else(|| ModelError::DatasetUnavailable(format!("{origin}: empty file")))?;
        let cols: Vec<&str> = header.split(',').map(str::trim).collect();
        if cols != HEADER {
            return Err(ModelError::DatasetUnavailable(format!("{origin}: unexpected header '{header}'")));
        }

        let mut features = Vec::new();
        let mut targets = Vec::new();
        let mut class_names: Vec<String> = Vec::new();
        for (lineno, line) in lines {
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if fields.len() != HEADER.len() {
                return Err(ModelError::DatasetUnavailable(format!(
                    "{origin}:{}: expected {} fields, found {}",
                    lineno + 1,
                    HEADER.len(),
                    fields.len()
                )));
            }
            let mut row = [0.0; N_FEATURES];
            for (slot, raw) in row.iter_mut().zip(&fields[..N_FEATURES]) {
                *slot = raw.parse::<f64>().map_err(|_| {
                    ModelError::DatasetUnavailable(format!("{origin}:{}: '{raw}' is not a number", lineno + 1))
                })?;
            }
            let label = fields[N_FEATURES];
            let class = match class_names.iter().position(|c| c == label) {
                Some(idx) => idx,
                None => {
                    class_names.push(label.to_string());
                    class_names.len() - 1
                }
            };
            features.push(row);
            targets.push(class);
        }
        if features.is_empty() {
            return Err(ModelError::DatasetUnavailable(format!("{origin}: no rows")));
        }
        debug!(origin, rows = features.len(), classes = class_names.len(), "dataset loaded");
        Ok(Self { features, targets, class_names })
    }

    pub fn len(&self) -> usize { self.features.len() }
    pub fn is_empty(&self) -> bool { self.features.is_empty() }
    pub fn features(&self) -> &[[f64; N_FEATURES]] { &self.features }
    pub fn targets(&self) -> &[usize] { &self.targets }
    pub fn class_names(&self) -> &[String] { &self.class_names }
    pub fn n_classes(&self) -> usize { self.class_names.len() }

    fn subset(&self, idx: &[usize]) -> Self {
        Self {
            features: idx.iter().map(|&i| self.features[i]).collect(),
            targets: idx.iter().map(|&i| self.targets[i]).collect(),
            class_names: self.class_names.clone(),
        }
    }

    /// Deterministic holdout split that keeps class proportions.
    /// Returns `(train, test)`.
    pub fn stratified_split(&self, test_fraction: f64, seed: u64) -> Result<(Dataset, Dataset)> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(ModelError::InvalidInput {
                field: "test_fraction",
                reason: format!("{test_fraction} is not in (0, 1)"),
            });
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let mut train_idx = Vec::new();
        let mut test_idx = Vec::new();
        for class in 0..self.n_classes() {
            let mut members: Vec<usize> = (0..self.len()).filter(|&i| self.targets[i] == class).collect();
            members.shuffle(&mut rng);
            let n_test = ((members.len() as f64) * test_fraction).round() as usize;
            let n_test = n_test.clamp(usize::from(members.len() > 1), members.len().saturating_sub(1));
            test_idx.extend_from_slice(&members[..n_test]);
            train_idx.extend_from_slice(&members[n_test..]);
        }
        train_idx.sort_unstable();
        test_idx.sort_unstable();
        Ok((self.subset(&train_idx), self.subset(&test_idx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_has_three_balanced_classes() {
        let ds = Dataset::embedded().unwrap();
        assert_eq!(ds.len(), 150);
        assert_eq!(ds.class_names(), ["setosa", "versicolor", "virginica"]);
        for c in 0..3 {
            assert_eq!(ds.targets().iter().filter(|&&t| t == c).count(), 50);
        }
        assert_eq!(ds.features()[0], [5.1, 3.5, 1.4, 0.2]);
    }

    #[test]
    fn rejects_bad_header_and_bad_numbers() {
        let err = Dataset::parse_csv("a,b,c\n1,2,3\n", "t").unwrap_err();
        assert!(matches!(err, ModelError::DatasetUnavailable(_)));
        let text = "sepal_length,sepal_width,petal_length,petal_width,species\n5.1,x,1.4,0.2,setosa\n";
        let err = Dataset::parse_csv(text, "t").unwrap_err();
        assert!(err.to_string().contains("'x' is not a number"));
    }

    #[test]
    fn missing_file_is_dataset_unavailable() {
        let err = DatasetSource::File(PathBuf::from("/no/such/iris.csv")).load().unwrap_err();
        assert_eq!(err.kind(), "dataset_unavailable");
    }

    #[test]
    fn stratified_split_is_deterministic_and_balanced() {
        let ds = Dataset::embedded().unwrap();
        let (train, test) = ds.stratified_split(0.2, 42).unwrap();
        assert_eq!(train.len(), 120);
        assert_eq!(test.len(), 30);
        for c in 0..3 {
            assert_eq!(test.targets().iter().filter(|&&t| t == c).count(), 10);
        }
        let (_, again) = ds.stratified_split(0.2, 42).unwrap();
        assert_eq!(test.features(), again.features());
        assert!(ds.stratified_split(1.0, 42).is_err());
    }
}
