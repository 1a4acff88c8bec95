//! Trainable versions and their fixed classifier presets.

use crate::classifier::ClassifierConfig;
use crate::error::{ModelError, Result};
use crate::forest::ForestParams;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelVersion {
    /// Deliberately weak baseline.
    V1,
    /// Bagged tree ensemble.
    V2,
}

impl ModelVersion {
    pub const ALL: [ModelVersion; 2] = [ModelVersion::V1, ModelVersion::V2];

    pub fn label(&self) -> &'static str {
        match self {
            ModelVersion::V1 => "v1",
            ModelVersion::V2 => "v2",
        }
    }

    pub fn preset(&self) -> ClassifierConfig {
        match self {
            ModelVersion::V1 => ClassifierConfig::MostFrequent,
            ModelVersion::V2 => ClassifierConfig::RandomForest(ForestParams {
                n_estimators: 100,
                max_depth: 10,
                min_samples_split: 2,
                min_samples_leaf: 1,
                max_features: None,
                bootstrap: true,
                seed: 42,
            }),
        }
    }
}

impl fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.label()) }
}

impl FromStr for ModelVersion {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "v1" => Ok(ModelVersion::V1),
            "2" | "v2" => Ok(ModelVersion::V2),
            _ => Err(ModelError::InvalidVersion(s.to_string())),
        }
    }
}

/// Canonical form of a served version label (`"2"` and `"V2"` become `"v2"`).
/// `None` for anything that cannot name an artifact file.
pub fn normalize_label(raw: &str) -> Option<String> {
    let lower = raw.trim().to_ascii_lowercase();
    let digits = lower.strip_prefix('v').unwrap_or(&lower);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("v{digits}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_accepts_closed_set_only() {
        assert_eq!("1".parse::<ModelVersion>().unwrap(), ModelVersion::V1);
        assert_eq!("v2".parse::<ModelVersion>().unwrap(), ModelVersion::V2);
        assert_eq!("V1".parse::<ModelVersion>().unwrap(), ModelVersion::V1);
        for bad in ["3", "v3", "", "latest", "v1.0"] {
            assert!(matches!(bad.parse::<ModelVersion>(), Err(ModelError::InvalidVersion(_))), "{bad}");
        }
    }

    #[test]
    fn presets_differ_by_capacity() {
        assert_eq!(ModelVersion::V1.preset().model_kind(), "DummyClassifier");
        assert_eq!(ModelVersion::V2.preset().model_kind(), "RandomForestClassifier");
    }

    #[test]
    fn label_normalization() {
        assert_eq!(normalize_label("2").as_deref(), Some("v2"));
        assert_eq!(normalize_label(" V10 ").as_deref(), Some("v10"));
        assert_eq!(normalize_label("../etc"), None);
        assert_eq!(normalize_label("v"), None);
    }
}
