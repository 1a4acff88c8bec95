//! Iris classifier training, model registry and prediction routing.
//!
//! The trainer writes one artifact per version and activates it in the
//! registry; the prediction service reads both on demand.

pub mod artifact;
pub mod classifier;
pub mod dataset;
pub mod error;
pub mod evaluate;
pub mod features;
pub mod forest;
pub mod registry;
pub mod service;
pub mod trainer;
pub mod version;

pub use artifact::{ArtifactStore, TrainedArtifact};
pub use dataset::{Dataset, DatasetSource};
pub use error::{ModelError, Result};
pub use evaluate::EvaluationReport;
pub use features::{FeatureVector, RawFeatures};
pub use registry::{Registry, RegistryRecord};
pub use service::{PredictionResult, PredictionService, VersionSummary};
pub use trainer::Trainer;
pub use version::ModelVersion;

use iris_core::ServiceConfig;

/// Registry and artifact store at the locations named by the shared config.
pub fn registry_from_config(cfg: &ServiceConfig) -> Registry {
    Registry::new(cfg.registry_path.clone(), ArtifactStore::new(cfg.model_dir.clone()))
}
