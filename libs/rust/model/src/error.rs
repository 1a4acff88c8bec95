use std::path::PathBuf;
use thiserror::Error;

/// Failure kinds surfaced by training, the registry and prediction.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid training version '{0}': expected one of 1, v1, 2, v2")]
    InvalidVersion(String),
    #[error("unknown model version '{0}': no artifact on disk")]
    UnknownVersion(String),
    #[error("model '{0}' not found")]
    ModelNotFound(String),
    #[error("no active model: train a version first")]
    NoActiveModel,
    #[error("registry corrupt: {0}")]
    RegistryCorrupt(String),
    #[error("invalid input for '{field}': {reason}")]
    InvalidInput { field: &'static str, reason: String },
    #[error("persistence failure at {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("dataset unavailable: {0}")]
    DatasetUnavailable(String),
}

impl ModelError {
    /// Stable code used in API error bodies and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ModelError::InvalidVersion(_) => "invalid_version",
            ModelError::UnknownVersion(_) => "unknown_version",
            ModelError::ModelNotFound(_) => "model_not_found",
            ModelError::NoActiveModel => "no_active_model",
            ModelError::RegistryCorrupt(_) => "registry_corrupt",
            ModelError::InvalidInput { .. } => "invalid_input",
            ModelError::Persistence { .. } => "persistence_error",
            ModelError::DatasetUnavailable(_) => "dataset_unavailable",
        }
    }

    pub(crate) fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ModelError::Persistence { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;
