//! The single durable record of which artifact is active.
//!
//! Every write replaces the whole file through a temp-file rename. There is
//! no cross-process locking: a `train` and a `switch_active` racing each
//! other both succeed and whichever renames last wins.

use crate::artifact::{artifact_file_name, write_atomic, ArtifactStore, TrainedArtifact};
use crate::error::{ModelError, Result};
use crate::version::normalize_label;
use chrono::{DateTime, Utc};
use iris_core::SERVING_METRICS;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryRecord {
    pub active_version: String,
    pub active_artifact_ref: String,
    pub model_kind: String,
    pub accuracy: f64,
    #[serde(default)]
    pub available_versions: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_sha256: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Registry {
    path: PathBuf,
    store: ArtifactStore,
}

impl Registry {
    pub fn new(path: impl Into<PathBuf>, store: ArtifactStore) -> Self { Self { path: path.into(), store } }

    pub fn path(&self) -> &Path { &self.path }

    pub fn store(&self) -> &ArtifactStore { &self.store }

    /// `Ok(None)` means no model has been activated yet.
    /// `available_versions` is refreshed from the model directory.
    pub fn read(&self) -> Result<Option<RegistryRecord>> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ModelError::persistence(&self.path, e)),
        };
        let mut record: RegistryRecord = serde_json::from_slice(&bytes)
            .map_err(|e| ModelError::RegistryCorrupt(format!("{}: {e}", self.path.display())))?;
        record.available_versions = self.store.available()?;
        Ok(Some(record))
    }

    pub fn write(&self, record: &RegistryRecord) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(record)
            .map_err(|e| ModelError::persistence(&self.path, std::io::Error::new(ErrorKind::InvalidData, e)))?;
        write_atomic(&self.path, &bytes)?;
        info!(version = %record.active_version, artifact = %record.active_artifact_ref, accuracy = record.accuracy, "registry written");
        Ok(())
    }

    /// Record that makes `artifact` the active model.
    pub fn record_for(&self, artifact: &TrainedArtifact, sha256: &str) -> Result<RegistryRecord> {
        Ok(RegistryRecord {
            active_version: artifact.version.clone(),
            active_artifact_ref: artifact_file_name(&artifact.version),
            model_kind: artifact.model_kind.clone(),
            accuracy: artifact.accuracy,
            available_versions: self.store.available()?,
            artifact_sha256: Some(sha256.to_string()),
            updated_at: Utc::now(),
        })
    }

    /// Points the registry at an already-trained artifact. Model kind and
    /// accuracy come from the artifact's own training metadata.
    pub fn switch_active(&self, label: &str) -> Result<RegistryRecord> {
        let canonical = normalize_label(label).ok_or_else(|| ModelError::UnknownVersion(label.to_string()))?;
        let Some(loaded) = self.store.load(&canonical)? else {
            warn!(version = %canonical, "switch rejected: no artifact");
            return Err(ModelError::UnknownVersion(canonical));
        };
        let record = self.record_for(&loaded.artifact, &loaded.sha256)?;
        self.write(&record)?;
        SERVING_METRICS.model_switches_total.inc();
        info!(version = %record.active_version, "active model switched");
        Ok(record)
    }

    /// Removes the registry file. Returns whether one existed.
    pub fn reset(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                warn!(path = %self.path.display(), "registry reset");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ModelError::persistence(&self.path, e)),
        }
    }
}
