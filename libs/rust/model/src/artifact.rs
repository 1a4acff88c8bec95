//! Version-named model artifacts on disk.

use crate::classifier::Classifier;
use crate::error::{ModelError, Result};
use crate::features::FeatureVector;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

const PREFIX: &str = "iris_";
const SUFFIX: &str = ".json";

/// A fitted classifier plus the metadata recorded when it was trained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedArtifact {
    pub version: String,
    pub model_kind: String,
    pub accuracy: f64,
    pub trained_at: DateTime<Utc>,
    pub n_samples: usize,
    pub class_names: Vec<String>,
    pub classifier: Classifier,
}

/// Outcome of classifying one feature vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub class_index: usize,
    pub label: String,
    pub confidence: f64,
    pub probabilities: Vec<f64>,
}

impl TrainedArtifact {
    pub fn classify(&self, features: &FeatureVector) -> Classification {
        let probabilities = self.classifier.predict_proba(&features.as_array());
        let (class_index, confidence) = crate::classifier::argmax(&probabilities);
        let label = self.class_names.get(class_index).cloned().unwrap_or_else(|| class_index.to_string());
        Classification { class_index, label, confidence: confidence.clamp(0.0, 1.0), probabilities }
    }
}

/// An artifact read back from disk, with what is needed to detect change.
#[derive(Debug, Clone)]
pub struct LoadedArtifact {
    pub artifact: TrainedArtifact,
    pub file_name: String,
    pub sha256: String,
    pub modified: Option<SystemTime>,
}

pub fn artifact_file_name(label: &str) -> String { format!("{PREFIX}{label}{SUFFIX}") }

fn label_from_file_name(name: &str) -> Option<String> {
    let label = name.strip_prefix(PREFIX)?.strip_suffix(SUFFIX)?;
    crate::version::normalize_label(label).filter(|l| l == label)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    hex::encode(h.finalize())
}

/// Writes to a uniquely named sibling temp file and renames it over `path`,
/// so readers see either the old content or the new, never a partial file.
/// Concurrent writers each get their own temp file; the last rename wins.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent).map_err(|e| ModelError::persistence(parent, e))?;
            parent
        }
        None => Path::new("."),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(".iris-write-")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|e| ModelError::persistence(parent, e))?;
    tmp.write_all(bytes)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| ModelError::persistence(path, e))?;
    // A failed persist drops the temp file, which removes it.
    tmp.persist(path).map_err(|e| ModelError::persistence(path, e.error))?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self { Self { dir: dir.into() } }

    pub fn dir(&self) -> &Path { &self.dir }

    pub fn path_for(&self, label: &str) -> PathBuf { self.dir.join(artifact_file_name(label)) }

    pub fn exists(&self, label: &str) -> bool { self.path_for(label).is_file() }

    /// Persists the artifact and returns the SHA-256 of the bytes written.
    pub fn save(&self, artifact: &TrainedArtifact) -> Result<String> {
        let path = self.path_for(&artifact.version);
        let bytes = serde_json::to_vec(artifact)
            .map_err(|e| ModelError::persistence(&path, std::io::Error::new(ErrorKind::InvalidData, e)))?;
        write_atomic(&path, &bytes)?;
        let sha = sha256_hex(&bytes);
        info!(version = %artifact.version, path = %path.display(), sha256 = %sha, "artifact written");
        Ok(sha)
    }

    /// `Ok(None)` when no artifact exists for `label`.
    pub fn load(&self, label: &str) -> Result<Option<LoadedArtifact>> {
        let path = self.path_for(label);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ModelError::persistence(&path, e)),
        };
        let artifact: TrainedArtifact = serde_json::from_slice(&bytes)
            .map_err(|e| ModelError::RegistryCorrupt(format!("artifact {} unreadable: {e}", path.display())))?;
        if artifact.version != label {
            return Err(ModelError::RegistryCorrupt(format!(
                "artifact {} declares version '{}'",
                path.display(),
                artifact.version
            )));
        }
        artifact
            .classifier
            .check(artifact.class_names.len())
            .map_err(|why| ModelError::RegistryCorrupt(format!("artifact {} rejected: {why}", path.display())))?;
        debug!(version = label, bytes = bytes.len(), "artifact loaded");
        Ok(Some(LoadedArtifact {
            artifact,
            file_name: artifact_file_name(label),
            sha256: sha256_hex(&bytes),
            modified: self.modified(label),
        }))
    }

    pub fn modified(&self, label: &str) -> Option<SystemTime> {
        fs::metadata(self.path_for(label)).and_then(|m| m.modified()).ok()
    }

    /// Labels of every artifact present in the directory.
    pub fn available(&self) -> Result<BTreeSet<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => return Err(ModelError::persistence(&self.dir, e)),
        };
        let mut labels = BTreeSet::new();
        for entry in entries {
            let entry = entry.map_err(|e| ModelError::persistence(&self.dir, e))?;
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            if let Some(label) = entry.file_name().to_str().and_then(label_from_file_name) {
                labels.insert(label);
            }
        }
        Ok(labels)
    }

    /// Deletes every artifact; returns the labels removed.
    pub fn purge(&self) -> Result<Vec<String>> {
        let labels = self.available()?;
        for label in &labels {
            let path = self.path_for(label);
            fs::remove_file(&path).map_err(|e| ModelError::persistence(&path, e))?;
        }
        Ok(labels.into_iter().collect())
    }
}
