//! Prediction routing between the active model and explicitly named versions.

use crate::artifact::LoadedArtifact;
use crate::error::{ModelError, Result};
use crate::features::{FeatureVector, RawFeatures};
use crate::registry::{Registry, RegistryRecord};
use crate::version::normalize_label;
use chrono::{DateTime, Utc};
use iris_core::SERVING_METRICS;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct PredictionResult {
    pub prediction: String,
    pub class_index: usize,
    pub confidence: f64,
    pub model_version: String,
    pub model_kind: String,
    pub probabilities: BTreeMap<String, f64>,
    pub input: FeatureVector,
}

#[derive(Debug, Clone, Serialize)]
pub struct VersionSummary {
    pub version: String,
    pub model_kind: String,
    pub accuracy: f64,
    pub artifact: String,
    pub trained_at: DateTime<Utc>,
    pub active: bool,
}

/// Serves predictions from artifacts cached in memory. A cache entry is
/// reused until its file's mtime changes or the registry expects a
/// different checksum.
pub struct PredictionService {
    registry: Registry,
    cache: RwLock<HashMap<String, Arc<LoadedArtifact>>>,
}

impl PredictionService {
    pub fn new(registry: Registry) -> Self { Self { registry, cache: RwLock::new(HashMap::new()) } }

    pub fn registry(&self) -> &Registry { &self.registry }

    fn cached(&self, label: &str, expected_sha: Option<&str>) -> Result<Option<Arc<LoadedArtifact>>> {
        let store = self.registry.store();
        let Some(modified) = store.modified(label) else {
            self.cache.write().remove(label);
            return Ok(None);
        };
        if let Some(hit) = self.cache.read().get(label) {
            if hit.modified == Some(modified) && expected_sha.map_or(true, |s| s == hit.sha256) {
                return Ok(Some(hit.clone()));
            }
        }
        let Some(loaded) = store.load(label)? else {
            self.cache.write().remove(label);
            return Ok(None);
        };
        SERVING_METRICS.model_loads_total.with_label_values(&[label]).inc();
        info!(version = label, sha256 = %loaded.sha256, "model loaded into cache");
        let loaded = Arc::new(loaded);
        self.cache.write().insert(label.to_string(), loaded.clone());
        Ok(Some(loaded))
    }

    fn resolve(&self, version_override: Option<&str>) -> Result<Arc<LoadedArtifact>> {
        if let Some(raw) = version_override {
            let label = normalize_label(raw).ok_or_else(|| ModelError::ModelNotFound(raw.to_string()))?;
            return self.cached(&label, None)?.ok_or(ModelError::ModelNotFound(label));
        }
        let record = self.registry.read()?.ok_or(ModelError::NoActiveModel)?;
        let expected = record.artifact_sha256.as_deref();
        let loaded = self.cached(&record.active_version, expected)?.ok_or_else(|| {
            ModelError::RegistryCorrupt(format!(
                "active version '{}' points at missing artifact {}",
                record.active_version, record.active_artifact_ref
            ))
        })?;
        if let Some(expected) = expected {
            if expected != loaded.sha256 {
                return Err(ModelError::RegistryCorrupt(format!(
                    "artifact {} checksum {} does not match registry {}",
                    loaded.file_name, loaded.sha256, expected
                )));
            }
        }
        Ok(loaded)
    }

    pub fn predict(&self, features: &FeatureVector, version_override: Option<&str>) -> Result<PredictionResult> {
        let start = Instant::now();
        let resolved = self.resolve(version_override);
        let loaded = match resolved {
            Ok(l) => l,
            Err(e) => {
                let label = match version_override {
                    Some(v) => normalize_label(v).unwrap_or_else(|| "invalid".into()),
                    None => "active".into(),
                };
                SERVING_METRICS.predictions_total.with_label_values(&[label.as_str(), e.kind()]).inc();
                warn!(version = %label, error = %e, "prediction failed");
                return Err(e);
            }
        };
        let artifact = &loaded.artifact;
        let c = artifact.classify(features);
        let probabilities = artifact
            .class_names
            .iter()
            .cloned()
            .zip(c.probabilities.iter().copied())
            .collect();

        let version = artifact.version.as_str();
        SERVING_METRICS.predictions_total.with_label_values(&[version, "ok"]).inc();
        SERVING_METRICS.prediction_latency_seconds.with_label_values(&[version]).observe(start.elapsed().as_secs_f64());
        debug!(version, prediction = %c.label, confidence = c.confidence, "prediction served");

        Ok(PredictionResult {
            prediction: c.label,
            class_index: c.class_index,
            confidence: c.confidence,
            model_version: artifact.version.clone(),
            model_kind: artifact.model_kind.clone(),
            probabilities,
            input: *features,
        })
    }

    /// Validates the raw fields before anything touches the registry.
    pub fn predict_raw(&self, raw: &RawFeatures, version_override: Option<&str>) -> Result<PredictionResult> {
        let features = raw.parse()?;
        self.predict(&features, version_override)
    }

    pub fn describe_active(&self) -> Result<RegistryRecord> { self.registry.read()?.ok_or(ModelError::NoActiveModel) }

    pub fn describe_all_available(&self) -> Result<Vec<VersionSummary>> {
        let active = self.registry.read()?.map(|r| r.active_version);
        let mut out = Vec::new();
        for label in self.registry.store().available()? {
            let loaded = match self.cached(&label, None) {
                Ok(Some(loaded)) => loaded,
                Ok(None) => continue,
                Err(e) => {
                    warn!(version = %label, error = %e, "skipping unreadable artifact");
                    continue;
                }
            };
            let a = &loaded.artifact;
            out.push(VersionSummary {
                version: a.version.clone(),
                model_kind: a.model_kind.clone(),
                accuracy: a.accuracy,
                artifact: loaded.file_name.clone(),
                trained_at: a.trained_at,
                active: active.as_deref() == Some(label.as_str()),
            });
        }
        Ok(out)
    }

    pub fn switch_active(&self, label: &str) -> Result<RegistryRecord> {
        let record = self.registry.switch_active(label)?;
        self.cache.write().remove(&record.active_version);
        Ok(record)
    }
}
