use crate::artifact::TrainedArtifact;
use crate::dataset::DatasetSource;
use crate::error::Result;
use crate::evaluate::{accuracy, class_metrics, confusion_matrix, predictions, EvaluationReport};
use crate::registry::{Registry, RegistryRecord};
use crate::version::ModelVersion;
use chrono::Utc;
use iris_core::SERVING_METRICS;
use tracing::{info, instrument, warn};

/// Retraining on unchanged data must not rewrite an artifact: only the
/// timestamp would differ.
fn same_model(a: &TrainedArtifact, b: &TrainedArtifact) -> bool {
    a.model_kind == b.model_kind
        && a.accuracy == b.accuracy
        && a.class_names == b.class_names
        && match (serde_json::to_value(&a.classifier), serde_json::to_value(&b.classifier)) {
            (Ok(x), Ok(y)) => x == y,
            _ => false,
        }
}

pub struct Trainer {
    registry: Registry,
    source: DatasetSource,
}

impl Trainer {
    pub fn new(registry: Registry, source: DatasetSource) -> Self { Self { registry, source } }

    pub fn registry(&self) -> &Registry { &self.registry }

    /// Fits the version's preset on the whole dataset, writes its artifact and
    /// makes it the active model. Accuracy is measured on the training data.
    #[instrument(skip(self))]
    pub fn train(&self, selector: &str) -> Result<RegistryRecord> {
        let version: ModelVersion = selector.parse()?;
        let data = self.source.load()?;
        let preset = version.preset();
        let classifier = preset.fit(&data);
        let acc = accuracy(data.targets(), &predictions(&classifier, &data));

        let artifact = TrainedArtifact {
            version: version.label().to_string(),
            model_kind: preset.model_kind().to_string(),
            accuracy: acc,
            trained_at: Utc::now(),
            n_samples: data.len(),
            class_names: data.class_names().to_vec(),
            classifier,
        };
        let store = self.registry.store();
        let sha = match store.load(version.label()) {
            Ok(Some(existing)) if same_model(&existing.artifact, &artifact) => {
                info!(version = %version, "artifact unchanged, keeping existing file");
                existing.sha256
            }
            Ok(_) => store.save(&artifact)?,
            Err(e) => {
                warn!(version = %version, error = %e, "existing artifact unreadable, overwriting");
                store.save(&artifact)?
            }
        };
        let record = self.registry.record_for(&artifact, &sha)?;
        self.registry.write(&record)?;

        SERVING_METRICS.training_runs_total.with_label_values(&[version.label()]).inc();
        info!(version = %version, model_kind = preset.model_kind(), accuracy = acc, samples = data.len(), "training complete");
        Ok(record)
    }

    /// Holdout evaluation of a preset. Writes nothing.
    #[instrument(skip(self))]
    pub fn evaluate(&self, selector: &str, test_fraction: f64, seed: u64) -> Result<EvaluationReport> {
        let version: ModelVersion = selector.parse()?;
        let data = self.source.load()?;
        let (train, test) = data.stratified_split(test_fraction, seed)?;
        let preset = version.preset();
        let classifier = preset.fit(&train);
        let predicted = predictions(&classifier, &test);
        let confusion = confusion_matrix(test.targets(), &predicted, test.n_classes());
        let report = EvaluationReport {
            version: version.label().to_string(),
            model_kind: preset.model_kind().to_string(),
            train_samples: train.len(),
            test_samples: test.len(),
            accuracy: accuracy(test.targets(), &predicted),
            per_class: class_metrics(&confusion, test.class_names()),
            confusion,
        };
        info!(version = %version, accuracy = report.accuracy, test_samples = report.test_samples, "evaluation complete");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactStore;
    use crate::error::ModelError;

    fn trainer(dir: &std::path::Path) -> Trainer {
        let registry = Registry::new(dir.join("model_registry.json"), ArtifactStore::new(dir.join("models")));
        Trainer::new(registry, DatasetSource::Embedded)
    }

    #[test]
    fn training_activates_the_version() {
        let dir = tempfile::TempDir::new().unwrap();
        let t = trainer(dir.path());
        let record = t.train("v1").unwrap();
        assert_eq!(record.active_version, "v1");
        assert_eq!(record.model_kind, "DummyClassifier");
        assert!((record.accuracy - 1.0 / 3.0).abs() < 1e-9);
        assert!(dir.path().join("models/iris_v1.json").is_file());
    }

    #[test]
    fn bad_selector_writes_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        let t = trainer(dir.path());
        assert!(matches!(t.train("v3"), Err(ModelError::InvalidVersion(_))));
        assert!(t.registry().read().unwrap().is_none());
        assert!(!dir.path().join("models").exists());
    }

    #[test]
    fn unreadable_artifact_is_replaced_on_retrain() {
        let dir = tempfile::TempDir::new().unwrap();
        let t = trainer(dir.path());
        std::fs::create_dir_all(dir.path().join("models")).unwrap();
        std::fs::write(dir.path().join("models/iris_v1.json"), b"{ truncated").unwrap();
        let record = t.train("v1").unwrap();
        let loaded = t.registry().store().load("v1").unwrap().unwrap();
        assert_eq!(record.artifact_sha256.as_deref(), Some(loaded.sha256.as_str()));
    }

    #[test]
    fn missing_dataset_is_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let registry = Registry::new(dir.path().join("r.json"), ArtifactStore::new(dir.path()));
        let t = Trainer::new(registry, DatasetSource::File(dir.path().join("absent.csv")));
        assert_eq!(t.train("2").unwrap_err().kind(), "dataset_unavailable");
    }

    #[test]
    fn holdout_report_ranks_the_forest_above_the_baseline() {
        let dir = tempfile::TempDir::new().unwrap();
        let t = trainer(dir.path());
        let weak = t.evaluate("v1", 0.2, 42).unwrap();
        let strong = t.evaluate("v2", 0.2, 42).unwrap();
        assert_eq!(strong.test_samples, 30);
        assert!(strong.accuracy > 0.8);
        assert!(strong.accuracy > weak.accuracy);
        assert_eq!(strong.per_class.len(), 3);
        assert!(t.registry().read().unwrap().is_none());
    }
}
