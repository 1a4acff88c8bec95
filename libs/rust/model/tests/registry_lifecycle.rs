//! Train / switch / predict lifecycle against a throwaway model directory.

use iris_model::{
    ArtifactStore, DatasetSource, FeatureVector, ModelError, PredictionService, Registry, Trainer,
};
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
    trainer: Trainer,
    service: PredictionService,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let registry = Registry::new(dir.path().join("model_registry.json"), ArtifactStore::new(dir.path().join("models")));
    Fixture {
        trainer: Trainer::new(registry.clone(), DatasetSource::Embedded),
        service: PredictionService::new(registry),
        dir,
    }
}

const SETOSA: FeatureVector = FeatureVector { sepal_length: 5.1, sepal_width: 3.5, petal_length: 1.4, petal_width: 0.2 };
const VIRGINICA: FeatureVector = FeatureVector { sepal_length: 6.7, sepal_width: 3.0, petal_length: 5.2, petal_width: 2.3 };

#[test]
fn every_trainable_version_is_servable() {
    let f = fixture();
    for selector in ["1", "v2"] {
        let record = f.trainer.train(selector).unwrap();
        let result = f.service.predict(&SETOSA, Some(&record.active_version)).unwrap();
        assert_eq!(result.model_version, record.active_version);
    }
}

#[test]
fn versions_coexist_after_successive_training() {
    let f = fixture();
    f.trainer.train("v1").unwrap();
    let record = f.trainer.train("v2").unwrap();
    assert_eq!(record.active_version, "v2");
    assert!(f.dir.path().join("models/iris_v1.json").is_file());
    assert!(f.dir.path().join("models/iris_v2.json").is_file());
    let listed: Vec<_> = f.service.describe_active().unwrap().available_versions.into_iter().collect();
    assert_eq!(listed, ["v1", "v2"]);
}

#[test]
fn switch_back_to_older_version() {
    let f = fixture();
    f.trainer.train("v1").unwrap();
    f.trainer.train("v2").unwrap();
    f.service.switch_active("v1").unwrap();
    let active = f.service.describe_active().unwrap();
    assert_eq!(active.active_version, "v1");
    assert_eq!(active.active_artifact_ref, "iris_v1.json");
    assert_eq!(active.model_kind, "DummyClassifier");
    assert_eq!(f.service.predict(&SETOSA, None).unwrap().model_version, "v1");
}

#[test]
fn unknown_switch_keeps_previous_record() {
    let f = fixture();
    f.trainer.train("v1").unwrap();
    let path = f.dir.path().join("model_registry.json");
    let before = fs::read(&path).unwrap();
    let err = f.service.switch_active("v2").unwrap_err();
    assert!(matches!(err, ModelError::UnknownVersion(_)));
    assert_eq!(fs::read(&path).unwrap(), before);
    assert_eq!(f.service.describe_active().unwrap().active_version, "v1");
}

#[test]
fn repeated_predictions_are_identical() {
    let f = fixture();
    f.trainer.train("v2").unwrap();
    let a = f.service.predict(&VIRGINICA, None).unwrap();
    let b = f.service.predict(&VIRGINICA, None).unwrap();
    assert_eq!(a.prediction, b.prediction);
    assert_eq!(a.confidence, b.confidence);
    assert_eq!(a.probabilities, b.probabilities);
}

#[test]
fn retraining_reproduces_the_same_classifier() {
    let f = fixture();
    let first = f.trainer.train("v2").unwrap();
    let second = f.trainer.train("v2").unwrap();
    assert!(first.artifact_sha256.is_some());
    assert_eq!(first.artifact_sha256, second.artifact_sha256);
    let a = f.service.predict(&VIRGINICA, Some("v2")).unwrap();
    assert_eq!(a.prediction, "virginica");
    assert_eq!(first.accuracy, second.accuracy);
}

#[test]
fn upgrade_improves_accuracy_and_confidence() {
    let f = fixture();
    let v1 = f.trainer.train("v1").unwrap();
    let weak = f.service.predict(&SETOSA, None).unwrap();
    let v2 = f.trainer.train("v2").unwrap();
    let strong = f.service.predict(&SETOSA, None).unwrap();

    assert!(v2.accuracy > v1.accuracy);
    assert_eq!(weak.model_version, "v1");
    assert_eq!(strong.model_version, "v2");
    assert_eq!(weak.prediction, "setosa");
    assert_eq!(strong.prediction, "setosa");
    assert!(strong.confidence > weak.confidence + 0.3);
    assert!((0.0..=1.0).contains(&strong.confidence));
}

#[test]
fn concurrent_switches_never_expose_a_torn_record() {
    let f = fixture();
    f.trainer.train("v1").unwrap();
    f.trainer.train("v2").unwrap();
    let registry = f.trainer.registry();
    let done = AtomicBool::new(false);

    std::thread::scope(|s| {
        let switchers: Vec<_> = (0..4)
            .map(|n| {
                s.spawn(move || {
                    for i in 0..100 {
                        let target = if (i + n) % 2 == 0 { "v1" } else { "v2" };
                        registry.switch_active(target).unwrap();
                    }
                })
            })
            .collect();
        let reader = s.spawn(|| {
            while !done.load(Ordering::SeqCst) {
                let record = registry.read().unwrap().expect("record present");
                assert!(["v1", "v2"].contains(&record.active_version.as_str()));
            }
        });
        for sw in switchers {
            sw.join().unwrap();
        }
        done.store(true, Ordering::SeqCst);
        reader.join().unwrap();
    });

    let stray: Vec<_> = fs::read_dir(f.dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(stray.is_empty());
}
