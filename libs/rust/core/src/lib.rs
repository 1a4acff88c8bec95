//! Core shared utilities for the iris model services.

use anyhow::Result;
use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod metrics;
pub use metrics::{metrics_handler, render_metrics, SERVING_METRICS, ServingMetrics};

static TRACING_INIT: OnceCell<()> = OnceCell::new();
static NODE_READINESS: AtomicBool = AtomicBool::new(false);

pub fn mark_ready() { NODE_READINESS.store(true, Ordering::SeqCst); }
pub fn clear_ready() { NODE_READINESS.store(false, Ordering::SeqCst); }
pub fn is_ready() -> bool { NODE_READINESS.load(Ordering::SeqCst) }

/// Installs the global subscriber once per process.
///
/// `RUST_LOG` drives the filter (default `info`); `IRIS_JSON_LOG=1` switches
/// the output to flattened JSON lines. Events are written to stderr.
pub fn init_tracing(service: &str) -> Result<()> {
    TRACING_INIT.get_or_try_init(|| -> Result<()> {
        let json = std::env::var("IRIS_JSON_LOG").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let registry = tracing_subscriber::registry().with(env_filter);
        if json {
            registry
                .with(fmt::layer().json().with_writer(std::io::stderr).flatten_event(true).with_current_span(true).with_span_list(false))
                .try_init()?;
        } else {
            registry
                .with(fmt::layer().with_writer(std::io::stderr).with_target(true).with_thread_ids(false).with_line_number(true))
                .try_init()?;
        }
        Ok(())
    })?;
    info!(target: "iris_core", service, "tracing initialized");
    Ok(())
}

/// Settings shared by the API process and the trainer CLI. Both must point at
/// the same model directory and registry file.
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub service_name: String,
    pub bind_addr: String,
    pub model_dir: PathBuf,
    pub registry_path: PathBuf,
    /// Unset means the bundled copy of the dataset.
    pub dataset_path: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_name: "iris".into(),
            bind_addr: "0.0.0.0:8000".into(),
            model_dir: PathBuf::from("models"),
            registry_path: PathBuf::from("model_registry.json"),
            dataset_path: None,
        }
    }
}

/// Layered load: defaults, then the file named by `IRIS_CONFIG_FILE`, then `IRIS_*` env vars.
pub fn load_config(service: &str) -> Result<ServiceConfig> {
    let file = std::env::var("IRIS_CONFIG_FILE").ok().map(PathBuf::from);
    load_config_with(service, file.as_deref())
}

pub fn load_config_with(service: &str, file: Option<&Path>) -> Result<ServiceConfig> {
    let defaults = ServiceConfig::default();
    let mut builder = config::Config::builder()
        .set_default("service_name", service)?
        .set_default("bind_addr", defaults.bind_addr)?
        .set_default("model_dir", defaults.model_dir.to_string_lossy().to_string())?
        .set_default("registry_path", defaults.registry_path.to_string_lossy().to_string())?;
    if let Some(path) = file {
        builder = builder.add_source(config::File::from(path).required(true));
    }
    builder = builder.add_source(
        config::Environment::with_prefix("IRIS")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );
    let cfg: ServiceConfig = builder.build()?.try_deserialize()?;
    info!(target: "iris_core", service, model_dir = %cfg.model_dir.display(), registry = %cfg.registry_path.display(), "config loaded");
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("iris.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "model_dir = \"/srv/models\"\nbind_addr = \"127.0.0.1:9000\"\ndataset_path = \"data/iris.csv\"").unwrap();
        let cfg = load_config_with("test-svc", Some(&path)).unwrap();
        assert_eq!(cfg.service_name, "test-svc");
        assert_eq!(cfg.model_dir, PathBuf::from("/srv/models"));
        assert_eq!(cfg.bind_addr, "127.0.0.1:9000");
        assert_eq!(cfg.dataset_path, Some(PathBuf::from("data/iris.csv")));
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let res = load_config_with("test-svc", Some(Path::new("/nonexistent/iris.toml")));
        assert!(res.is_err());
    }

    #[test]
    fn readiness_flag_toggles() {
        mark_ready();
        assert!(is_ready());
        clear_ready();
        assert!(!is_ready());
    }
}
