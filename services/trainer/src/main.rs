//! model-trainer: trains, activates and inspects iris model versions.

use anyhow::Result;
use clap::{Parser, Subcommand};
use iris_core::{init_tracing, load_config_with, ServiceConfig};
use iris_model::{registry_from_config, DatasetSource, PredictionService, Trainer};
use std::path::PathBuf;
use tracing::{info, warn};

mod output;

use output::{print_json, print_record, print_report, print_status, OutputFormat};

#[derive(Parser, Debug)]
#[command(name = "model-trainer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "IRIS_CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Directory holding the model artifacts
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    /// Registry file path
    #[arg(long, global = true)]
    registry: Option<PathBuf>,

    /// CSV dataset to train on instead of the bundled copy
    #[arg(long, global = true)]
    dataset: Option<PathBuf>,

    /// Machine-readable output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train a version and make it active
    Train { version: String },

    /// Make an already trained version active
    Switch { version: String },

    /// Show the active record and every trained version
    Status,

    /// Score a version on a stratified holdout without touching the registry
    Evaluate {
        version: String,
        #[arg(long, default_value_t = 0.2)]
        test_fraction: f64,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Delete the registry record
    Reset {
        /// Also delete every artifact file
        #[arg(long)]
        purge_artifacts: bool,
    },
}

fn resolve_config(cli: &Cli) -> Result<ServiceConfig> {
    let mut cfg = load_config_with("model-trainer", cli.config.as_deref())?;
    if let Some(dir) = &cli.model_dir {
        cfg.model_dir = dir.clone();
    }
    if let Some(path) = &cli.registry {
        cfg.registry_path = path.clone();
    }
    if let Some(path) = &cli.dataset {
        cfg.dataset_path = Some(path.clone());
    }
    Ok(cfg)
}

fn run(cli: Cli) -> Result<()> {
    let cfg = resolve_config(&cli)?;
    let format = OutputFormat::from_flag(cli.json);
    let registry = registry_from_config(&cfg);

    match cli.command {
        Commands::Train { version } => {
            let trainer = Trainer::new(registry, DatasetSource::from_path(cfg.dataset_path.clone()));
            let record = trainer.train(&version)?;
            print_record(&record, format)
        }
        Commands::Switch { version } => {
            let record = PredictionService::new(registry).switch_active(&version)?;
            print_record(&record, format)
        }
        Commands::Status => {
            let service = PredictionService::new(registry);
            let active = service.registry().read()?;
            let models = service.describe_all_available()?;
            print_status(active.as_ref(), &models, format)
        }
        Commands::Evaluate { version, test_fraction, seed } => {
            let trainer = Trainer::new(registry, DatasetSource::from_path(cfg.dataset_path.clone()));
            let report = trainer.evaluate(&version, test_fraction, seed)?;
            print_report(&report, format)
        }
        Commands::Reset { purge_artifacts } => {
            let removed_record = registry.reset()?;
            let purged = if purge_artifacts { registry.store().purge()? } else { Vec::new() };
            if !purged.is_empty() {
                warn!(versions = ?purged, "artifacts purged");
            }
            match format {
                OutputFormat::Json => print_json(&serde_json::json!({ "registry_removed": removed_record, "purged": purged })),
                OutputFormat::Text => {
                    println!("registry {}", if removed_record { "removed" } else { "already absent" });
                    if purge_artifacts {
                        println!("purged artifacts: {}", if purged.is_empty() { "none".to_string() } else { purged.join(", ") });
                    }
                    Ok(())
                }
            }
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing("model-trainer")?;
    info!(command = ?cli.command, "model-trainer starting");
    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
