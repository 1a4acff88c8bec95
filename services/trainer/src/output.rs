//! Human or JSON rendering of command results.

use anyhow::Result;
use iris_model::{EvaluationReport, RegistryRecord, VersionSummary};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_flag(json: bool) -> Self { if json { Self::Json } else { Self::Text } }
}

pub fn print_json<T: Serialize + ?Sized>(data: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

pub fn record_lines(record: &RegistryRecord) -> Vec<String> {
    let mut lines = vec![
        format!("active version : {}", record.active_version),
        format!("artifact       : {}", record.active_artifact_ref),
        format!("model kind     : {}", record.model_kind),
        format!("accuracy       : {:.4}", record.accuracy),
        format!("updated at     : {}", record.updated_at.to_rfc3339()),
    ];
    if let Some(sha) = &record.artifact_sha256 {
        lines.push(format!("sha256         : {sha}"));
    }
    let available: Vec<&str> = record.available_versions.iter().map(String::as_str).collect();
    lines.push(format!("available      : {}", available.join(", ")));
    lines
}

pub fn print_record(record: &RegistryRecord, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(record),
        OutputFormat::Text => {
            for line in record_lines(record) {
                println!("{line}");
            }
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct Status<'a> {
    active: Option<&'a RegistryRecord>,
    models: &'a [VersionSummary],
}

pub fn print_status(active: Option<&RegistryRecord>, models: &[VersionSummary], format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(&Status { active, models });
    }
    match active {
        Some(record) => print_record(record, format)?,
        None => println!("no active model"),
    }
    if !models.is_empty() {
        println!();
        println!("{:<8} {:<24} {:>8}  {}", "VERSION", "KIND", "ACCURACY", "TRAINED AT");
        for m in models {
            let marker = if m.active { "*" } else { " " };
            println!("{marker}{:<7} {:<24} {:>8.4}  {}", m.version, m.model_kind, m.accuracy, m.trained_at.to_rfc3339());
        }
    }
    Ok(())
}

pub fn print_report(report: &EvaluationReport, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(report);
    }
    println!(
        "{} ({}): holdout accuracy {:.4} on {} samples ({} train)",
        report.version, report.model_kind, report.accuracy, report.test_samples, report.train_samples
    );
    println!("{:<12} {:>9} {:>9} {:>9} {:>8}", "CLASS", "PRECISION", "RECALL", "F1", "SUPPORT");
    for c in &report.per_class {
        println!("{:<12} {:>9.3} {:>9.3} {:>9.3} {:>8}", c.class, c.precision, c.recall, c.f1, c.support);
    }
    println!("confusion (rows = truth):");
    for row in &report.confusion {
        let cells: Vec<String> = row.iter().map(|n| format!("{n:>4}")).collect();
        println!("{}", cells.join(""));
    }
    Ok(())
}
