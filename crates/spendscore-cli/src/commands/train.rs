//! Train and evaluate command implementations

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use spendscore_core::{run_training, training::evaluate};

use super::datasets::{load_config, load_inputs, parse_selection};
use crate::cli::DatasetArgs;

/// Write a JSON value pretty-printed
pub fn write_json(path: &Path, value: &serde_json::Value) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

pub fn cmd_train(
    config_path: Option<&Path>,
    model: &str,
    data: &DatasetArgs,
    output: &Path,
) -> Result<()> {
    let config = load_config(config_path)?;
    let selection = parse_selection(model)?;
    let inputs = load_inputs(data, selection, &config)?;

    println!("🧮 Training {}...", selection);
    let run = run_training(selection, &inputs, &config);

    fs::create_dir_all(output)
        .with_context(|| format!("Failed to create output directory: {}", output.display()))?;

    for (kind, table) in run.artifacts.to_json()? {
        let path = output.join(format!("{}.json", kind));
        write_json(&path, &table)?;
        println!("   Wrote {}", path.display());
    }

    if let Some(report) = &run.report {
        let path = output.join("report.json");
        write_json(&path, &serde_json::to_value(report)?)?;
        println!(
            "   Wrote {} ({})",
            path.display(),
            report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        println!("   Dataset digest: {}", &report.dataset_digest[..12]);
    }

    println!("✅ Training complete!");
    Ok(())
}

pub fn cmd_evaluate(config_path: Option<&Path>, model: &str, data: &DatasetArgs) -> Result<()> {
    let config = load_config(config_path)?;
    let selection = parse_selection(model)?;
    let inputs = load_inputs(data, selection, &config)?;

    let metrics = evaluate(selection, &inputs, &config);
    println!("{}", serde_json::to_string_pretty(&metrics)?);
    Ok(())
}
