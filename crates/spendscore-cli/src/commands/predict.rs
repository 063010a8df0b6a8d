//! Predict command implementation

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use spendscore_core::{CategorizerArtifact, CategoryScorer};

use super::datasets::load_config;

/// Load a categorizer artifact written by `train`
pub fn load_artifact(path: &Path) -> Result<CategorizerArtifact> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read artifact: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid categorizer artifact: {}", path.display()))
}

/// Ranked `(category, score)` pairs for one transaction
pub fn rank_transaction(
    config_path: Option<&Path>,
    artifact_path: &Path,
    description: &str,
    amount: f64,
    top_k: usize,
) -> Result<Vec<(String, f64)>> {
    let config = load_config(config_path)?;
    let artifact = load_artifact(artifact_path)?;
    let scorer = CategoryScorer::new(&artifact, &config.vocabulary);
    Ok(scorer.rank(description, amount).into_iter().take(top_k).collect())
}

pub fn cmd_predict(
    config_path: Option<&Path>,
    artifact_path: &Path,
    description: &str,
    amount: f64,
    top_k: usize,
) -> Result<()> {
    let ranked = rank_transaction(config_path, artifact_path, description, amount, top_k.max(1))?;

    let Some((category, _)) = ranked.first() else {
        println!("Category: {} (artifact has no categories)", spendscore_core::FALLBACK_CATEGORY);
        return Ok(());
    };

    println!("Category: {}", category);
    println!();
    for (i, (category, score)) in ranked.iter().take(top_k).enumerate() {
        println!("  {}. {:<20} {:>10.4}", i + 1, category, score);
    }
    Ok(())
}
