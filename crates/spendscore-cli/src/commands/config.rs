//! Config command implementation

use std::path::Path;

use anyhow::Result;
use spendscore_core::config::{default_config_path, resolve_config_source};

use super::datasets::load_config;

pub fn cmd_config(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let vocabulary = &config.vocabulary;

    println!("⚙️  Scoring configuration");
    println!("   Source: {}", resolve_config_source(config_path));
    if let Some(path) = default_config_path() {
        println!("   Override path: {}", path.display());
    }
    println!();
    println!("Vocabulary:");
    println!("   Stopwords:          {}", vocabulary.stopwords.len());
    println!("   Generic tokens:     {}", vocabulary.generic_tokens.len());
    println!("   Strong tokens:      {}", vocabulary.strong_tokens.len());
    println!("   Allowed categories: {}", vocabulary.allowed_categories.len());
    println!("   Category aliases:   {}", vocabulary.category_aliases.len());
    println!("   Curated categories: {}", vocabulary.curated_keywords.len());
    println!();
    println!("Filters:");
    println!("{}", serde_json::to_string_pretty(&config.filters)?);
    println!("Training:");
    println!("{}", serde_json::to_string_pretty(&config.training)?);

    Ok(())
}
