//! Spendscore CLI - Scoring-model construction and evaluation
//!
//! Usage:
//!   spendscore train --model all --transactions tx.csv --output artifacts
//!   spendscore evaluate --model transaction_categorizer --transactions tx.csv
//!   spendscore predict --artifact artifacts/transaction_categorizer.json -d "uber trip" --amount 12
//!   spendscore config

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Train {
            model,
            data,
            output,
        } => commands::cmd_train(config_path, &model, &data, &output),
        Commands::Evaluate { model, data } => commands::cmd_evaluate(config_path, &model, &data),
        Commands::Predict {
            artifact,
            description,
            amount,
            top_k,
        } => commands::cmd_predict(config_path, &artifact, &description, amount, top_k),
        Commands::ExportClean {
            model,
            data,
            output,
        } => commands::cmd_export_clean(config_path, &model, &data, &output),
        Commands::Config => commands::cmd_config(config_path),
    }
}
