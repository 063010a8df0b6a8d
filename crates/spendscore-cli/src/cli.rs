//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Spendscore - Build and evaluate personal finance scoring models
#[derive(Parser)]
#[command(name = "spendscore")]
#[command(about = "Train and evaluate transaction scoring models", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Vocabulary/threshold config (defaults to the data-dir override, then built-in)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Input datasets shared by train, evaluate and export-clean
#[derive(Args, Debug, Clone, Default)]
pub struct DatasetArgs {
    /// Labeled transactions CSV (Date, Description, Amount, Category, Transaction Type)
    #[arg(long)]
    pub transactions: Option<PathBuf>,

    /// Categorized spending CSV
    #[arg(long)]
    pub spending: Option<PathBuf>,

    /// Date column of the spending CSV
    #[arg(long, default_value = "date")]
    pub spending_date_column: String,

    /// Category column of the spending CSV
    #[arg(long, default_value = "category")]
    pub spending_category_column: String,

    /// Amount column of the spending CSV
    #[arg(long, default_value = "amount")]
    pub spending_amount_column: String,

    /// Budget allocation CSV with `*Budget` columns (repeatable)
    #[arg(long)]
    pub budget: Vec<PathBuf>,

    /// Spending-habits survey CSV (budget shares and savings goals)
    #[arg(long)]
    pub habits: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train models and write their tables as JSON
    Train {
        /// Model to train: transaction_categorizer, spending_forecaster,
        /// budget_allocator, goal_predictor, anomaly_detector, all
        #[arg(short, long, default_value = "all")]
        model: String,

        #[command(flatten)]
        data: DatasetArgs,

        /// Output directory for artifacts (and report.json for `all`)
        #[arg(short, long, default_value = "artifacts")]
        output: PathBuf,
    },

    /// Evaluate models and print their metrics
    Evaluate {
        /// Model to evaluate (or `all`)
        #[arg(short, long, default_value = "all")]
        model: String,

        #[command(flatten)]
        data: DatasetArgs,
    },

    /// Categorize one transaction with a trained categorizer
    Predict {
        /// transaction_categorizer.json written by `train`
        #[arg(short, long)]
        artifact: PathBuf,

        /// Transaction description
        #[arg(short, long)]
        description: String,

        /// Transaction amount
        #[arg(long, allow_hyphen_values = true)]
        amount: f64,

        /// Number of ranked categories to show
        #[arg(short = 'k', long, default_value = "3")]
        top_k: usize,
    },

    /// Write the cleaned datasets as CSV
    ExportClean {
        /// Model whose datasets to export (or `all`)
        #[arg(short, long, default_value = "all")]
        model: String,

        #[command(flatten)]
        data: DatasetArgs,

        /// Output directory
        #[arg(short, long, default_value = "clean")]
        output: PathBuf,
    },

    /// Show the active configuration
    Config,
}
