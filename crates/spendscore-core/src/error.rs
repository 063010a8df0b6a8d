//! Error types for spendscore
//!
//! Only configuration loading and CSV import can fail. Training, scoring and
//! evaluation are total: degenerate input yields empty tables or zeroed
//! metrics instead of an error.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Import error: {0}")]
    Import(String),
}

pub type Result<T> = std::result::Result<T, Error>;
