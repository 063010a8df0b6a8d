//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `datasets` - Shared utilities (config loading, model selection, dataset loading)
//! - `train` - Train and evaluate commands
//! - `predict` - Single-transaction categorization
//! - `export` - Cleaned dataset export
//! - `config` - Active configuration display

pub mod config;
pub mod datasets;
pub mod export;
pub mod predict;
pub mod train;

// Re-export command functions for main.rs
pub use config::*;
pub use datasets::*;
pub use export::*;
pub use predict::*;
pub use train::*;
