//! CLI command implementations for uid-io-monitor.
//!
//! This module provides implementations for all CLI subcommands:
//! - `check`: Configuration and statistics source validation
//! - `config`: Configuration file generation
//! - `dump`: In-process sampling and history output
//! - `generate`: Synthetic statistics file generation

pub mod check;
pub mod config;
pub mod dump;
pub mod generate;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use dump::command_dump;
pub use generate::command_generate_testdata;
