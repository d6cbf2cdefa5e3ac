//! CLI command implementations for kemp-exporter.
//!
//! The `server` subcommand lives in `main`; this module holds the
//! one-shot commands:
//! - `config`: Configuration file generation

pub mod config;

// Re-export command functions
pub use config::command_config;
