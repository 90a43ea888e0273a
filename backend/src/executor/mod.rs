//! Gateway CLI module
//!
//! Runs the gateway's command-line tool. It handles process spawning, output
//! capture, timeout management, and error handling.

pub mod cli;
pub mod error;

pub use cli::CliRunner;
pub use error::CliError;
