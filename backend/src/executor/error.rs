//! CLI-specific error types
//!
//! Errors that can occur while running the gateway CLI (process spawning,
//! timeouts, output decoding).

use thiserror::Error;

/// Errors that can occur while running the gateway CLI
#[derive(Error, Debug)]
pub enum CliError {
    /// Process exited with a non-zero code
    #[error("Process execution failed: {0}")]
    ProcessFailed(String),

    /// Command execution exceeded the timeout limit
    #[error("Command execution timed out after {0} seconds")]
    Timeout(u64),

    /// Failed to spawn the process (e.g., command not found, permission denied)
    #[error("Failed to spawn process: {0}")]
    SpawnFailed(#[from] std::io::Error),

    /// Process output could not be decoded as UTF-8
    #[error("Invalid output encoding: {0}")]
    InvalidEncoding(String),

    /// Process output was not the JSON it should have been
    #[error("Invalid JSON output: {0}")]
    InvalidJson(#[from] serde_json::Error),
}
