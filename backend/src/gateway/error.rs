//! Gateway client error types
//!
//! Errors produced by the gateway connection, handshake, and correlated calls.

use thiserror::Error;

/// Errors that can occur while talking to the gateway
///
/// `Clone` so a single in-flight connect attempt can hand the same outcome
/// to every caller that joined it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The transport could not be opened
    #[error("Gateway connection failed: {0}")]
    ConnectionFailed(String),

    /// The transport closed while the call was outstanding
    #[error("Connection closed")]
    ConnectionClosed,

    /// The transport was not open when a request had to be sent
    #[error("Not connected")]
    NotConnected,

    /// The gateway rejected the `connect` handshake
    #[error("Handshake rejected ({code}): {message}")]
    Handshake {
        /// Remote error code
        code: i64,
        /// Remote error message
        message: String,
    },

    /// No response arrived within the call deadline
    #[error("Request timeout: {method} did not answer within {secs}s")]
    Timeout {
        /// Method that timed out
        method: String,
        /// Deadline in seconds
        secs: u64,
    },

    /// The gateway answered with `ok: false`
    #[error("{message}")]
    Remote {
        /// Remote error code
        code: i64,
        /// Remote error message
        message: String,
    },

    /// The configured endpoint is not a usable WebSocket URL
    #[error("Invalid gateway URL: {0}")]
    InvalidUrl(String),

    /// An outbound frame could not be serialized
    #[error("Failed to encode request: {0}")]
    Encode(String),

    /// A payload did not match the expected shape
    #[error("Unexpected payload for {method}: {reason}")]
    Decode {
        /// Method whose payload failed to decode
        method: String,
        /// serde error text
        reason: String,
    },
}
