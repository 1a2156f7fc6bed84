//! Errors surfaced by the relay runtime

use thiserror::Error;

/// Failure to bring the relay up
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to bind UDP socket on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to resolve output destination {host}:{port}: {reason}")]
    Resolve {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("relay is already running")]
    AlreadyRunning,
}
