//! Error taxonomy for the companion agent.
//!
//! Every failure inside a tick maps onto one of these variants. None of them
//! stop the daemon: the tick is logged as failed and the next one runs on schedule.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompanionError {
    /// Missing credentials or farm controller settings. Not retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network failure talking to the farm controller. Retried on the next tick.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Malformed, incomplete or rejected farm controller response.
    #[error("Response error: {0}")]
    Response(String),

    /// Locally detected bad input (short token, missing URL).
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CompanionError {
    /// Whether the failure came from the network layer (connect error, timeout)
    /// rather than from the remote application or local state.
    pub fn is_transport(&self) -> bool {
        match self {
            CompanionError::Transport(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            _ => false,
        }
    }
}
