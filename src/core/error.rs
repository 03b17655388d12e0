//! Application-wide error types.

use thiserror::Error;

use crate::chain::ChainError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("io error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("failed to load chain '{reference}': {source}")]
    Resolution {
        reference: String,
        #[source]
        source: ChainError,
    },

    #[error("telemetry bind failed on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("telemetry error: {0}")]
    Telemetry(String),

    #[error("node error: {0}")]
    Node(String),
}

impl AppError {
    /// Wrap an I/O failure with a description of what was being attempted.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        AppError::Io { context: context.into(), source }
    }
}
