use std::net::SocketAddr;

use thiserror::Error;

/// Error surface for the daemon runtime and its HTTP client helpers.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error ({context}): {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(#[from] minion_core::ConfigError),

    #[error("gateway error: {0}")]
    Gateway(#[from] minion_core::GatewayError),

    #[error("sync error: {0}")]
    Sync(#[from] minion_sync::SyncError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("minion protocol error: {0}")]
    Protocol(String),

    #[error("minion is not reachable at {url}: {message}")]
    NotRunning { url: String, message: String },
}

pub(crate) fn io_err(context: impl Into<String>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        context: context.into(),
        source,
    }
}
