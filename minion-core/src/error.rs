//! Error types for minion-core.

use std::path::PathBuf;

use thiserror::Error;

/// Startup configuration problems. Detected before any network call.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading config: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse error on load, with the offending path.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("config not found at {path}")]
    NotFound { path: PathBuf },

    /// `dirs::home_dir()` returned `None`, so the default config path is unknown.
    #[error("cannot determine home directory; pass --config explicitly")]
    HomeNotFound,

    #[error("listen port {0} is invalid; expected 1-65535")]
    InvalidPort(u32),

    /// A required string setting is empty or whitespace.
    #[error("{0} is unspecified")]
    Blank(&'static str),

    #[error("{field} {values:?} contains a blank aspect")]
    BlankAspect {
        field: &'static str,
        values: Vec<String>,
    },

    #[error("tenant id is unspecified but multi-tenant mode is enabled")]
    MissingTenantId,

    #[error("retry backoff factor {0} must be finite and >= 1.0")]
    InvalidBackoff(f64),
}

/// Failures talking to the registry or the tenant service.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request never produced an HTTP response (DNS, connect, timeout).
    #[error("{operation} request to {url} failed: {message}")]
    Transport {
        operation: String,
        url: String,
        message: String,
    },

    /// The service answered with a non-success status.
    #[error("{operation} returned HTTP {status}: {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("failed to decode {operation} response: {message}")]
    Decode { operation: String, message: String },
}

impl GatewayError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Transport { .. } => true,
            GatewayError::Status { status, .. } => *status >= 500 || *status == 429,
            GatewayError::Decode { .. } => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
