//! Minion startup configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.minion/
//!   config.yaml   (default location; `--config` / `MINION_CONFIG` override it)
//! ```
//!
//! # API pattern
//!
//! - `load_at(path)`: explicit path; used in tests with `TempDir`
//! - `load()`: derives the default path from `dirs::home_dir()`
//!
//! Loading never validates; call [`MinionConfig::validate`] before building
//! anything that talks to the network.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{AspectDefinition, MinionId, TenantId};

/// The distinguished tenant partition every aspect definition is written to.
pub const DEFAULT_TENANT_ID: TenantId = TenantId(0);

/// Upper bound on a single retry delay, however far the backoff has grown.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(300);

/// Log output format of the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Everything a minion needs at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinionConfig {
    /// Port the ingress server binds. Kept wide so out-of-range values are
    /// reported instead of failing deserialization.
    pub listen_port: u32,
    /// Base URL at which the registry can reach this minion.
    pub internal_url: String,
    pub registry_url: String,
    #[serde(default)]
    pub tenant_url: String,
    pub minion_id: String,
    /// Pre-issued session credential attached to every outgoing call.
    pub credential: String,
    #[serde(default)]
    pub aspects: Vec<String>,
    #[serde(default)]
    pub optional_aspects: Vec<String>,
    #[serde(default)]
    pub write_aspect_defs: Vec<AspectDefinition>,
    /// Maximum in-flight handler invocations; 0 means unbounded.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub multi_tenant: bool,
    #[serde(default)]
    pub tenant_id: Option<TenantId>,
    #[serde(default = "default_tenant_refresh_interval_secs")]
    pub tenant_refresh_interval_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_retry_backoff_factor")]
    pub retry_backoff_factor: f64,
    #[serde(default)]
    pub crawl_page_size: Option<u32>,
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_concurrency() -> usize {
    1
}

fn default_tenant_refresh_interval_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_retry_backoff_factor() -> f64 {
    1.0
}

/// Bounded retry schedule for registry and tenant calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub delay: Duration,
    /// Multiplier applied to `delay` after each failed attempt; 1.0 is fixed delay.
    pub backoff_factor: f64,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            delay: Duration::ZERO,
            backoff_factor: 1.0,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    /// Saturates at [`MAX_RETRY_DELAY`].
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if self.delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .map_or(MAX_RETRY_DELAY, |delay| delay.min(MAX_RETRY_DELAY))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            delay: Duration::from_millis(default_retry_delay_ms()),
            backoff_factor: default_retry_backoff_factor(),
        }
    }
}

impl MinionConfig {
    /// Check every startup invariant. Returns the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_port == 0 || self.listen_port > u32::from(u16::MAX) {
            return Err(ConfigError::InvalidPort(self.listen_port));
        }
        require("minion id", &self.minion_id)?;
        require("internal url", &self.internal_url)?;
        require("registry url", &self.registry_url)?;
        require("credential", &self.credential)?;

        if contains_blank(&self.aspects) {
            return Err(ConfigError::BlankAspect {
                field: "aspects",
                values: self.aspects.clone(),
            });
        }
        if contains_blank(&self.optional_aspects) {
            return Err(ConfigError::BlankAspect {
                field: "optional aspects",
                values: self.optional_aspects.clone(),
            });
        }
        if self.multi_tenant && self.tenant_id.is_none() {
            return Err(ConfigError::MissingTenantId);
        }
        if !self.retry_backoff_factor.is_finite() || self.retry_backoff_factor < 1.0 {
            return Err(ConfigError::InvalidBackoff(self.retry_backoff_factor));
        }
        Ok(())
    }

    /// Validated listen port.
    pub fn port(&self) -> Result<u16, ConfigError> {
        match u16::try_from(self.listen_port) {
            Ok(port) if port > 0 => Ok(port),
            _ => Err(ConfigError::InvalidPort(self.listen_port)),
        }
    }

    pub fn id(&self) -> MinionId {
        MinionId::from(self.minion_id.as_str())
    }

    /// Tenant scope sent with registry calls.
    pub fn scope_tenant(&self) -> TenantId {
        self.tenant_id.unwrap_or(DEFAULT_TENANT_ID)
    }

    /// Callback URL registered with the webhook.
    pub fn hook_url(&self) -> String {
        format!("{}/hook", self.internal_url.trim_end_matches('/'))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            delay: Duration::from_millis(self.retry_delay_ms),
            backoff_factor: self.retry_backoff_factor,
        }
    }

    pub fn tenant_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.tenant_refresh_interval_secs)
    }
}

fn require(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::Blank(field))
    } else {
        Ok(())
    }
}

fn contains_blank(values: &[String]) -> bool {
    values.iter().any(|value| value.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// `<home>/.minion/config.yaml`: pure, no I/O.
pub fn default_path_at(home: &Path) -> PathBuf {
    home.join(".minion").join("config.yaml")
}

/// Load a config file from `path`.
///
/// Returns `ConfigError::NotFound` if absent,
/// `ConfigError::Parse` (with path) if malformed YAML.
pub fn load_at(path: &Path) -> Result<MinionConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path)?;
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// `load_at` convenience wrapper using the default location.
pub fn load() -> Result<MinionConfig, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
    load_at(&default_path_at(&home))
}
