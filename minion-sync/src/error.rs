//! Error types for minion-sync.

use thiserror::Error;

use minion_core::{ConfigError, GatewayError, TenantId};

/// Failures of the synchronization engine, by the stage that produced them.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Fetching the tenant list for aspect replication failed.
    #[error("failed to list tenants: {0}")]
    Tenants(#[source] GatewayError),

    /// One aspect-definition write failed; replication is incomplete.
    #[error("failed to write aspect definition '{aspect}' for tenant {tenant}: {source}")]
    AspectSync {
        aspect: String,
        tenant: TenantId,
        #[source]
        source: GatewayError,
    },

    #[error("failed to look up or register webhook '{webhook}': {source}")]
    Registration {
        webhook: String,
        #[source]
        source: GatewayError,
    },

    #[error("failed to resume webhook '{webhook}': {source}")]
    Resume {
        webhook: String,
        #[source]
        source: GatewayError,
    },

    /// Steady-state acknowledgment failure; the registry redelivers.
    #[error("failed to acknowledge delivery up to event {last_event_id} on '{webhook}': {source}")]
    Acknowledge {
        webhook: String,
        last_event_id: i64,
        #[source]
        source: GatewayError,
    },

    #[error("crawl aborted at page {page_token:?}: {source}")]
    Crawl {
        page_token: Option<String>,
        #[source]
        source: GatewayError,
    },
}

impl SyncError {
    /// Whether this error must stop the process when it happens during startup.
    pub fn is_fatal_at_startup(&self) -> bool {
        !matches!(self, SyncError::Acknowledge { .. })
    }
}
