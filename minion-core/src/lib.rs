//! Minion core library: domain types, configuration, errors, gateway contracts.
//!
//! - [`types`]: newtypes and wire structs (records, webhooks, batches, progress)
//! - [`config`]: [`MinionConfig`] load / validate
//! - [`error`]: [`ConfigError`], [`GatewayError`]
//! - [`gateway`]: [`RegistryGateway`], [`TenantGateway`]
//! - `testing`: in-memory gateways (feature `testing`)

pub mod config;
pub mod error;
pub mod gateway;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;

pub use config::{LogFormat, MinionConfig, RetryPolicy, DEFAULT_TENANT_ID, MAX_RETRY_DELAY};
pub use error::{ConfigError, GatewayError};
pub use gateway::{RegistryGateway, TenantGateway};
pub use types::{
    AspectDefinition, CrawlProgress, EventBatch, EventId, EventType, MinionId, Record, RecordId,
    RecordsPage, RecordsQuery, RegistryEvent, Tenant, TenantId, WebHook, WebHookAcknowledgement,
    WebHookAcknowledgementResponse, WebHookConfig,
};
