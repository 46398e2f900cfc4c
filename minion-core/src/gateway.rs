//! Contracts of the remote services a minion consumes.
//!
//! The engine only ever sees these traits; `minion-gateway` provides the HTTP
//! implementations and [`crate::testing`] the in-memory ones.

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::types::{
    AspectDefinition, RecordsPage, RecordsQuery, Tenant, TenantId, WebHook,
    WebHookAcknowledgement, WebHookAcknowledgementResponse,
};

/// Typed RPC surface of the registry.
#[async_trait]
pub trait RegistryGateway: Send + Sync {
    async fn get_records(&self, query: &RecordsQuery) -> Result<RecordsPage, GatewayError>;

    /// `Ok(None)` when no webhook with `id` exists.
    async fn get_webhook(&self, id: &str) -> Result<Option<WebHook>, GatewayError>;

    /// Create or replace a webhook.
    async fn put_webhook(&self, hook: &WebHook) -> Result<WebHook, GatewayError>;

    async fn ack_webhook(
        &self,
        id: &str,
        ack: &WebHookAcknowledgement,
    ) -> Result<WebHookAcknowledgementResponse, GatewayError>;

    /// Idempotent write of an aspect definition into one tenant partition.
    async fn put_aspect_definition(
        &self,
        definition: &AspectDefinition,
        tenant: TenantId,
    ) -> Result<AspectDefinition, GatewayError>;
}

/// Tenant listing service.
#[async_trait]
pub trait TenantGateway: Send + Sync {
    async fn get_tenants(&self) -> Result<Vec<Tenant>, GatewayError>;
}
