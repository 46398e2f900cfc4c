//! Replication of this minion's aspect definitions into every tenant.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::join_all;

use minion_core::{AspectDefinition, RegistryGateway, TenantGateway, TenantId, DEFAULT_TENANT_ID};

use crate::error::SyncError;

pub struct AspectSynchronizer {
    registry: Arc<dyn RegistryGateway>,
    tenants: Arc<dyn TenantGateway>,
    definitions: Vec<AspectDefinition>,
}

impl AspectSynchronizer {
    pub fn new(
        registry: Arc<dyn RegistryGateway>,
        tenants: Arc<dyn TenantGateway>,
        definitions: Vec<AspectDefinition>,
    ) -> Self {
        Self {
            registry,
            tenants,
            definitions,
        }
    }

    /// Write every definition into every known tenant plus the default one.
    ///
    /// Writes run concurrently. Any failure fails the whole sync; re-running
    /// is safe because each write is an idempotent put. Tenants created after
    /// this returns are not covered until the next sync.
    pub async fn sync(&self) -> Result<Vec<TenantId>, SyncError> {
        if self.definitions.is_empty() {
            tracing::debug!("no aspect definitions to write");
            return Ok(Vec::new());
        }

        let tenants = self.tenant_ids().await?;
        let writes = self.definitions.iter().flat_map(|definition| {
            tenants.iter().map(move |&tenant| async move {
                self.registry
                    .put_aspect_definition(definition, tenant)
                    .await
                    .map_err(|source| SyncError::AspectSync {
                        aspect: definition.id.clone(),
                        tenant,
                        source,
                    })
            })
        });

        for result in join_all(writes).await {
            result?;
        }

        tracing::info!(
            definitions = self.definitions.len(),
            tenants = tenants.len(),
            "aspect definitions synchronized"
        );
        Ok(tenants)
    }

    /// Known tenant ids plus the default tenant, sorted and deduplicated.
    async fn tenant_ids(&self) -> Result<Vec<TenantId>, SyncError> {
        let tenants = self.tenants.get_tenants().await.map_err(SyncError::Tenants)?;
        let ids: BTreeSet<TenantId> = tenants
            .into_iter()
            .map(|tenant| tenant.id)
            .chain(std::iter::once(DEFAULT_TENANT_ID))
            .collect();
        Ok(ids.into_iter().collect())
    }
}
