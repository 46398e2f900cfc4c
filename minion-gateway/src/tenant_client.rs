//! HTTP client for the tenant service, with a minimum refresh interval.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use tokio::sync::Mutex;
use tokio::time::Instant;

use minion_core::{
    GatewayError, MinionConfig, RetryPolicy, Tenant, TenantGateway, DEFAULT_TENANT_ID,
};

use crate::registry_client::{check, decode, transport};
use crate::retry::with_retries;
use crate::{SESSION_HEADER, TENANT_HEADER};

struct CachedTenants {
    fetched_at: Instant,
    tenants: Vec<Tenant>,
}

/// Tenant gateway. Repeated calls within `refresh_interval` are served from
/// the last successful response.
pub struct HttpTenantClient {
    client: Client,
    base_url: String,
    credential: String,
    retry: RetryPolicy,
    refresh_interval: Duration,
    cache: Mutex<Option<CachedTenants>>,
}

impl HttpTenantClient {
    pub fn new(
        base_url: impl Into<String>,
        credential: impl Into<String>,
        retry: RetryPolicy,
        refresh_interval: Duration,
    ) -> Result<Self, GatewayError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| transport("buildClient", &base_url, err))?;
        Ok(Self {
            client,
            base_url,
            credential: credential.into(),
            retry,
            refresh_interval,
            cache: Mutex::new(None),
        })
    }

    pub fn from_config(config: &MinionConfig) -> Result<Self, GatewayError> {
        Self::new(
            config.tenant_url.as_str(),
            config.credential.as_str(),
            config.retry_policy(),
            config.tenant_refresh_interval(),
        )
    }

    async fn fetch(&self) -> Result<Vec<Tenant>, GatewayError> {
        let operation = "getTenants";
        let url = format!("{}/tenants", self.base_url);
        let url = url.as_str();

        with_retries(&self.retry, operation, || async move {
            let response = self
                .client
                .request(Method::GET, url)
                .header(SESSION_HEADER, &self.credential)
                .header(TENANT_HEADER, DEFAULT_TENANT_ID.to_string())
                .send()
                .await
                .map_err(|err| transport(operation, url, err))?;
            decode(operation, check(operation, response).await?).await
        })
        .await
    }
}

#[async_trait]
impl TenantGateway for HttpTenantClient {
    async fn get_tenants(&self) -> Result<Vec<Tenant>, GatewayError> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if cached.fetched_at.elapsed() < self.refresh_interval {
                tracing::debug!(tenants = cached.tenants.len(), "serving cached tenant list");
                return Ok(cached.tenants.clone());
            }
        }

        let tenants = self.fetch().await?;
        tracing::info!(tenants = tenants.len(), "fetched tenant list");
        *cache = Some(CachedTenants {
            fetched_at: Instant::now(),
            tenants: tenants.clone(),
        });
        Ok(tenants)
    }
}
