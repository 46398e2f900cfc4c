//! In-memory gateways for tests.
//!
//! [`FakeRegistry`] pages a fixed record set, stores webhooks and aspect
//! definitions, records every call, and can be told to fail specific calls.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::config::{LogFormat, MinionConfig};
use crate::error::GatewayError;
use crate::gateway::{RegistryGateway, TenantGateway};
use crate::types::{
    AspectDefinition, Record, RecordsPage, RecordsQuery, Tenant, TenantId, WebHook,
    WebHookAcknowledgement, WebHookAcknowledgementResponse,
};

/// A config that passes validation; tests tweak single fields from here.
pub fn valid_config() -> MinionConfig {
    MinionConfig {
        listen_port: 6123,
        internal_url: "http://indexer.test:6123".to_string(),
        registry_url: "http://registry.test/v0".to_string(),
        tenant_url: "http://tenant.test/v0".to_string(),
        minion_id: "indexer".to_string(),
        credential: "session-token".to_string(),
        aspects: vec!["dcat-dataset-strings".to_string()],
        optional_aspects: vec!["dataset-format".to_string()],
        write_aspect_defs: vec![],
        concurrency: 2,
        multi_tenant: false,
        tenant_id: None,
        tenant_refresh_interval_secs: 60,
        max_retries: 0,
        retry_delay_ms: 0,
        retry_backoff_factor: 1.0,
        crawl_page_size: None,
        log_format: LogFormat::Text,
    }
}

/// `count` records with ids `record-0`, `record-1`, ...
pub fn numbered_records(count: usize) -> Vec<Record> {
    (0..count)
        .map(|i| Record::new(format!("record-{i}"), format!("Record {i}")))
        .collect()
}

/// One observed registry call.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryCall {
    GetRecords(RecordsQuery),
    GetWebHook(String),
    PutWebHook(String),
    AckWebHook {
        id: String,
        ack: WebHookAcknowledgement,
    },
    PutAspectDefinition {
        id: String,
        tenant: TenantId,
    },
}

#[derive(Default)]
struct FakeRegistryState {
    webhooks: HashMap<String, WebHook>,
    aspects: HashMap<(String, TenantId), AspectDefinition>,
    calls: Vec<RegistryCall>,
    ack_failures_remaining: u32,
    page_failures_remaining: u32,
    failing_aspect_tenants: HashSet<TenantId>,
    registration_fails: bool,
}

pub struct FakeRegistry {
    records: Vec<Record>,
    page_size: usize,
    state: Mutex<FakeRegistryState>,
}

impl Default for FakeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            page_size: 100,
            state: Mutex::new(FakeRegistryState::default()),
        }
    }

    pub fn with_records(mut self, records: Vec<Record>, page_size: usize) -> Self {
        self.records = records;
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_webhook(self, hook: WebHook) -> Self {
        self.state().webhooks.insert(hook.id.clone(), hook);
        self
    }

    /// The next `n` acknowledgments fail with HTTP 503.
    pub fn fail_acks(self, n: u32) -> Self {
        self.state().ack_failures_remaining = n;
        self
    }

    /// The next `n` page fetches fail with HTTP 503.
    pub fn fail_pages(self, n: u32) -> Self {
        self.state().page_failures_remaining = n;
        self
    }

    pub fn fail_aspect_writes_for(self, tenant: TenantId) -> Self {
        self.state().failing_aspect_tenants.insert(tenant);
        self
    }

    pub fn fail_registration(self) -> Self {
        self.state().registration_fails = true;
        self
    }

    pub fn calls(&self) -> Vec<RegistryCall> {
        self.state().calls.clone()
    }

    pub fn count_calls(&self, matches: impl Fn(&RegistryCall) -> bool) -> usize {
        self.state().calls.iter().filter(|call| matches(call)).count()
    }

    pub fn page_fetches(&self) -> usize {
        self.count_calls(|call| matches!(call, RegistryCall::GetRecords(_)))
    }

    pub fn acks(&self) -> Vec<WebHookAcknowledgement> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                RegistryCall::AckWebHook { ack, .. } => Some(*ack),
                _ => None,
            })
            .collect()
    }

    pub fn webhook(&self, id: &str) -> Option<WebHook> {
        self.state().webhooks.get(id).cloned()
    }

    /// Stored aspect definitions, keyed by (definition id, tenant).
    pub fn stored_aspects(&self) -> HashMap<(String, TenantId), AspectDefinition> {
        self.state().aspects.clone()
    }

    fn state(&self) -> MutexGuard<'_, FakeRegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn unavailable(operation: &str) -> GatewayError {
    GatewayError::Status {
        operation: operation.to_string(),
        status: 503,
        body: "injected failure".to_string(),
    }
}

#[async_trait]
impl RegistryGateway for FakeRegistry {
    async fn get_records(&self, query: &RecordsQuery) -> Result<RecordsPage, GatewayError> {
        {
            let mut state = self.state();
            state.calls.push(RegistryCall::GetRecords(query.clone()));
            if state.page_failures_remaining > 0 {
                state.page_failures_remaining -= 1;
                return Err(unavailable("getRecords"));
            }
        }

        let page_index: usize = match query.page_token.as_deref() {
            None => 0,
            Some(token) => token.parse().map_err(|_| GatewayError::Status {
                operation: "getRecords".to_string(),
                status: 400,
                body: format!("bad page token {token}"),
            })?,
        };
        let start = (page_index * self.page_size).min(self.records.len());
        let end = (start + self.page_size).min(self.records.len());
        let has_more = end < self.records.len();

        Ok(RecordsPage {
            records: self.records[start..end].to_vec(),
            has_more: Some(has_more),
            next_page_token: has_more.then(|| (page_index + 1).to_string()),
            total_count: Some(self.records.len() as u64),
        })
    }

    async fn get_webhook(&self, id: &str) -> Result<Option<WebHook>, GatewayError> {
        let mut state = self.state();
        state.calls.push(RegistryCall::GetWebHook(id.to_string()));
        Ok(state.webhooks.get(id).cloned())
    }

    async fn put_webhook(&self, hook: &WebHook) -> Result<WebHook, GatewayError> {
        let mut state = self.state();
        state.calls.push(RegistryCall::PutWebHook(hook.id.clone()));
        if state.registration_fails {
            return Err(unavailable("putWebHook"));
        }
        state.webhooks.insert(hook.id.clone(), hook.clone());
        Ok(hook.clone())
    }

    async fn ack_webhook(
        &self,
        id: &str,
        ack: &WebHookAcknowledgement,
    ) -> Result<WebHookAcknowledgementResponse, GatewayError> {
        let mut state = self.state();
        state.calls.push(RegistryCall::AckWebHook {
            id: id.to_string(),
            ack: *ack,
        });
        if state.ack_failures_remaining > 0 {
            state.ack_failures_remaining -= 1;
            return Err(unavailable("ackWebHook"));
        }
        let Some(hook) = state.webhooks.get_mut(id) else {
            return Err(GatewayError::Status {
                operation: "ackWebHook".to_string(),
                status: 404,
                body: format!("no webhook {id}"),
            });
        };
        if let Some(last) = ack.last_event_id_received {
            hook.last_event_id_received = Some(last);
        }
        Ok(WebHookAcknowledgementResponse {
            last_event_id_received: hook.last_event_id_received,
        })
    }

    async fn put_aspect_definition(
        &self,
        definition: &AspectDefinition,
        tenant: TenantId,
    ) -> Result<AspectDefinition, GatewayError> {
        let mut state = self.state();
        state.calls.push(RegistryCall::PutAspectDefinition {
            id: definition.id.clone(),
            tenant,
        });
        if state.failing_aspect_tenants.contains(&tenant) {
            return Err(unavailable("putAspectDefinition"));
        }
        state
            .aspects
            .insert((definition.id.clone(), tenant), definition.clone());
        Ok(definition.clone())
    }
}

/// Fixed tenant list with a call counter.
pub struct FakeTenants {
    tenants: Vec<Tenant>,
    fail: bool,
    calls: AtomicUsize,
}

impl FakeTenants {
    pub fn new(ids: &[i64]) -> Self {
        Self {
            tenants: ids
                .iter()
                .map(|id| Tenant {
                    id: TenantId(*id),
                    domain_name: format!("tenant-{id}.example"),
                    enabled: true,
                })
                .collect(),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(&[])
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TenantGateway for FakeTenants {
    async fn get_tenants(&self) -> Result<Vec<Tenant>, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(unavailable("getTenants"));
        }
        Ok(self.tenants.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pages_split_record_set() {
        let registry = FakeRegistry::new().with_records(numbered_records(250), 100);
        let mut sizes = Vec::new();
        let mut query = RecordsQuery::default();
        loop {
            let page = registry.get_records(&query).await.expect("page");
            sizes.push(page.records.len());
            match page.next_cursor() {
                Some(token) => query.page_token = Some(token.to_string()),
                None => break,
            }
        }
        assert_eq!(sizes, vec![100, 100, 50]);
        assert_eq!(registry.page_fetches(), 3);
    }
}
