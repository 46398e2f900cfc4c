//! Domain types shared by every minion crate.
//!
//! Wire-facing structs serialize in the registry's camelCase JSON shape.
//! Aspect payloads are opaque `serde_json::Value`s at this layer.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Stable identity of a minion; also the id of its webhook.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MinionId(pub String);

impl fmt::Display for MinionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for MinionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MinionId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Unique key of a registry record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Numeric tenant partition id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TenantId(pub i64);

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<i64> for TenantId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Monotonically increasing registry event id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub i64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<i64> for EventId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Records and aspects
// ---------------------------------------------------------------------------

/// A registry record. Read-only from the minion's point of view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
    /// Aspect name → aspect payload.
    #[serde(default)]
    pub aspects: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,
}

impl Record {
    /// Bare record with no aspects; mostly useful in tests and fakes.
    pub fn new(id: impl Into<RecordId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            aspects: BTreeMap::new(),
            source_tag: None,
            tenant_id: None,
        }
    }

    pub fn with_aspect(mut self, name: impl Into<String>, payload: Value) -> Self {
        self.aspects.insert(name.into(), payload);
        self
    }
}

/// A metadata-schema definition the minion writes into the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AspectDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub json_schema: Value,
}

// ---------------------------------------------------------------------------
// Webhooks
// ---------------------------------------------------------------------------

/// Registry mutation kinds a webhook can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    CreateRecord,
    CreateAspectDefinition,
    CreateRecordAspect,
    PatchRecord,
    PatchAspectDefinition,
    PatchRecordAspect,
    DeleteRecord,
    DeleteAspectDefinition,
    DeleteRecordAspect,
    #[serde(other)]
    Unknown,
}

impl EventType {
    /// Create and patch events; what a minion subscribes to.
    pub fn mutations() -> Vec<EventType> {
        vec![
            EventType::CreateRecord,
            EventType::CreateAspectDefinition,
            EventType::CreateRecordAspect,
            EventType::PatchRecord,
            EventType::PatchAspectDefinition,
            EventType::PatchRecordAspect,
        ]
    }
}

/// Filter and payload options of a webhook subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebHookConfig {
    #[serde(default)]
    pub aspects: Vec<String>,
    #[serde(default)]
    pub optional_aspects: Vec<String>,
    #[serde(default)]
    pub include_events: bool,
    #[serde(default)]
    pub include_aspect_definitions: bool,
    #[serde(default)]
    pub dereference: bool,
    #[serde(default)]
    pub include_records: bool,
}

/// A webhook registration as stored by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebHook {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub event_types: Vec<EventType>,
    pub config: WebHookConfig,
    /// Last event id the registry considers acknowledged.
    #[serde(default, rename = "lastEvent")]
    pub last_event_id_received: Option<EventId>,
    #[serde(default)]
    pub is_waiting_for_response: Option<bool>,
    #[serde(default)]
    pub last_retry_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub is_running: Option<bool>,
    #[serde(default)]
    pub is_processing: Option<bool>,
}

/// Body of `POST /hooks/{id}/ack`. `last_event_id_received` is sent as an
/// explicit `null` for the resume acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebHookAcknowledgement {
    pub succeeded: bool,
    pub last_event_id_received: Option<EventId>,
}

impl WebHookAcknowledgement {
    /// The no-op acknowledgment that asks the registry to redeliver.
    pub fn resume() -> Self {
        Self {
            succeeded: false,
            last_event_id_received: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebHookAcknowledgementResponse {
    #[serde(default)]
    pub last_event_id_received: Option<EventId>,
}

// ---------------------------------------------------------------------------
// Paging
// ---------------------------------------------------------------------------

/// Parameters of one `getRecords` page request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordsQuery {
    pub aspects: Vec<String>,
    pub optional_aspects: Vec<String>,
    pub dereference: bool,
    pub page_token: Option<String>,
    pub limit: Option<u32>,
}

/// One page of records.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsPage {
    #[serde(default)]
    pub records: Vec<Record>,
    #[serde(default)]
    pub has_more: Option<bool>,
    #[serde(default, deserialize_with = "page_token_from_string_or_number")]
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub total_count: Option<u64>,
}

impl RecordsPage {
    /// Cursor for the following page, or `None` when this is the last page.
    ///
    /// An explicit `hasMore: false` ends paging even if a token is present;
    /// without `hasMore` the presence of a token decides.
    pub fn next_cursor(&self) -> Option<&str> {
        let token = self.next_page_token.as_deref()?;
        match self.has_more {
            Some(false) => None,
            _ => Some(token),
        }
    }
}

fn page_token_from_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Token {
        Text(String),
        Number(i64),
    }

    Ok(Option::<Token>::deserialize(deserializer)?.map(|token| match token {
        Token::Text(text) => text,
        Token::Number(n) => n.to_string(),
    }))
}

// ---------------------------------------------------------------------------
// Delivery batches
// ---------------------------------------------------------------------------

/// A single registry mutation event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEvent {
    pub id: EventId,
    pub event_type: EventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,
    #[serde(default)]
    pub data: Value,
}

/// Inbound webhook delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBatch {
    #[serde(default)]
    pub action: String,
    pub last_event_id: EventId,
    #[serde(default)]
    pub events: Vec<RegistryEvent>,
    #[serde(default)]
    pub records: Vec<Record>,
}

impl EventBatch {
    /// Records of the batch in delivery order, first occurrence of each id only.
    pub fn unique_records(&self) -> Vec<Record> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .filter(|record| seen.insert(record.id.clone()))
            .cloned()
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tenants and progress
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: TenantId,
    #[serde(default, rename = "domainname")]
    pub domain_name: String,
    #[serde(default)]
    pub enabled: bool,
}

/// Snapshot of the crawl state, as reported by the progress endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlProgress {
    /// Cursor of the page being crawled; `None` is the initial cursor.
    pub crawling_page_token: Option<String>,
    pub is_crawling: bool,
    /// Records whose handler invocation has completed in the current crawl.
    pub crawled_record_number: u64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
