//! Webhook registration, resumption and delivery acknowledgment.
//!
//! State transitions:
//!
//! ```text
//! Unregistered -> Registering -> Idle      (hook absent; caller backfills)
//! Unregistered -> Resuming    -> Idle      (hook present; registry redelivers)
//! Idle -> Acknowledging -> Idle | Failed   (per delivery batch)
//! Failed -> Acknowledging                  (next batch retries the cycle)
//! ```
//!
//! Failures while registering or resuming are returned to the caller and are
//! fatal at startup. A failed acknowledgment only moves the manager to
//! `Failed`; the registry redelivers unacknowledged batches.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};

use minion_core::{
    EventBatch, EventId, EventType, MinionConfig, RecordId, RegistryGateway, WebHook,
    WebHookAcknowledgement, WebHookConfig,
};

use crate::error::SyncError;
use crate::processor::{EventProcessor, Outcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebhookState {
    Unregistered,
    Registering,
    Resuming,
    Idle,
    Acknowledging,
    Failed,
}

/// How startup found the webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartupDecision {
    /// No hook existed; one was created and a backfill crawl is needed.
    Registered,
    /// The hook existed; a resume acknowledgment was sent.
    Resumed,
}

impl StartupDecision {
    pub fn needs_crawl(self) -> bool {
        matches!(self, StartupDecision::Registered)
    }
}

/// What happened to one delivery batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliverySummary {
    pub last_event_id: EventId,
    pub records: usize,
    pub failed_records: Vec<RecordId>,
    /// Value sent as `succeeded` in the acknowledgment.
    pub succeeded: bool,
    /// Whether the registry accepted the acknowledgment.
    pub acknowledged: bool,
}

/// The webhook descriptor registered for a minion.
pub fn build_webhook(config: &MinionConfig) -> WebHook {
    WebHook {
        id: config.minion_id.clone(),
        name: config.minion_id.clone(),
        url: config.hook_url(),
        active: true,
        enabled: true,
        event_types: EventType::mutations(),
        config: WebHookConfig {
            aspects: config.aspects.clone(),
            optional_aspects: config.optional_aspects.clone(),
            include_events: false,
            include_aspect_definitions: false,
            dereference: true,
            include_records: true,
        },
        last_event_id_received: None,
        is_waiting_for_response: Some(false),
        last_retry_time: None,
        retry_count: 0,
        is_running: None,
        is_processing: None,
    }
}

pub struct WebhookLifecycleManager {
    registry: Arc<dyn RegistryGateway>,
    processor: Arc<EventProcessor>,
    descriptor: WebHook,
    state: watch::Sender<WebhookState>,
    /// Held for a whole delivery cycle so acknowledgments leave in the order
    /// batches arrived.
    cycle: Mutex<()>,
}

impl WebhookLifecycleManager {
    pub fn new(
        registry: Arc<dyn RegistryGateway>,
        processor: Arc<EventProcessor>,
        descriptor: WebHook,
    ) -> Self {
        let (state, _) = watch::channel(WebhookState::Unregistered);
        Self {
            registry,
            processor,
            descriptor,
            state,
            cycle: Mutex::new(()),
        }
    }

    pub fn webhook_id(&self) -> &str {
        &self.descriptor.id
    }

    pub fn descriptor(&self) -> &WebHook {
        &self.descriptor
    }

    pub fn state(&self) -> WebhookState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<WebhookState> {
        self.state.subscribe()
    }

    fn transition(&self, next: WebhookState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            tracing::debug!(webhook_id = %self.descriptor.id, ?previous, ?next, "webhook state");
        }
    }

    /// Resume the existing webhook or register a new one.
    pub async fn startup(&self) -> Result<StartupDecision, SyncError> {
        let id = self.descriptor.id.as_str();
        let existing = self
            .registry
            .get_webhook(id)
            .await
            .map_err(|source| self.fail_startup(SyncError::Registration {
                webhook: id.to_string(),
                source,
            }))?;

        match existing {
            Some(hook) => {
                self.transition(WebhookState::Resuming);
                tracing::info!(
                    webhook_id = id,
                    last_event = ?hook.last_event_id_received,
                    "webhook exists; resuming"
                );
                self.registry
                    .ack_webhook(id, &WebHookAcknowledgement::resume())
                    .await
                    .map_err(|source| self.fail_startup(SyncError::Resume {
                        webhook: id.to_string(),
                        source,
                    }))?;
                self.transition(WebhookState::Idle);
                Ok(StartupDecision::Resumed)
            }
            None => {
                self.transition(WebhookState::Registering);
                tracing::info!(webhook_id = id, url = %self.descriptor.url, "registering webhook");
                self.registry
                    .put_webhook(&self.descriptor)
                    .await
                    .map_err(|source| self.fail_startup(SyncError::Registration {
                        webhook: id.to_string(),
                        source,
                    }))?;
                self.transition(WebhookState::Idle);
                Ok(StartupDecision::Registered)
            }
        }
    }

    fn fail_startup(&self, err: SyncError) -> SyncError {
        self.transition(WebhookState::Failed);
        err
    }

    /// Process every record of `batch`, then acknowledge up to its last event.
    ///
    /// Cycles never overlap: a batch arriving mid-cycle waits for the previous
    /// acknowledgment to be sent.
    pub async fn deliver(&self, batch: EventBatch) -> DeliverySummary {
        let _cycle = self.cycle.lock().await;
        self.transition(WebhookState::Acknowledging);

        let records = batch.unique_records();
        let count = records.len();
        let outcomes = self.processor.process_all(records).await;
        let failed_records: Vec<RecordId> = outcomes
            .into_iter()
            .filter_map(|outcome| match outcome {
                Outcome::Success { .. } => None,
                Outcome::HandlerError { record_id, cause } => {
                    tracing::warn!(record_id = %record_id, cause = %cause, "record handler failed");
                    Some(record_id)
                }
            })
            .collect();

        let ack = WebHookAcknowledgement {
            succeeded: failed_records.is_empty(),
            last_event_id_received: Some(batch.last_event_id),
        };
        let acknowledged = match self.registry.ack_webhook(&self.descriptor.id, &ack).await {
            Ok(_) => {
                self.transition(WebhookState::Idle);
                true
            }
            Err(source) => {
                let err = SyncError::Acknowledge {
                    webhook: self.descriptor.id.clone(),
                    last_event_id: batch.last_event_id.0,
                    source,
                };
                tracing::error!(error = %err, "acknowledgment failed; awaiting redelivery");
                self.transition(WebhookState::Failed);
                false
            }
        };

        tracing::info!(
            webhook_id = %self.descriptor.id,
            last_event_id = batch.last_event_id.0,
            records = count,
            failed = failed_records.len(),
            acknowledged,
            "delivery processed"
        );

        DeliverySummary {
            last_event_id: batch.last_event_id,
            records: count,
            succeeded: ack.succeeded,
            failed_records,
            acknowledged,
        }
    }
}
