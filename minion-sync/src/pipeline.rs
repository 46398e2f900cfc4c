//! Startup orchestration and the shared engine handle used by the daemon.

use std::sync::Arc;

use serde::Serialize;

use minion_core::{
    CrawlProgress, EventBatch, MinionConfig, RegistryGateway, TenantGateway, TenantId,
};

use crate::aspects::AspectSynchronizer;
use crate::crawler::{CrawlEngine, CrawlStart};
use crate::error::SyncError;
use crate::processor::{EventProcessor, RecordHandler};
use crate::webhook::{build_webhook, DeliverySummary, StartupDecision, WebhookLifecycleManager};

/// Result of a successful startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartupReport {
    pub decision: StartupDecision,
    /// Tenants the aspect definitions were written to.
    pub tenants: Vec<TenantId>,
    /// Set when a backfill crawl was launched.
    pub crawl: Option<CrawlStart>,
}

/// One minion: the engine components wired to a registry and a handler.
///
/// Both delivery paths share one [`EventProcessor`], so webhook batches and
/// crawl pages contend for the same `concurrency` slots.
pub struct Minion {
    config: MinionConfig,
    processor: Arc<EventProcessor>,
    aspects: AspectSynchronizer,
    webhooks: WebhookLifecycleManager,
    crawler: Arc<CrawlEngine>,
}

impl Minion {
    /// Validates `config` before anything else; an invalid config never
    /// reaches the network.
    pub fn new(
        config: MinionConfig,
        registry: Arc<dyn RegistryGateway>,
        tenants: Arc<dyn TenantGateway>,
        handler: Arc<dyn RecordHandler>,
    ) -> Result<Self, SyncError> {
        config.validate()?;

        let processor = Arc::new(EventProcessor::new(handler, config.concurrency));
        let aspects =
            AspectSynchronizer::new(registry.clone(), tenants, config.write_aspect_defs.clone());
        let webhooks =
            WebhookLifecycleManager::new(registry.clone(), processor.clone(), build_webhook(&config));
        let crawler = Arc::new(CrawlEngine::from_config(&config, registry, processor.clone()));

        Ok(Self {
            config,
            processor,
            aspects,
            webhooks,
            crawler,
        })
    }

    /// Replicate aspect definitions, then resume or register the webhook.
    /// A fresh registration launches a backfill crawl without waiting for it.
    pub async fn start(&self) -> Result<StartupReport, SyncError> {
        tracing::info!(minion_id = %self.config.minion_id, "starting minion");

        let tenants = self.aspects.sync().await?;
        let decision = self.webhooks.startup().await?;
        let crawl = decision.needs_crawl().then(|| self.crawler.start());

        tracing::info!(
            minion_id = %self.config.minion_id,
            ?decision,
            crawling = crawl.is_some(),
            "minion started"
        );
        Ok(StartupReport {
            decision,
            tenants,
            crawl,
        })
    }

    pub async fn deliver(&self, batch: EventBatch) -> DeliverySummary {
        self.webhooks.deliver(batch).await
    }

    pub fn recrawl(&self) -> CrawlStart {
        self.crawler.start()
    }

    pub fn progress(&self) -> CrawlProgress {
        self.crawler.progress()
    }

    pub fn config(&self) -> &MinionConfig {
        &self.config
    }

    pub fn processor(&self) -> &EventProcessor {
        &self.processor
    }

    pub fn webhooks(&self) -> &WebhookLifecycleManager {
        &self.webhooks
    }

    pub fn crawler(&self) -> &Arc<CrawlEngine> {
        &self.crawler
    }
}
