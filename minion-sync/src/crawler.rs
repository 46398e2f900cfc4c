//! Full paginated backfill of matching records.
//!
//! At most one crawl runs per engine. Progress lives in a `watch` channel so
//! the `is_crawling` check-and-set in [`CrawlEngine::start`] is atomic and any
//! number of readers can observe it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinSet;

use minion_core::{CrawlProgress, MinionConfig, RecordsQuery, RegistryGateway};

use crate::error::SyncError;
use crate::processor::{EventProcessor, Outcome, Submission};

/// Result of a crawl trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlStart {
    /// `false` when a crawl was already running and this trigger did nothing.
    pub is_new_crawler: bool,
}

pub struct CrawlEngine {
    registry: Arc<dyn RegistryGateway>,
    processor: Arc<EventProcessor>,
    aspects: Vec<String>,
    optional_aspects: Vec<String>,
    page_size: Option<u32>,
    progress: watch::Sender<CrawlProgress>,
}

impl CrawlEngine {
    pub fn new(
        registry: Arc<dyn RegistryGateway>,
        processor: Arc<EventProcessor>,
        aspects: Vec<String>,
        optional_aspects: Vec<String>,
        page_size: Option<u32>,
    ) -> Self {
        let (progress, _) = watch::channel(CrawlProgress::default());
        Self {
            registry,
            processor,
            aspects,
            optional_aspects,
            page_size,
            progress,
        }
    }

    pub fn from_config(
        config: &MinionConfig,
        registry: Arc<dyn RegistryGateway>,
        processor: Arc<EventProcessor>,
    ) -> Self {
        Self::new(
            registry,
            processor,
            config.aspects.clone(),
            config.optional_aspects.clone(),
            config.crawl_page_size,
        )
    }

    /// Launch a crawl from the initial cursor unless one is already running.
    /// Returns immediately; the crawl proceeds in a background task.
    pub fn start(self: &Arc<Self>) -> CrawlStart {
        let claimed = self.progress.send_if_modified(|progress| {
            if progress.is_crawling {
                return false;
            }
            *progress = CrawlProgress {
                crawling_page_token: None,
                is_crawling: true,
                crawled_record_number: 0,
            };
            true
        });

        if !claimed {
            tracing::info!("crawl already in progress; trigger ignored");
            return CrawlStart {
                is_new_crawler: false,
            };
        }

        tracing::info!(aspects = ?self.aspects, "starting crawl");
        tokio::spawn(self.clone().crawl());
        CrawlStart {
            is_new_crawler: true,
        }
    }

    /// Current progress snapshot.
    pub fn progress(&self) -> CrawlProgress {
        self.progress.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CrawlProgress> {
        self.progress.subscribe()
    }

    /// Resolve once no crawl is running, returning the final snapshot.
    pub async fn wait_until_idle(&self) -> CrawlProgress {
        let mut receiver = self.progress.subscribe();
        let idle = receiver
            .wait_for(|progress| !progress.is_crawling)
            .await
            .map(|progress| progress.clone());
        // The sender lives as long as `self`, so the channel cannot close here.
        idle.unwrap_or_else(|_| self.progress())
    }

    async fn crawl(self: Arc<Self>) {
        let idle = IdleOnDrop(&self.progress);
        let result = self.page_through().await;
        drop(idle);

        let progress = self.progress();
        match result {
            Ok(()) => tracing::info!(
                records = progress.crawled_record_number,
                "crawl completed"
            ),
            Err(err) => tracing::error!(
                error = %err,
                records = progress.crawled_record_number,
                "crawl aborted"
            ),
        }
    }

    /// Fetch pages strictly in sequence. Every record of a page is submitted
    /// before the next page is requested; completions are counted as they
    /// land and all outstanding work is awaited before returning.
    async fn page_through(self: &Arc<Self>) -> Result<(), SyncError> {
        let mut query = RecordsQuery {
            aspects: self.aspects.clone(),
            optional_aspects: self.optional_aspects.clone(),
            dereference: true,
            page_token: None,
            limit: self.page_size,
        };
        let mut outstanding = JoinSet::new();

        let result = loop {
            let page = match self.registry.get_records(&query).await {
                Ok(page) => page,
                Err(source) => {
                    break Err(SyncError::Crawl {
                        page_token: query.page_token.clone(),
                        source,
                    })
                }
            };
            tracing::debug!(
                page_token = ?query.page_token,
                records = page.records.len(),
                "crawled page"
            );

            for record in page.records.iter().cloned() {
                let submission = self.processor.submit(record).await;
                outstanding.spawn(self.clone().count_completion(submission));
                while outstanding.try_join_next().is_some() {}
            }

            let Some(token) = page.next_cursor().map(str::to_string) else {
                break Ok(());
            };
            self.progress
                .send_modify(|progress| progress.crawling_page_token = Some(token.clone()));
            query.page_token = Some(token);
        };

        while outstanding.join_next().await.is_some() {}
        result
    }

    async fn count_completion(self: Arc<Self>, submission: Submission) {
        let outcome = submission.outcome().await;
        if let Outcome::HandlerError { record_id, cause } = &outcome {
            tracing::warn!(record_id = %record_id, cause = %cause, "record handler failed during crawl");
        }
        self.progress
            .send_modify(|progress| progress.crawled_record_number += 1);
    }
}

/// Clears `is_crawling` when dropped, including while a crawl task unwinds.
struct IdleOnDrop<'a>(&'a watch::Sender<CrawlProgress>);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.0.send_modify(|progress| progress.is_crawling = false);
    }
}
