//! # minion-sync
//!
//! The synchronization engine: keeps a caller-supplied [`RecordHandler`]
//! consistent with the registry through webhook deliveries and full crawls.
//!
//! - [`processor`]: bounded-concurrency handler dispatch
//! - [`crawler`]: single-flight paginated backfill with progress
//! - [`aspects`]: per-tenant aspect definition replication
//! - [`webhook`]: registration, resumption and acknowledgment
//! - [`pipeline`]: [`Minion`], the startup sequence tying them together

pub mod aspects;
pub mod crawler;
pub mod error;
pub mod pipeline;
pub mod processor;
pub mod webhook;

pub use aspects::AspectSynchronizer;
pub use crawler::{CrawlEngine, CrawlStart};
pub use error::SyncError;
pub use pipeline::{Minion, StartupReport};
pub use processor::{BoxError, EventProcessor, Outcome, RecordHandler, Submission};
pub use webhook::{
    build_webhook, DeliverySummary, StartupDecision, WebhookLifecycleManager, WebhookState,
};
