//! Bounded-concurrency dispatcher for the record handler.
//!
//! Every submission runs the handler in its own task while holding one of
//! `concurrency` slots. Submissions past the cap wait for a slot in FIFO
//! order. Handler errors and panics are captured as
//! [`Outcome::HandlerError`]; nothing escapes to the caller.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use minion_core::{Record, RecordId};

/// Error type handlers report failures with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// What a minion does with a record.
///
/// Implementations must be idempotent: a record can be handled more than
/// once, because a crawl and a webhook delivery may both carry it and a
/// batch acknowledged with `succeeded: false` is redelivered in full.
#[async_trait]
pub trait RecordHandler: Send + Sync + 'static {
    async fn handle(&self, record: Record) -> Result<(), BoxError>;
}

/// Result of one handler invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum Outcome {
    Success { record_id: RecordId },
    HandlerError { record_id: RecordId, cause: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn record_id(&self) -> &RecordId {
        match self {
            Outcome::Success { record_id } | Outcome::HandlerError { record_id, .. } => record_id,
        }
    }
}

/// A handler invocation that has been given a slot and is running.
pub struct Submission {
    record_id: RecordId,
    handle: JoinHandle<Result<(), BoxError>>,
}

impl Submission {
    pub fn record_id(&self) -> &RecordId {
        &self.record_id
    }

    /// Wait for the handler to finish.
    pub async fn outcome(self) -> Outcome {
        let record_id = self.record_id;
        match self.handle.await {
            Ok(Ok(())) => Outcome::Success { record_id },
            Ok(Err(err)) => Outcome::HandlerError {
                record_id,
                cause: err.to_string(),
            },
            Err(join) if join.is_panic() => Outcome::HandlerError {
                record_id,
                cause: "record handler panicked".to_string(),
            },
            Err(join) => Outcome::HandlerError {
                record_id,
                cause: format!("record handler task did not complete: {join}"),
            },
        }
    }
}

/// Decrements the in-flight gauge even if the handler panics.
struct InFlightGuard(Arc<AtomicUsize>);

impl InFlightGuard {
    fn enter(gauge: Arc<AtomicUsize>) -> Self {
        gauge.fetch_add(1, Ordering::SeqCst);
        Self(gauge)
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct EventProcessor {
    handler: Arc<dyn RecordHandler>,
    /// `None` when concurrency is unbounded.
    slots: Option<Arc<Semaphore>>,
    concurrency: usize,
    in_flight: Arc<AtomicUsize>,
    completed: Arc<AtomicU64>,
}

impl EventProcessor {
    /// `concurrency = 0` means unbounded.
    pub fn new(handler: Arc<dyn RecordHandler>, concurrency: usize) -> Self {
        let slots = (concurrency > 0).then(|| Arc::new(Semaphore::new(concurrency)));
        Self {
            handler,
            slots,
            concurrency,
            in_flight: Arc::new(AtomicUsize::new(0)),
            completed: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Handler invocations currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Handler invocations finished since construction, successful or not.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    /// Wait for a free slot, then start the handler for `record`.
    pub async fn submit(&self, record: Record) -> Submission {
        let permit = match &self.slots {
            // Acquisition only fails on a closed semaphore; this one never closes.
            Some(slots) => slots.clone().acquire_owned().await.ok(),
            None => None,
        };

        let record_id = record.id.clone();
        let handler = self.handler.clone();
        let in_flight = self.in_flight.clone();
        let completed = self.completed.clone();

        let handle = tokio::spawn(async move {
            let _permit = permit;
            let _guard = InFlightGuard::enter(in_flight);
            let result = handler.handle(record).await;
            completed.fetch_add(1, Ordering::SeqCst);
            result
        });

        Submission { record_id, handle }
    }

    /// Submit and wait for the outcome of a single record.
    pub async fn process(&self, record: Record) -> Outcome {
        self.submit(record).await.outcome().await
    }

    /// Submit every record in order and wait for all outcomes.
    /// Outcomes are returned in submission order.
    pub async fn process_all(&self, records: Vec<Record>) -> Vec<Outcome> {
        let mut submissions = Vec::with_capacity(records.len());
        for record in records {
            submissions.push(self.submit(record).await);
        }
        join_all(submissions.into_iter().map(Submission::outcome)).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use minion_core::testing::numbered_records;
    use tokio::sync::Barrier;

    use super::*;

    /// Sleeps briefly and tracks the peak number of concurrent invocations.
    #[derive(Default)]
    struct PeakTracker {
        current: AtomicUsize,
        peak: AtomicUsize,
        started: Mutex<Vec<RecordId>>,
    }

    #[async_trait]
    impl RecordHandler for PeakTracker {
        async fn handle(&self, record: Record) -> Result<(), BoxError> {
            self.started
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(record.id.clone());
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailOdd;

    #[async_trait]
    impl RecordHandler for FailOdd {
        async fn handle(&self, record: Record) -> Result<(), BoxError> {
            let index: usize = record.id.0.trim_start_matches("record-").parse()?;
            if index % 2 == 1 {
                return Err(format!("cannot index {}", record.id).into());
            }
            Ok(())
        }
    }

    struct Panics;

    #[async_trait]
    impl RecordHandler for Panics {
        async fn handle(&self, _record: Record) -> Result<(), BoxError> {
            panic!("handler bug");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn never_exceeds_concurrency_cap() {
        let tracker = Arc::new(PeakTracker::default());
        let processor = EventProcessor::new(tracker.clone(), 3);

        let outcomes = processor.process_all(numbered_records(30)).await;

        assert_eq!(outcomes.len(), 30);
        assert!(outcomes.iter().all(Outcome::is_success));
        assert!(tracker.peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(processor.completed(), 30);
        assert_eq!(processor.in_flight(), 0);
    }

    #[tokio::test]
    async fn single_slot_starts_handlers_in_submission_order() {
        let tracker = Arc::new(PeakTracker::default());
        let processor = EventProcessor::new(tracker.clone(), 1);

        processor.process_all(numbered_records(8)).await;

        let started = tracker
            .started
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        let expected: Vec<RecordId> = numbered_records(8).into_iter().map(|r| r.id).collect();
        assert_eq!(started, expected);
        assert_eq!(tracker.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn zero_concurrency_is_unbounded() {
        struct WaitForAll(Barrier);

        #[async_trait]
        impl RecordHandler for WaitForAll {
            async fn handle(&self, _record: Record) -> Result<(), BoxError> {
                self.0.wait().await;
                Ok(())
            }
        }

        // Every handler blocks until all ten are running at once.
        let processor = EventProcessor::new(Arc::new(WaitForAll(Barrier::new(10))), 0);
        let outcomes = tokio::time::timeout(
            Duration::from_secs(5),
            processor.process_all(numbered_records(10)),
        )
        .await
        .expect("all handlers ran concurrently");
        assert!(outcomes.iter().all(Outcome::is_success));
    }

    #[tokio::test]
    async fn handler_errors_are_captured_per_record() {
        let processor = EventProcessor::new(Arc::new(FailOdd), 2);
        let outcomes = processor.process_all(numbered_records(4)).await;

        let failed: Vec<_> = outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| o.record_id().0.clone())
            .collect();
        assert_eq!(failed, vec!["record-1", "record-3"]);
        match &outcomes[1] {
            Outcome::HandlerError { cause, .. } => assert!(cause.contains("cannot index")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn handler_panic_becomes_an_outcome() {
        let processor = EventProcessor::new(Arc::new(Panics), 1);
        let outcome = processor.process(Record::new("boom", "Boom")).await;

        assert_eq!(
            outcome,
            Outcome::HandlerError {
                record_id: RecordId::from("boom"),
                cause: "record handler panicked".to_string(),
            }
        );
        assert_eq!(processor.in_flight(), 0, "guard released on panic");
    }
}
