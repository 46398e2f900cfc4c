use async_trait::async_trait;

use minion_core::Record;
use minion_sync::{BoxError, RecordHandler};

/// Reference handler: logs each record and its aspect names.
/// Stateless, so handling a record twice is harmless.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingHandler;

#[async_trait]
impl RecordHandler for LoggingHandler {
    async fn handle(&self, record: Record) -> Result<(), BoxError> {
        let aspects: Vec<&str> = record.aspects.keys().map(String::as_str).collect();
        tracing::info!(record_id = %record.id, name = %record.name, ?aspects, "record received");
        Ok(())
    }
}
