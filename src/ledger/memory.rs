use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::{RecordSink, SinkError};
use crate::purchase::PurchaseRecord;

/// Ledger kept in process memory, lost on restart
#[derive(Debug, Default)]
pub struct MemoryLedger {
    rows: Mutex<Vec<PurchaseRecord>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every stored row in insertion order
    pub async fn snapshot(&self) -> Vec<PurchaseRecord> {
        self.rows.lock().await.clone()
    }
}

#[async_trait]
impl RecordSink for MemoryLedger {
    async fn append_record(&self, record: &PurchaseRecord) -> Result<(), SinkError> {
        let mut rows = self.rows.lock().await;
        rows.push(record.clone());
        debug!(rows = rows.len(), "Appended record to memory ledger");
        Ok(())
    }

    async fn append_batch(&self, records: &[PurchaseRecord]) -> Result<(), SinkError> {
        let mut rows = self.rows.lock().await;
        rows.extend_from_slice(records);
        debug!(added = records.len(), rows = rows.len(), "Appended batch to memory ledger");
        Ok(())
    }

    async fn fetch_recent(&self, limit: usize) -> Result<Vec<PurchaseRecord>, SinkError> {
        let rows = self.rows.lock().await;
        let start = rows.len().saturating_sub(limit);
        Ok(rows[start..].to_vec())
    }
}
