//! Record sinks: where accepted purchases end up.
//!
//! The conversation layer only sees [`RecordSink`]. Which backend sits behind
//! it (a Google Sheets worksheet, a PostgreSQL table or an in-process vector) is
//! decided once at startup from the configuration.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::LedgerConfig;
use crate::purchase::PurchaseRecord;

pub mod memory;
pub mod postgres;
pub mod service_account;
pub mod sheets;
pub mod sheets_auth;

pub use memory::MemoryLedger;
pub use postgres::PgLedger;
pub use service_account::ServiceAccountKey;
pub use sheets::SheetsLedger;
pub use sheets_auth::{AccessToken, SheetsSession, TokenSource};

/// Header row of the ledger: date, product, price, notes
pub const LEDGER_HEADERS: [&str; 4] = ["التاريخ", "المنتج", "السعر", "ملاحظات"];

/// Why a sink call failed. Details are for logs, never for the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("ledger unreachable: {0}")]
    Connectivity(String),
    #[error("ledger not found: {0}")]
    StoreNotFound(String),
    #[error("not authorized to write the ledger: {0}")]
    Unauthorized(String),
    #[error("ledger rejected the request: {0}")]
    Rejected(String),
}

/// Destination of purchase records
///
/// Appends are not deduplicated: the same record appended twice is stored twice.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn append_record(&self, record: &PurchaseRecord) -> Result<(), SinkError>;

    /// Append all `records` in one request. Called at most once per batch message.
    async fn append_batch(&self, records: &[PurchaseRecord]) -> Result<(), SinkError>;

    /// The newest `limit` records, oldest first.
    async fn fetch_recent(&self, limit: usize) -> Result<Vec<PurchaseRecord>, SinkError>;
}

/// Shared handle injected into the bot handlers
pub type SharedSink = Arc<dyn RecordSink>;

/// Build the sink selected by the configuration. No network traffic happens
/// here; backends connect on first use. A configured service-account key file
/// is read and parsed up front.
pub fn build_sink(config: &LedgerConfig) -> Result<SharedSink, SinkError> {
    Ok(match config {
        LedgerConfig::Sheets(sheets) => {
            let source = match (&sheets.access_token, &sheets.credentials_file) {
                (Some(token), _) => TokenSource::Static(token.clone()),
                (None, Some(path)) => {
                    let key = ServiceAccountKey::from_file(path)?;
                    info!(account = %key.client_email, "Authenticating to Sheets with a service account");
                    TokenSource::ServiceAccount(key)
                }
                (None, None) => TokenSource::Metadata {
                    url: sheets.token_url.clone(),
                },
            };
            info!(spreadsheet = %sheets.spreadsheet_id, "Using Google Sheets ledger");
            Arc::new(SheetsLedger::new(
                &sheets.api_base,
                sheets.spreadsheet_id.clone(),
                sheets.worksheet.clone(),
                source,
            )?)
        }
        LedgerConfig::Postgres { database_url } => {
            info!("Using PostgreSQL ledger");
            Arc::new(PgLedger::connect_lazy(database_url)?)
        }
        LedgerConfig::Memory => {
            warn!("Using in-memory ledger, purchases are lost on restart");
            Arc::new(MemoryLedger::new())
        }
    })
}
