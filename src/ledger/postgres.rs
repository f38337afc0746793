//! PostgreSQL ledger: one row per purchase in the `purchases` table.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::{RecordSink, SinkError};
use crate::purchase::PurchaseRecord;

const MAX_CONNECTIONS: u32 = 5;

/// SQLSTATE for "undefined_table"
const UNDEFINED_TABLE: &str = "42P01";

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS purchases (
    id BIGSERIAL PRIMARY KEY,
    purchased_on DATE NOT NULL,
    product TEXT NOT NULL,
    price NUMERIC NOT NULL,
    notes TEXT NOT NULL DEFAULT '',
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)";

const INSERT_PURCHASE: &str =
    "INSERT INTO purchases (purchased_on, product, price, notes) VALUES ($1, $2, $3, $4)";

const SELECT_RECENT: &str =
    "SELECT purchased_on, product, price, notes FROM purchases ORDER BY id DESC LIMIT $1";

pub struct PgLedger {
    pool: PgPool,
    schema: OnceCell<()>,
}

impl PgLedger {
    /// Create a ledger over a lazily connecting pool. No connection is made
    /// until the first sink call.
    pub fn connect_lazy(database_url: &str) -> Result<Self, SinkError> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_lazy(database_url)
            .map_err(map_sqlx_error)?;
        Ok(Self::with_pool(pool))
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self {
            pool,
            schema: OnceCell::new(),
        }
    }

    /// Create the `purchases` table if it does not exist yet, once per process.
    pub async fn ensure_schema(&self) -> Result<(), SinkError> {
        self.schema
            .get_or_try_init(|| async {
                info!("Ensuring purchases table exists");
                sqlx::query(CREATE_TABLE)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;
                Ok::<(), SinkError>(())
            })
            .await
            .map(|_| ())
    }
}

fn map_sqlx_error(error: sqlx::Error) -> SinkError {
    match &error {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNDEFINED_TABLE) => {
            SinkError::StoreNotFound(error.to_string())
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => SinkError::Connectivity(error.to_string()),
        _ => SinkError::Rejected(error.to_string()),
    }
}

fn decode_row(row: &PgRow) -> Result<PurchaseRecord, String> {
    let date: NaiveDate = row.try_get("purchased_on").map_err(|e| e.to_string())?;
    let product: String = row.try_get("product").map_err(|e| e.to_string())?;
    let price: Decimal = row.try_get("price").map_err(|e| e.to_string())?;
    let notes: String = row.try_get("notes").map_err(|e| e.to_string())?;
    PurchaseRecord::new(date, product, price, notes).map_err(|e| e.to_string())
}

#[async_trait]
impl RecordSink for PgLedger {
    async fn append_record(&self, record: &PurchaseRecord) -> Result<(), SinkError> {
        self.ensure_schema().await?;
        debug!(product = %record.product(), price = %record.price(), "Inserting purchase");

        sqlx::query(INSERT_PURCHASE)
            .bind(record.date())
            .bind(record.product())
            .bind(record.price())
            .bind(record.notes())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn append_batch(&self, records: &[PurchaseRecord]) -> Result<(), SinkError> {
        if records.is_empty() {
            return Ok(());
        }
        self.ensure_schema().await?;
        debug!(count = records.len(), "Inserting purchase batch");

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        for record in records {
            sqlx::query(INSERT_PURCHASE)
                .bind(record.date())
                .bind(record.product())
                .bind(record.price())
                .bind(record.notes())
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }
        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn fetch_recent(&self, limit: usize) -> Result<Vec<PurchaseRecord>, SinkError> {
        self.ensure_schema().await?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let rows = sqlx::query(SELECT_RECENT)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let mut records: Vec<PurchaseRecord> = rows
            .iter()
            .filter_map(|row| match decode_row(row) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, "Skipping malformed purchase row");
                    None
                }
            })
            .collect();
        records.reverse();
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_are_connectivity() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolTimedOut),
            SinkError::Connectivity(_)
        ));
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolClosed),
            SinkError::Connectivity(_)
        ));
    }

    #[test]
    fn test_other_errors_are_rejected() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound),
            SinkError::Rejected(_)
        ));
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected_early() {
        assert!(PgLedger::connect_lazy("not a url").is_err());
    }
}
