use anyhow::{Context, Result};
use chrono::NaiveDate;
use purchases::ledger::{PgLedger, RecordSink, SinkError};
use purchases::purchase::PurchaseRecord;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::env;

/// Helper macro to skip tests when database is not available
macro_rules! skip_if_no_db {
    ($test_fn:expr) => {
        match setup_test_db().await {
            Ok(pool) => $test_fn(pool).await,
            Err(_) => {
                eprintln!("Skipping test: Database not available");
                Ok(())
            }
        }
    };
}

async fn setup_test_db() -> Result<PgPool> {
    // Skip tests if no DATABASE_URL is provided
    let database_url = match env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping database tests: DATABASE_URL not set");
            return Err(anyhow::anyhow!("Test database not configured"));
        }
    };

    let pool = PgPool::connect(&database_url)
        .await
        .context("Failed to connect to test database")?;

    // Clean up any existing test data
    sqlx::query("DROP TABLE IF EXISTS purchases CASCADE")
        .execute(&pool)
        .await?;

    Ok(pool)
}

fn record(product: &str, price: Decimal, notes: &str) -> PurchaseRecord {
    let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    PurchaseRecord::new(day, product, price, notes).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Tests share one database, run them as a single sequence.
    #[tokio::test]
    async fn test_pg_ledger() -> Result<()> {
        skip_if_no_db!(test_pg_ledger_impl)
    }

    async fn test_pg_ledger_impl(pool: PgPool) -> Result<()> {
        let ledger = PgLedger::with_pool(pool.clone());

        // Table is created on first use
        assert!(ledger.fetch_recent(5).await?.is_empty());

        let cola = record("كولا", Decimal::new(23, 0), "");
        ledger.append_record(&cola).await?;
        ledger.append_record(&cola).await?;
        ledger
            .append_batch(&[
                record("شيبس", Decimal::new(195, 1), ""),
                record("قهوة", Decimal::new(265, 1), "بدون سكر"),
            ])
            .await?;

        let all = ledger.fetch_recent(50).await?;
        assert_eq!(all.len(), 4);
        assert_eq!(all[0], cola);
        assert_eq!(all[1], cola);

        let recent = ledger.fetch_recent(2).await?;
        assert_eq!(recent[0].product(), "شيبس");
        assert_eq!(recent[1].notes(), "بدون سكر");
        assert_eq!(recent[1].price(), Decimal::new(265, 1));

        // Rows that no longer form a valid purchase are skipped
        sqlx::query("INSERT INTO purchases (purchased_on, product, price) VALUES ($1, '', 3)")
            .bind(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap())
            .execute(&pool)
            .await?;
        assert_eq!(ledger.fetch_recent(50).await?.len(), 4);

        // A table dropped behind the ledger's back is reported, not recreated
        sqlx::query("DROP TABLE purchases").execute(&pool).await?;
        assert!(matches!(
            ledger.append_record(&cola).await,
            Err(SinkError::StoreNotFound(_))
        ));

        Ok(())
    }
}
