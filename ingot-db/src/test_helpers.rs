//! Test helpers for the ledger database.

use crate::{
    error::{DbError, DbResult},
    ledger_db::{LedgerDbPool, create_in_memory_pool},
};

/// Create an in-memory ledger database for testing
pub async fn create_test_pool() -> DbResult<LedgerDbPool> {
    let pool = create_in_memory_pool(1).await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| DbError::Migration(e.to_string()))?;

    Ok(LedgerDbPool::from_pool(pool))
}
