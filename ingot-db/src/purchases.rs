//! Append-only purchase ledger.
//!
//! Every debit goes through [`PurchaseRepository::record`], which updates the
//! member balance and writes the ledger row in one transaction so that
//! `balance_after` always equals the balance immediately after the insert.
//! Ledger rows are never mutated; they are deleted only by a full reset of
//! their owner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::members::from_timestamp;

/// Purchase kinds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseKind {
    Boost,
    Tip,
}

impl std::fmt::Display for PurchaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PurchaseKind::Boost => write!(f, "boost"),
            PurchaseKind::Tip => write!(f, "tip"),
        }
    }
}

impl std::str::FromStr for PurchaseKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "boost" => Ok(PurchaseKind::Boost),
            "tip" => Ok(PurchaseKind::Tip),
            _ => Err(format!("Unknown purchase kind: {}", s)),
        }
    }
}

/// Ledger record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Purchase {
    pub id: i64,
    pub discord_id: String,
    pub kind: PurchaseKind,
    pub details: String,
    pub gold_cost: i64,
    pub balance_after: i64,
    pub created_at: DateTime<Utc>,
}

/// Aggregate stats for one buyer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseStats {
    pub purchase_count: i64,
    pub last_purchase_at: Option<DateTime<Utc>>,
}

const DEFAULT_HISTORY_LIMIT: i64 = 10;
const MAX_HISTORY_LIMIT: i64 = 50;

/// Purchase repository for database operations
pub struct PurchaseRepository;

impl PurchaseRepository {
    /// Record a purchase: debit the member and append the ledger row
    ///
    /// Runs in a transaction. Fails with [`DbError::InsufficientBalance`] if
    /// the debit would take the balance below zero, and
    /// [`DbError::MemberNotFound`] if the buyer has no member row.
    pub async fn record(
        pool: &SqlitePool,
        discord_id: &str,
        kind: PurchaseKind,
        details: &str,
        gold_cost: i64,
    ) -> DbResult<Purchase> {
        let now = Utc::now().timestamp();
        let mut tx = pool.begin().await?;

        let balance: Option<(i64,)> =
            sqlx::query_as("SELECT balance_gold FROM members WHERE discord_id = ?")
                .bind(discord_id)
                .fetch_optional(&mut *tx)
                .await?;

        let balance = balance
            .map(|(b,)| b)
            .ok_or_else(|| DbError::MemberNotFound(discord_id.to_string()))?;

        if balance < gold_cost {
            return Err(DbError::InsufficientBalance {
                have: balance,
                need: gold_cost,
            });
        }

        let balance_after = balance - gold_cost;

        sqlx::query(
            r#"
            UPDATE members
            SET balance_gold = ?, updated_at = ?
            WHERE discord_id = ?
            "#,
        )
        .bind(balance_after)
        .bind(now)
        .bind(discord_id)
        .execute(&mut *tx)
        .await?;

        let kind_str = kind.to_string();
        let result = sqlx::query(
            r#"
            INSERT INTO purchases (discord_id, kind, details, gold_cost, balance_after, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(discord_id)
        .bind(&kind_str)
        .bind(details)
        .bind(gold_cost)
        .bind(balance_after)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            "Recorded {} purchase for {}: -{} (balance {})",
            kind, discord_id, gold_cost, balance_after
        );

        Ok(Purchase {
            id: result.last_insert_rowid(),
            discord_id: discord_id.to_string(),
            kind,
            details: details.to_string(),
            gold_cost,
            balance_after,
            created_at: from_timestamp(now),
        })
    }

    /// Latest purchases for one buyer, newest first
    ///
    /// The limit is clamped to 1..=50; `None` means the default of 10.
    pub async fn history(
        pool: &SqlitePool,
        discord_id: &str,
        limit: Option<i64>,
    ) -> DbResult<Vec<Purchase>> {
        let limit = limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT);

        let rows = sqlx::query_as::<_, PurchaseRow>(
            r#"
            SELECT id, discord_id, kind, details, gold_cost, balance_after, created_at
            FROM purchases
            WHERE discord_id = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(discord_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    /// Lifetime gold spend for one buyer (drives the tier)
    pub async fn total_spent(pool: &SqlitePool, discord_id: &str) -> DbResult<i64> {
        let (total,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(gold_cost), 0) FROM purchases WHERE discord_id = ?",
        )
        .bind(discord_id)
        .fetch_one(pool)
        .await?;
        Ok(total)
    }

    /// Purchase count and last purchase time for one buyer
    pub async fn stats(pool: &SqlitePool, discord_id: &str) -> DbResult<PurchaseStats> {
        let (count, last): (i64, Option<i64>) = sqlx::query_as(
            "SELECT COUNT(*), MAX(created_at) FROM purchases WHERE discord_id = ?",
        )
        .bind(discord_id)
        .fetch_one(pool)
        .await?;

        Ok(PurchaseStats {
            purchase_count: count,
            last_purchase_at: last.map(from_timestamp),
        })
    }

    /// Delete a buyer's full history (full reset only); returns the count
    pub async fn delete_for_member(pool: &SqlitePool, discord_id: &str) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM purchases WHERE discord_id = ?")
            .bind(discord_id)
            .execute(pool)
            .await?;

        let count = result.rows_affected();
        if count > 0 {
            info!("Deleted {} purchases for {}", count, discord_id);
        }
        Ok(count)
    }

    /// Total ledger rows
    pub async fn count(pool: &SqlitePool) -> DbResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM purchases")
            .fetch_one(pool)
            .await?;
        Ok(count)
    }

    /// Most recent purchases across all buyers (dashboard)
    pub async fn recent(pool: &SqlitePool, limit: i64) -> DbResult<Vec<Purchase>> {
        let rows = sqlx::query_as::<_, PurchaseRow>(
            r#"
            SELECT id, discord_id, kind, details, gold_cost, balance_after, created_at
            FROM purchases
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }
}

/// Internal row type for SQLx mapping
#[derive(sqlx::FromRow)]
struct PurchaseRow {
    id: i64,
    discord_id: String,
    kind: String,
    details: String,
    gold_cost: i64,
    balance_after: i64,
    created_at: i64,
}

impl From<PurchaseRow> for Purchase {
    fn from(row: PurchaseRow) -> Self {
        Purchase {
            id: row.id,
            discord_id: row.discord_id,
            kind: row.kind.parse().unwrap_or(PurchaseKind::Boost),
            details: row.details,
            gold_cost: row.gold_cost,
            balance_after: row.balance_after,
            created_at: from_timestamp(row.created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::members::MemberRepository;
    use crate::test_helpers::create_test_pool;

    #[tokio::test]
    async fn test_record_debits_and_snapshots() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        MemberRepository::create(pool, "1001", 10_000_000).await.unwrap();

        let purchase =
            PurchaseRepository::record(pool, "1001", PurchaseKind::Boost, "8 x +12", 4_000_000)
                .await
                .unwrap();

        assert_eq!(purchase.gold_cost, 4_000_000);
        assert_eq!(purchase.balance_after, 6_000_000);

        let member = MemberRepository::get(pool, "1001").await.unwrap().unwrap();
        assert_eq!(member.balance_gold, purchase.balance_after);
    }

    #[tokio::test]
    async fn test_record_insufficient_balance() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        MemberRepository::create(pool, "1001", 100).await.unwrap();

        let result =
            PurchaseRepository::record(pool, "1001", PurchaseKind::Tip, "Tip", 200).await;
        assert!(matches!(
            result,
            Err(DbError::InsufficientBalance { have: 100, need: 200 })
        ));

        // Balance untouched, no ledger row written
        let member = MemberRepository::get(pool, "1001").await.unwrap().unwrap();
        assert_eq!(member.balance_gold, 100);
        assert_eq!(PurchaseRepository::count(pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_record_unknown_member() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        let result =
            PurchaseRepository::record(pool, "nobody", PurchaseKind::Boost, "x", 1).await;
        assert!(matches!(result, Err(DbError::MemberNotFound(_))));
    }

    #[tokio::test]
    async fn test_history_order_and_clamp() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        MemberRepository::create(pool, "1001", 1_000).await.unwrap();
        for i in 0..5 {
            PurchaseRepository::record(
                pool,
                "1001",
                PurchaseKind::Boost,
                &format!("order {}", i),
                100,
            )
            .await
            .unwrap();
        }

        let history = PurchaseRepository::history(pool, "1001", None).await.unwrap();
        assert_eq!(history.len(), 5);
        assert_eq!(history[0].details, "order 4"); // newest first

        let clamped = PurchaseRepository::history(pool, "1001", Some(0)).await.unwrap();
        assert_eq!(clamped.len(), 1);

        let capped = PurchaseRepository::history(pool, "1001", Some(500)).await.unwrap();
        assert_eq!(capped.len(), 5);
    }

    #[tokio::test]
    async fn test_total_spent_and_stats() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        MemberRepository::create(pool, "1001", 10_000).await.unwrap();
        assert_eq!(PurchaseRepository::total_spent(pool, "1001").await.unwrap(), 0);

        let empty = PurchaseRepository::stats(pool, "1001").await.unwrap();
        assert_eq!(empty.purchase_count, 0);
        assert!(empty.last_purchase_at.is_none());

        PurchaseRepository::record(pool, "1001", PurchaseKind::Boost, "a", 3_000)
            .await
            .unwrap();
        PurchaseRepository::record(pool, "1001", PurchaseKind::Tip, "Tip", 2_000)
            .await
            .unwrap();

        assert_eq!(PurchaseRepository::total_spent(pool, "1001").await.unwrap(), 5_000);

        let stats = PurchaseRepository::stats(pool, "1001").await.unwrap();
        assert_eq!(stats.purchase_count, 2);
        assert!(stats.last_purchase_at.is_some());
    }

    #[tokio::test]
    async fn test_delete_for_member() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        MemberRepository::create(pool, "1001", 1_000).await.unwrap();
        PurchaseRepository::record(pool, "1001", PurchaseKind::Boost, "a", 500)
            .await
            .unwrap();

        assert_eq!(PurchaseRepository::delete_for_member(pool, "1001").await.unwrap(), 1);
        assert_eq!(PurchaseRepository::count(pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_kind_roundtrip() {
        assert_eq!("boost".parse::<PurchaseKind>().unwrap(), PurchaseKind::Boost);
        assert_eq!("TIP".parse::<PurchaseKind>().unwrap(), PurchaseKind::Tip);
        assert!("gold".parse::<PurchaseKind>().is_err());
        assert_eq!(PurchaseKind::Boost.to_string(), "boost");
    }
}
