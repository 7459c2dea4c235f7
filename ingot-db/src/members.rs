//! Member balance operations.
//!
//! One row per buyer, created on the first admin-issued grant and deleted
//! only by a full reset. The balance is the source of truth; the purchase
//! ledger only snapshots it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{DbError, DbResult};

/// Member balance record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub discord_id: String,
    pub balance_gold: i64,
    pub updated_at: DateTime<Utc>,
}

/// Convert SQLite timestamp (seconds since epoch) to DateTime<Utc>
pub(crate) fn from_timestamp(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_else(Utc::now)
}

/// Member repository for database operations
pub struct MemberRepository;

impl MemberRepository {
    /// Create a member row with a starting balance
    ///
    /// Fails with [`DbError::MemberExists`] if the buyer already has one.
    pub async fn create(pool: &SqlitePool, discord_id: &str, balance_gold: i64) -> DbResult<Member> {
        if Self::get(pool, discord_id).await?.is_some() {
            return Err(DbError::MemberExists(discord_id.to_string()));
        }

        let now = Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO members (discord_id, balance_gold, updated_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(discord_id)
        .bind(balance_gold)
        .bind(now)
        .execute(pool)
        .await?;

        info!("Created member {} with balance {}", discord_id, balance_gold);

        Self::get(pool, discord_id)
            .await?
            .ok_or_else(|| DbError::MemberNotFound(discord_id.to_string()))
    }

    /// Get a member by Discord id
    pub async fn get(pool: &SqlitePool, discord_id: &str) -> DbResult<Option<Member>> {
        let row = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT discord_id, balance_gold, updated_at
            FROM members
            WHERE discord_id = ?
            "#,
        )
        .bind(discord_id)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    /// Add gold to a member's balance
    ///
    /// The member must already exist; the amount must be positive.
    pub async fn credit(pool: &SqlitePool, discord_id: &str, amount: i64) -> DbResult<Member> {
        let member = Self::get(pool, discord_id)
            .await?
            .ok_or_else(|| DbError::MemberNotFound(discord_id.to_string()))?;

        let new_balance = member.balance_gold + amount;
        let now = Utc::now().timestamp();

        sqlx::query(
            r#"
            UPDATE members
            SET balance_gold = ?, updated_at = ?
            WHERE discord_id = ?
            "#,
        )
        .bind(new_balance)
        .bind(now)
        .bind(discord_id)
        .execute(pool)
        .await?;

        info!("Credited {} gold to {}", amount, discord_id);

        Self::get(pool, discord_id)
            .await?
            .ok_or_else(|| DbError::MemberNotFound(discord_id.to_string()))
    }

    /// Delete a member row (full reset only)
    pub async fn delete(pool: &SqlitePool, discord_id: &str) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM members WHERE discord_id = ?")
            .bind(discord_id)
            .execute(pool)
            .await?;

        let count = result.rows_affected();
        if count > 0 {
            info!("Deleted member {}", discord_id);
        }
        Ok(count)
    }

    /// Total member rows
    pub async fn count(pool: &SqlitePool) -> DbResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM members")
            .fetch_one(pool)
            .await?;
        Ok(count)
    }

    /// Highest balances first (dashboard)
    pub async fn top_by_balance(pool: &SqlitePool, limit: i64) -> DbResult<Vec<Member>> {
        let rows = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT discord_id, balance_gold, updated_at
            FROM members
            ORDER BY balance_gold DESC, updated_at DESC
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
struct MemberRow {
    discord_id: String,
    balance_gold: i64,
    updated_at: i64,
}

impl From<MemberRow> for Member {
    fn from(row: MemberRow) -> Self {
        Member {
            discord_id: row.discord_id,
            balance_gold: row.balance_gold,
            updated_at: from_timestamp(row.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::create_test_pool;

    #[tokio::test]
    async fn test_create_and_get_member() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        let member = MemberRepository::create(pool, "1001", 5_000_000).await.unwrap();
        assert_eq!(member.discord_id, "1001");
        assert_eq!(member.balance_gold, 5_000_000);

        let found = MemberRepository::get(pool, "1001").await.unwrap().unwrap();
        assert_eq!(found.balance_gold, 5_000_000);
    }

    #[tokio::test]
    async fn test_create_duplicate_fails() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        MemberRepository::create(pool, "1001", 0).await.unwrap();
        let result = MemberRepository::create(pool, "1001", 100).await;
        assert!(matches!(result, Err(DbError::MemberExists(_))));
    }

    #[tokio::test]
    async fn test_credit() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        MemberRepository::create(pool, "1001", 1_000_000).await.unwrap();
        let member = MemberRepository::credit(pool, "1001", 2_000_000).await.unwrap();
        assert_eq!(member.balance_gold, 3_000_000);
    }

    #[tokio::test]
    async fn test_credit_missing_member() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        let result = MemberRepository::credit(pool, "nobody", 100).await;
        assert!(matches!(result, Err(DbError::MemberNotFound(_))));
    }

    #[tokio::test]
    async fn test_delete() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        MemberRepository::create(pool, "1001", 0).await.unwrap();
        assert_eq!(MemberRepository::delete(pool, "1001").await.unwrap(), 1);
        assert!(MemberRepository::get(pool, "1001").await.unwrap().is_none());
        assert_eq!(MemberRepository::delete(pool, "1001").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_top_by_balance() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        MemberRepository::create(pool, "a", 10).await.unwrap();
        MemberRepository::create(pool, "b", 30).await.unwrap();
        MemberRepository::create(pool, "c", 20).await.unwrap();

        let top = MemberRepository::top_by_balance(pool, 2).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].discord_id, "b");
        assert_eq!(top[1].discord_id, "c");

        assert_eq!(MemberRepository::count(pool).await.unwrap(), 3);
    }
}
