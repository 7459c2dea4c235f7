//! Latest gold price quote per guild.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;
use crate::members::from_timestamp;

/// USD-per-1M-gold quote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Price {
    pub guild_id: String,
    pub usd_per_1m: f64,
    pub updated_at: DateTime<Utc>,
}

impl Price {
    /// A quote older than 24 hours is shown with a staleness warning
    pub fn is_stale(&self) -> bool {
        Utc::now() - self.updated_at > Duration::hours(24)
    }
}

/// Price repository for database operations
pub struct PriceRepository;

impl PriceRepository {
    /// Set a guild's current quote, stamping the update time
    pub async fn upsert(pool: &SqlitePool, guild_id: &str, usd_per_1m: f64) -> DbResult<Price> {
        let now = Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO prices (guild_id, usd_per_1m, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT (guild_id) DO UPDATE SET
                usd_per_1m = excluded.usd_per_1m,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(guild_id)
        .bind(usd_per_1m)
        .bind(now)
        .execute(pool)
        .await?;

        info!("Gold price for guild {} set to ${}/1M", guild_id, usd_per_1m);

        Ok(Price {
            guild_id: guild_id.to_string(),
            usd_per_1m,
            updated_at: from_timestamp(now),
        })
    }

    /// Get a guild's current quote
    pub async fn get(pool: &SqlitePool, guild_id: &str) -> DbResult<Option<Price>> {
        let row = sqlx::query_as::<_, PriceRow>(
            "SELECT guild_id, usd_per_1m, updated_at FROM prices WHERE guild_id = ?",
        )
        .bind(guild_id)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(|r| r.into()))
    }

    /// Most recently updated quote across all guilds (dashboard)
    pub async fn latest(pool: &SqlitePool) -> DbResult<Option<Price>> {
        let row = sqlx::query_as::<_, PriceRow>(
            "SELECT guild_id, usd_per_1m, updated_at FROM prices ORDER BY updated_at DESC LIMIT 1",
        )
        .fetch_optional(pool)
        .await?;
        Ok(row.map(|r| r.into()))
    }
}

/// Internal row type for SQLx mapping
#[derive(sqlx::FromRow)]
struct PriceRow {
    guild_id: String,
    usd_per_1m: f64,
    updated_at: i64,
}

impl From<PriceRow> for Price {
    fn from(row: PriceRow) -> Self {
        Price {
            guild_id: row.guild_id,
            usd_per_1m: row.usd_per_1m,
            updated_at: from_timestamp(row.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::create_test_pool;

    #[tokio::test]
    async fn test_upsert_and_get() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        assert!(PriceRepository::get(pool, "g1").await.unwrap().is_none());

        PriceRepository::upsert(pool, "g1", 0.25).await.unwrap();
        PriceRepository::upsert(pool, "g1", 0.30).await.unwrap();

        let price = PriceRepository::get(pool, "g1").await.unwrap().unwrap();
        assert_eq!(price.usd_per_1m, 0.30);
        assert!(!price.is_stale());
    }

    #[tokio::test]
    async fn test_latest_across_guilds() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        assert!(PriceRepository::latest(pool).await.unwrap().is_none());

        PriceRepository::upsert(pool, "g1", 0.25).await.unwrap();
        // Backdate g1 so g2 is unambiguously the most recent quote
        sqlx::query("UPDATE prices SET updated_at = updated_at - 100 WHERE guild_id = 'g1'")
            .execute(pool)
            .await
            .unwrap();
        PriceRepository::upsert(pool, "g2", 0.40).await.unwrap();

        let latest = PriceRepository::latest(pool).await.unwrap().unwrap();
        assert_eq!(latest.guild_id, "g2");
    }

    #[test]
    fn test_staleness_cutoff() {
        let fresh = Price {
            guild_id: "g".to_string(),
            usd_per_1m: 0.25,
            updated_at: Utc::now() - Duration::hours(23),
        };
        assert!(!fresh.is_stale());

        let stale = Price {
            updated_at: Utc::now() - Duration::hours(25),
            ..fresh
        };
        assert!(stale.is_stale());
    }
}
