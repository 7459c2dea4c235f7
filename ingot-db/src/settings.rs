//! Per-guild channel wiring saved by `/setup`.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

/// Guild configuration row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GuildSettings {
    pub guild_id: String,
    pub order_channel_id: String,
    pub gold_price_channel_id: String,
    pub tickets_category_id: String,
    pub archive_category_id: String,
}

/// Settings repository for database operations
pub struct SettingsRepository;

impl SettingsRepository {
    /// Insert or fully replace a guild's settings
    pub async fn upsert(pool: &SqlitePool, settings: &GuildSettings) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (guild_id, order_channel_id, gold_price_channel_id,
                                  tickets_category_id, archive_category_id)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (guild_id) DO UPDATE SET
                order_channel_id = excluded.order_channel_id,
                gold_price_channel_id = excluded.gold_price_channel_id,
                tickets_category_id = excluded.tickets_category_id,
                archive_category_id = excluded.archive_category_id
            "#,
        )
        .bind(&settings.guild_id)
        .bind(&settings.order_channel_id)
        .bind(&settings.gold_price_channel_id)
        .bind(&settings.tickets_category_id)
        .bind(&settings.archive_category_id)
        .execute(pool)
        .await?;

        info!("Saved settings for guild {}", settings.guild_id);
        Ok(())
    }

    /// Get a guild's settings
    pub async fn get(pool: &SqlitePool, guild_id: &str) -> DbResult<Option<GuildSettings>> {
        let settings = sqlx::query_as::<_, GuildSettings>(
            "SELECT * FROM settings WHERE guild_id = ?",
        )
        .bind(guild_id)
        .fetch_optional(pool)
        .await?;
        Ok(settings)
    }

    /// Number of configured guilds
    pub async fn count(pool: &SqlitePool) -> DbResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM settings")
            .fetch_one(pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::create_test_pool;

    fn sample(guild_id: &str) -> GuildSettings {
        GuildSettings {
            guild_id: guild_id.to_string(),
            order_channel_id: "100".to_string(),
            gold_price_channel_id: "200".to_string(),
            tickets_category_id: "300".to_string(),
            archive_category_id: "400".to_string(),
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        assert!(SettingsRepository::get(pool, "g1").await.unwrap().is_none());

        SettingsRepository::upsert(pool, &sample("g1")).await.unwrap();
        let settings = SettingsRepository::get(pool, "g1").await.unwrap().unwrap();
        assert_eq!(settings.order_channel_id, "100");

        let mut updated = sample("g1");
        updated.order_channel_id = "999".to_string();
        SettingsRepository::upsert(pool, &updated).await.unwrap();

        let settings = SettingsRepository::get(pool, "g1").await.unwrap().unwrap();
        assert_eq!(settings.order_channel_id, "999");
        assert_eq!(SettingsRepository::count(pool).await.unwrap(), 1);
    }
}
