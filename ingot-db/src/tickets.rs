//! Ticket channel index.
//!
//! The partial unique index on open rows is what enforces the
//! one-open-ticket-per-buyer-per-kind rule; callers surface the conflict as
//! [`DbError::TicketAlreadyOpen`]. Rows whose Discord channel has since been
//! deleted are dropped with [`TicketRepository::release`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::error::{DbError, DbResult};
use crate::members::from_timestamp;

/// Ticket kinds, one channel each
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TicketKind {
    Gold,
    Boost,
}

impl std::fmt::Display for TicketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TicketKind::Gold => write!(f, "gold"),
            TicketKind::Boost => write!(f, "boost"),
        }
    }
}

impl std::str::FromStr for TicketKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gold" => Ok(TicketKind::Gold),
            "boost" => Ok(TicketKind::Boost),
            _ => Err(format!("Unknown ticket kind: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Open,
    Archived,
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TicketStatus::Open => write!(f, "open"),
            TicketStatus::Archived => write!(f, "archived"),
        }
    }
}

/// Ticket row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i64,
    pub guild_id: String,
    pub discord_id: String,
    pub kind: TicketKind,
    pub channel_id: String,
    pub status: TicketStatus,
    pub opened_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
}

/// Ticket repository for database operations
pub struct TicketRepository;

impl TicketRepository {
    /// The buyer's open ticket of this kind, if any
    pub async fn find_open(
        pool: &SqlitePool,
        guild_id: &str,
        discord_id: &str,
        kind: TicketKind,
    ) -> DbResult<Option<Ticket>> {
        let row = sqlx::query_as::<_, TicketRow>(
            r#"
            SELECT id, guild_id, discord_id, kind, channel_id, status, opened_at, archived_at
            FROM tickets
            WHERE guild_id = ? AND discord_id = ? AND kind = ? AND status = 'open'
            "#,
        )
        .bind(guild_id)
        .bind(discord_id)
        .bind(kind.to_string())
        .fetch_optional(pool)
        .await?;
        Ok(row.map(|r| r.into()))
    }

    /// Register a newly created ticket channel
    pub async fn open(
        pool: &SqlitePool,
        guild_id: &str,
        discord_id: &str,
        kind: TicketKind,
        channel_id: &str,
    ) -> DbResult<Ticket> {
        let now = Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO tickets (guild_id, discord_id, kind, channel_id, status, opened_at)
            VALUES (?, ?, ?, ?, 'open', ?)
            "#,
        )
        .bind(guild_id)
        .bind(discord_id)
        .bind(kind.to_string())
        .bind(channel_id)
        .bind(now)
        .execute(pool)
        .await;

        let result = match result {
            Ok(r) => r,
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                let existing = Self::find_open(pool, guild_id, discord_id, kind).await?;
                return Err(DbError::TicketAlreadyOpen {
                    kind: kind.to_string(),
                    channel_id: existing.map(|t| t.channel_id).unwrap_or_default(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            "Opened {} ticket for {} in guild {} (channel {})",
            kind, discord_id, guild_id, channel_id
        );

        Ok(Ticket {
            id: result.last_insert_rowid(),
            guild_id: guild_id.to_string(),
            discord_id: discord_id.to_string(),
            kind,
            channel_id: channel_id.to_string(),
            status: TicketStatus::Open,
            opened_at: from_timestamp(now),
            archived_at: None,
        })
    }

    /// Archive the ticket living in this channel; returns the row if one existed
    pub async fn archive_by_channel(
        pool: &SqlitePool,
        channel_id: &str,
    ) -> DbResult<Option<Ticket>> {
        let now = Utc::now().timestamp();
        let row = sqlx::query_as::<_, TicketRow>(
            r#"
            UPDATE tickets
            SET status = 'archived', archived_at = ?
            WHERE channel_id = ? AND status = 'open'
            RETURNING id, guild_id, discord_id, kind, channel_id, status, opened_at, archived_at
            "#,
        )
        .bind(now)
        .bind(channel_id)
        .fetch_optional(pool)
        .await?;

        if let Some(ref r) = row {
            info!("Archived ticket {} (channel {})", r.id, channel_id);
        }
        Ok(row.map(|r| r.into()))
    }

    /// Drop an open row whose Discord channel no longer exists
    pub async fn release(pool: &SqlitePool, id: i64) -> DbResult<()> {
        sqlx::query("DELETE FROM tickets WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        warn!("Released stale ticket row {}", id);
        Ok(())
    }
}

/// Internal row type for SQLx mapping
#[derive(sqlx::FromRow)]
struct TicketRow {
    id: i64,
    guild_id: String,
    discord_id: String,
    kind: String,
    channel_id: String,
    status: String,
    opened_at: i64,
    archived_at: Option<i64>,
}

impl From<TicketRow> for Ticket {
    fn from(row: TicketRow) -> Self {
        Ticket {
            id: row.id,
            guild_id: row.guild_id,
            discord_id: row.discord_id,
            kind: row.kind.parse().unwrap_or(TicketKind::Gold),
            channel_id: row.channel_id,
            status: if row.status == "archived" {
                TicketStatus::Archived
            } else {
                TicketStatus::Open
            },
            opened_at: from_timestamp(row.opened_at),
            archived_at: row.archived_at.map(from_timestamp),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::create_test_pool;

    #[tokio::test]
    async fn test_open_and_find() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        assert!(
            TicketRepository::find_open(pool, "g1", "1001", TicketKind::Gold)
                .await
                .unwrap()
                .is_none()
        );

        let ticket = TicketRepository::open(pool, "g1", "1001", TicketKind::Gold, "555")
            .await
            .unwrap();
        assert_eq!(ticket.status, TicketStatus::Open);

        let found = TicketRepository::find_open(pool, "g1", "1001", TicketKind::Gold)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.channel_id, "555");
    }

    #[tokio::test]
    async fn test_one_open_per_kind() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        TicketRepository::open(pool, "g1", "1001", TicketKind::Gold, "555")
            .await
            .unwrap();

        let dup = TicketRepository::open(pool, "g1", "1001", TicketKind::Gold, "556").await;
        assert!(matches!(
            dup,
            Err(DbError::TicketAlreadyOpen { ref channel_id, .. }) if channel_id == "555"
        ));

        // A different kind, buyer, or guild is fine
        TicketRepository::open(pool, "g1", "1001", TicketKind::Boost, "557")
            .await
            .unwrap();
        TicketRepository::open(pool, "g1", "1002", TicketKind::Gold, "558")
            .await
            .unwrap();
        TicketRepository::open(pool, "g2", "1001", TicketKind::Gold, "559")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_archive_frees_the_slot() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        TicketRepository::open(pool, "g1", "1001", TicketKind::Boost, "555")
            .await
            .unwrap();

        let archived = TicketRepository::archive_by_channel(pool, "555")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(archived.status, TicketStatus::Archived);
        assert!(archived.archived_at.is_some());

        // Archiving twice is a no-op
        assert!(
            TicketRepository::archive_by_channel(pool, "555")
                .await
                .unwrap()
                .is_none()
        );

        // The buyer can open a fresh boost ticket again
        TicketRepository::open(pool, "g1", "1001", TicketKind::Boost, "556")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_release_stale_row() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        let ticket = TicketRepository::open(pool, "g1", "1001", TicketKind::Gold, "555")
            .await
            .unwrap();
        TicketRepository::release(pool, ticket.id).await.unwrap();

        assert!(
            TicketRepository::find_open(pool, "g1", "1001", TicketKind::Gold)
                .await
                .unwrap()
                .is_none()
        );
    }
}
