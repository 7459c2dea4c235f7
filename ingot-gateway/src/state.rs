//! Shared application state.
//!
//! Pending interactive flows (reset confirmations, embed drafts) are stashed
//! here under a one-shot uuid token embedded in the component custom id.
//! Redemption takes the entry out of the map, so a token can only fire once,
//! and entries past their expiry window are dropped on redemption.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use ingot_core::Config;
use ingot_db::LedgerDbPool;

/// How long a /resetall confirmation stays redeemable
const RESET_EXPIRY_MINUTES: i64 = 5;

/// How long a /publishembed draft waits for its modal
const DRAFT_EXPIRY_MINUTES: i64 = 10;

/// A /resetall awaiting its Confirm button
#[derive(Debug, Clone)]
pub struct PendingReset {
    /// Admin who issued the command; only they may confirm
    pub requester_id: String,
    pub guild_id: String,
    /// Buyer being reset
    pub target_id: String,
    pub created_at: DateTime<Utc>,
}

impl PendingReset {
    pub fn is_expired(&self) -> bool {
        Utc::now() - self.created_at > Duration::minutes(RESET_EXPIRY_MINUTES)
    }
}

/// A /publishembed invocation awaiting its modal submit
#[derive(Debug, Clone)]
pub struct EmbedDraft {
    pub author_id: String,
    pub guild_id: String,
    pub channel_id: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl EmbedDraft {
    pub fn is_expired(&self) -> bool {
        Utc::now() - self.created_at > Duration::minutes(DRAFT_EXPIRY_MINUTES)
    }
}

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub db: LedgerDbPool,
    pending_resets: Mutex<HashMap<String, PendingReset>>,
    embed_drafts: Mutex<HashMap<String, EmbedDraft>>,
}

impl AppState {
    pub fn new(config: Config, db: LedgerDbPool) -> Self {
        Self {
            config,
            db,
            pending_resets: Mutex::new(HashMap::new()),
            embed_drafts: Mutex::new(HashMap::new()),
        }
    }

    pub async fn set_pending_reset(&self, token: &str, pending: PendingReset) {
        let mut map = self.pending_resets.lock().await;
        map.retain(|_, p| !p.is_expired());
        map.insert(token.to_string(), pending);
    }

    /// Look at a reset without redeeming it (owner/guild checks happen first
    /// so a wrong clicker doesn't burn the token)
    pub async fn peek_pending_reset(&self, token: &str) -> Option<PendingReset> {
        let map = self.pending_resets.lock().await;
        map.get(token).cloned()
    }

    /// Redeem a reset token; expired or unknown tokens return None
    pub async fn take_pending_reset(&self, token: &str) -> Option<PendingReset> {
        let mut map = self.pending_resets.lock().await;
        map.remove(token).filter(|p| !p.is_expired())
    }

    pub async fn set_embed_draft(&self, token: &str, draft: EmbedDraft) {
        let mut map = self.embed_drafts.lock().await;
        map.retain(|_, d| !d.is_expired());
        map.insert(token.to_string(), draft);
    }

    /// Look at an embed draft without redeeming it
    pub async fn peek_embed_draft(&self, token: &str) -> Option<EmbedDraft> {
        let map = self.embed_drafts.lock().await;
        map.get(token).cloned()
    }

    /// Redeem an embed draft token; expired or unknown tokens return None
    pub async fn take_embed_draft(&self, token: &str) -> Option<EmbedDraft> {
        let mut map = self.embed_drafts.lock().await;
        map.remove(token).filter(|d| !d.is_expired())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingot_db::test_helpers::create_test_pool;

    fn test_config() -> Config {
        Config {
            discord_token: "token".to_string(),
            home_guild_id: None,
            dashboard_host: "127.0.0.1".to_string(),
            dashboard_port: 3000,
        }
    }

    fn reset(created_at: DateTime<Utc>) -> PendingReset {
        PendingReset {
            requester_id: "1".to_string(),
            guild_id: "g".to_string(),
            target_id: "2".to_string(),
            created_at,
        }
    }

    #[tokio::test]
    async fn test_reset_token_is_one_shot() {
        let db = create_test_pool().await.unwrap();
        let state = AppState::new(test_config(), db);

        state.set_pending_reset("tok", reset(Utc::now())).await;
        assert!(state.take_pending_reset("tok").await.is_some());
        assert!(state.take_pending_reset("tok").await.is_none());
    }

    #[tokio::test]
    async fn test_expired_reset_not_redeemable() {
        let db = create_test_pool().await.unwrap();
        let state = AppState::new(test_config(), db);

        state
            .set_pending_reset("tok", reset(Utc::now() - Duration::minutes(6)))
            .await;
        assert!(state.take_pending_reset("tok").await.is_none());
    }

    #[tokio::test]
    async fn test_embed_draft_expiry_window() {
        let db = create_test_pool().await.unwrap();
        let state = AppState::new(test_config(), db);

        let draft = EmbedDraft {
            author_id: "1".to_string(),
            guild_id: "g".to_string(),
            channel_id: "c".to_string(),
            image_url: None,
            created_at: Utc::now() - Duration::minutes(9),
        };
        state.set_embed_draft("tok", draft).await;
        assert!(state.take_embed_draft("tok").await.is_some());
    }
}
