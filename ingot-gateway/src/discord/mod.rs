mod bot;
mod card_image;
mod commands;
mod components;
mod embeds;
mod roles;
mod tickets;

use std::sync::Arc;

use serenity::prelude::*;
use tracing::info;

pub use bot::Bot;

/// Prefix for every component and modal custom id this bot owns
pub(crate) const CUSTOM_ID_PREFIX: &str = "ig:";

/// Start the Discord bot
pub async fn start_discord_bot(state: Arc<crate::state::AppState>) -> Result<Client, DiscordError> {
    info!("Starting Discord bot...");

    // Eagerly load system fonts so the first member-card render doesn't
    // block the tokio runtime (LazyLock scans every font on the system).
    card_image::init_fonts();
    info!("System font database initialized");

    let intents = GatewayIntents::GUILDS;

    let token = state.config.discord_token.clone();
    let bot = Bot::new(state);

    let client = Client::builder(&token, intents)
        .event_handler(bot)
        .await
        .map_err(|e| DiscordError::ClientError(e.to_string()))?;

    Ok(client)
}

/// Discord-related errors
#[derive(Debug, thiserror::Error)]
pub enum DiscordError {
    #[error("Failed to create Discord client: {0}")]
    ClientError(String),
}
