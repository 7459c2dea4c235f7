use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ingot_gateway::dashboard;
use ingot_gateway::discord::start_discord_bot;
use ingot_gateway::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = ingot_core::Config::from_env()?;
    info!("Configuration loaded");

    // Initialize database
    let db = ingot_db::LedgerDbPool::new().await?;
    info!("Ledger database initialized");

    let state = Arc::new(AppState::new(config, db));

    // Start Discord bot
    let mut client = start_discord_bot(Arc::clone(&state)).await?;
    let discord_task = tokio::spawn(async move {
        if let Err(e) = client.start().await {
            tracing::error!("Discord client error: {}", e);
        }
    });
    info!("Discord bot started");

    // Run the dashboard server (this blocks)
    let bind_addr = state.config.bind_addr();
    info!("Starting dashboard on {}", bind_addr);
    let server_result = dashboard::run(state, &bind_addr).await;

    discord_task.abort();
    server_result
}
