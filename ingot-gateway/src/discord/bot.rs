use std::sync::Arc;

use serenity::async_trait;
use serenity::builder::{CreateAttachment, CreateCommand, CreateCommandOption};
use serenity::model::application::{Command, CommandOptionType, Interaction};
use serenity::model::gateway::Ready;
use serenity::model::id::GuildId;
use serenity::model::permissions::Permissions;
use serenity::model::user::User;
use serenity::prelude::*;
use tracing::{error, info};

use ingot_core::tier_for_total;
use ingot_db::PurchaseRepository;

use crate::state::AppState;

use super::card_image;
use super::roles;

/// Discord bot handler
///
/// Slash command and component bodies live in `commands.rs` and
/// `components.rs` as `impl Bot` methods; this file wires them to serenity's
/// `EventHandler` and registers the command set on ready.
pub struct Bot {
    pub(super) state: Arc<AppState>,
}

impl Bot {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Lifetime spend, the tier it earns, and a best-effort role sync.
    ///
    /// Role-sync failures are logged and never fail the caller; the returned
    /// tier is then computed from spend alone.
    pub(super) async fn synced_tier(
        &self,
        ctx: &Context,
        guild_id: Option<GuildId>,
        user_id: serenity::model::id::UserId,
    ) -> Result<(i64, &'static str), ingot_db::DbError> {
        let total =
            PurchaseRepository::total_spent(self.state.db.pool(), &user_id.to_string()).await?;
        let mut tier_name = tier_for_total(total).name;
        if let Some(guild_id) = guild_id {
            match roles::sync_tier_role(ctx, guild_id, user_id, total).await {
                Ok(name) => tier_name = name,
                Err(e) => error!("Failed to sync tier role for {}: {}", user_id, e),
            }
        }
        Ok((total, tier_name))
    }

    /// Render the member card PNG as an attachment, fetching avatar + logo
    pub(super) async fn member_card_attachment(
        &self,
        ctx: &Context,
        guild_id: Option<GuildId>,
        user: &User,
        balance_gold: i64,
        total_spent: i64,
        tier_name: &str,
    ) -> Option<CreateAttachment> {
        let avatar = card_image::fetch_image(&card_image::png_cdn_url(&user.face())).await;
        let logo = match guild_id {
            Some(guild_id) => match guild_id.to_partial_guild(&ctx.http).await {
                Ok(guild) => match guild.icon_url() {
                    Some(url) => card_image::fetch_image(&card_image::png_cdn_url(&url)).await,
                    None => None,
                },
                Err(_) => None,
            },
            None => None,
        };

        let png = card_image::render_member_card(
            &user.name,
            tier_name,
            balance_gold,
            total_spent,
            avatar.as_deref(),
            logo.as_deref(),
        )?;
        Some(CreateAttachment::bytes(
            png,
            format!("member-card-{}.png", user.id),
        ))
    }
}

#[async_trait]
impl EventHandler for Bot {
    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command) => self.handle_command(&ctx, &command).await,
            Interaction::Component(component) => self.handle_component(&ctx, &component).await,
            Interaction::Modal(modal) => self.handle_modal(&ctx, &modal).await,
            _ => {}
        }
    }

    /// Bot is ready - register slash commands
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("Discord bot connected as {}", ready.user.name);

        let admin = Permissions::MANAGE_GUILD;
        let mut guild_commands = vec![
            CreateCommand::new("setup")
                .description("Configure channels and post the shop panels")
                .default_member_permissions(admin)
                .add_option(
                    CreateCommandOption::new(
                        CommandOptionType::Channel,
                        "order_channel",
                        "Text channel for the order panel",
                    )
                    .required(false),
                )
                .add_option(
                    CreateCommandOption::new(
                        CommandOptionType::Channel,
                        "gold_price_channel",
                        "Text channel for the gold price panel",
                    )
                    .required(false),
                )
                .add_option(
                    CreateCommandOption::new(
                        CommandOptionType::Channel,
                        "tickets_category",
                        "Category for new tickets",
                    )
                    .required(false),
                )
                .add_option(
                    CreateCommandOption::new(
                        CommandOptionType::Channel,
                        "archive_category",
                        "Category for archived tickets",
                    )
                    .required(false),
                ),
            CreateCommand::new("goldprice")
                .description("Update the gold price")
                .default_member_permissions(admin)
                .add_option(
                    CreateCommandOption::new(
                        CommandOptionType::Number,
                        "usd_per_1m",
                        "Price in USD per 1M gold",
                    )
                    .required(true),
                ),
            CreateCommand::new("dbcheck")
                .description("Show database row counts and price rows")
                .default_member_permissions(admin),
            CreateCommand::new("postorder")
                .description("Repost the order and gold price panels")
                .default_member_permissions(admin),
            CreateCommand::new("deleteticket")
                .description("Archive the current ticket channel")
                .default_member_permissions(admin),
            CreateCommand::new("publishtext")
                .description("Publish a text message via modal")
                .default_member_permissions(admin),
            CreateCommand::new("publishembed")
                .description("Publish an embed via modal")
                .default_member_permissions(admin)
                .add_option(
                    CreateCommandOption::new(
                        CommandOptionType::Attachment,
                        "picture",
                        "Image shown in the embed",
                    )
                    .required(false),
                ),
            CreateCommand::new("mc")
                .description("Create a member card for a buyer")
                .default_member_permissions(admin)
                .add_option(
                    CreateCommandOption::new(CommandOptionType::User, "user", "The buyer")
                        .required(true),
                )
                .add_option(
                    CreateCommandOption::new(
                        CommandOptionType::Integer,
                        "balance",
                        "Starting gold balance",
                    )
                    .required(true),
                ),
            CreateCommand::new("addbal")
                .description("Add gold to a buyer's balance")
                .default_member_permissions(admin)
                .add_option(
                    CreateCommandOption::new(CommandOptionType::User, "user", "The buyer")
                        .required(true),
                )
                .add_option(
                    CreateCommandOption::new(
                        CommandOptionType::Integer,
                        "amount",
                        "Gold to add",
                    )
                    .required(true),
                ),
            CreateCommand::new("purchase")
                .description("Record a boost purchase against a buyer's balance")
                .default_member_permissions(admin)
                .add_option(
                    CreateCommandOption::new(CommandOptionType::User, "user", "The buyer")
                        .required(true),
                )
                .add_option(
                    CreateCommandOption::new(
                        CommandOptionType::String,
                        "details",
                        "What was bought (e.g., 8 x +12)",
                    )
                    .required(true),
                )
                .add_option(
                    CreateCommandOption::new(
                        CommandOptionType::Integer,
                        "gold_cost",
                        "Gold deducted",
                    )
                    .required(true),
                ),
            CreateCommand::new("resetall")
                .description("Delete a buyer's card, history, and tier roles")
                .default_member_permissions(admin)
                .add_option(
                    CreateCommandOption::new(CommandOptionType::User, "user", "The buyer")
                        .required(true),
                ),
            CreateCommand::new("historyuser")
                .description("Show a buyer's last 10 purchases")
                .default_member_permissions(admin)
                .add_option(
                    CreateCommandOption::new(CommandOptionType::User, "user", "The buyer")
                        .required(true),
                ),
            CreateCommand::new("who")
                .description("Show a buyer's stats")
                .default_member_permissions(admin)
                .add_option(
                    CreateCommandOption::new(CommandOptionType::User, "user", "The buyer")
                        .required(true),
                ),
            CreateCommand::new("history").description("Show your last 10 purchases"),
        ];

        // /me works everywhere, including DMs, so it is always global
        let me_command = CreateCommand::new("me").description("Show your member card");

        match self.state.config.home_guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                if let Err(e) = guild_id.set_commands(&ctx.http, guild_commands).await {
                    error!("Failed to register guild slash commands: {}", e);
                }
                if let Err(e) = Command::set_global_commands(&ctx.http, vec![me_command]).await {
                    error!("Failed to register global slash commands: {}", e);
                }
            }
            None => {
                guild_commands.push(me_command);
                if let Err(e) = Command::set_global_commands(&ctx.http, guild_commands).await {
                    error!("Failed to register slash commands: {}", e);
                }
            }
        }
    }
}
