//! Slash command handlers.
//!
//! Every handler replies ephemerally. Admin commands are registered with
//! MANAGE_GUILD default permissions and re-check the invoker's permissions
//! here, since channel overrides can widen who sees a command.

use serenity::builder::{
    CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage, CreateMessage,
    EditChannel, EditInteractionResponse,
};
use serenity::model::application::{
    CommandDataOptionValue, CommandInteraction,
};
use serenity::model::channel::ChannelType;
use serenity::model::id::ChannelId;
use serenity::model::Colour;
use serenity::prelude::*;
use tracing::error;

use ingot_core::{format_gold, progress, tier_for_total};
use ingot_db::{
    DbError, GuildSettings, MemberRepository, PriceRepository, PurchaseKind, PurchaseRepository,
    SettingsRepository, TicketRepository,
};

use crate::state::{EmbedDraft, PendingReset};

use super::bot::Bot;
use super::embeds::{
    self, gold_pair, history_lines, order_panel_buttons, order_panel_embed, price_panel_buttons,
    price_panel_embed, purchase_recorded_embed, reset_buttons, tier_progress_embed, tip_button_row,
};
use super::roles;

type CmdResult = Result<(), CommandError>;

#[derive(Debug, thiserror::Error)]
pub(super) enum CommandError {
    #[error("Discord API error: {0}")]
    Discord(#[from] serenity::Error),
    #[error(transparent)]
    Db(#[from] DbError),
}

/// Invoker holds ADMINISTRATOR or MANAGE_GUILD in this channel
pub(super) fn is_manager(command: &CommandInteraction) -> bool {
    command
        .member
        .as_ref()
        .and_then(|m| m.permissions)
        .map(|p| p.administrator() || p.manage_guild())
        .unwrap_or(false)
}

fn option_value<'a>(
    command: &'a CommandInteraction,
    name: &str,
) -> Option<&'a CommandDataOptionValue> {
    command
        .data
        .options
        .iter()
        .find(|o| o.name == name)
        .map(|o| &o.value)
}

impl Bot {
    pub(super) async fn handle_command(&self, ctx: &Context, command: &CommandInteraction) {
        let name = command.data.name.as_str();

        // /history and /me are open to everyone
        if !matches!(name, "history" | "me") && !is_manager(command) {
            let _ = reply(ctx, command, "ERROR: No permission.").await;
            return;
        }

        let result = match name {
            "setup" => self.cmd_setup(ctx, command).await,
            "goldprice" => self.cmd_goldprice(ctx, command).await,
            "dbcheck" => self.cmd_dbcheck(ctx, command).await,
            "postorder" => self.cmd_postorder(ctx, command).await,
            "deleteticket" => self.cmd_deleteticket(ctx, command).await,
            "publishtext" => self.cmd_publishtext(ctx, command).await,
            "publishembed" => self.cmd_publishembed(ctx, command).await,
            "mc" => self.cmd_mc(ctx, command).await,
            "addbal" => self.cmd_addbal(ctx, command).await,
            "purchase" => self.cmd_purchase(ctx, command).await,
            "resetall" => self.cmd_resetall(ctx, command).await,
            "history" => self.cmd_history(ctx, command).await,
            "historyuser" => self.cmd_historyuser(ctx, command).await,
            "who" => self.cmd_who(ctx, command).await,
            "me" => self.cmd_me(ctx, command).await,
            _ => Ok(()),
        };

        if let Err(e) = result {
            error!("Command /{} failed: {}", name, e);
            let msg = "ERROR: Something went wrong.";
            if edit(ctx, command, msg).await.is_err() {
                let _ = reply(ctx, command, msg).await;
            }
        }
    }

    async fn cmd_setup(&self, ctx: &Context, command: &CommandInteraction) -> CmdResult {
        let Some(guild_id) = command.guild_id else {
            return reply(ctx, command, "ERROR: This command only works in a server.").await;
        };
        command.defer_ephemeral(&ctx.http).await?;

        let pool = self.state.db.pool();
        let existing = SettingsRepository::get(pool, &guild_id.to_string()).await?;

        // Validate provided channels against their resolved kinds
        let mut picked: [(&str, Option<ChannelId>, ChannelType); 4] = [
            ("order_channel", None, ChannelType::Text),
            ("gold_price_channel", None, ChannelType::Text),
            ("tickets_category", None, ChannelType::Category),
            ("archive_category", None, ChannelType::Category),
        ];
        for (name, slot, wanted) in picked.iter_mut() {
            let Some(CommandDataOptionValue::Channel(channel_id)) = option_value(command, *name)
            else {
                continue;
            };
            let kind = command
                .data
                .resolved
                .channels
                .get(channel_id)
                .map(|c| c.kind);
            if kind != Some(*wanted) {
                let noun = if *wanted == ChannelType::Text {
                    "a text channel"
                } else {
                    "a category"
                };
                return edit(ctx, command, &format!("ERROR: {} must be {}.", name, noun)).await;
            }
            *slot = Some(*channel_id);
        }

        // Merge with previously saved settings; only missing options are required
        let keep =
            |saved: Option<&String>| saved.and_then(|s| s.parse::<u64>().ok()).map(ChannelId::new);
        let order = picked[0].1.or(keep(existing.as_ref().map(|s| &s.order_channel_id)));
        let price = picked[1].1.or(keep(existing.as_ref().map(|s| &s.gold_price_channel_id)));
        let tickets_cat = picked[2].1.or(keep(existing.as_ref().map(|s| &s.tickets_category_id)));
        let archive_cat = picked[3].1.or(keep(existing.as_ref().map(|s| &s.archive_category_id)));

        let mut missing = Vec::new();
        if order.is_none() {
            missing.push("order_channel");
        }
        if price.is_none() {
            missing.push("gold_price_channel");
        }
        if tickets_cat.is_none() {
            missing.push("tickets_category");
        }
        if archive_cat.is_none() {
            missing.push("archive_category");
        }
        let (Some(order), Some(price), Some(tickets_cat), Some(archive_cat)) =
            (order, price, tickets_cat, archive_cat)
        else {
            return edit(
                ctx,
                command,
                &format!(
                    "ERROR: Missing required setup value(s): {}.\n\
                     Provide them in /setup now (only missing ones are required).",
                    missing.join(", ")
                ),
            )
            .await;
        };

        SettingsRepository::upsert(
            pool,
            &GuildSettings {
                guild_id: guild_id.to_string(),
                order_channel_id: order.to_string(),
                gold_price_channel_id: price.to_string(),
                tickets_category_id: tickets_cat.to_string(),
                archive_category_id: archive_cat.to_string(),
            },
        )
        .await?;

        // Re-verify the saved channels are live before posting panels
        let channels = guild_id.channels(&ctx.http).await?;
        if channels.get(&order).map(|c| c.kind) != Some(ChannelType::Text) {
            return edit(
                ctx,
                command,
                "ERROR: Saved order channel is unavailable. Re-run /setup with order_channel.",
            )
            .await;
        }
        if channels.get(&price).map(|c| c.kind) != Some(ChannelType::Text) {
            return edit(
                ctx,
                command,
                "ERROR: Saved gold price channel is unavailable. Re-run /setup with gold_price_channel.",
            )
            .await;
        }
        let archive_name = channels
            .get(&archive_cat)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| archive_cat.to_string());

        order
            .send_message(
                &ctx.http,
                CreateMessage::new()
                    .embed(order_panel_embed())
                    .components(vec![order_panel_buttons()]),
            )
            .await?;
        let current_price = PriceRepository::get(pool, &guild_id.to_string()).await?;
        price
            .send_message(
                &ctx.http,
                CreateMessage::new()
                    .embed(price_panel_embed(current_price.as_ref()))
                    .components(vec![price_panel_buttons()]),
            )
            .await?;

        edit(
            ctx,
            command,
            &format!(
                "OK: Setup saved.\n\
                 Order panel posted in <#{}>.\n\
                 Gold price panel posted in <#{}>.\n\
                 Archive category: **{}**",
                order, price, archive_name
            ),
        )
        .await
    }

    async fn cmd_goldprice(&self, ctx: &Context, command: &CommandInteraction) -> CmdResult {
        let Some(guild_id) = command.guild_id else {
            return reply(ctx, command, "ERROR: This command only works in a server.").await;
        };
        command.defer_ephemeral(&ctx.http).await?;

        let usd = option_value(command, "usd_per_1m")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        if usd <= 0.0 {
            return edit(ctx, command, "ERROR: Price must be > 0.").await;
        }

        let pool = self.state.db.pool();
        let price = PriceRepository::upsert(pool, &guild_id.to_string(), usd).await?;

        // Repost the panel so the public channel shows the fresh rate
        if let Some(settings) = SettingsRepository::get(pool, &guild_id.to_string()).await? {
            if let Ok(channel_id) = settings.gold_price_channel_id.parse() {
                let _ = ChannelId::new(channel_id)
                    .send_message(
                        &ctx.http,
                        CreateMessage::new()
                            .embed(price_panel_embed(Some(&price)))
                            .components(vec![price_panel_buttons()]),
                    )
                    .await;
            }
        }

        edit(ctx, command, &format!("OK: Price updated: {} USD / 1M", usd)).await
    }

    async fn cmd_dbcheck(&self, ctx: &Context, command: &CommandInteraction) -> CmdResult {
        let Some(guild_id) = command.guild_id else {
            return reply(ctx, command, "ERROR: This command only works in a server.").await;
        };
        command.defer_ephemeral(&ctx.http).await?;

        let pool = self.state.db.pool();
        let guild_price = PriceRepository::get(pool, &guild_id.to_string()).await?;
        let latest_price = PriceRepository::latest(pool).await?;
        let members = MemberRepository::count(pool).await?;
        let purchases = PurchaseRepository::count(pool).await?;
        let settings = SettingsRepository::count(pool).await?;

        let guild_price_text = guild_price
            .map(|p| p.usd_per_1m.to_string())
            .unwrap_or_else(|| "none".to_string());
        let latest_price_text = latest_price
            .map(|p| format!("{} (guild {})", p.usd_per_1m, p.guild_id))
            .unwrap_or_else(|| "none".to_string());

        edit(
            ctx,
            command,
            &format!(
                "DB: SQLite\n\
                 Guild: `{}`\n\
                 Settings rows: **{}**\n\
                 Members rows: **{}**\n\
                 Purchases rows: **{}**\n\
                 Current guild price: **{}**\n\
                 Latest price row: **{}**",
                guild_id, settings, members, purchases, guild_price_text, latest_price_text
            ),
        )
        .await
    }

    async fn cmd_postorder(&self, ctx: &Context, command: &CommandInteraction) -> CmdResult {
        let Some(guild_id) = command.guild_id else {
            return reply(ctx, command, "ERROR: This command only works in a server.").await;
        };
        command.defer_ephemeral(&ctx.http).await?;

        let pool = self.state.db.pool();
        let Some(settings) = SettingsRepository::get(pool, &guild_id.to_string()).await? else {
            return edit(ctx, command, "ERROR: Run `/setup` first.").await;
        };

        let Ok(order_id) = settings.order_channel_id.parse::<u64>() else {
            return edit(ctx, command, "ERROR: Order channel not found. Re-run /setup.").await;
        };
        let order = ChannelId::new(order_id);
        if order
            .send_message(
                &ctx.http,
                CreateMessage::new()
                    .embed(order_panel_embed())
                    .components(vec![order_panel_buttons()]),
            )
            .await
            .is_err()
        {
            return edit(ctx, command, "ERROR: Order channel not found. Re-run /setup.").await;
        }

        let current_price = PriceRepository::get(pool, &guild_id.to_string()).await?;
        if let Ok(price_id) = settings.gold_price_channel_id.parse::<u64>() {
            let _ = ChannelId::new(price_id)
                .send_message(
                    &ctx.http,
                    CreateMessage::new()
                        .embed(price_panel_embed(current_price.as_ref()))
                        .components(vec![price_panel_buttons()]),
                )
                .await;
        }

        edit(ctx, command, "OK: Posted order panel and gold price panel.").await
    }

    async fn cmd_deleteticket(&self, ctx: &Context, command: &CommandInteraction) -> CmdResult {
        let Some(guild_id) = command.guild_id else {
            return reply(ctx, command, "ERROR: This command only works in a server.").await;
        };
        command.defer_ephemeral(&ctx.http).await?;

        let pool = self.state.db.pool();
        let Some(settings) = SettingsRepository::get(pool, &guild_id.to_string()).await? else {
            return edit(ctx, command, "ERROR: Run `/setup` first.").await;
        };

        let channels = guild_id.channels(&ctx.http).await?;
        let Some(channel) = channels.get(&command.channel_id) else {
            return edit(
                ctx,
                command,
                "ERROR: This command can only be used in a text ticket channel.",
            )
            .await;
        };
        if channel.kind != ChannelType::Text {
            return edit(
                ctx,
                command,
                "ERROR: This command can only be used in a text ticket channel.",
            )
            .await;
        }

        let parent = channel.parent_id.map(|p| p.to_string());
        if parent.as_deref() == Some(settings.archive_category_id.as_str()) {
            return edit(ctx, command, "WARNING: This ticket is already archived.").await;
        }
        let looks_like_ticket = parent.as_deref() == Some(settings.tickets_category_id.as_str())
            || channel.name.starts_with("ticket-");
        if !looks_like_ticket {
            return edit(
                ctx,
                command,
                "ERROR: This does not look like an active ticket channel.",
            )
            .await;
        }

        let Ok(archive_id) = settings.archive_category_id.parse::<u64>() else {
            return edit(
                ctx,
                command,
                "ERROR: Archive category not configured. Re-run `/setup`.",
            )
            .await;
        };

        let mut archived_name = if channel.name.starts_with("archived-") {
            channel.name.clone()
        } else {
            format!("archived-{}", channel.name)
        };
        archived_name.truncate(100);

        command
            .channel_id
            .edit(
                &ctx.http,
                EditChannel::new()
                    .name(archived_name)
                    .category(Some(ChannelId::new(archive_id))),
            )
            .await?;

        TicketRepository::archive_by_channel(pool, &command.channel_id.to_string()).await?;

        edit(
            ctx,
            command,
            "OK: Ticket archived to the configured archive category.",
        )
        .await
    }

    async fn cmd_publishtext(&self, ctx: &Context, command: &CommandInteraction) -> CmdResult {
        command
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Modal(embeds::publish_text_modal()),
            )
            .await?;
        Ok(())
    }

    async fn cmd_publishembed(&self, ctx: &Context, command: &CommandInteraction) -> CmdResult {
        let Some(guild_id) = command.guild_id else {
            return reply(ctx, command, "ERROR: This command only works in a server.").await;
        };

        let image_url = match option_value(command, "picture") {
            Some(CommandDataOptionValue::Attachment(attachment_id)) => {
                let attachment = command.data.resolved.attachments.get(attachment_id);
                match attachment {
                    Some(a)
                        if a.content_type
                            .as_deref()
                            .map(|ct| ct.starts_with("image/"))
                            .unwrap_or(false) =>
                    {
                        Some(a.url.clone())
                    }
                    _ => {
                        return reply(ctx, command, "ERROR: picture must be an image file.").await;
                    }
                }
            }
            _ => None,
        };

        let token = uuid::Uuid::new_v4().to_string();
        self.state
            .set_embed_draft(
                &token,
                EmbedDraft {
                    author_id: command.user.id.to_string(),
                    guild_id: guild_id.to_string(),
                    channel_id: command.channel_id.to_string(),
                    image_url,
                    created_at: chrono::Utc::now(),
                },
            )
            .await;

        command
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Modal(embeds::publish_embed_modal(&token)),
            )
            .await?;
        Ok(())
    }

    async fn cmd_mc(&self, ctx: &Context, command: &CommandInteraction) -> CmdResult {
        command.defer_ephemeral(&ctx.http).await?;

        let Some(user_id) = option_value(command, "user").and_then(|v| v.as_user_id()) else {
            return edit(ctx, command, "ERROR: user is required.").await;
        };
        let balance = option_value(command, "balance").and_then(|v| v.as_i64()).unwrap_or(-1);
        if balance < 0 {
            return edit(ctx, command, "ERROR: Balance cannot be negative.").await;
        }

        let pool = self.state.db.pool();
        let user = user_id.to_user(&ctx.http).await?;

        match MemberRepository::create(pool, &user_id.to_string(), balance).await {
            Ok(_) => {}
            Err(DbError::MemberExists(_)) => {
                let existing = MemberRepository::get(pool, &user_id.to_string())
                    .await?
                    .map(|m| m.balance_gold)
                    .unwrap_or(0);
                return edit(
                    ctx,
                    command,
                    &format!(
                        "WARNING: Member already exists with **{}**. Use **/addbal**.",
                        format_gold(existing)
                    ),
                )
                .await;
            }
            Err(e) => return Err(e.into()),
        }

        let (total, tier_name) = self.synced_tier(ctx, command.guild_id, user_id).await?;
        let card = self
            .member_card_attachment(ctx, command.guild_id, &user, balance, total, tier_name)
            .await;

        if let Some(dm_card) = card.clone() {
            let dm = user
                .dm(
                    &ctx.http,
                    CreateMessage::new()
                        .content(
                            "Thank you for buying services from us. Here is your member card:",
                        )
                        .add_file(dm_card),
                )
                .await;
            if let Err(e) = dm {
                error!("Failed to DM member card to {}: {}", user_id, e);
            }
        }

        let mut response =
            EditInteractionResponse::new().content(format!("OK: Member created for <@{}>.", user_id));
        if let Some(card) = card {
            response = response.new_attachment(card);
        }
        command.edit_response(&ctx.http, response).await?;
        Ok(())
    }

    async fn cmd_addbal(&self, ctx: &Context, command: &CommandInteraction) -> CmdResult {
        command.defer_ephemeral(&ctx.http).await?;

        let Some(user_id) = option_value(command, "user").and_then(|v| v.as_user_id()) else {
            return edit(ctx, command, "ERROR: user is required.").await;
        };
        let amount = option_value(command, "amount").and_then(|v| v.as_i64()).unwrap_or(0);
        if amount <= 0 {
            return edit(ctx, command, "ERROR: Amount must be > 0.").await;
        }

        let member =
            match MemberRepository::credit(self.state.db.pool(), &user_id.to_string(), amount).await
            {
                Ok(m) => m,
                Err(DbError::MemberNotFound(_)) => {
                    return edit(
                        ctx,
                        command,
                        &format!("ERROR: No member record for <@{}>. Use **/mc** first.", user_id),
                    )
                    .await;
                }
                Err(e) => return Err(e.into()),
            };

        edit(
            ctx,
            command,
            &format!(
                "OK: Added **{}** to <@{}>. New balance: **{}**.",
                format_gold(amount),
                user_id,
                format_gold(member.balance_gold)
            ),
        )
        .await
    }

    async fn cmd_purchase(&self, ctx: &Context, command: &CommandInteraction) -> CmdResult {
        command.defer_ephemeral(&ctx.http).await?;

        let Some(user_id) = option_value(command, "user").and_then(|v| v.as_user_id()) else {
            return edit(ctx, command, "ERROR: user is required.").await;
        };
        let Some(details) = option_value(command, "details").and_then(|v| v.as_str()) else {
            return edit(ctx, command, "ERROR: details is required.").await;
        };
        let gold_cost = option_value(command, "gold_cost").and_then(|v| v.as_i64()).unwrap_or(0);
        if gold_cost <= 0 {
            return edit(ctx, command, "ERROR: gold_cost must be > 0.").await;
        }

        let pool = self.state.db.pool();
        let purchase = match PurchaseRepository::record(
            pool,
            &user_id.to_string(),
            PurchaseKind::Boost,
            details,
            gold_cost,
        )
        .await
        {
            Ok(p) => p,
            Err(DbError::MemberNotFound(_)) => {
                return edit(
                    ctx,
                    command,
                    &format!("ERROR: <@{}> has no member card. Use /mc first.", user_id),
                )
                .await;
            }
            Err(DbError::InsufficientBalance { have, need }) => {
                return edit(
                    ctx,
                    command,
                    &format!(
                        "ERROR: Not enough balance.\nCurrent: {}\nNeed: {}",
                        gold_pair(have),
                        gold_pair(need)
                    ),
                )
                .await;
            }
            Err(e) => return Err(e.into()),
        };

        let (total, tier_name) = self.synced_tier(ctx, command.guild_id, user_id).await?;

        // Buyer gets a tier-progress DM with a tip button
        let user = user_id.to_user(&ctx.http).await?;
        let user_label = format!("<@{}>", user_id);
        let dm = user
            .dm(
                &ctx.http,
                CreateMessage::new()
                    .embed(tier_progress_embed(total, tier_name, &user_label))
                    .components(vec![tip_button_row()]),
            )
            .await;
        if let Err(e) = dm {
            error!("Failed to DM tier progress to {}: {}", user_id, e);
        }

        command
            .edit_response(
                &ctx.http,
                EditInteractionResponse::new()
                    .embed(purchase_recorded_embed(&purchase, total, tier_name, &user_label))
                    .components(vec![tip_button_row()]),
            )
            .await?;
        Ok(())
    }

    async fn cmd_resetall(&self, ctx: &Context, command: &CommandInteraction) -> CmdResult {
        let Some(guild_id) = command.guild_id else {
            return reply(ctx, command, "ERROR: This command only works in a server.").await;
        };

        let Some(user_id) = option_value(command, "user").and_then(|v| v.as_user_id()) else {
            return reply(ctx, command, "ERROR: user is required.").await;
        };

        let pool = self.state.db.pool();
        let Some(member) = MemberRepository::get(pool, &user_id.to_string()).await? else {
            return reply(
                ctx,
                command,
                &format!("ERROR: No member record for <@{}>. Use **/mc** first.", user_id),
            )
            .await;
        };

        let token = uuid::Uuid::new_v4().to_string();
        self.state
            .set_pending_reset(
                &token,
                PendingReset {
                    requester_id: command.user.id.to_string(),
                    guild_id: guild_id.to_string(),
                    target_id: user_id.to_string(),
                    created_at: chrono::Utc::now(),
                },
            )
            .await;

        command
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new()
                        .content(format!(
                            "Confirm full reset for <@{}>?\n\
                             Current balance: {}\n\
                             This will delete member card, purchase history, and tier roles.",
                            user_id,
                            gold_pair(member.balance_gold)
                        ))
                        .components(vec![reset_buttons(&token)])
                        .ephemeral(true),
                ),
            )
            .await?;
        Ok(())
    }

    async fn cmd_history(&self, ctx: &Context, command: &CommandInteraction) -> CmdResult {
        command.defer_ephemeral(&ctx.http).await?;

        let purchases = PurchaseRepository::history(
            self.state.db.pool(),
            &command.user.id.to_string(),
            None,
        )
        .await?;
        if purchases.is_empty() {
            return edit(ctx, command, "No purchases yet.").await;
        }

        command
            .edit_response(
                &ctx.http,
                EditInteractionResponse::new().embed(
                    CreateEmbed::new()
                        .title("Your Purchase History (Last 10)")
                        .description(history_lines(&purchases)),
                ),
            )
            .await?;
        Ok(())
    }

    async fn cmd_historyuser(&self, ctx: &Context, command: &CommandInteraction) -> CmdResult {
        command.defer_ephemeral(&ctx.http).await?;

        let Some(user_id) = option_value(command, "user").and_then(|v| v.as_user_id()) else {
            return edit(ctx, command, "ERROR: user is required.").await;
        };

        let purchases =
            PurchaseRepository::history(self.state.db.pool(), &user_id.to_string(), None).await?;
        if purchases.is_empty() {
            return edit(ctx, command, &format!("No purchases for <@{}> yet.", user_id)).await;
        }

        let user = user_id.to_user(&ctx.http).await?;
        command
            .edit_response(
                &ctx.http,
                EditInteractionResponse::new().embed(
                    CreateEmbed::new()
                        .title(format!("Purchase History: {}", user.name))
                        .description(history_lines(&purchases)),
                ),
            )
            .await?;
        Ok(())
    }

    async fn cmd_who(&self, ctx: &Context, command: &CommandInteraction) -> CmdResult {
        command.defer_ephemeral(&ctx.http).await?;

        let Some(user_id) = option_value(command, "user").and_then(|v| v.as_user_id()) else {
            return edit(ctx, command, "ERROR: user is required.").await;
        };

        let pool = self.state.db.pool();
        let Some(member) = MemberRepository::get(pool, &user_id.to_string()).await? else {
            return edit(ctx, command, &format!("No member record for <@{}>.", user_id)).await;
        };

        let total = PurchaseRepository::total_spent(pool, &user_id.to_string()).await?;
        let stats = PurchaseRepository::stats(pool, &user_id.to_string()).await?;
        let tier = tier_for_total(total);
        let prog = progress(total);
        let last = stats
            .last_purchase_at
            .map(|t| format!("`{}`", t.format("%Y-%m-%d %H:%M:%S")))
            .unwrap_or_else(|| "None".to_string());

        let user = user_id.to_user(&ctx.http).await?;
        command
            .edit_response(
                &ctx.http,
                EditInteractionResponse::new().embed(
                    CreateEmbed::new()
                        .colour(Colour::new(tier.color))
                        .title(format!("Member Stats: {}", user.name))
                        .description(format!("<@{}>", user_id))
                        .field("Balance Remaining", gold_pair(member.balance_gold), true)
                        .field("Total Spent Gold", gold_pair(total), true)
                        .field("Tier", format!("**{} Tier**", tier.name), true)
                        .field("Purchases", stats.purchase_count.to_string(), true)
                        .field("Last Purchase", last, true)
                        .field("Next Tier Progress", prog.spend_text, false),
                ),
            )
            .await?;
        Ok(())
    }

    async fn cmd_me(&self, ctx: &Context, command: &CommandInteraction) -> CmdResult {
        command.defer_ephemeral(&ctx.http).await?;

        let pool = self.state.db.pool();
        let user_key = command.user.id.to_string();
        let Some(member) = MemberRepository::get(pool, &user_key).await? else {
            return edit(ctx, command, "ERROR: You don't have a member record yet.").await;
        };

        let total = PurchaseRepository::total_spent(pool, &user_key).await?;

        // In a guild the held role is authoritative for display; in DMs we
        // fall back to the spend-derived tier.
        let tier_name = match command.guild_id {
            Some(guild_id) => {
                let guild = guild_id.to_partial_guild(&ctx.http).await?;
                match guild_id.member(&ctx.http, command.user.id).await {
                    Ok(guild_member) => roles::tier_name_from_roles(&guild_member, &guild.roles),
                    Err(_) => tier_for_total(total).name,
                }
            }
            None => tier_for_total(total).name,
        };

        let card = self
            .member_card_attachment(
                ctx,
                command.guild_id,
                &command.user,
                member.balance_gold,
                total,
                tier_name,
            )
            .await;

        let mut response = EditInteractionResponse::new().components(vec![tip_button_row()]);
        match card {
            Some(card) => response = response.new_attachment(card),
            None => response = response.content("ERROR: Could not render your member card."),
        }
        command.edit_response(&ctx.http, response).await?;
        Ok(())
    }
}

/// Ephemeral first response
async fn reply(ctx: &Context, command: &CommandInteraction, content: &str) -> CmdResult {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

/// Edit of a deferred ephemeral response
async fn edit(ctx: &Context, command: &CommandInteraction, content: &str) -> CmdResult {
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
        .await?;
    Ok(())
}
