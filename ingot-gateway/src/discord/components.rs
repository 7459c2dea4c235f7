//! Button and modal-submit handlers.
//!
//! Custom ids are routed by the `ig:` prefix. Token-carrying ids
//! (`ig:rsc:`, `ig:rsx:`, `ig:pem:`) redeem their pending state entry with
//! owner, guild, and expiry checks before acting.

use serenity::builder::{
    CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage, CreateMessage,
};
use serenity::model::application::{
    ActionRowComponent, ComponentInteraction, ModalInteraction,
};
use serenity::model::id::{ChannelId, GuildId};
use serenity::prelude::*;
use tracing::error;

use ingot_core::{format_gold, progress, tier_for_total};
use ingot_db::{
    DbError, MemberRepository, PriceRepository, PurchaseKind, PurchaseRepository,
    SettingsRepository, TicketKind,
};

use super::bot::Bot;
use super::embeds::{self, gold_pair};
use super::roles;
use super::tickets::{self, TicketOutcome};
use super::CUSTOM_ID_PREFIX;

impl Bot {
    pub(super) async fn handle_component(&self, ctx: &Context, component: &ComponentInteraction) {
        let Some(action) = component.data.custom_id.strip_prefix(CUSTOM_ID_PREFIX) else {
            return;
        };

        let result = match action {
            "tip" => self.open_tip_modal(ctx, component).await,
            "price" => self.price_check(ctx, component).await,
            "notify" => self.notify_admin(ctx, component).await,
            "buy:gold" => self.buy_ticket(ctx, component, TicketKind::Gold).await,
            "buy:boost" => self.buy_ticket(ctx, component, TicketKind::Boost).await,
            _ => {
                if let Some(token) = action.strip_prefix("rsc:") {
                    self.reset_confirm(ctx, component, token, true).await
                } else if let Some(token) = action.strip_prefix("rsx:") {
                    self.reset_confirm(ctx, component, token, false).await
                } else {
                    Ok(())
                }
            }
        };

        if let Err(e) = result {
            error!("Component {} failed: {}", component.data.custom_id, e);
            let _ = component
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .content("ERROR: Something went wrong.")
                            .ephemeral(true),
                    ),
                )
                .await;
        }
    }

    pub(super) async fn handle_modal(&self, ctx: &Context, modal: &ModalInteraction) {
        let Some(action) = modal.data.custom_id.strip_prefix(CUSTOM_ID_PREFIX) else {
            return;
        };

        let result = match action {
            "tipm" => self.tip_submit(ctx, modal).await,
            "ptm" => self.publish_text_submit(ctx, modal).await,
            _ => match action.strip_prefix("pem:") {
                Some(token) => self.publish_embed_submit(ctx, modal, token).await,
                None => Ok(()),
            },
        };

        if let Err(e) = result {
            error!("Modal {} failed: {}", modal.data.custom_id, e);
            let _ = modal_reply(ctx, modal, "ERROR: Something went wrong.").await;
        }
    }

    async fn open_tip_modal(
        &self,
        ctx: &Context,
        component: &ComponentInteraction,
    ) -> serenity::Result<()> {
        component
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Modal(embeds::tip_modal()),
            )
            .await
    }

    async fn price_check(
        &self,
        ctx: &Context,
        component: &ComponentInteraction,
    ) -> serenity::Result<()> {
        let price = match component.guild_id {
            Some(guild_id) => PriceRepository::get(self.state.db.pool(), &guild_id.to_string())
                .await
                .unwrap_or_else(|e| {
                    error!("Price lookup failed: {}", e);
                    None
                }),
            None => None,
        };

        let Some(price) = price else {
            return component_reply(
                ctx,
                component,
                "WARNING: Price not set yet. Admin run `/goldprice`.",
            )
            .await;
        };

        let stale_line = if price.is_stale() {
            "\nWARNING: This price is older than 1 day and may have changed."
        } else {
            "\nOK: Price was updated within the last 24 hours."
        };
        component_reply(
            ctx,
            component,
            &format!(
                "Gold Current Rate: **{} USD / 1M**\nLast updated: `{}`{}",
                price.usd_per_1m,
                price.updated_at.format("%Y-%m-%d %H:%M:%S"),
                stale_line
            ),
        )
        .await
    }

    async fn notify_admin(
        &self,
        ctx: &Context,
        component: &ComponentInteraction,
    ) -> serenity::Result<()> {
        let Some(guild_id) = component.guild_id else {
            return component_reply(
                ctx,
                component,
                "ERROR: This button only works inside a server channel.",
            )
            .await;
        };

        let settings = SettingsRepository::get(self.state.db.pool(), &guild_id.to_string())
            .await
            .unwrap_or_else(|e| {
                error!("Settings lookup failed: {}", e);
                None
            });
        let order_channel = settings
            .and_then(|s| s.order_channel_id.parse::<u64>().ok())
            .map(ChannelId::new);
        let Some(order_channel) = order_channel else {
            return component_reply(
                ctx,
                component,
                "ERROR: Setup not found. Ask admin to run `/setup`.",
            )
            .await;
        };

        let sent = order_channel
            .send_message(
                &ctx.http,
                CreateMessage::new().content(format!(
                    "Price update request from <@{}> in <#{}>. \
                     Please confirm the latest gold rate.",
                    component.user.id, component.channel_id
                )),
            )
            .await;
        if sent.is_err() {
            return component_reply(ctx, component, "ERROR: Admin notify channel is unavailable.")
                .await;
        }

        component_reply(
            ctx,
            component,
            "OK: Admin has been notified for updated pricing.",
        )
        .await
    }

    async fn buy_ticket(
        &self,
        ctx: &Context,
        component: &ComponentInteraction,
        kind: TicketKind,
    ) -> serenity::Result<()> {
        let Some(guild_id) = component.guild_id else {
            return component_reply(
                ctx,
                component,
                "ERROR: This button only works inside a server channel.",
            )
            .await;
        };

        component.defer_ephemeral(&ctx.http).await?;

        let outcome =
            tickets::create_ticket(ctx, &self.state, guild_id, &component.user, kind).await;
        let content = match outcome {
            Ok(TicketOutcome::Created(channel)) => {
                let label = match kind {
                    TicketKind::Gold => "Gold",
                    TicketKind::Boost => "Boost",
                };
                format!("OK: {} ticket created: <#{}>", label, channel)
            }
            Ok(TicketOutcome::AlreadyOpen(channel)) => format!(
                "WARNING: You already have an active {} ticket: <#{}>",
                kind.to_string().to_uppercase(),
                channel
            ),
            Ok(TicketOutcome::NotConfigured) => {
                "ERROR: Bot not setup yet. Admin must run `/setup`.".to_string()
            }
            Err(e) => {
                error!("Failed to create {} ticket: {}", kind, e);
                format!(
                    "ERROR: Failed to create {} ticket. Check bot permissions & category.",
                    kind.to_string().to_uppercase()
                )
            }
        };

        component
            .edit_response(
                &ctx.http,
                serenity::builder::EditInteractionResponse::new().content(content),
            )
            .await?;
        Ok(())
    }

    async fn reset_confirm(
        &self,
        ctx: &Context,
        component: &ComponentInteraction,
        token: &str,
        confirm: bool,
    ) -> serenity::Result<()> {
        let Some(pending) = self.state.peek_pending_reset(token).await else {
            return component_reply(ctx, component, "ERROR: This reset request is expired or invalid.")
                .await;
        };

        if pending.requester_id != component.user.id.to_string() {
            return component_reply(
                ctx,
                component,
                "ERROR: Only the admin who started this reset can confirm it.",
            )
            .await;
        }
        if Some(pending.guild_id.as_str())
            != component.guild_id.map(|g| g.to_string()).as_deref()
        {
            return component_reply(
                ctx,
                component,
                "ERROR: This reset request belongs to another server.",
            )
            .await;
        }

        // Checks passed, burn the token
        let Some(pending) = self.state.take_pending_reset(token).await else {
            return component_reply(
                ctx,
                component,
                "ERROR: Reset confirmation timed out. Run /resetall again.",
            )
            .await;
        };

        if !confirm {
            return component_update(ctx, component, "OK: Reset canceled.").await;
        }

        let pool = self.state.db.pool();
        let member = match MemberRepository::get(pool, &pending.target_id).await {
            Ok(Some(m)) => m,
            Ok(None) => {
                return component_update(ctx, component, "ERROR: Member record no longer exists.")
                    .await;
            }
            Err(e) => {
                error!("Member lookup failed during reset: {}", e);
                return component_update(ctx, component, "ERROR: Something went wrong.").await;
            }
        };

        let deleted = match reset_member(pool, &pending.target_id).await {
            Ok(count) => count,
            Err(e) => {
                error!("Reset failed for {}: {}", pending.target_id, e);
                return component_update(ctx, component, "ERROR: Something went wrong.").await;
            }
        };

        if let Some(guild_id) = component.guild_id {
            if let Ok(user_id) = pending.target_id.parse::<u64>() {
                if let Err(e) = roles::clear_tier_roles(
                    ctx,
                    guild_id,
                    serenity::model::id::UserId::new(user_id),
                )
                .await
                {
                    error!("Failed to clear tier roles for {}: {}", pending.target_id, e);
                }
            }
        }

        component_update(
            ctx,
            component,
            &format!(
                "OK: Member record deleted.\n\
                 OK: Total Spent Gold reset to **0**.\n\
                 Deleted purchase records: **{}**.\n\
                 Previous balance: {}\n\
                 Tier roles removed.",
                deleted,
                gold_pair(member.balance_gold)
            ),
        )
        .await
    }

    async fn tip_submit(&self, ctx: &Context, modal: &ModalInteraction) -> serenity::Result<()> {
        let amount_raw = modal_field(modal, "amount");
        let note = modal_field(modal, "note");

        let amount = amount_raw.trim().parse::<i64>().unwrap_or(0);
        if amount <= 0 {
            return modal_reply(ctx, modal, "ERROR: Tip amount must be a positive integer.").await;
        }

        let pool = self.state.db.pool();
        let user_key = modal.user.id.to_string();
        let details = if note.trim().is_empty() {
            "Tip".to_string()
        } else {
            format!("Tip: {}", note.trim())
        };

        let purchase =
            match PurchaseRepository::record(pool, &user_key, PurchaseKind::Tip, &details, amount)
                .await
            {
                Ok(p) => p,
                Err(DbError::MemberNotFound(_)) => {
                    return modal_reply(ctx, modal, "ERROR: You don't have a member record yet.")
                        .await;
                }
                Err(DbError::InsufficientBalance { have, need }) => {
                    return modal_reply(
                        ctx,
                        modal,
                        &format!(
                            "ERROR: Not enough balance to tip.\nCurrent: {}\nNeed: {}",
                            gold_pair(have),
                            gold_pair(need)
                        ),
                    )
                    .await;
                }
                Err(e) => {
                    error!("Tip record failed for {}: {}", user_key, e);
                    return modal_reply(ctx, modal, "ERROR: Something went wrong.").await;
                }
            };

        let total = PurchaseRepository::total_spent(pool, &user_key)
            .await
            .unwrap_or(0);
        let mut tier_name = tier_for_total(total).name;

        // Tips can arrive from DMs; fall back to the home guild for role sync
        let sync_guild = modal
            .guild_id
            .or(self.state.config.home_guild_id.map(GuildId::new));
        if let Some(guild_id) = sync_guild {
            match roles::sync_tier_role(ctx, guild_id, modal.user.id, total).await {
                Ok(name) => tier_name = name,
                Err(e) => error!("Failed to sync tier after tip: {}", e),
            }
        }

        let prog = progress(total);
        modal_reply(
            ctx,
            modal,
            &format!(
                "OK: Tip recorded: **-{}**\n\
                 Balance: {}\n\
                 Tier: **{} Tier**\n\
                 Next Tier: **{}**\n\
                 {}",
                format_gold(amount),
                gold_pair(purchase.balance_after),
                tier_name,
                prog.next_tier_label,
                prog.spend_text
            ),
        )
        .await
    }

    async fn publish_text_submit(
        &self,
        ctx: &Context,
        modal: &ModalInteraction,
    ) -> serenity::Result<()> {
        if !modal_is_manager(modal) {
            return modal_reply(ctx, modal, "ERROR: No permission.").await;
        }
        if modal.guild_id.is_none() {
            return modal_reply(
                ctx,
                modal,
                "ERROR: This form must be submitted in a text channel.",
            )
            .await;
        }

        let content = modal_field(modal, "content");
        let tts = parse_boolean_like(&modal_field(modal, "tts"));

        let sent = modal
            .channel_id
            .send_message(&ctx.http, CreateMessage::new().content(content).tts(tts))
            .await?;
        modal_reply(ctx, modal, &format!("OK: Text published.\n{}", sent.link())).await
    }

    async fn publish_embed_submit(
        &self,
        ctx: &Context,
        modal: &ModalInteraction,
        token: &str,
    ) -> serenity::Result<()> {
        if !modal_is_manager(modal) {
            return modal_reply(ctx, modal, "ERROR: No permission.").await;
        }

        let Some(draft) = self.state.peek_embed_draft(token).await else {
            return modal_reply(ctx, modal, "ERROR: Embed draft expired. Run /publishembed again.")
                .await;
        };
        if draft.author_id != modal.user.id.to_string() {
            return modal_reply(ctx, modal, "ERROR: Only the command user can submit this form.")
                .await;
        }
        if Some(draft.guild_id.as_str()) != modal.guild_id.map(|g| g.to_string()).as_deref() {
            return modal_reply(ctx, modal, "ERROR: This draft belongs to another server.").await;
        }
        let Some(draft) = self.state.take_embed_draft(token).await else {
            return modal_reply(ctx, modal, "ERROR: Draft timed out. Run /publishembed again.")
                .await;
        };

        let title = modal_field(modal, "title");
        let description = modal_field(modal, "description");
        let fields_raw = modal_field(modal, "fields_raw");
        let message_text = modal_field(modal, "message_text");

        let mut fields = Vec::new();
        let lines: Vec<&str> = fields_raw
            .lines()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect();
        if lines.len() > 10 {
            return modal_reply(ctx, modal, "ERROR: Maximum 10 field lines.").await;
        }
        for line in lines {
            let parts: Vec<&str> = line.split('|').map(|p| p.trim()).collect();
            if parts.len() < 2 || parts[0].is_empty() || parts[1].is_empty() {
                return modal_reply(
                    ctx,
                    modal,
                    "ERROR: Field line format must be: Name | Value | inline(optional yes/no)",
                )
                .await;
            }
            let inline = parts.get(2).map(|p| parse_boolean_like(p)).unwrap_or(false);
            fields.push((parts[0].to_string(), parts[1].to_string(), inline));
        }

        let mut embed = CreateEmbed::new()
            .title(title)
            .description(description)
            .colour(0x3498db);
        for (name, value, inline) in fields {
            embed = embed.field(name, value, inline);
        }
        if !message_text.trim().is_empty() {
            embed = embed.field("Additional Text", message_text.trim().to_string(), false);
        }
        if let Some(url) = &draft.image_url {
            embed = embed.image(url);
        }
        if let Some(guild_id) = modal.guild_id {
            if let Ok(guild) = guild_id.to_partial_guild(&ctx.http).await {
                if let Some(icon) = guild.icon_url() {
                    embed = embed.thumbnail(icon);
                }
            }
        }

        let target = draft
            .channel_id
            .parse::<u64>()
            .ok()
            .map(ChannelId::new);
        let Some(target) = target else {
            return modal_reply(ctx, modal, "ERROR: Target channel unavailable.").await;
        };
        let sent = match target
            .send_message(&ctx.http, CreateMessage::new().embed(embed))
            .await
        {
            Ok(m) => m,
            Err(_) => {
                return modal_reply(ctx, modal, "ERROR: Target channel unavailable.").await;
            }
        };

        modal_reply(ctx, modal, &format!("OK: Embed published.\n{}", sent.link())).await
    }
}

/// Full reset: purge the ledger first, then the member row
async fn reset_member(pool: &sqlx::SqlitePool, discord_id: &str) -> Result<u64, DbError> {
    let deleted = PurchaseRepository::delete_for_member(pool, discord_id).await?;
    MemberRepository::delete(pool, discord_id).await?;
    Ok(deleted)
}

fn modal_is_manager(modal: &ModalInteraction) -> bool {
    modal
        .member
        .as_ref()
        .and_then(|m| m.permissions)
        .map(|p| p.administrator() || p.manage_guild())
        .unwrap_or(false)
}

/// Value of a named text input in a submitted modal
fn modal_field(modal: &ModalInteraction, custom_id: &str) -> String {
    for row in &modal.data.components {
        for component in &row.components {
            if let ActionRowComponent::InputText(input) = component {
                if input.custom_id == custom_id {
                    return input.value.clone().unwrap_or_default();
                }
            }
        }
    }
    String::new()
}

fn parse_boolean_like(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "yes" | "y" | "true" | "1" | "on"
    )
}

async fn component_reply(
    ctx: &Context,
    component: &ComponentInteraction,
    content: &str,
) -> serenity::Result<()> {
    component
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(true),
            ),
        )
        .await
}

/// Replace the confirmation message in place, removing its buttons
async fn component_update(
    ctx: &Context,
    component: &ComponentInteraction,
    content: &str,
) -> serenity::Result<()> {
    component
        .create_response(
            &ctx.http,
            CreateInteractionResponse::UpdateMessage(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .components(vec![]),
            ),
        )
        .await
}

async fn modal_reply(
    ctx: &Context,
    modal: &ModalInteraction,
    content: &str,
) -> serenity::Result<()> {
    modal
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(true),
            ),
        )
        .await
}

#[cfg(test)]
mod tests {
    use super::parse_boolean_like;

    #[test]
    fn test_parse_boolean_like() {
        assert!(parse_boolean_like("Yes"));
        assert!(parse_boolean_like(" true "));
        assert!(parse_boolean_like("1"));
        assert!(!parse_boolean_like("no"));
        assert!(!parse_boolean_like(""));
    }
}
