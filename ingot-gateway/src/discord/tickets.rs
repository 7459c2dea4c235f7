//! Ticket channel creation and archiving.

use serenity::builder::{CreateChannel, CreateMessage};
use serenity::model::channel::{
    ChannelType, PermissionOverwrite, PermissionOverwriteType,
};
use serenity::model::id::{ChannelId, GuildId, RoleId};
use serenity::model::permissions::Permissions;
use serenity::model::user::User;
use serenity::prelude::*;
use tracing::{info, warn};

use ingot_db::{DbError, PriceRepository, SettingsRepository, TicketKind, TicketRepository};

use crate::state::AppState;

const CHANNEL_NAME_MAX: usize = 90;

#[derive(Debug, thiserror::Error)]
pub(super) enum TicketError {
    #[error("Discord API error: {0}")]
    Discord(#[from] serenity::Error),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("Saved settings hold an invalid id: {0}")]
    BadSettings(String),
}

pub(super) enum TicketOutcome {
    Created(ChannelId),
    AlreadyOpen(ChannelId),
    NotConfigured,
}

/// `ticket-<kind>-<sanitized username>-<last 4 of id>`
pub(super) fn ticket_channel_name(kind: TicketKind, username: &str, user_id: &str) -> String {
    let safe: String = username
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    let safe = if safe.is_empty() { "buyer" } else { &safe };
    let suffix = &user_id[user_id.len().saturating_sub(4)..];
    let mut name = format!("ticket-{}-{}-{}", kind, safe, suffix);
    name.truncate(CHANNEL_NAME_MAX);
    name
}

/// Open a ticket channel for the buyer, enforcing one open ticket per kind
pub(super) async fn create_ticket(
    ctx: &Context,
    state: &AppState,
    guild_id: GuildId,
    buyer: &User,
    kind: TicketKind,
) -> Result<TicketOutcome, TicketError> {
    let pool = state.db.pool();
    let guild_key = guild_id.to_string();
    let buyer_key = buyer.id.to_string();

    let Some(settings) = SettingsRepository::get(pool, &guild_key).await? else {
        return Ok(TicketOutcome::NotConfigured);
    };

    // The index row wins unless its channel is gone (manually deleted);
    // stale rows are released so the buyer isn't locked out forever.
    if let Some(existing) = TicketRepository::find_open(pool, &guild_key, &buyer_key, kind).await? {
        let channel_id = existing.channel_id.parse::<u64>().ok().map(ChannelId::new);
        if let Some(channel_id) = channel_id {
            if channel_is_live(ctx, guild_id, channel_id, buyer).await {
                return Ok(TicketOutcome::AlreadyOpen(channel_id));
            }
        }
        warn!(
            "Open {} ticket for {} points at dead channel {}, releasing",
            kind, buyer_key, existing.channel_id
        );
        TicketRepository::release(pool, existing.id).await?;
    }

    let name = ticket_channel_name(kind, &buyer.name, &buyer_key);
    let category = ChannelId::new(
        settings
            .tickets_category_id
            .parse()
            .map_err(|_| TicketError::BadSettings(settings.tickets_category_id.clone()))?,
    );
    let overwrites = ticket_overwrites(ctx, guild_id, buyer).await?;

    let channel = guild_id
        .create_channel(
            &ctx.http,
            CreateChannel::new(name)
                .kind(ChannelType::Text)
                .category(category)
                .permissions(overwrites),
        )
        .await?;

    let welcome = match kind {
        TicketKind::Gold => {
            let price_text = match PriceRepository::get(pool, &guild_key).await? {
                Some(p) => format!("Current rate: **{} USD / 1M**", p.usd_per_1m),
                None => "Current rate: **Not set**".to_string(),
            };
            format!(
                "[GOLD] **Ticket Type: GOLD**\n\
                 Hi <@{}>! Thanks for your gold order.\n\
                 {}\n\n\
                 Please tell us:\n\
                 1) How many gold (e.g., 1M, 2M)\n\
                 2) Realm / region\n\
                 3) Delivery method (mail / face-to-face, etc.)",
                buyer.id, price_text
            )
        }
        TicketKind::Boost => format!(
            "[BOOST] **Ticket Type: BOOST**\n\
             Hi <@{}>! Let's set up your boost.\n\n\
             Please tell us:\n\
             1) Boost type (Mythic+ / Raid / etc.)\n\
             2) Details (e.g., 8 x +12)\n\
             3) Region/Realm + schedule/time\n\
             4) Any preferences (armor stack / traders / stream OFF, etc.)",
            buyer.id
        ),
    };
    channel
        .send_message(&ctx.http, CreateMessage::new().content(welcome))
        .await?;

    match TicketRepository::open(pool, &guild_key, &buyer_key, kind, &channel.id.to_string()).await
    {
        Ok(_) => {
            info!("Ticket channel {} created for {}", channel.id, buyer_key);
            Ok(TicketOutcome::Created(channel.id))
        }
        // Lost a race with a concurrent click; drop our channel and point
        // the buyer at the winner.
        Err(DbError::TicketAlreadyOpen { channel_id, .. }) => {
            match channel_id.parse::<u64>() {
                Ok(winner) => {
                    let _ = channel.delete(&ctx.http).await;
                    Ok(TicketOutcome::AlreadyOpen(ChannelId::new(winner)))
                }
                Err(_) => Ok(TicketOutcome::Created(channel.id)),
            }
        }
        Err(e) => Err(e.into()),
    }
}

/// The channel still exists and the buyer still has their view overwrite
async fn channel_is_live(
    ctx: &Context,
    guild_id: GuildId,
    channel_id: ChannelId,
    buyer: &User,
) -> bool {
    let Ok(channels) = guild_id.channels(&ctx.http).await else {
        return true; // can't verify, trust the index
    };
    let Some(channel) = channels.get(&channel_id) else {
        return false;
    };
    channel.permission_overwrites.iter().any(|ow| {
        ow.kind == PermissionOverwriteType::Member(buyer.id)
            && ow.allow.contains(Permissions::VIEW_CHANNEL)
    })
}

async fn ticket_overwrites(
    ctx: &Context,
    guild_id: GuildId,
    buyer: &User,
) -> serenity::Result<Vec<PermissionOverwrite>> {
    let guild = guild_id.to_partial_guild(&ctx.http).await?;
    let bot_id = ctx.http.get_current_user().await?.id;
    let everyone = RoleId::new(guild_id.get());

    let mut overwrites = vec![PermissionOverwrite {
        allow: Permissions::empty(),
        deny: Permissions::VIEW_CHANNEL,
        kind: PermissionOverwriteType::Role(everyone),
    }];

    for role in guild.roles.values() {
        if role.id == everyone {
            continue;
        }
        if role.permissions.administrator() || role.permissions.manage_guild() {
            overwrites.push(PermissionOverwrite {
                allow: Permissions::VIEW_CHANNEL
                    | Permissions::SEND_MESSAGES
                    | Permissions::READ_MESSAGE_HISTORY,
                deny: Permissions::empty(),
                kind: PermissionOverwriteType::Role(role.id),
            });
        } else {
            overwrites.push(PermissionOverwrite {
                allow: Permissions::empty(),
                deny: Permissions::VIEW_CHANNEL,
                kind: PermissionOverwriteType::Role(role.id),
            });
        }
    }

    overwrites.push(PermissionOverwrite {
        allow: Permissions::VIEW_CHANNEL
            | Permissions::SEND_MESSAGES
            | Permissions::READ_MESSAGE_HISTORY,
        deny: Permissions::empty(),
        kind: PermissionOverwriteType::Member(buyer.id),
    });
    overwrites.push(PermissionOverwrite {
        allow: Permissions::VIEW_CHANNEL
            | Permissions::SEND_MESSAGES
            | Permissions::MANAGE_CHANNELS
            | Permissions::READ_MESSAGE_HISTORY,
        deny: Permissions::empty(),
        kind: PermissionOverwriteType::Member(bot_id),
    });

    Ok(overwrites)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_name_sanitizes_username() {
        assert_eq!(
            ticket_channel_name(TicketKind::Gold, "Some User!", "123456789"),
            "ticket-gold-someuser-6789"
        );
    }

    #[test]
    fn test_channel_name_empty_username_falls_back() {
        assert_eq!(
            ticket_channel_name(TicketKind::Boost, "###", "42"),
            "ticket-boost-buyer-42"
        );
    }

    #[test]
    fn test_channel_name_capped() {
        let long = "a".repeat(200);
        let name = ticket_channel_name(TicketKind::Gold, &long, "123456789");
        assert_eq!(name.len(), CHANNEL_NAME_MAX);
    }
}
