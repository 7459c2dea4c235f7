//! Tier role management.
//!
//! Tier roles are created on demand and named exactly after the tier table,
//! so membership can be read back from role names. Sync failures are logged
//! by callers and never fail the command that triggered them.

use std::collections::HashMap;

use serenity::builder::EditRole;
use serenity::model::Colour;
use serenity::model::guild::Member;
use serenity::model::id::{GuildId, RoleId, UserId};
use serenity::prelude::*;
use tracing::info;

use ingot_core::{TIERS, tier_for_total};

/// Create missing tier roles and re-color drifted ones; returns name -> id
pub(super) async fn ensure_tier_roles(
    ctx: &Context,
    guild_id: GuildId,
) -> serenity::Result<HashMap<&'static str, RoleId>> {
    let guild = guild_id.to_partial_guild(&ctx.http).await?;
    let mut role_map = HashMap::new();

    for tier in &TIERS {
        let existing = guild.roles.values().find(|r| r.name == tier.name);
        let role_id = match existing {
            Some(role) if role.colour.0 == tier.color => role.id,
            Some(role) => {
                guild_id
                    .edit_role(
                        &ctx.http,
                        role.id,
                        EditRole::new().colour(Colour::new(tier.color)),
                    )
                    .await?;
                role.id
            }
            None => {
                let role = guild_id
                    .create_role(
                        &ctx.http,
                        EditRole::new().name(tier.name).colour(Colour::new(tier.color)),
                    )
                    .await?;
                info!("Created tier role {} in guild {}", tier.name, guild_id);
                role.id
            }
        };
        role_map.insert(tier.name, role_id);
    }

    Ok(role_map)
}

/// Put the member on exactly the tier their lifetime spend earns
///
/// Returns the synced tier name.
pub(super) async fn sync_tier_role(
    ctx: &Context,
    guild_id: GuildId,
    user_id: UserId,
    total_spent: i64,
) -> serenity::Result<&'static str> {
    let member = guild_id.member(&ctx.http, user_id).await?;
    let role_map = ensure_tier_roles(ctx, guild_id).await?;
    let target = tier_for_total(total_spent);

    for tier in &TIERS {
        let Some(&role_id) = role_map.get(tier.name) else {
            continue;
        };
        if tier.name == target.name {
            continue;
        }
        if member.roles.contains(&role_id) {
            ctx.http
                .remove_member_role(guild_id, user_id, role_id, Some("Buyer tier changed"))
                .await?;
        }
    }

    if let Some(&target_role) = role_map.get(target.name) {
        if !member.roles.contains(&target_role) {
            ctx.http
                .add_member_role(guild_id, user_id, target_role, Some("Buyer tier sync"))
                .await?;
        }
    }

    Ok(target.name)
}

/// Strip every tier role from the member (full reset)
pub(super) async fn clear_tier_roles(
    ctx: &Context,
    guild_id: GuildId,
    user_id: UserId,
) -> serenity::Result<()> {
    let member = guild_id.member(&ctx.http, user_id).await?;
    let role_map = ensure_tier_roles(ctx, guild_id).await?;

    for tier in &TIERS {
        let Some(&role_id) = role_map.get(tier.name) else {
            continue;
        };
        if member.roles.contains(&role_id) {
            ctx.http
                .remove_member_role(guild_id, user_id, role_id, Some("Buyer full reset"))
                .await?;
        }
    }

    Ok(())
}

/// Tier name from the roles a member currently holds, highest first
pub(super) fn tier_name_from_roles(
    member: &Member,
    guild_roles: &HashMap<RoleId, serenity::model::guild::Role>,
) -> &'static str {
    for tier in TIERS.iter().rev() {
        let held = member.roles.iter().any(|rid| {
            guild_roles
                .get(rid)
                .map(|r| r.name == tier.name)
                .unwrap_or(false)
        });
        if held {
            return tier.name;
        }
    }
    "Common"
}
