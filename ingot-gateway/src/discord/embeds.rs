//! Embed, button, and modal builders shared across commands and components.

use serenity::builder::{
    CreateActionRow, CreateButton, CreateEmbed, CreateInputText, CreateModal,
};
use serenity::model::Colour;
use serenity::model::application::{ButtonStyle, InputTextStyle};

use ingot_core::{format_amount, format_gold, progress, reward_for, tier_by_name};
use ingot_db::{Price, Purchase};

/// Gold amount rendered both short and exact: `**12M** (12,000,000)`
pub(super) fn gold_pair(n: i64) -> String {
    format!("**{}** ({})", format_gold(n), format_amount(n))
}

pub(super) fn order_panel_embed() -> CreateEmbed {
    CreateEmbed::new().title("Orders").description(
        "Use the buttons below:\n\
         - **Gold Price Check** = see latest gold rate\n\
         - **Buy Gold** = open a gold ticket\n\
         - **Buy Boost** = open a boost ticket",
    )
}

pub(super) fn order_panel_buttons() -> CreateActionRow {
    CreateActionRow::Buttons(vec![
        CreateButton::new("ig:price")
            .label("Gold Price Check")
            .style(ButtonStyle::Secondary),
        CreateButton::new("ig:buy:gold")
            .label("Buy Gold")
            .style(ButtonStyle::Success),
        CreateButton::new("ig:buy:boost")
            .label("Buy Boost")
            .style(ButtonStyle::Primary),
    ])
}

pub(super) fn price_panel_embed(price: Option<&Price>) -> CreateEmbed {
    let stale = price.map(|p| p.is_stale()).unwrap_or(true);
    let price_text = match price {
        Some(p) => format!("**{} USD / 1M**", p.usd_per_1m),
        None => "**Not set yet**".to_string(),
    };
    let updated_text = match price {
        Some(p) => format!("`{}`", p.updated_at.format("%Y-%m-%d %H:%M:%S")),
        None => "`Not set`".to_string(),
    };

    CreateEmbed::new()
        .title("Gold Price Check")
        .colour(if stale { 0xf1c40f } else { 0x2ecc71 })
        .description(format!(
            "Current price: {}\nLast updated: {}\n\n\
             Note: Prices not updated within **1 day** are subject to change.\n\
             Please DM admin or click **Notify Admin** for the latest confirmed rate.",
            price_text, updated_text
        ))
}

pub(super) fn price_panel_buttons() -> CreateActionRow {
    CreateActionRow::Buttons(vec![
        CreateButton::new("ig:price")
            .label("Check Current Price")
            .style(ButtonStyle::Secondary),
        CreateButton::new("ig:notify")
            .label("Notify Admin")
            .style(ButtonStyle::Primary),
    ])
}

pub(super) fn tip_button_row() -> CreateActionRow {
    CreateActionRow::Buttons(vec![
        CreateButton::new("ig:tip")
            .label("Tip Gold")
            .style(ButtonStyle::Secondary),
    ])
}

pub(super) fn reset_buttons(token: &str) -> CreateActionRow {
    CreateActionRow::Buttons(vec![
        CreateButton::new(format!("ig:rsc:{token}"))
            .label("Confirm Reset")
            .style(ButtonStyle::Danger),
        CreateButton::new(format!("ig:rsx:{token}"))
            .label("Cancel")
            .style(ButtonStyle::Secondary),
    ])
}

pub(super) fn tip_modal() -> CreateModal {
    CreateModal::new("ig:tipm", "Tip Gold").components(vec![
        CreateActionRow::InputText(
            CreateInputText::new(InputTextStyle::Short, "Tip amount (gold integer)", "amount")
                .required(true)
                .placeholder("1000000"),
        ),
        CreateActionRow::InputText(
            CreateInputText::new(InputTextStyle::Short, "Note (optional)", "note")
                .required(false)
                .max_length(200),
        ),
    ])
}

pub(super) fn publish_text_modal() -> CreateModal {
    CreateModal::new("ig:ptm", "Publish Text").components(vec![
        CreateActionRow::InputText(
            CreateInputText::new(InputTextStyle::Paragraph, "Message content", "content")
                .required(true),
        ),
        CreateActionRow::InputText(
            CreateInputText::new(InputTextStyle::Short, "TTS? (yes/no)", "tts").required(false),
        ),
    ])
}

pub(super) fn publish_embed_modal(token: &str) -> CreateModal {
    CreateModal::new(format!("ig:pem:{token}"), "Publish Embed").components(vec![
        CreateActionRow::InputText(
            CreateInputText::new(InputTextStyle::Short, "Title", "title").required(true),
        ),
        CreateActionRow::InputText(
            CreateInputText::new(InputTextStyle::Paragraph, "Description", "description")
                .required(true),
        ),
        CreateActionRow::InputText(
            CreateInputText::new(
                InputTextStyle::Paragraph,
                "Fields (one per line: Name | Value | inline)",
                "fields_raw",
            )
            .required(false),
        ),
        CreateActionRow::InputText(
            CreateInputText::new(
                InputTextStyle::Paragraph,
                "Text below fields (optional)",
                "message_text",
            )
            .required(false),
        ),
    ])
}

/// The tier-progress embed DMed to buyers after a purchase
pub(super) fn tier_progress_embed(
    total_gold: i64,
    tier_name: &str,
    user_label: &str,
) -> CreateEmbed {
    let tier = tier_by_name(tier_name);
    let prog = progress(total_gold);
    let embed = CreateEmbed::new()
        .title("Tier Progress")
        .colour(Colour::new(tier.color));

    if ingot_core::next_tier(total_gold).is_none() {
        return embed
            .description(format!(
                "Thank you {} for buying boost from us.\n\
                 Total bought: {} ({})\n\
                 You have unlocked Legendary Tier.",
                user_label,
                format_gold(total_gold),
                format_amount(total_gold)
            ))
            .field("Current Tier", format!("**{} Tier**", tier_name), true)
            .field("Status", "Highest tier unlocked.", true)
            .field("Current Reward", reward_for("Legendary"), false);
    }

    embed
        .description(format!(
            "Thank you {} for buying boost from us.\n\
             Total bought: {} ({})\n\
             {}",
            user_label,
            format_gold(total_gold),
            format_amount(total_gold),
            prog.spend_text
        ))
        .field("Current Tier", format!("**{} Tier**", tier_name), true)
        .field("Current Reward", reward_for(tier_name), false)
        .field("Next Tier", format!("**{}**", prog.next_tier_label), true)
        .field("Next Reward", prog.next_reward, false)
}

/// The admin-facing summary for a recorded purchase
pub(super) fn purchase_recorded_embed(
    purchase: &Purchase,
    total_gold: i64,
    tier_name: &str,
    user_label: &str,
) -> CreateEmbed {
    let prog = progress(total_gold);
    CreateEmbed::new()
        .title("OK: Purchase Recorded")
        .description(user_label.to_string())
        .field("Type", purchase.kind.to_string().to_uppercase(), true)
        .field("Details", purchase.details.clone(), false)
        .field(
            "Deducted",
            format!(
                "-{} ({})",
                format_gold(purchase.gold_cost),
                format_amount(purchase.gold_cost)
            ),
            false,
        )
        .field("Balance After", gold_pair(purchase.balance_after), false)
        .field("Total Bought", gold_pair(total_gold), false)
        .field("Tier", format!("**{} Tier**", tier_name), true)
        .field("Current Reward", reward_for(tier_name), false)
        .field("Next Tier", format!("**{}**", prog.next_tier_label), true)
        .field("Next Reward", prog.next_reward, false)
        .field("Progress", prog.spend_text, false)
}

/// One line per ledger row, newest first
pub(super) fn history_lines(purchases: &[Purchase]) -> String {
    purchases
        .iter()
        .enumerate()
        .map(|(i, p)| {
            format!(
                "**{}.** [{}] {} - -{} | bal: {}\n`{}`",
                i + 1,
                p.kind.to_string().to_uppercase(),
                p.details,
                format_gold(p.gold_cost),
                format_gold(p.balance_after),
                p.created_at.format("%Y-%m-%d %H:%M:%S")
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ingot_db::PurchaseKind;

    #[test]
    fn test_gold_pair() {
        assert_eq!(gold_pair(12_000_000), "**12M** (12,000,000)");
    }

    #[test]
    fn test_history_lines_numbering() {
        let purchases = vec![
            Purchase {
                id: 2,
                discord_id: "1".to_string(),
                kind: PurchaseKind::Tip,
                details: "Tip".to_string(),
                gold_cost: 500_000,
                balance_after: 1_500_000,
                created_at: Utc::now(),
            },
            Purchase {
                id: 1,
                discord_id: "1".to_string(),
                kind: PurchaseKind::Boost,
                details: "8 x +12".to_string(),
                gold_cost: 4_000_000,
                balance_after: 2_000_000,
                created_at: Utc::now(),
            },
        ];

        let lines = history_lines(&purchases);
        assert!(lines.starts_with("**1.** [TIP] Tip"));
        assert!(lines.contains("**2.** [BOOST] 8 x +12"));
    }
}
