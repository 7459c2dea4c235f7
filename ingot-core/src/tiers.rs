//! Buyer loyalty tiers.
//!
//! Tiers are derived from lifetime gold spend only; the remaining balance
//! never affects tier. Thresholds are strictly ordered and ties at an exact
//! threshold resolve to the higher tier ("highest qualifying tier wins").

use crate::gold::format_gold;

/// A loyalty bracket: display name, lifetime-spend threshold, embed color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tier {
    pub name: &'static str,
    pub min_gold: i64,
    pub color: u32,
}

/// Static ordered tier table, lowest threshold first.
pub const TIERS: [Tier; 4] = [
    Tier { name: "Common", min_gold: 0, color: 0x95a5a6 },
    Tier { name: "Rare", min_gold: 10_000_000, color: 0x3498db },
    Tier { name: "Epic", min_gold: 20_000_000, color: 0x9b59b6 },
    Tier { name: "Legendary", min_gold: 50_000_000, color: 0xf39c12 },
];

const REWARDS: [(&str, &str); 4] = [
    ("Common", "No tier reward yet."),
    ("Rare", "20% off one key for every 4 keys bundle."),
    ("Epic", "1 free key on 8 keys bundle."),
    (
        "Legendary",
        "5% discount on every gold purchase + 1 free key on 8 keys bundle.",
    ),
];

/// Highest tier whose threshold the total spend meets.
pub fn tier_for_total(total_gold: i64) -> &'static Tier {
    TIERS
        .iter()
        .rev()
        .find(|t| total_gold >= t.min_gold)
        .unwrap_or(&TIERS[0])
}

/// First tier whose threshold exceeds the total spend, if any.
pub fn next_tier(total_gold: i64) -> Option<&'static Tier> {
    TIERS.iter().find(|t| t.min_gold > total_gold)
}

/// Tier lookup by display name, falling back to Common for unknown names.
pub fn tier_by_name(name: &str) -> &'static Tier {
    TIERS.iter().find(|t| t.name == name).unwrap_or(&TIERS[0])
}

/// Static reward copy for a tier name.
pub fn reward_for(name: &str) -> &'static str {
    REWARDS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, r)| *r)
        .unwrap_or(REWARDS[0].1)
}

/// Progress text toward the next tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierProgress {
    pub next_tier_label: String,
    pub spend_text: String,
    pub next_reward: &'static str,
}

/// Compute next-tier progress copy for a total spend.
pub fn progress(total_gold: i64) -> TierProgress {
    match next_tier(total_gold) {
        Some(tier) => {
            let needed = tier.min_gold - total_gold;
            TierProgress {
                next_tier_label: format!("{} Tier", tier.name),
                spend_text: format!(
                    "Spend {} more to unlock {} Tier.",
                    format_gold(needed),
                    tier.name
                ),
                next_reward: reward_for(tier.name),
            }
        }
        None => TierProgress {
            next_tier_label: "Legendary Tier (Max)".to_string(),
            spend_text: "Highest tier already unlocked.".to_string(),
            next_reward: reward_for("Legendary"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_thresholds() {
        assert_eq!(tier_for_total(0).name, "Common");
        assert_eq!(tier_for_total(9_999_999).name, "Common");
        assert_eq!(tier_for_total(10_000_000).name, "Rare");
        assert_eq!(tier_for_total(19_999_999).name, "Rare");
        assert_eq!(tier_for_total(20_000_000).name, "Epic");
        assert_eq!(tier_for_total(50_000_000).name, "Legendary");
        assert_eq!(tier_for_total(i64::MAX).name, "Legendary");
    }

    #[test]
    fn test_tier_negative_total_clamps_to_common() {
        assert_eq!(tier_for_total(-1).name, "Common");
    }

    #[test]
    fn test_next_tier() {
        assert_eq!(next_tier(0).unwrap().name, "Rare");
        assert_eq!(next_tier(10_000_000).unwrap().name, "Epic");
        assert_eq!(next_tier(49_999_999).unwrap().name, "Legendary");
        assert!(next_tier(50_000_000).is_none());
    }

    #[test]
    fn test_progress_mid_tier() {
        let p = progress(12_000_000);
        assert_eq!(p.next_tier_label, "Epic Tier");
        assert_eq!(p.spend_text, "Spend 8M more to unlock Epic Tier.");
        assert_eq!(p.next_reward, reward_for("Epic"));
    }

    #[test]
    fn test_progress_max_tier() {
        let p = progress(60_000_000);
        assert_eq!(p.next_tier_label, "Legendary Tier (Max)");
        assert_eq!(p.spend_text, "Highest tier already unlocked.");
    }

    #[test]
    fn test_tier_by_name_unknown_falls_back() {
        assert_eq!(tier_by_name("Mythic").name, "Common");
        assert_eq!(tier_by_name("Legendary").color, 0xf39c12);
    }

    #[test]
    fn test_thresholds_strictly_ordered() {
        for pair in TIERS.windows(2) {
            assert!(pair[0].min_gold < pair[1].min_gold);
        }
    }
}
