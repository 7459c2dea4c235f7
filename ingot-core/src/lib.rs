//! ingot-core: pure domain logic for the Ingot shop bot.
//!
//! Holds the buyer tier table, gold amount formatting, and the environment
//! based configuration shared by the gateway binary. No I/O beyond env vars.

pub mod config;
pub mod gold;
pub mod tiers;

pub use config::{Config, ConfigError, load_dotenv};
pub use gold::{format_amount, format_gold};
pub use tiers::{TIERS, Tier, TierProgress, next_tier, progress, reward_for, tier_by_name, tier_for_total};
