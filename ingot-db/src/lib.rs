//! ingot-db: SQLite persistence for the Ingot shop bot.
//!
//! This crate provides database operations for:
//! - Member balance rows and the append-only purchase ledger
//! - Per-guild settings and gold price quotes
//! - The open-ticket index backing the one-ticket-per-kind rule

pub mod error;
pub mod ledger_db;
pub mod members;
pub mod prices;
pub mod purchases;
pub mod settings;
pub mod tickets;

// Re-export commonly used types
pub use error::{DbError, DbResult};
pub use ledger_db::LedgerDbPool;
pub use members::{Member, MemberRepository};
pub use prices::{Price, PriceRepository};
pub use purchases::{Purchase, PurchaseKind, PurchaseRepository, PurchaseStats};
pub use settings::{GuildSettings, SettingsRepository};
pub use tickets::{Ticket, TicketKind, TicketRepository, TicketStatus};

// Re-export test helpers when running tests or when test-helpers feature is enabled
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
