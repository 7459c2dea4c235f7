//! Database error types.

/// Database operation errors
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// SQL error from sqlx
    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    /// Member not found
    #[error("Member not found: {0}")]
    MemberNotFound(String),

    /// Member already has a card
    #[error("Member already exists: {0}")]
    MemberExists(String),

    /// Debit would take the balance below zero
    #[error("Insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: i64, need: i64 },

    /// Buyer already has an open ticket of this kind
    #[error("Open {kind} ticket already exists in channel {channel_id}")]
    TicketAlreadyOpen { kind: String, channel_id: String },

    /// Config/data directory not found
    #[error("Config/data directory not found")]
    NoConfigDir,

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for database operations
pub type DbResult<T> = Result<T, DbError>;
