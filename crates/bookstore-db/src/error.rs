//! # Database Error Types
//!
//! Error types for database operations and the settlement engine surface.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                │
//! │                                                                     │
//! │  SQLite error (sqlx::Error)                                         │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  DbError (this module) ← adds context and categorization            │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  SettlementError ← the taxonomy callers see:                        │
//! │    Validation / Conflict / NotFound / Transaction                   │
//! │                                                                     │
//! │  Every category is terminal for the current request; the caller     │
//! │  decides whether to resubmit.                                       │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use bookstore_core::{CoreError, VoucherRejection};

// =============================================================================
// Db Error
// =============================================================================

/// Database operation errors.
///
/// Wraps sqlx errors and provides additional context for debugging and
/// caller feedback.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation (voucher code, order number).
    #[error("duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A guarded update lost: the row exists but its current state
    /// rejected the change (for example a stock decrement below zero).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Database connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a Conflict error for a lost state guard.
    pub fn conflict(message: impl Into<String>) -> Self {
        DbError::Conflict(message.into())
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite constraint messages:
                //   "UNIQUE constraint failed: <table>.<column>"
                //   "FOREIGN KEY constraint failed"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Settlement Error
// =============================================================================

/// The error taxonomy surfaced by checkout, preview, transition, and
/// cancellation.
///
/// ## Categories
/// - `Validation` - bad input or ineligible voucher; nothing was mutated
/// - `Conflict` - a counter or state guard lost (insufficient stock,
///   exhausted voucher limits, terminal order status); nothing persists
/// - `NotFound` - referenced voucher, book, or order does not exist
/// - `Transaction` - unexpected persistence failure; the whole unit was
///   rolled back
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("transaction failed: {0}")]
    Transaction(String),
}

impl SettlementError {
    pub fn validation(message: impl Into<String>) -> Self {
        SettlementError::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        SettlementError::Conflict(message.into())
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        SettlementError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

/// Database failures inside a settlement unit surface as the taxonomy:
/// missing rows stay NotFound, lost guards stay Conflict, everything
/// else is a Transaction failure (the unit has been rolled back).
impl From<DbError> for SettlementError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => SettlementError::NotFound { entity, id },
            DbError::Conflict(message) => SettlementError::Conflict(message),
            other => {
                tracing::error!(error = %other, "settlement persistence failure");
                SettlementError::Transaction(other.to_string())
            }
        }
    }
}

impl From<sqlx::Error> for SettlementError {
    fn from(err: sqlx::Error) -> Self {
        SettlementError::from(DbError::from(err))
    }
}

impl From<CoreError> for SettlementError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::EmptyCart => SettlementError::validation("cart is empty"),
            CoreError::InsufficientStock { .. } => SettlementError::conflict(err.to_string()),
            CoreError::InvalidOrderStatus { .. } => SettlementError::conflict(err.to_string()),
            other => SettlementError::Validation(other.to_string()),
        }
    }
}

/// Voucher rejections map by category: exhausted limits are conflicts
/// (the same rejection a lost race produces), everything else is a
/// validation failure.
impl From<VoucherRejection> for SettlementError {
    fn from(rejection: VoucherRejection) -> Self {
        if rejection.is_limit_exhausted() {
            SettlementError::conflict(rejection.to_string())
        } else {
            SettlementError::validation(rejection.to_string())
        }
    }
}

/// Result type for settlement operations.
pub type SettlementResult<T> = Result<T, SettlementError>;

// =============================================================================
// Unit Tests
// =============================================================================
