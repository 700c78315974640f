//! # bookstore-db: Persistence and Settlement Layer
//!
//! This crate provides SQLite persistence for the bookstore settlement
//! engine, plus the transactional settlement surface itself. It uses
//! sqlx for async database operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Settlement Data Flow                              │
//! │                                                                         │
//! │  Caller (checkout / preview / transition / cancel)                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   bookstore-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │ Repositories  │    │  Settlement  │  │   │
//! │  │   │   (pool.rs)   │    │ (book, cart,  │    │   Engine     │  │   │
//! │  │   │               │    │  voucher,     │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│  order)       │◄───│ one tx per   │  │   │
//! │  │   │ Migrations    │    │               │    │ checkout     │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                          ▲                                     │
//! │       ▼                          │ pure pricing / eligibility          │
//! │  SQLite database            bookstore-core                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database and settlement error types
//! - [`repository`] - Repository implementations (book, cart, voucher, order)
//! - [`settlement`] - Checkout, voucher preview, transitions, cancellation
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bookstore_db::{Database, DbConfig};
//! use bookstore_db::settlement::{CartSource, CheckoutRequest};
//!
//! let db = Database::new(DbConfig::new("path/to/store.db")).await?;
//!
//! let order = db.settlement().checkout(CheckoutRequest {
//!     user_id: "u-1".into(),
//!     source: CartSource::StoredCart,
//!     voucher_code: Some("SAVE10".into()),
//!     shipping_fee_cents: 500,
//!     shipping_address_id: None,
//!     payment_method: Some("card".into()),
//!     notes: None,
//! }).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod settlement;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult, SettlementError, SettlementResult};
pub use pool::{Database, DbConfig};
pub use settlement::{CartSource, CheckoutRequest, RequestedLine, SettlementEngine, VoucherPreview};

// Repository re-exports for convenience
pub use repository::book::BookRepository;
pub use repository::cart::CartRepository;
pub use repository::order::{OrderHistoryEntry, OrderRepository};
pub use repository::voucher::VoucherRepository;
