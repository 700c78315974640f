//! # bookstore-core: Pure Business Logic for the Settlement Engine
//!
//! This crate is the **heart** of the bookstore checkout. It contains all
//! business logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    Bookstore Architecture                           │
//! │                                                                     │
//! │  ┌─────────────────────────────────────────────────────────────┐   │
//! │  │       Callers (HTTP handlers, admin tooling - external)     │   │
//! │  └────────────────────────────┬────────────────────────────────┘   │
//! │                               │                                     │
//! │  ┌────────────────────────────▼────────────────────────────────┐   │
//! │  │            ★ bookstore-core (THIS CRATE) ★                  │   │
//! │  │                                                             │   │
//! │  │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │   │
//! │  │  │  types  │ │  money  │ │ voucher │ │ pricing │           │   │
//! │  │  │  Book   │ │  Money  │ │ eligib. │ │ totals  │           │   │
//! │  │  │  Order  │ │  cents  │ │ rules   │ │         │           │   │
//! │  │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │   │
//! │  │                                                             │   │
//! │  │  NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS         │   │
//! │  └────────────────────────────┬────────────────────────────────┘   │
//! │                               │                                     │
//! │  ┌────────────────────────────▼────────────────────────────────┐   │
//! │  │              bookstore-db (Database Layer)                  │   │
//! │  │    SQLite repositories, migrations, the checkout tx         │   │
//! │  └─────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Book, Voucher, Order, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`voucher`] - Voucher eligibility evaluation and discount policy
//! - [`pricing`] - Order total calculation
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Design Principles
//!
//! 1. **Pure functions**: same input = same output (the evaluation instant
//!    is an explicit argument, never read from the clock)
//! 2. **No I/O**: database, network, file system access is FORBIDDEN here
//! 3. **Integer money**: all monetary values are in cents (i64)
//! 4. **Explicit errors**: all errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod pricing;
pub mod types;
pub mod validation;
pub mod voucher;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use pricing::{order_total, PricingBreakdown};
pub use types::*;
pub use validation::{validate_price_cents, validate_quantity, validate_voucher_code};
pub use voucher::{evaluate_voucher, VoucherBenefit, VoucherRejection};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity of a single book in one cart line.
///
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_LINE_QUANTITY: i64 = 999;

/// Maximum distinct lines allowed in a single checkout.
pub const MAX_CART_LINES: usize = 100;
