//! # Domain Types
//!
//! Core domain types for the bookstore settlement engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                │
//! │                                                                     │
//! │  ┌───────────────┐   ┌───────────────┐   ┌───────────────┐         │
//! │  │     Book      │   │    Voucher    │   │     Order     │         │
//! │  │  ───────────  │   │  ───────────  │   │  ───────────  │         │
//! │  │  id (UUID)    │   │  id (UUID)    │   │  id (UUID)    │         │
//! │  │  price_cents  │   │  code (biz)   │   │  order_number │         │
//! │  │  stock_qty    │   │  used_count   │   │  status       │         │
//! │  │  sold_qty     │   │  usage_limit  │   │  total_cents  │         │
//! │  └───────────────┘   └───────────────┘   └───────────────┘         │
//! │                                                                     │
//! │  CartLine ──(checkout)──► OrderLine (frozen price snapshot)         │
//! │  Voucher ──(checkout)───► VoucherUsage (append-only audit row)      │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID where one exists: voucher `code`, `order_number`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Book
// =============================================================================

/// A book in the catalog.
///
/// The catalog owns creation and editing; the settlement engine only reads
/// prices and mutates the two inventory counters (`stock_quantity`,
/// `sold_quantity`) inside checkout and cancellation transactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display title, snapshotted onto order lines at checkout.
    pub title: String,

    /// Category this book belongs to, used by voucher inclusion and
    /// exclusion lists.
    pub category_id: Option<String>,

    /// Unit price in cents.
    pub price_cents: i64,

    /// Units currently in stock. Never negative.
    pub stock_quantity: i64,

    /// Units sold across all committed orders. Never negative.
    pub sold_quantity: i64,

    /// Whether the book can still be purchased (soft delete).
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Returns the unit price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Checks whether the requested quantity could be fulfilled from the
    /// current counter. The authoritative check is the guarded UPDATE in
    /// the checkout transaction; this is a cheap pre-flight read.
    pub fn has_stock(&self, quantity: i64) -> bool {
        self.stock_quantity >= quantity
    }
}

// =============================================================================
// Cart Line
// =============================================================================

/// A priced cart line, produced by the cart snapshot loader.
///
/// Carries the book fields the evaluator and assembler need (price,
/// category, title) so that no further catalog reads happen after the
/// snapshot is taken.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub book_id: String,
    /// Book title at snapshot time, copied onto the order line.
    pub title: String,
    /// Category at snapshot time, used for voucher filtering.
    pub category_id: Option<String>,
    /// Quantity requested. Always > 0.
    pub quantity: i64,
    /// Unit price in cents at snapshot time.
    pub unit_price_cents: i64,
}

impl CartLine {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Line total: unit price × quantity. Exact integer math, no rounding.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }
}

/// Sums line totals into a cart subtotal.
pub fn cart_subtotal(lines: &[CartLine]) -> Money {
    lines.iter().map(|l| l.line_total()).sum()
}

// =============================================================================
// Discount Kind
// =============================================================================

/// How a voucher's `discount_value` is interpreted.
///
/// The original data model stored this as a free-form string column; a
/// typed enum makes the "unknown discount kind" configuration error
/// unrepresentable past the database boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    /// `discount_value` is in basis points (1000 = 10% off the eligible
    /// amount).
    Percentage,
    /// `discount_value` is in cents, taken off the eligible amount.
    FixedAmount,
    /// Discounts the shipping fee instead of the products.
    FreeShipping,
}

// =============================================================================
// Voucher
// =============================================================================

/// A promotional voucher.
///
/// Administration owns creation and editing; `used_count` is mutated
/// exclusively by the usage recorder inside a successful checkout
/// transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voucher {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Business identifier customers type in. Unique.
    pub code: String,

    /// Display name.
    pub name: String,

    pub description: Option<String>,

    pub kind: DiscountKind,

    /// Basis points for `Percentage`, cents for `FixedAmount`. Unused for
    /// `FreeShipping` (the cap alone bounds the shipping discount).
    pub discount_value: i64,

    /// Minimum cart subtotal for the voucher to apply, in cents.
    pub min_order_cents: i64,

    /// Optional ceiling on the computed discount, in cents.
    pub max_discount_cents: Option<i64>,

    /// Optional global cap on successful applications.
    pub usage_limit: Option<i64>,

    /// Successful applications so far. Monotonic, starts at 0.
    pub used_count: i64,

    /// Per-user cap on applications. 0 disables the check.
    pub user_limit: i64,

    /// Validity window (inclusive).
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,

    pub is_active: bool,

    /// Inclusion filters: when either list is non-empty, only matching
    /// lines contribute to the eligible amount.
    pub applicable_categories: Vec<String>,
    pub applicable_books: Vec<String>,

    /// Exclusion filters: matching lines never contribute.
    pub excluded_categories: Vec<String>,
    pub excluded_books: Vec<String>,

    pub created_at: DateTime<Utc>,
}

impl Voucher {
    /// Returns the minimum order amount as Money.
    #[inline]
    pub fn min_order_amount(&self) -> Money {
        Money::from_cents(self.min_order_cents)
    }

    /// Returns the discount cap as Money, if configured.
    #[inline]
    pub fn max_discount(&self) -> Option<Money> {
        self.max_discount_cents.map(Money::from_cents)
    }

    /// Whether either inclusion list is configured.
    pub fn has_inclusion_filters(&self) -> bool {
        !self.applicable_categories.is_empty() || !self.applicable_books.is_empty()
    }
}

// =============================================================================
// Voucher Usage
// =============================================================================

/// Append-only audit record of a voucher application.
///
/// One row per (voucher, order) pair is expected but not schema-enforced;
/// the only writer is the checkout transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoucherUsage {
    pub id: String,
    pub voucher_id: String,
    pub user_id: String,
    pub order_id: String,
    /// Discount granted by this application, in cents.
    pub discount_cents: i64,
    pub used_at: DateTime<Utc>,
}

// =============================================================================
// Order Status
// =============================================================================

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    /// Statuses from which no further transition is allowed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Refunded)
    }

    /// The single next step along the fulfilment chain, if any.
    pub fn next_in_chain(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending => Some(OrderStatus::Confirmed),
            OrderStatus::Confirmed => Some(OrderStatus::Processing),
            OrderStatus::Processing => Some(OrderStatus::Shipped),
            OrderStatus::Shipped => Some(OrderStatus::Delivered),
            _ => None,
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

// =============================================================================
// Payment Status
// =============================================================================

/// Recorded payment state. The engine records the state; actual payment
/// processing is an external collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
    PartiallyRefunded,
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

// =============================================================================
// Order
// =============================================================================

/// A committed order, created once by the settlement engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    /// Business identifier: `ORD-YYYYMMDD-XXXXXXXX`.
    pub order_number: String,
    pub user_id: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub subtotal_cents: i64,
    pub shipping_fee_cents: i64,
    /// Combined product + shipping discount, in cents.
    pub discount_cents: i64,
    pub total_cents: i64,
    pub voucher_id: Option<String>,
    pub shipping_address_id: Option<String>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Order Line
// =============================================================================

/// A line item in an order.
///
/// Uses the snapshot pattern: unit price and title are frozen at
/// checkout. Later catalog price changes never rewrite order history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: String,
    pub order_id: String,
    pub book_id: String,
    /// Book title at time of checkout (frozen).
    pub title_snapshot: String,
    /// Quantity ordered. Always > 0.
    pub quantity: i64,
    /// Unit price in cents at time of checkout (frozen).
    pub unit_price_cents: i64,
    /// Line total (unit price × quantity).
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl OrderLine {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
