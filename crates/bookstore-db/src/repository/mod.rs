//! # Repository Module
//!
//! Database repository implementations.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  Caller                                                             │
//! │     │  db.vouchers().get_by_code("SAVE10")                          │
//! │     ▼                                                               │
//! │  VoucherRepository ── SQL ──► SQLite                                │
//! │                                                                     │
//! │  Benefits:                                                          │
//! │  • SQL is isolated in one place per aggregate                       │
//! │  • Row mapping is shared with the settlement transaction            │
//! │  • Repositories never start transactions; multi-entity atomic       │
//! │    work lives in the settlement engine                              │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`book::BookRepository`] - Catalog reads and inventory counters
//! - [`cart::CartRepository`] - Stored cart lines per user
//! - [`voucher::VoucherRepository`] - Vouchers and usage records
//! - [`order::OrderRepository`] - Orders and order lines

pub mod book;
pub mod cart;
pub mod order;
pub mod voucher;
