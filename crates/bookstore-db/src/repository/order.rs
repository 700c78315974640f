//! # Order Repository
//!
//! Read side of the order store. Orders are created exclusively by the
//! settlement engine's checkout transaction, and their status is mutated
//! only through the engine's transition and cancellation paths; this
//! repository exposes lookups for both.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use bookstore_core::{Order, OrderLine, OrderStatus, PaymentStatus};

use crate::error::DbResult;

/// Column list shared by every order SELECT.
pub(crate) const ORDER_COLUMNS: &str = "id, order_number, user_id, status, payment_status, \
     subtotal_cents, shipping_fee_cents, discount_cents, total_cents, voucher_id, \
     shipping_address_id, payment_method, notes, cancellation_reason, \
     shipped_at, delivered_at, cancelled_at, created_at, updated_at";

pub(crate) fn order_from_row(row: &SqliteRow) -> DbResult<Order> {
    Ok(Order {
        id: row.try_get("id")?,
        order_number: row.try_get("order_number")?,
        user_id: row.try_get("user_id")?,
        status: row.try_get::<OrderStatus, _>("status")?,
        payment_status: row.try_get::<PaymentStatus, _>("payment_status")?,
        subtotal_cents: row.try_get("subtotal_cents")?,
        shipping_fee_cents: row.try_get("shipping_fee_cents")?,
        discount_cents: row.try_get("discount_cents")?,
        total_cents: row.try_get("total_cents")?,
        voucher_id: row.try_get("voucher_id")?,
        shipping_address_id: row.try_get("shipping_address_id")?,
        payment_method: row.try_get("payment_method")?,
        notes: row.try_get("notes")?,
        cancellation_reason: row.try_get("cancellation_reason")?,
        shipped_at: row.try_get::<Option<DateTime<Utc>>, _>("shipped_at")?,
        delivered_at: row.try_get::<Option<DateTime<Utc>>, _>("delivered_at")?,
        cancelled_at: row.try_get::<Option<DateTime<Utc>>, _>("cancelled_at")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

///// One audit-trail row: the status an order entered, who moved it there,
/// and when. Written inside the same transaction as the change.
#[derive(Debug, Clone)]
pub struct OrderHistoryEntry {
    pub id: String,
    pub order_id: String,
    pub status: OrderStatus,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

fn history_from_row(row: &SqliteRow) -> DbResult<OrderHistoryEntry> {
    Ok(OrderHistoryEntry {
        id: row.try_get("id")?,
        order_id: row.try_get("order_id")?,
        status: row.try_get::<OrderStatus, _>("status")?,
        notes: row.try_get("notes")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

pub(crate) fn order_line_from_row(row: &SqliteRow) -> DbResult<OrderLine> {
    Ok(OrderLine {
        id: row.try_get("id")?,
        order_id: row.try_get("order_id")?,
        book_id: row.try_get("book_id")?,
        title_snapshot: row.try_get("title_snapshot")?,
        quantity: row.try_get("quantity")?,
        unit_price_cents: row.try_get("unit_price_cents")?,
        total_cents: row.try_get("total_cents")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Fetches an order by id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(order_from_row).transpose()
    }

    /// Fetches an order by its business number.
    pub async fn get_by_number(&self, order_number: &str) -> DbResult<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = ?1"
        ))
        .bind(order_number)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(order_from_row).transpose()
    }

    /// Lists the line items of an order in insertion order.
    pub async fn get_lines(&self, order_id: &str) -> DbResult<Vec<OrderLine>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, book_id, title_snapshot, quantity,
                   unit_price_cents, total_cents, created_at
            FROM order_items
            WHERE order_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(order_line_from_row).collect()
    }

    /// Lists the status history of an order, oldest first.
    pub async fn get_history(&self, order_id: &str) -> DbResult<Vec<OrderHistoryEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, status, notes, created_by, created_at
            FROM order_history
            WHERE order_id = ?1
            ORDER BY created_at, rowid
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(history_from_row).collect()
    }

    /// Lists a user's orders, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> DbResult<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = ?1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(order_from_row).collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_get_missing_order_returns_none() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.orders();

        assert!(repo.get_by_id("nope").await.unwrap().is_none());
        assert!(repo.get_by_number("ORD-0").await.unwrap().is_none());
        assert!(repo.list_for_user("u-1").await.unwrap().is_empty());
    }
}
