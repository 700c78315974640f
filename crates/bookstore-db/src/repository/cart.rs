//! # Cart Repository
//!
//! Stored cart lines per user. Cart contents are owned by external cart
//! operations; the settlement engine reads them through the snapshot
//! loader and deletes them atomically when an order is created from them.

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;

/// A stored cart row: (user, book, quantity). Quantities are always > 0;
/// pricing is attached later by the snapshot loader.
#[derive(Debug, Clone)]
pub struct CartItem {
    pub id: String,
    pub user_id: String,
    pub book_id: String,
    pub quantity: i64,
}

fn cart_item_from_row(row: &SqliteRow) -> DbResult<CartItem> {
    Ok(CartItem {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        book_id: row.try_get("book_id")?,
        quantity: row.try_get("quantity")?,
    })
}

/// Repository for cart database operations.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    /// Creates a new CartRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// Lists the stored cart lines for a user.
    pub async fn list_for_user(&self, user_id: &str) -> DbResult<Vec<CartItem>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, book_id, quantity
            FROM cart_items
            WHERE user_id = ?1
            ORDER BY created_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(cart_item_from_row).collect()
    }

    /// Adds a book to a user's cart, or bumps the quantity if the line
    /// already exists.
    pub async fn upsert_line(&self, user_id: &str, book_id: &str, quantity: i64) -> DbResult<()> {
        debug!(user_id = %user_id, book_id = %book_id, quantity = %quantity, "Upserting cart line");

        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO cart_items (id, user_id, book_id, quantity, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            ON CONFLICT (user_id, book_id)
            DO UPDATE SET quantity = quantity + excluded.quantity, updated_at = excluded.updated_at
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(book_id)
        .bind(quantity)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Removes a single line from a user's cart.
    pub async fn remove_line(&self, user_id: &str, book_id: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = ?1 AND book_id = ?2")
            .bind(user_id)
            .bind(book_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Empties a user's cart outside of checkout. The checkout path
    /// deletes cart rows inside its own transaction instead.
    pub async fn clear_for_user(&self, user_id: &str) -> DbResult<()> {
        debug!(user_id = %user_id, "Clearing cart");

        sqlx::query("DELETE FROM cart_items WHERE user_id = ?1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::book::generate_book_id;
    use bookstore_core::Book;

    async fn seed_book(db: &Database) -> String {
        let now = Utc::now();
        let book = Book {
            id: generate_book_id(),
            title: "Book".to_string(),
            category_id: None,
            price_cents: 1_000,
            stock_quantity: 10,
            sold_quantity: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.books().insert(&book).await.unwrap();
        book.id
    }

    #[tokio::test]
    async fn test_upsert_merges_quantities() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let book_id = seed_book(&db).await;
        let repo = db.carts();

        repo.upsert_line("u1", &book_id, 2).await.unwrap();
        repo.upsert_line("u1", &book_id, 3).await.unwrap();

        let lines = repo.list_for_user("u1").await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 5);
    }

    #[tokio::test]
    async fn test_clear_for_user() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let book_id = seed_book(&db).await;
        let repo = db.carts();

        repo.upsert_line("u1", &book_id, 1).await.unwrap();
        repo.upsert_line("u2", &book_id, 1).await.unwrap();
        repo.clear_for_user("u1").await.unwrap();

        assert!(repo.list_for_user("u1").await.unwrap().is_empty());
        assert_eq!(repo.list_for_user("u2").await.unwrap().len(), 1);
    }
}
