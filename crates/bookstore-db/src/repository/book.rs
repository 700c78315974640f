//! # Book Repository
//!
//! Catalog reads plus the inventory-counter mutations used by the
//! settlement engine. Counter updates are always deltas guarded by a
//! `WHERE` condition, never absolute writes, so a stale reader can never
//! commit a decrement past zero.

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use bookstore_core::Book;

/// Maps a `books` row to the domain type.
pub(crate) fn book_from_row(row: &SqliteRow) -> DbResult<Book> {
    Ok(Book {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        category_id: row.try_get("category_id")?,
        price_cents: row.try_get("price_cents")?,
        stock_quantity: row.try_get("stock_quantity")?,
        sold_quantity: row.try_get("sold_quantity")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

const BOOK_COLUMNS: &str = "id, title, category_id, price_cents, stock_quantity, \
                            sold_quantity, is_active, created_at, updated_at";

/// Repository for book database operations.
#[derive(Debug, Clone)]
pub struct BookRepository {
    pool: SqlitePool,
}

impl BookRepository {
    /// Creates a new BookRepository.
    pub fn new(pool: SqlitePool) -> Self {
        BookRepository { pool }
    }

    /// Gets a book by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Book>> {
        let row = sqlx::query(&format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(book_from_row).transpose()
    }

    /// Inserts a new book.
    pub async fn insert(&self, book: &Book) -> DbResult<()> {
        debug!(id = %book.id, title = %book.title, "Inserting book");

        sqlx::query(
            r#"
            INSERT INTO books (
                id, title, category_id, price_cents,
                stock_quantity, sold_quantity, is_active,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&book.id)
        .bind(&book.title)
        .bind(&book.category_id)
        .bind(book.price_cents)
        .bind(book.stock_quantity)
        .bind(book.sold_quantity)
        .bind(book.is_active)
        .bind(book.created_at)
        .bind(book.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Applies a stock delta outside of checkout (restocking, manual
    /// corrections). Negative deltas are guarded so stock never goes
    /// below zero.
    pub async fn adjust_stock(&self, id: &str, delta: i64) -> DbResult<()> {
        debug!(id = %id, delta = %delta, "Adjusting stock");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE books
            SET stock_quantity = stock_quantity + ?2,
                updated_at = ?3
            WHERE id = ?1 AND stock_quantity + ?2 >= 0
            "#,
        )
        .bind(id)
        .bind(delta)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Zero rows means either no such book or a refused decrement.
            let exists = sqlx::query("SELECT 1 FROM books WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
                .is_some();

            if !exists {
                return Err(DbError::not_found("Book", id));
            }
            return Err(DbError::conflict(format!(
                "stock adjustment of {delta} would drop book '{id}' below zero"
            )));
        }

        Ok(())
    }

    /// Soft-deletes a book by setting is_active = false.
    ///
    /// Historical orders keep referencing it through their snapshots.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting book");

        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE books SET is_active = 0, updated_at = ?2 WHERE id = ?1",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Book", id));
        }

        Ok(())
    }
}

/// Helper to generate a new book ID.
pub fn generate_book_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn sample_book(stock: i64) -> Book {
        let now = Utc::now();
        Book {
            id: generate_book_id(),
            title: "The Rust Programming Language".to_string(),
            category_id: Some("programming".to_string()),
            price_cents: 4_500,
            stock_quantity: stock,
            sold_quantity: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.books();

        let book = sample_book(10);
        repo.insert(&book).await.unwrap();

        let loaded = repo.get_by_id(&book.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, book.title);
        assert_eq!(loaded.price_cents, 4_500);
        assert_eq!(loaded.stock_quantity, 10);
        assert!(loaded.is_active);
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.books().get_by_id("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_adjust_stock_guard() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.books();

        let book = sample_book(3);
        repo.insert(&book).await.unwrap();

        repo.adjust_stock(&book.id, -3).await.unwrap();
        let loaded = repo.get_by_id(&book.id).await.unwrap().unwrap();
        assert_eq!(loaded.stock_quantity, 0);

        // Going below zero is refused, and reported as a conflict rather
        // than a missing book
        let err = repo.adjust_stock(&book.id, -1).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_adjust_stock_missing_book() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let err = db.books().adjust_stock("nope", 5).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
