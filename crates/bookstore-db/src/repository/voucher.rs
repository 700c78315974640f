//! # Voucher Repository
//!
//! Voucher reads, usage history, and per-user usage counts. The
//! `used_count` column carries a dedicated guarded increment that the
//! settlement engine issues inside its checkout transaction; nothing in
//! this repository mutates it.
//!
//! The four id-list filters are stored as JSON arrays in TEXT columns and
//! decoded into `Vec<String>` at the row boundary.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use bookstore_core::{DiscountKind, Voucher, VoucherUsage};

use crate::error::{DbError, DbResult};

/// Column list shared by every voucher SELECT.
pub(crate) const VOUCHER_COLUMNS: &str = "id, code, name, description, discount_kind, \
     discount_value, min_order_cents, max_discount_cents, usage_limit, used_count, \
     user_limit, starts_at, ends_at, is_active, applicable_categories, applicable_books, \
     excluded_categories, excluded_books, created_at";

fn id_list(row: &SqliteRow, column: &str) -> DbResult<Vec<String>> {
    let raw: String = row.try_get(column)?;
    serde_json::from_str(&raw)
        .map_err(|e| DbError::Internal(format!("malformed {column} list: {e}")))
}

pub(crate) fn voucher_from_row(row: &SqliteRow) -> DbResult<Voucher> {
    Ok(Voucher {
        id: row.try_get("id")?,
        code: row.try_get("code")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        kind: row.try_get::<DiscountKind, _>("discount_kind")?,
        discount_value: row.try_get("discount_value")?,
        min_order_cents: row.try_get("min_order_cents")?,
        max_discount_cents: row.try_get("max_discount_cents")?,
        usage_limit: row.try_get("usage_limit")?,
        used_count: row.try_get("used_count")?,
        user_limit: row.try_get("user_limit")?,
        starts_at: row.try_get::<DateTime<Utc>, _>("starts_at")?,
        ends_at: row.try_get::<DateTime<Utc>, _>("ends_at")?,
        is_active: row.try_get("is_active")?,
        applicable_categories: id_list(row, "applicable_categories")?,
        applicable_books: id_list(row, "applicable_books")?,
        excluded_categories: id_list(row, "excluded_categories")?,
        excluded_books: id_list(row, "excluded_books")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

fn usage_from_row(row: &SqliteRow) -> DbResult<VoucherUsage> {
    Ok(VoucherUsage {
        id: row.try_get("id")?,
        voucher_id: row.try_get("voucher_id")?,
        user_id: row.try_get("user_id")?,
        order_id: row.try_get("order_id")?,
        discount_cents: row.try_get("discount_cents")?,
        used_at: row.try_get::<DateTime<Utc>, _>("used_at")?,
    })
}

/// Repository for voucher database operations.
#[derive(Debug, Clone)]
pub struct VoucherRepository {
    pool: SqlitePool,
}

impl VoucherRepository {
    /// Creates a new VoucherRepository.
    pub fn new(pool: SqlitePool) -> Self {
        VoucherRepository { pool }
    }

    /// Fetches a voucher by its customer-facing code.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Voucher>> {
        let row = sqlx::query(&format!(
            "SELECT {VOUCHER_COLUMNS} FROM vouchers WHERE code = ?1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(voucher_from_row).transpose()
    }

    /// Fetches a voucher by id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Voucher>> {
        let row = sqlx::query(&format!(
            "SELECT {VOUCHER_COLUMNS} FROM vouchers WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(voucher_from_row).transpose()
    }

    /// Inserts a voucher. Administration path; the settlement engine only
    /// reads vouchers and increments `used_count`.
    pub async fn insert(&self, voucher: &Voucher) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO vouchers (
                id, code, name, description, discount_kind, discount_value,
                min_order_cents, max_discount_cents, usage_limit, used_count,
                user_limit, starts_at, ends_at, is_active,
                applicable_categories, applicable_books,
                excluded_categories, excluded_books, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                    ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
            "#,
        )
        .bind(&voucher.id)
        .bind(&voucher.code)
        .bind(&voucher.name)
        .bind(&voucher.description)
        .bind(voucher.kind)
        .bind(voucher.discount_value)
        .bind(voucher.min_order_cents)
        .bind(voucher.max_discount_cents)
        .bind(voucher.usage_limit)
        .bind(voucher.used_count)
        .bind(voucher.user_limit)
        .bind(voucher.starts_at)
        .bind(voucher.ends_at)
        .bind(voucher.is_active)
        .bind(serde_json::to_string(&voucher.applicable_categories).unwrap_or_else(|_| "[]".into()))
        .bind(serde_json::to_string(&voucher.applicable_books).unwrap_or_else(|_| "[]".into()))
        .bind(serde_json::to_string(&voucher.excluded_categories).unwrap_or_else(|_| "[]".into()))
        .bind(serde_json::to_string(&voucher.excluded_books).unwrap_or_else(|_| "[]".into()))
        .bind(voucher.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Counts successful applications of a voucher by one user. Feeds the
    /// per-user limit check during evaluation.
    pub async fn usage_count_for_user(&self, voucher_id: &str, user_id: &str) -> DbResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM voucher_usage WHERE voucher_id = ?1 AND user_id = ?2",
        )
        .bind(voucher_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("n")?)
    }

    /// Lists the usage history of a voucher, newest first.
    pub async fn list_usages(&self, voucher_id: &str) -> DbResult<Vec<VoucherUsage>> {
        let rows = sqlx::query(
            r#"
            SELECT id, voucher_id, user_id, order_id, discount_cents, used_at
            FROM voucher_usage
            WHERE voucher_id = ?1
            ORDER BY used_at DESC
            "#,
        )
        .bind(voucher_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(usage_from_row).collect()
    }
}

/// Generates a new UUID for a voucher.
pub fn generate_voucher_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Duration;

    fn sample_voucher(code: &str) -> Voucher {
        let now = Utc::now();
        Voucher {
            id: generate_voucher_id(),
            code: code.to_string(),
            name: "Ten percent off".to_string(),
            description: Some("Sitewide".to_string()),
            kind: DiscountKind::Percentage,
            discount_value: 1_000,
            min_order_cents: 0,
            max_discount_cents: None,
            usage_limit: Some(100),
            used_count: 0,
            user_limit: 1,
            starts_at: now - Duration::days(1),
            ends_at: now + Duration::days(30),
            is_active: true,
            applicable_categories: vec![],
            applicable_books: vec!["b-1".to_string()],
            excluded_categories: vec!["clearance".to_string()],
            excluded_books: vec![],
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_by_code() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.vouchers();

        let voucher = sample_voucher("SAVE10");
        repo.insert(&voucher).await.unwrap();

        let found = repo.get_by_code("SAVE10").await.unwrap().unwrap();
        assert_eq!(found.id, voucher.id);
        assert_eq!(found.kind, DiscountKind::Percentage);
        assert_eq!(found.applicable_books, vec!["b-1".to_string()]);
        assert_eq!(found.excluded_categories, vec!["clearance".to_string()]);
        assert!(found.excluded_books.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.vouchers();

        repo.insert(&sample_voucher("ONCE")).await.unwrap();
        let err = repo.insert(&sample_voucher("ONCE")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_usage_count_starts_at_zero() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.vouchers();

        let voucher = sample_voucher("COUNT");
        repo.insert(&voucher).await.unwrap();

        let count = repo.usage_count_for_user(&voucher.id, "u-1").await.unwrap();
        assert_eq!(count, 0);
        assert!(repo.list_usages(&voucher.id).await.unwrap().is_empty());
    }
}
