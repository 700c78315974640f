//! # Settlement Engine
//!
//! Converts carts into orders. One call, one transaction.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                       checkout(request)                             │
//! │                                                                     │
//! │  load cart snapshot (priced lines)                                  │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  resolve + evaluate voucher (pure, no side effects)                 │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  BEGIN ──► insert order ──► per line:                               │
//! │  │           insert order_item snapshot                             │
//! │  │           guarded stock decrement (0 rows ⇒ Conflict)            │
//! │  │         delete consumed cart rows (stored-cart source only)      │
//! │  │         insert voucher_usage + guarded used_count increment      │
//! │  └──► COMMIT          (0 rows ⇒ Conflict, rollback)                 │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The guarded UPDATEs are the authoritative concurrency control: two
//! checkouts racing for the last unit of stock or the last voucher slot
//! are serialized by SQLite, and the loser's guard matches zero rows.
//! There are no automatic retries; callers resubmit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use bookstore_core::{
    cart_subtotal, evaluate_voucher, validate_price_cents, validate_quantity,
    validate_voucher_code, CartLine, CoreError, Money, Order, OrderStatus, PaymentStatus,
    PricingBreakdown, Voucher, MAX_CART_LINES,
};

use crate::error::{SettlementError, SettlementResult};
use crate::repository::order::{order_from_row, order_line_from_row, ORDER_COLUMNS};
use crate::repository::voucher::{voucher_from_row, VOUCHER_COLUMNS};

// =============================================================================
// Request Types
// =============================================================================

/// Where the checkout lines come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "source")]
pub enum CartSource {
    /// Consume the user's stored cart rows; they are deleted on commit.
    StoredCart,
    /// Explicit (book_id, quantity) pairs. The stored cart is untouched.
    Lines { lines: Vec<RequestedLine> },
}

/// One requested line in an explicit-lines checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestedLine {
    pub book_id: String,
    pub quantity: i64,
}

/// Input to [`SettlementEngine::checkout`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub user_id: String,
    pub source: CartSource,
    /// Customer-facing voucher code, if one is being applied.
    pub voucher_code: Option<String>,
    /// Externally computed shipping fee, in cents.
    pub shipping_fee_cents: i64,
    pub shipping_address_id: Option<String>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

/// Result of a read-only voucher preview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoucherPreview {
    pub eligible: bool,
    /// Rejection reason when `eligible` is false.
    pub reason: Option<String>,
    pub subtotal_cents: i64,
    pub shipping_fee_cents: i64,
    pub discount_cents: i64,
    pub shipping_discount_cents: i64,
    pub total_cents: i64,
}

// =============================================================================
// Settlement Engine
// =============================================================================

/// The transactional surface of the crate: checkout, voucher preview,
/// status transitions, cancellation.
#[derive(Debug, Clone)]
pub struct SettlementEngine {
    pool: SqlitePool,
}

impl SettlementEngine {
    /// Creates a new SettlementEngine.
    pub fn new(pool: SqlitePool) -> Self {
        SettlementEngine { pool }
    }

    // -------------------------------------------------------------------------
    // Checkout
    // -------------------------------------------------------------------------

    /// Converts a cart into a committed order.
    ///
    /// All writes happen in one transaction; any failure leaves no trace.
    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn checkout(&self, request: CheckoutRequest) -> SettlementResult<Order> {
        validate_price_cents(request.shipping_fee_cents).map_err(CoreError::from)?;

        let lines = self.load_cart_snapshot(&request.user_id, &request.source).await?;
        let subtotal = cart_subtotal(&lines);
        let shipping_fee = Money::from_cents(request.shipping_fee_cents);

        // Evaluate before opening the transaction; the guards inside make
        // the stale-read window harmless.
        let applied = match &request.voucher_code {
            Some(code) => {
                let voucher = self.resolve_voucher(code).await?;
                let prior_uses = self
                    .usage_count_for_user(&voucher.id, &request.user_id)
                    .await?;
                let benefit = evaluate_voucher(
                    &voucher,
                    prior_uses,
                    &lines,
                    subtotal,
                    shipping_fee,
                    Utc::now(),
                )?;
                Some((voucher, benefit))
            }
            None => None,
        };

        let breakdown = PricingBreakdown::compute(
            subtotal,
            shipping_fee,
            applied.as_ref().map(|(_, b)| *b),
        );

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4().to_string(),
            order_number: generate_order_number(),
            user_id: request.user_id.clone(),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            subtotal_cents: breakdown.subtotal_cents,
            shipping_fee_cents: breakdown.shipping_fee_cents,
            discount_cents: breakdown.combined_discount_cents(),
            total_cents: breakdown.total_cents,
            voucher_id: applied.as_ref().map(|(v, _)| v.id.clone()),
            shipping_address_id: request.shipping_address_id.clone(),
            payment_method: request.payment_method.clone(),
            notes: request.notes.clone(),
            cancellation_reason: None,
            shipped_at: None,
            delivered_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_number, user_id, status, payment_status,
                subtotal_cents, shipping_fee_cents, discount_cents, total_cents,
                voucher_id, shipping_address_id, payment_method, notes,
                created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)
            "#,
        )
        .bind(&order.id)
        .bind(&order.order_number)
        .bind(&order.user_id)
        .bind(order.status)
        .bind(order.payment_status)
        .bind(order.subtotal_cents)
        .bind(order.shipping_fee_cents)
        .bind(order.discount_cents)
        .bind(order.total_cents)
        .bind(&order.voucher_id)
        .bind(&order.shipping_address_id)
        .bind(&order.payment_method)
        .bind(&order.notes)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        insert_history(&mut tx, &order.id, OrderStatus::Pending, &order.user_id, None, now).await?;

        for line in &lines {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    id, order_id, book_id, title_snapshot, quantity,
                    unit_price_cents, total_cents, created_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&order.id)
            .bind(&line.book_id)
            .bind(&line.title)
            .bind(line.quantity)
            .bind(line.unit_price_cents)
            .bind(line.line_total().cents())
            .bind(now)
            .execute(&mut *tx)
            .await?;

            // The authoritative stock check. A concurrent checkout that
            // already took the units makes this guard match zero rows.
            let result = sqlx::query(
                r#"
                UPDATE books
                SET stock_quantity = stock_quantity - ?2,
                    sold_quantity = sold_quantity + ?2,
                    updated_at = ?3
                WHERE id = ?1 AND stock_quantity >= ?2
                "#,
            )
            .bind(&line.book_id)
            .bind(line.quantity)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                warn!(book_id = %line.book_id, quantity = %line.quantity, "Stock guard rejected checkout");
                return Err(SettlementError::conflict(format!(
                    "insufficient stock for book {}",
                    line.book_id
                )));
            }
        }

        if matches!(request.source, CartSource::StoredCart) {
            sqlx::query("DELETE FROM cart_items WHERE user_id = ?1")
                .bind(&request.user_id)
                .execute(&mut *tx)
                .await?;
        }

        if let Some((voucher, benefit)) = &applied {
            sqlx::query(
                r#"
                INSERT INTO voucher_usage (id, voucher_id, user_id, order_id, discount_cents, used_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&voucher.id)
            .bind(&order.user_id)
            .bind(&order.id)
            .bind(benefit.combined().cents())
            .bind(now)
            .execute(&mut *tx)
            .await?;

            // Guarded counter increment; a lost race against the last
            // usage slot rolls the whole checkout back.
            let result = sqlx::query(
                r#"
                UPDATE vouchers
                SET used_count = used_count + 1
                WHERE id = ?1 AND (usage_limit IS NULL OR used_count < usage_limit)
                "#,
            )
            .bind(&voucher.id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                warn!(voucher_id = %voucher.id, "Voucher usage guard rejected checkout");
                return Err(SettlementError::conflict(format!(
                    "voucher '{}' usage limit reached",
                    voucher.code
                )));
            }

            // The pre-transaction evaluation read the per-user count from a
            // possibly stale snapshot. Recount on this connection now that
            // our own usage row is in; a concurrent checkout by the same
            // user that committed in between pushes the count past the
            // limit and this transaction rolls back.
            if voucher.user_limit > 0 {
                let row = sqlx::query(
                    "SELECT COUNT(*) AS n FROM voucher_usage WHERE voucher_id = ?1 AND user_id = ?2",
                )
                .bind(&voucher.id)
                .bind(&order.user_id)
                .fetch_one(&mut *tx)
                .await?;
                let uses: i64 = row.try_get("n")?;

                if uses > voucher.user_limit {
                    warn!(voucher_id = %voucher.id, user_id = %order.user_id, "Per-user voucher guard rejected checkout");
                    return Err(SettlementError::conflict(format!(
                        "voucher '{}' usage limit for this user reached",
                        voucher.code
                    )));
                }
            }
        }

        tx.commit().await?;

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total_cents = %order.total_cents,
            "Checkout committed"
        );

        Ok(order)
    }

    // -------------------------------------------------------------------------
    // Voucher Preview
    // -------------------------------------------------------------------------

    /// Evaluates a voucher against the current cart without mutating
    /// anything. A rejected voucher is a normal answer, not an error.
    pub async fn preview_voucher(
        &self,
        user_id: &str,
        source: &CartSource,
        voucher_code: &str,
        shipping_fee_cents: i64,
    ) -> SettlementResult<VoucherPreview> {
        validate_price_cents(shipping_fee_cents).map_err(CoreError::from)?;

        let lines = self.load_cart_snapshot(user_id, source).await?;
        let subtotal = cart_subtotal(&lines);
        let shipping_fee = Money::from_cents(shipping_fee_cents);

        let voucher = self.resolve_voucher(voucher_code).await?;
        let prior_uses = self.usage_count_for_user(&voucher.id, user_id).await?;

        match evaluate_voucher(&voucher, prior_uses, &lines, subtotal, shipping_fee, Utc::now()) {
            Ok(benefit) => {
                let breakdown = PricingBreakdown::compute(subtotal, shipping_fee, Some(benefit));
                Ok(VoucherPreview {
                    eligible: true,
                    reason: None,
                    subtotal_cents: breakdown.subtotal_cents,
                    shipping_fee_cents: breakdown.shipping_fee_cents,
                    discount_cents: breakdown.discount_cents,
                    shipping_discount_cents: breakdown.shipping_discount_cents,
                    total_cents: breakdown.total_cents,
                })
            }
            Err(rejection) => {
                let breakdown = PricingBreakdown::compute(subtotal, shipping_fee, None);
                Ok(VoucherPreview {
                    eligible: false,
                    reason: Some(rejection.to_string()),
                    subtotal_cents: breakdown.subtotal_cents,
                    shipping_fee_cents: breakdown.shipping_fee_cents,
                    discount_cents: 0,
                    shipping_discount_cents: 0,
                    total_cents: breakdown.total_cents,
                })
            }
        }
    }

    // -------------------------------------------------------------------------
    // Status Transitions
    // -------------------------------------------------------------------------

    /// Moves an order one step along the fulfilment chain, or to a
    /// terminal state. `cancelled` routes through [`Self::cancel`].
    #[instrument(skip(self, notes))]
    pub async fn transition(
        &self,
        order_id: &str,
        new_status: OrderStatus,
        actor: &str,
        notes: Option<String>,
    ) -> SettlementResult<Order> {
        if new_status == OrderStatus::Cancelled {
            return self.cancel(order_id, actor, notes).await;
        }

        let order = self
            .fetch_order(order_id)
            .await?
            .ok_or_else(|| SettlementError::not_found("Order", order_id))?;

        let allowed = if new_status == OrderStatus::Refunded {
            !order.status.is_terminal()
        } else {
            order.status.next_in_chain() == Some(new_status)
        };
        if !allowed {
            return Err(CoreError::InvalidOrderStatus {
                order_id: order_id.to_string(),
                current_status: format!("{:?}", order.status).to_lowercase(),
                operation: format!("transition to {:?}", new_status).to_lowercase(),
            }
            .into());
        }

        let now = Utc::now();
        let shipped_at = (new_status == OrderStatus::Shipped).then_some(now);
        let delivered_at = (new_status == OrderStatus::Delivered).then_some(now);
        // Delivery implies the payment went through for pay-on-delivery
        // orders still marked pending.
        let paid = new_status == OrderStatus::Delivered
            && order.payment_status == PaymentStatus::Pending;
        let refunded = new_status == OrderStatus::Refunded;

        let mut tx = self.pool.begin().await?;

        // Guard on the status we read; a concurrent transition makes this
        // match zero rows.
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = ?2,
                payment_status = CASE
                    WHEN ?4 THEN 'paid'
                    WHEN ?5 THEN 'refunded'
                    ELSE payment_status
                END,
                shipped_at = COALESCE(?6, shipped_at),
                delivered_at = COALESCE(?7, delivered_at),
                notes = COALESCE(?8, notes),
                updated_at = ?9
            WHERE id = ?1 AND status = ?3
            "#,
        )
        .bind(order_id)
        .bind(new_status)
        .bind(order.status)
        .bind(paid)
        .bind(refunded)
        .bind(shipped_at)
        .bind(delivered_at)
        .bind(&notes)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SettlementError::conflict(format!(
                "order {order_id} changed status concurrently"
            )));
        }

        insert_history(&mut tx, order_id, new_status, actor, notes.as_deref(), now).await?;
        tx.commit().await?;

        info!(order_id = %order_id, actor = %actor, status = ?new_status, "Order status updated");

        self.fetch_order(order_id)
            .await?
            .ok_or_else(|| SettlementError::not_found("Order", order_id))
    }

    // -------------------------------------------------------------------------
    // Cancellation
    // -------------------------------------------------------------------------

    /// Cancels an order and restores its stock, all in one transaction.
    ///
    /// Voucher usage is deliberately left in place: the application was a
    /// real business event and the audit trail keeps it.
    #[instrument(skip(self, reason))]
    pub async fn cancel(
        &self,
        order_id: &str,
        actor: &str,
        reason: Option<String>,
    ) -> SettlementResult<Order> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // Status guard doubles as the existence check; a delivered or
        // already-cancelled order matches zero rows.
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'cancelled',
                cancelled_at = ?2,
                cancellation_reason = ?3,
                updated_at = ?2
            WHERE id = ?1 AND status NOT IN ('delivered', 'cancelled')
            "#,
        )
        .bind(order_id)
        .bind(now)
        .bind(&reason)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            // Distinguish "already terminal" from "no such order" on the
            // same connection; the transaction rolls back on return.
            let existing = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"))
                .bind(order_id)
                .fetch_optional(&mut *tx)
                .await?;
            return match existing {
                Some(row) => {
                    let order = order_from_row(&row)?;
                    Err(CoreError::InvalidOrderStatus {
                        order_id: order_id.to_string(),
                        current_status: format!("{:?}", order.status).to_lowercase(),
                        operation: "cancel".to_string(),
                    }
                    .into())
                }
                None => Err(SettlementError::not_found("Order", order_id)),
            };
        }

        let item_rows = sqlx::query(
            r#"
            SELECT id, order_id, book_id, title_snapshot, quantity,
                   unit_price_cents, total_cents, created_at
            FROM order_items
            WHERE order_id = ?1
            "#,
        )
        .bind(order_id)
        .fetch_all(&mut *tx)
        .await?;

        for row in &item_rows {
            let line = order_line_from_row(row)?;
            sqlx::query(
                r#"
                UPDATE books
                SET stock_quantity = stock_quantity + ?2,
                    sold_quantity = sold_quantity - ?2,
                    updated_at = ?3
                WHERE id = ?1
                "#,
            )
            .bind(&line.book_id)
            .bind(line.quantity)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        insert_history(&mut tx, order_id, OrderStatus::Cancelled, actor, reason.as_deref(), now)
            .await?;
        tx.commit().await?;

        info!(order_id = %order_id, actor = %actor, "Order cancelled and stock restored");

        self.fetch_order(order_id)
            .await?
            .ok_or_else(|| SettlementError::not_found("Order", order_id))
    }

    // -------------------------------------------------------------------------
    // Snapshot Loading
    // -------------------------------------------------------------------------

    /// Materializes the checkout source into priced cart lines.
    ///
    /// Prices, titles, and categories are read once here; everything
    /// downstream works on the snapshot.
    async fn load_cart_snapshot(
        &self,
        user_id: &str,
        source: &CartSource,
    ) -> SettlementResult<Vec<CartLine>> {
        let lines = match source {
            CartSource::StoredCart => {
                let rows = sqlx::query(
                    r#"
                    SELECT c.book_id AS book_id, c.quantity AS quantity,
                           b.title AS title, b.category_id AS category_id,
                           b.price_cents AS price_cents, b.is_active AS is_active
                    FROM cart_items c
                    JOIN books b ON b.id = c.book_id
                    WHERE c.user_id = ?1
                    ORDER BY c.created_at
                    "#,
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;

                let mut lines = Vec::with_capacity(rows.len());
                for row in &rows {
                    let book_id: String = row.try_get("book_id")?;
                    let is_active: bool = row.try_get("is_active")?;
                    if !is_active {
                        return Err(CoreError::BookInactive(book_id).into());
                    }
                    lines.push(CartLine {
                        book_id,
                        title: row.try_get("title")?,
                        category_id: row.try_get("category_id")?,
                        quantity: row.try_get("quantity")?,
                        unit_price_cents: row.try_get("price_cents")?,
                    });
                }
                lines
            }

            CartSource::Lines { lines: requested } => {
                let mut lines = Vec::with_capacity(requested.len());
                for req in requested {
                    validate_quantity(req.quantity).map_err(CoreError::from)?;
                    let row = sqlx::query(
                        r#"
                        SELECT title, category_id, price_cents, is_active
                        FROM books WHERE id = ?1
                        "#,
                    )
                    .bind(&req.book_id)
                    .fetch_optional(&self.pool)
                    .await?
                    .ok_or_else(|| SettlementError::not_found("Book", &req.book_id))?;

                    let is_active: bool = row.try_get("is_active")?;
                    if !is_active {
                        return Err(CoreError::BookInactive(req.book_id.clone()).into());
                    }
                    lines.push(CartLine {
                        book_id: req.book_id.clone(),
                        title: row.try_get("title")?,
                        category_id: row.try_get("category_id")?,
                        quantity: req.quantity,
                        unit_price_cents: row.try_get("price_cents")?,
                    });
                }
                lines
            }
        };

        if lines.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }
        if lines.len() > MAX_CART_LINES {
            return Err(SettlementError::validation(format!(
                "cart has {} lines, maximum is {MAX_CART_LINES}",
                lines.len()
            )));
        }

        Ok(lines)
    }

    /// Looks a voucher up by its customer-facing code.
    async fn resolve_voucher(&self, code: &str) -> SettlementResult<Voucher> {
        let normalized = validate_voucher_code(code).map_err(CoreError::from)?;

        let row = sqlx::query(&format!(
            "SELECT {VOUCHER_COLUMNS} FROM vouchers WHERE code = ?1"
        ))
        .bind(&normalized)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(voucher_from_row(&row)?),
            None => Err(SettlementError::not_found("Voucher", normalized)),
        }
    }

    async fn usage_count_for_user(&self, voucher_id: &str, user_id: &str) -> SettlementResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM voucher_usage WHERE voucher_id = ?1 AND user_id = ?2",
        )
        .bind(voucher_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("n")?)
    }

    async fn fetch_order(&self, order_id: &str) -> SettlementResult<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"))
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(order_from_row).transpose()?)
    }
}

/// Appends an audit-trail row for a status change, on the same connection
/// (and so the same transaction) as the change itself.
async fn insert_history(
    conn: &mut SqliteConnection,
    order_id: &str,
    status: OrderStatus,
    actor: &str,
    notes: Option<&str>,
    now: DateTime<Utc>,
) -> SettlementResult<()> {
    sqlx::query(
        r#"
        INSERT INTO order_history (id, order_id, status, notes, created_by, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(order_id)
    .bind(status)
    .bind(notes)
    .bind(actor)
    .bind(now)
    .execute(conn)
    .await?;

    Ok(())
}

/// Generates a business order number: `ORD-YYYYMMDD-XXXXXXXX`.
///
/// The suffix is 8 random hex characters; uniqueness is best-effort and
/// backed by the UNIQUE column constraint.
fn generate_order_number() -> String {
    let date = Utc::now().format("%Y%m%d");
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(8)
        .collect::<String>()
        .to_uppercase();
    format!("ORD-{date}-{suffix}")
}

// =============================================================================
// Unit Tests
// =============================================================================
