//! # Voucher Eligibility Evaluator
//!
//! Decides whether a voucher applies to a priced cart and computes the
//! resulting product discount and shipping discount.
//!
//! ## Evaluation Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                  evaluate_voucher()                                 │
//! │                                                                     │
//! │  1. active?                 ──── no ──► Rejected(Inactive)          │
//! │  2. now within window?      ──── no ──► Rejected(OutsideWindow)     │
//! │  3. used_count < limit?     ──── no ──► Rejected(UsageLimitReached) │
//! │  4. user uses < user_limit? ──── no ──► Rejected(UserLimitReached)  │
//! │  5. subtotal ≥ minimum?     ──── no ──► Rejected(BelowMinimum)      │
//! │  6. eligible amount > 0     ──── no ──► Rejected(NoEligibleItems)   │
//! │     (exclusions first, then inclusion lists if configured)          │
//! │  7. apply discount policy (percentage / fixed / free shipping)      │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  VoucherBenefit { discount, shipping_discount }                     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! This function is pure: it never touches the database and is safe to
//! call from the read-only preview path. The per-user usage count is
//! loaded by the caller (one explicit fetch per aggregate) and passed in.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use thiserror::Error;

use crate::money::Money;
use crate::types::{CartLine, DiscountKind, Voucher};

// =============================================================================
// Outcome Types
// =============================================================================

/// The benefit granted by an eligible voucher.
///
/// `discount` applies to the products, `shipping_discount` to the
/// shipping fee. Exactly one of them is non-zero for any single voucher
/// kind, but callers should treat both generically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoucherBenefit {
    pub discount: Money,
    pub shipping_discount: Money,
}

impl VoucherBenefit {
    /// Combined discount recorded on the order row.
    #[inline]
    pub fn combined(&self) -> Money {
        self.discount + self.shipping_discount
    }
}

/// Why a voucher did not apply.
///
/// Each variant carries a human-readable message; the settlement layer
/// maps the limit variants to conflicts and the rest to validation
/// failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoucherRejection {
    #[error("voucher is not active")]
    Inactive,

    #[error("voucher is outside its validity window")]
    OutsideWindow,

    #[error("voucher usage limit has been reached")]
    UsageLimitReached,

    #[error("voucher usage limit for this user has been reached")]
    UserLimitReached,

    #[error("order subtotal is below the voucher minimum of {minimum}")]
    BelowMinimum { minimum: Money },

    #[error("no eligible items")]
    NoEligibleItems,
}

impl VoucherRejection {
    /// True for rejections caused by exhausted usage counters, which can
    /// also happen as the result of losing a race to a concurrent
    /// checkout.
    pub fn is_limit_exhausted(&self) -> bool {
        matches!(
            self,
            VoucherRejection::UsageLimitReached | VoucherRejection::UserLimitReached
        )
    }
}

// =============================================================================
// Evaluation
// =============================================================================

/// Evaluates a voucher against a priced cart.
///
/// ## Arguments
/// * `voucher` - The voucher under evaluation
/// * `prior_user_uses` - Existing `voucher_usage` rows for (voucher, user)
/// * `lines` - Priced cart lines from the snapshot loader
/// * `subtotal` - Cart subtotal (sum of line totals)
/// * `shipping_fee` - Externally computed shipping fee
/// * `now` - Evaluation instant, injected for testability
///
/// ## Returns
/// * `Ok(VoucherBenefit)` - Discounts to apply
/// * `Err(VoucherRejection)` - First failed check, in documented order
///
/// No side effects; calling this for preview mutates nothing.
pub fn evaluate_voucher(
    voucher: &Voucher,
    prior_user_uses: i64,
    lines: &[CartLine],
    subtotal: Money,
    shipping_fee: Money,
    now: DateTime<Utc>,
) -> Result<VoucherBenefit, VoucherRejection> {
    if !voucher.is_active {
        return Err(VoucherRejection::Inactive);
    }

    if now < voucher.starts_at || now > voucher.ends_at {
        return Err(VoucherRejection::OutsideWindow);
    }

    if let Some(limit) = voucher.usage_limit {
        if voucher.used_count >= limit {
            return Err(VoucherRejection::UsageLimitReached);
        }
    }

    if voucher.user_limit > 0 && prior_user_uses >= voucher.user_limit {
        return Err(VoucherRejection::UserLimitReached);
    }

    if subtotal < voucher.min_order_amount() {
        return Err(VoucherRejection::BelowMinimum {
            minimum: voucher.min_order_amount(),
        });
    }

    let eligible = eligible_amount(voucher, lines);
    if voucher.has_inclusion_filters() && eligible.is_zero() {
        return Err(VoucherRejection::NoEligibleItems);
    }

    Ok(compute_benefit(voucher, eligible, shipping_fee))
}

/// Sums the portion of the cart the discount is computed against.
///
/// Exclusion lists drop lines unconditionally; of what remains, inclusion
/// lists (when either is non-empty) keep only matching lines. Line totals
/// are exact integers, so no rounding happens here.
fn eligible_amount(voucher: &Voucher, lines: &[CartLine]) -> Money {
    let excluded_books: HashSet<&str> =
        voucher.excluded_books.iter().map(String::as_str).collect();
    let excluded_categories: HashSet<&str> =
        voucher.excluded_categories.iter().map(String::as_str).collect();
    let included_books: HashSet<&str> =
        voucher.applicable_books.iter().map(String::as_str).collect();
    let included_categories: HashSet<&str> =
        voucher.applicable_categories.iter().map(String::as_str).collect();

    let restrict = voucher.has_inclusion_filters();

    lines
        .iter()
        .filter(|line| {
            if excluded_books.contains(line.book_id.as_str()) {
                return false;
            }
            if let Some(category) = &line.category_id {
                if excluded_categories.contains(category.as_str()) {
                    return false;
                }
            }
            if !restrict {
                return true;
            }
            included_books.contains(line.book_id.as_str())
                || line
                    .category_id
                    .as_deref()
                    .is_some_and(|c| included_categories.contains(c))
        })
        .map(|line| line.line_total())
        .sum()
}

/// Applies the discount-kind policy to the eligible amount.
///
/// Rounding to whole cents happens once per checkout, inside
/// `Money::percentage` on the final eligible amount.
fn compute_benefit(voucher: &Voucher, eligible: Money, shipping_fee: Money) -> VoucherBenefit {
    match voucher.kind {
        DiscountKind::Percentage => {
            // A misconfigured value above 10000 bps would otherwise compute
            // more than the eligible amount itself.
            let raw = eligible
                .percentage(voucher.discount_value.max(0) as u32)
                .min(eligible);
            VoucherBenefit {
                discount: cap(raw, voucher.max_discount()),
                shipping_discount: Money::zero(),
            }
        }
        DiscountKind::FixedAmount => {
            let raw = Money::from_cents(voucher.discount_value).min(eligible);
            VoucherBenefit {
                discount: cap(raw, voucher.max_discount()),
                shipping_discount: Money::zero(),
            }
        }
        DiscountKind::FreeShipping => {
            let ceiling = voucher.max_discount().unwrap_or(shipping_fee);
            VoucherBenefit {
                discount: Money::zero(),
                shipping_discount: shipping_fee.min(ceiling),
            }
        }
    }
}

fn cap(amount: Money, ceiling: Option<Money>) -> Money {
    match ceiling {
        Some(max) => amount.min(max),
        None => amount,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn voucher(kind: DiscountKind, value: i64) -> Voucher {
        let now = Utc::now();
        Voucher {
            id: "v-1".to_string(),
            code: "TEST".to_string(),
            name: "Test voucher".to_string(),
            description: None,
            kind,
            discount_value: value,
            min_order_cents: 0,
            max_discount_cents: None,
            usage_limit: None,
            used_count: 0,
            user_limit: 1,
            starts_at: now - Duration::days(1),
            ends_at: now + Duration::days(1),
            is_active: true,
            applicable_categories: vec![],
            applicable_books: vec![],
            excluded_categories: vec![],
            excluded_books: vec![],
            created_at: now,
        }
    }

    fn line(book_id: &str, category: Option<&str>, cents: i64, qty: i64) -> CartLine {
        CartLine {
            book_id: book_id.to_string(),
            title: book_id.to_string(),
            category_id: category.map(str::to_string),
            quantity: qty,
            unit_price_cents: cents,
        }
    }

    fn eval(v: &Voucher, lines: &[CartLine], shipping: i64) -> Result<VoucherBenefit, VoucherRejection> {
        let subtotal = crate::types::cart_subtotal(lines);
        evaluate_voucher(v, 0, lines, subtotal, Money::from_cents(shipping), Utc::now())
    }

    #[test]
    fn percentage_ten_percent_of_200000() {
        // 10% = 1000 bps on an eligible amount of 200000.00
        let v = voucher(DiscountKind::Percentage, 1000);
        let lines = vec![line("b1", None, 10_000_000, 2)];

        let benefit = eval(&v, &lines, 0).unwrap();
        assert_eq!(benefit.discount.cents(), 2_000_000);
        assert_eq!(benefit.shipping_discount.cents(), 0);
    }

    #[test]
    fn fixed_amount_capped() {
        // fixed 50000.00 capped at 30000.00 on eligible 100000.00
        let mut v = voucher(DiscountKind::FixedAmount, 5_000_000);
        v.max_discount_cents = Some(3_000_000);
        let lines = vec![line("b1", None, 10_000_000, 1)];

        let benefit = eval(&v, &lines, 0).unwrap();
        assert_eq!(benefit.discount.cents(), 3_000_000);
    }

    #[test]
    fn fixed_amount_never_exceeds_eligible() {
        let v = voucher(DiscountKind::FixedAmount, 5000);
        let lines = vec![line("b1", None, 3000, 1)];

        let benefit = eval(&v, &lines, 0).unwrap();
        assert_eq!(benefit.discount.cents(), 3000);
    }

    #[test]
    fn free_shipping_bounded_by_fee_and_cap() {
        let v = voucher(DiscountKind::FreeShipping, 0);
        let lines = vec![line("b1", None, 1000, 1)];

        let benefit = eval(&v, &lines, 2500).unwrap();
        assert_eq!(benefit.discount.cents(), 0);
        assert_eq!(benefit.shipping_discount.cents(), 2500);

        let mut capped = voucher(DiscountKind::FreeShipping, 0);
        capped.max_discount_cents = Some(1500);
        let benefit = eval(&capped, &lines, 2500).unwrap();
        assert_eq!(benefit.shipping_discount.cents(), 1500);
    }

    #[test]
    fn inactive_rejected_first() {
        let mut v = voucher(DiscountKind::Percentage, 1000);
        v.is_active = false;
        // Also outside window, but active check fires first.
        v.ends_at = Utc::now() - Duration::days(2);
        let lines = vec![line("b1", None, 1000, 1)];

        assert_eq!(eval(&v, &lines, 0).unwrap_err(), VoucherRejection::Inactive);
    }

    #[test]
    fn outside_window_rejected() {
        let mut v = voucher(DiscountKind::Percentage, 1000);
        v.starts_at = Utc::now() + Duration::days(1);
        v.ends_at = Utc::now() + Duration::days(2);
        let lines = vec![line("b1", None, 1000, 1)];

        assert_eq!(eval(&v, &lines, 0).unwrap_err(), VoucherRejection::OutsideWindow);
    }

    #[test]
    fn usage_limit_exhausted() {
        let mut v = voucher(DiscountKind::Percentage, 1000);
        v.usage_limit = Some(1);
        v.used_count = 1;
        let lines = vec![line("b1", None, 1000, 1)];

        let rejection = eval(&v, &lines, 0).unwrap_err();
        assert_eq!(rejection, VoucherRejection::UsageLimitReached);
        assert!(rejection.is_limit_exhausted());
    }

    #[test]
    fn user_limit_exhausted() {
        let v = voucher(DiscountKind::Percentage, 1000);
        let lines = vec![line("b1", None, 1000, 1)];
        let subtotal = crate::types::cart_subtotal(&lines);

        // user_limit defaults to 1 and the user already has one usage row
        let rejection =
            evaluate_voucher(&v, 1, &lines, subtotal, Money::zero(), Utc::now()).unwrap_err();
        assert_eq!(rejection, VoucherRejection::UserLimitReached);
    }

    #[test]
    fn user_limit_zero_disables_check() {
        let mut v = voucher(DiscountKind::Percentage, 1000);
        v.user_limit = 0;
        let lines = vec![line("b1", None, 1000, 1)];
        let subtotal = crate::types::cart_subtotal(&lines);

        assert!(evaluate_voucher(&v, 99, &lines, subtotal, Money::zero(), Utc::now()).is_ok());
    }

    #[test]
    fn below_minimum_rejected() {
        let mut v = voucher(DiscountKind::Percentage, 1000);
        v.min_order_cents = 5000;
        let lines = vec![line("b1", None, 1000, 1)];

        assert!(matches!(
            eval(&v, &lines, 0).unwrap_err(),
            VoucherRejection::BelowMinimum { .. }
        ));
    }

    #[test]
    fn exclusions_remove_lines_from_eligible_amount() {
        let mut v = voucher(DiscountKind::Percentage, 1000);
        v.excluded_books = vec!["b2".to_string()];
        let lines = vec![line("b1", None, 10_000, 1), line("b2", None, 90_000, 1)];

        // only b1 (10000) is eligible; 10% = 1000
        let benefit = eval(&v, &lines, 0).unwrap();
        assert_eq!(benefit.discount.cents(), 1000);
    }

    #[test]
    fn excluded_category_removes_line() {
        let mut v = voucher(DiscountKind::Percentage, 1000);
        v.excluded_categories = vec!["fiction".to_string()];
        let lines = vec![
            line("b1", Some("fiction"), 10_000, 1),
            line("b2", Some("science"), 20_000, 1),
        ];

        let benefit = eval(&v, &lines, 0).unwrap();
        assert_eq!(benefit.discount.cents(), 2000);
    }

    #[test]
    fn inclusion_filters_keep_only_matches() {
        let mut v = voucher(DiscountKind::Percentage, 1000);
        v.applicable_categories = vec!["science".to_string()];
        let lines = vec![
            line("b1", Some("fiction"), 10_000, 1),
            line("b2", Some("science"), 20_000, 1),
        ];

        let benefit = eval(&v, &lines, 0).unwrap();
        assert_eq!(benefit.discount.cents(), 2000);
    }

    #[test]
    fn no_eligible_items_under_inclusion_filters() {
        let mut v = voucher(DiscountKind::Percentage, 1000);
        v.applicable_categories = vec!["cookbooks".to_string()];
        let lines = vec![line("b1", Some("fiction"), 10_000, 1)];

        assert_eq!(eval(&v, &lines, 0).unwrap_err(), VoucherRejection::NoEligibleItems);
    }

    #[test]
    fn no_filters_means_whole_cart_eligible() {
        let v = voucher(DiscountKind::Percentage, 1000);
        let lines = vec![
            line("b1", Some("fiction"), 10_000, 1),
            line("b2", None, 20_000, 1),
        ];

        let benefit = eval(&v, &lines, 0).unwrap();
        assert_eq!(benefit.discount.cents(), 3000);
    }

    #[test]
    fn exclusion_beats_inclusion() {
        let mut v = voucher(DiscountKind::Percentage, 1000);
        v.applicable_books = vec!["b1".to_string(), "b2".to_string()];
        v.excluded_books = vec!["b1".to_string()];
        let lines = vec![line("b1", None, 10_000, 1), line("b2", None, 20_000, 1)];

        let benefit = eval(&v, &lines, 0).unwrap();
        assert_eq!(benefit.discount.cents(), 2000);
    }

    #[test]
    fn percentage_never_exceeds_eligible_amount() {
        // 200% configured; the discount is clamped to the eligible amount
        // so the persisted discount can never exceed the order value.
        let v = voucher(DiscountKind::Percentage, 20_000);
        let lines = vec![line("b1", None, 10_000, 1)];

        let benefit = eval(&v, &lines, 500).unwrap();
        assert_eq!(benefit.discount.cents(), 10_000);
        assert_eq!(benefit.shipping_discount.cents(), 0);
    }

    #[test]
    fn percentage_cap_applies_after_computation() {
        let mut v = voucher(DiscountKind::Percentage, 1000);
        v.max_discount_cents = Some(500);
        let lines = vec![line("b1", None, 100_000, 1)];

        let benefit = eval(&v, &lines, 0).unwrap();
        assert_eq!(benefit.discount.cents(), 500);
    }
}
