//! # Pricing Calculator
//!
//! Combines subtotal, shipping fee, and voucher discounts into the final
//! payable total. Pure functions; the settlement engine persists whatever
//! is computed here.

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::voucher::VoucherBenefit;

/// Final payable total.
///
/// `total = subtotal + shipping_fee − discount − shipping_discount`,
/// floored at zero. All inputs are already in whole cents so no rounding
/// occurs here.
pub fn order_total(
    subtotal: Money,
    shipping_fee: Money,
    discount: Money,
    shipping_discount: Money,
) -> Money {
    (subtotal + shipping_fee - discount - shipping_discount).clamp_non_negative()
}

/// A full pricing breakdown, as shown to a user before checkout and as
/// persisted on the order row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingBreakdown {
    pub subtotal_cents: i64,
    pub shipping_fee_cents: i64,
    pub discount_cents: i64,
    pub shipping_discount_cents: i64,
    pub total_cents: i64,
}

impl PricingBreakdown {
    /// Builds the breakdown for a cart with an optional voucher benefit.
    pub fn compute(subtotal: Money, shipping_fee: Money, benefit: Option<VoucherBenefit>) -> Self {
        let (discount, shipping_discount) = match benefit {
            Some(b) => (b.discount, b.shipping_discount),
            None => (Money::zero(), Money::zero()),
        };
        let total = order_total(subtotal, shipping_fee, discount, shipping_discount);

        PricingBreakdown {
            subtotal_cents: subtotal.cents(),
            shipping_fee_cents: shipping_fee.cents(),
            discount_cents: discount.cents(),
            shipping_discount_cents: shipping_discount.cents(),
            total_cents: total.cents(),
        }
    }

    /// Combined discount recorded on the order row.
    #[inline]
    pub fn combined_discount_cents(&self) -> i64 {
        self.discount_cents + self.shipping_discount_cents
    }
}
