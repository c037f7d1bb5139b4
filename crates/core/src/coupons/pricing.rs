use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::coupon::{DiscountKind, NormalizedCoupon};
use crate::domain::product::EnrichedProduct;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceComputation {
    pub original_price: f64,
    pub final_price: f64,
    pub savings: f64,
}

/// Applies one coupon to one product. A missing price is treated as zero and
/// savings never exceed the original price.
pub fn compute_final_price(
    product: &EnrichedProduct,
    coupon: &NormalizedCoupon,
    cart_total: Option<f64>,
) -> PriceComputation {
    let original = product.price.filter(|price| price.is_finite()).unwrap_or(0.0).max(0.0);
    let amount =
        Some(coupon.amount_numeric).filter(|amount| amount.is_finite()).unwrap_or(0.0).max(0.0);

    let savings = match coupon.discount_kind() {
        DiscountKind::Percent => original * amount / 100.0,
        DiscountKind::FixedProduct => original.min(amount),
        DiscountKind::FixedCart => match cart_total.filter(|total| *total != 0.0) {
            Some(total) => {
                let share = amount * (original / total);
                if share.is_finite() {
                    share
                } else {
                    original.min(amount)
                }
            }
            None => original.min(amount),
        },
        DiscountKind::Unsupported => 0.0,
    };

    let savings = if savings.is_nan() { 0.0 } else { savings.clamp(0.0, original) };
    let final_price = original - savings;

    PriceComputation {
        original_price: round_cents(original),
        final_price: round_cents(final_price),
        savings: round_cents(savings),
    }
}

/// Rounds the exact binary value of `value`, so `2.675` (stored just below
/// the midpoint) becomes `2.67`.
fn round_cents(value: f64) -> f64 {
    Decimal::from_f64_retain(value)
        .unwrap_or(Decimal::ZERO)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
        .to_f64()
        .unwrap_or(0.0)
}
