use serde::{Deserialize, Serialize};

use crate::domain::coupon::NormalizedCoupon;
use crate::domain::product::EnrichedProduct;

pub const DEFAULT_MAXIMUM_CART: f64 = 1e12;

/// Shopper-side facts a coupon is checked against.
#[derive(Clone, Debug)]
pub struct EligibilityContext<'a> {
    pub product: &'a EnrichedProduct,
    pub cart_total: f64,
    pub user_email: Option<&'a str>,
    pub now: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    NotStarted,
    Expired,
    ProductNotTargeted,
    CategoryMismatch,
    BelowMinimum,
    AboveMaximum,
    EmailRestricted,
}

/// Rules run in a fixed order; the first failing rule wins.
pub fn check(coupon: &NormalizedCoupon, ctx: &EligibilityContext<'_>) -> Result<(), Rejection> {
    if let Some(start) = coupon.date_start_epoch.filter(|start| *start != 0) {
        if ctx.now < start {
            return Err(Rejection::NotStarted);
        }
    }
    if let Some(expires) = coupon.date_expires_epoch.filter(|expires| *expires != 0) {
        if ctx.now > expires {
            return Err(Rejection::Expired);
        }
    }

    let cart_scoped = coupon.apply_to.as_deref() == Some("cart");
    if !coupon.product_ids.is_empty() && !cart_scoped {
        if let Some(product_id) = ctx.product.id.as_ref() {
            let targeted = coupon.product_ids.iter().any(|id| ids_match(id, product_id.as_str()));
            if !targeted {
                return Err(Rejection::ProductNotTargeted);
            }
        }
    }

    if !coupon.product_categories.is_empty() {
        let product_categories = ctx.product.categories();
        if !product_categories.is_empty() {
            let overlaps = product_categories
                .iter()
                .any(|category| coupon.product_categories.iter().any(|wanted| wanted == category));
            if !overlaps {
                return Err(Rejection::CategoryMismatch);
            }
        }
    }

    let minimum = coupon.minimum_amount.unwrap_or(0.0);
    let maximum = coupon.maximum_amount.filter(|max| *max > 0.0).unwrap_or(DEFAULT_MAXIMUM_CART);
    if ctx.cart_total < minimum {
        return Err(Rejection::BelowMinimum);
    }
    if ctx.cart_total > maximum {
        return Err(Rejection::AboveMaximum);
    }

    if let Some(email) = ctx.user_email.map(str::trim).filter(|email| !email.is_empty()) {
        if !coupon.email_restrictions.is_empty()
            && !coupon.email_restrictions.iter().any(|allowed| allowed.eq_ignore_ascii_case(email))
        {
            return Err(Rejection::EmailRestricted);
        }
    }

    Ok(())
}

/// Keeps candidates that pass every rule, preserving input order.
pub fn filter_applicable(
    candidates: impl IntoIterator<Item = NormalizedCoupon>,
    ctx: &EligibilityContext<'_>,
) -> Vec<NormalizedCoupon> {
    candidates.into_iter().filter(|coupon| check(coupon, ctx).is_ok()).collect()
}

fn ids_match(left: &str, right: &str) -> bool {
    match (left.trim().parse::<i64>(), right.trim().parse::<i64>()) {
        (Ok(left), Ok(right)) => left == right,
        _ => left.trim() == right.trim(),
    }
}
