pub mod eligibility;
pub mod normalize;
pub mod pricing;

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::catalog::{CatalogIndex, IndexError, QuerySpec, SearchRequest};
use crate::domain::coupon::NormalizedCoupon;
use crate::domain::product::EnrichedProduct;

pub use eligibility::{check, filter_applicable, EligibilityContext, Rejection};
pub use normalize::{normalize_coupon, normalize_coupon_at, parse_epoch};
pub use pricing::{compute_final_price, PriceComputation};

/// Active coupons fetched per eligibility check.
pub const CANDIDATE_LIMIT: usize = 50;

/// Coupon reads over the coupon index.
#[derive(Clone)]
pub struct CouponService {
    index: Arc<dyn CatalogIndex>,
    coupon_index: String,
}

impl CouponService {
    pub fn new(index: Arc<dyn CatalogIndex>, coupon_index: impl Into<String>) -> Self {
        Self { index, coupon_index: coupon_index.into() }
    }

    pub fn coupon_index(&self) -> &str {
        &self.coupon_index
    }

    pub async fn get_applicable_coupons(
        &self,
        product: &EnrichedProduct,
        cart_total: f64,
        user_email: Option<&str>,
    ) -> Vec<NormalizedCoupon> {
        self.get_applicable_coupons_at(product, cart_total, user_email, Utc::now().timestamp()).await
    }

    /// Index failures are logged and reported as no applicable coupons.
    pub async fn get_applicable_coupons_at(
        &self,
        product: &EnrichedProduct,
        cart_total: f64,
        user_email: Option<&str>,
        now: i64,
    ) -> Vec<NormalizedCoupon> {
        let candidates = match self.active_candidates().await {
            Ok(candidates) => candidates,
            Err(error) => {
                warn!(
                    event_name = "coupons.applicable.lookup_failed",
                    error = %error,
                    "could not load coupon candidates"
                );
                return Vec::new();
            }
        };

        let ctx = EligibilityContext { product, cart_total, user_email, now };
        let applicable = filter_applicable(candidates, &ctx);
        debug!(
            event_name = "coupons.applicable.filtered",
            product = %product.name,
            applicable = applicable.len(),
            "coupon eligibility evaluated"
        );
        applicable
    }

    async fn active_candidates(&self) -> Result<Vec<NormalizedCoupon>, IndexError> {
        let request = SearchRequest::new(
            QuerySpec::Term { field: "active_bool".to_string(), value: json!(true) },
            CANDIDATE_LIMIT,
        );
        let response = self.index.search(&self.coupon_index, &request).await?;
        Ok(decode_coupons(response.object_sources()))
    }

    /// Looks a code up as typed (lower-cased) and with whitespace removed.
    pub async fn find_by_code(&self, code: &str) -> Result<Option<NormalizedCoupon>, IndexError> {
        let lowered = code.trim().to_lowercase();
        if lowered.is_empty() {
            return Ok(None);
        }
        let compact: String = lowered.chars().filter(|ch| !ch.is_whitespace()).collect();

        let mut codes = vec![lowered];
        if !codes.contains(&compact) {
            codes.push(compact);
        }
        let request = SearchRequest::new(QuerySpec::CodeLookup { codes }, 1);
        let response = self.index.search(&self.coupon_index, &request).await?;
        Ok(decode_coupons(response.object_sources()).into_iter().next())
    }

    pub async fn list_all(&self, limit: usize) -> Result<Vec<NormalizedCoupon>, IndexError> {
        let request = SearchRequest::new(QuerySpec::MatchAll, limit);
        let response = self.index.search(&self.coupon_index, &request).await?;
        Ok(decode_coupons(response.object_sources()))
    }
}

/// Normalized documents decode directly; raw upstream payloads are re-normalized.
fn decode_coupons(sources: Vec<Value>) -> Vec<NormalizedCoupon> {
    sources
        .into_iter()
        .filter_map(|source| match &source {
            Value::Object(raw) if !raw.contains_key("active_bool") => Some(normalize_coupon(raw)),
            Value::Object(raw) => match serde_json::from_value::<NormalizedCoupon>(source.clone()) {
                Ok(coupon) => Some(coupon),
                Err(error) => {
                    debug!(
                        event_name = "coupons.decode.renormalized",
                        error = %error,
                        "indexed coupon did not decode; normalizing again"
                    );
                    Some(normalize_coupon(raw))
                }
            },
            _ => None,
        })
        .collect()
}
