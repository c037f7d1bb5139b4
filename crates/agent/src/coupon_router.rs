//! Answers coupon questions in one of four modes, chosen per message.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shopmate_core::coupons::{compute_final_price, CouponService, PriceComputation};
use shopmate_core::domain::coupon::NormalizedCoupon;
use shopmate_core::domain::product::EnrichedProduct;
use shopmate_core::recommend::{enrich_record, ProductLookup};
use tracing::{debug, warn};

use crate::conversation::ChatContext;

pub const LIST_PAGE_SIZE: usize = 50;

/// Codes recognised in free text. Anything else needs the customer to name it again.
pub const KNOWN_COUPON_CODES: &[&str] =
    &["test10", "weekend20", "winter50", "diwali40", "newyear100", "sale 30"];

/// Product words that trigger a catalog lookup when no product is in context.
const PRODUCT_KEYWORDS: &[&str] = &[
    "hoodie", "shirt", "hat", "hats", "cap", "beverage", "drink", "towel", "bag", "sauce", "tea",
    "umbrella",
];

const LIST_PHRASES: &[&str] =
    &["what coupons", "all coupons", "available coupons", "do you have coupons"];
const ELIGIBILITY_PHRASES: &[&str] = &["which product", "what can use", "eligible for", "apply to"];
const CALCULATE_PHRASES: &[&str] = &["final price", "calculate", "how much", "total cost"];

const PLACEHOLDER_PRODUCT: &str = "items";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponMode {
    ListAll,
    CheckEligibility,
    CalculatePrice,
    ShowApplicable,
}

/// Allow-list matcher for coupon codes, tolerant of spacing inside a code.
#[derive(Clone, Debug)]
pub struct CouponCodeMatcher {
    codes: Vec<KnownCode>,
}

#[derive(Clone, Debug)]
struct KnownCode {
    canonical: String,
    compact: String,
    words: usize,
}

impl Default for CouponCodeMatcher {
    fn default() -> Self {
        Self::with_codes(KNOWN_COUPON_CODES.iter().copied())
    }
}

impl CouponCodeMatcher {
    pub fn with_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let codes = codes
            .into_iter()
            .map(|code| {
                let canonical = code.as_ref().trim().to_lowercase();
                KnownCode {
                    compact: canonical.split_whitespace().collect(),
                    words: canonical.split_whitespace().count().max(1),
                    canonical,
                }
            })
            .filter(|code| !code.compact.is_empty())
            .collect();
        Self { codes }
    }

    /// First known code in allow-list order, in its stored spelling.
    pub fn find(&self, text: &str) -> Option<String> {
        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = lowered
            .split(|ch: char| !ch.is_alphanumeric())
            .filter(|token| !token.is_empty())
            .collect();

        self.codes
            .iter()
            .find(|code| {
                (1..=code.words).any(|width| {
                    tokens.windows(width).any(|window| window.concat() == code.compact)
                })
            })
            .map(|code| code.canonical.clone())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PitchProduct {
    pub name: String,
    pub image: Option<String>,
    pub status: Option<String>,
    pub short_description: String,
    pub link: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CouponPitch {
    pub coupon_code: String,
    pub description: Option<String>,
    pub product: PitchProduct,
    pub original_price: f64,
    pub final_price: f64,
    pub savings: f64,
    pub pitch_text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CouponReply {
    pub mode: CouponMode,
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub coupons: Vec<NormalizedCoupon>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub eligibility: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calculation: Option<PriceComputation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pitches: Vec<CouponPitch>,
}

impl CouponReply {
    fn text(mode: CouponMode, text: impl Into<String>) -> Self {
        Self {
            mode,
            text: text.into(),
            coupons: Vec::new(),
            eligibility: Vec::new(),
            calculation: None,
            pitches: Vec::new(),
        }
    }
}

pub struct CouponRouter {
    coupons: CouponService,
    lookup: Arc<dyn ProductLookup>,
    matcher: CouponCodeMatcher,
}

impl CouponRouter {
    pub fn new(coupons: CouponService, lookup: Arc<dyn ProductLookup>) -> Self {
        Self { coupons, lookup, matcher: CouponCodeMatcher::default() }
    }

    pub fn with_matcher(mut self, matcher: CouponCodeMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn select_mode(&self, query: &str) -> CouponMode {
        let lowered = query.to_lowercase();
        let has = |phrases: &[&str]| phrases.iter().any(|phrase| lowered.contains(phrase));

        if has(LIST_PHRASES) {
            CouponMode::ListAll
        } else if has(ELIGIBILITY_PHRASES) && self.matcher.find(query).is_some() {
            CouponMode::CheckEligibility
        } else if has(CALCULATE_PHRASES) {
            CouponMode::CalculatePrice
        } else {
            CouponMode::ShowApplicable
        }
    }

    pub async fn handle(&self, query: &str, context: &ChatContext) -> CouponReply {
        let mode = self.select_mode(query);
        debug!(event_name = "coupons.router.mode", mode = ?mode, "coupon query routed");

        match mode {
            CouponMode::ListAll => self.list_all().await,
            CouponMode::CheckEligibility => match self.matcher.find(query) {
                Some(code) => self.check_eligibility(&code).await,
                None => self.show_applicable(query, context).await,
            },
            CouponMode::CalculatePrice => self.calculate_price(query, context).await,
            CouponMode::ShowApplicable => self.show_applicable(query, context).await,
        }
    }

    async fn list_all(&self) -> CouponReply {
        let coupons = match self.coupons.list_all(LIST_PAGE_SIZE).await {
            Ok(coupons) => coupons,
            Err(error) => {
                warn!(event_name = "coupons.list.failed", error = %error, "could not list coupons");
                return CouponReply::text(CouponMode::ListAll, "Error fetching coupons.");
            }
        };
        if coupons.is_empty() {
            return CouponReply::text(CouponMode::ListAll, "No coupons available right now.");
        }

        let lines: Vec<String> = coupons
            .iter()
            .map(|coupon| {
                let expires = coupon
                    .date_expires
                    .as_deref()
                    .map(|date| format!(" (expires {date})"))
                    .unwrap_or_default();
                let status = if coupon.active_bool { "✅ Active" } else { "❌ Inactive" };
                format!("• **{}** - {}{expires} {status}", coupon.code, coupon.discount_label())
            })
            .collect();

        CouponReply {
            text: format!("Here are all available coupons:\n\n{}", lines.join("\n")),
            coupons,
            ..CouponReply::text(CouponMode::ListAll, "")
        }
    }

    async fn check_eligibility(&self, code: &str) -> CouponReply {
        let mode = CouponMode::CheckEligibility;
        let coupon = match self.coupons.find_by_code(code).await {
            Ok(Some(coupon)) => coupon,
            Ok(None) => return CouponReply::text(mode, format!("Coupon '{code}' not found.")),
            Err(error) => {
                warn!(event_name = "coupons.eligibility.failed", code, error = %error, "lookup failed");
                return CouponReply::text(mode, format!("Error checking coupon '{code}'."));
            }
        };

        let restrictions = restriction_lines(&coupon);
        let bullets: Vec<String> = restrictions.iter().map(|line| format!("• {line}")).collect();
        CouponReply {
            text: format!("**{code}** eligibility:\n{}", bullets.join("\n")),
            eligibility: restrictions,
            coupons: vec![coupon],
            ..CouponReply::text(mode, "")
        }
    }

    async fn calculate_price(&self, query: &str, context: &ChatContext) -> CouponReply {
        let mode = CouponMode::CalculatePrice;
        let Some(code) = self.matcher.find(query) else {
            return CouponReply::text(
                mode,
                "Please specify which coupon you'd like to use for the calculation.",
            );
        };
        let Some(product) = self.resolve_product(query, context).await else {
            return CouponReply::text(
                mode,
                "Please specify which product you'd like to calculate the price for.",
            );
        };

        let coupon = match self.coupons.find_by_code(&code).await {
            Ok(Some(coupon)) => coupon,
            Ok(None) => return CouponReply::text(mode, format!("Coupon '{code}' not found.")),
            Err(error) => {
                warn!(event_name = "coupons.calculate.failed", code, error = %error, "lookup failed");
                return CouponReply::text(mode, "Error calculating price.");
            }
        };

        let calculation = compute_final_price(&product, &coupon, None);
        let text = format!(
            "Price calculation for **{}** with **{code}**:\n• Original: ${:.2}\n• Final: ${:.2}\n• You save: ${:.2}",
            product.name, calculation.original_price, calculation.final_price, calculation.savings
        );
        CouponReply {
            text,
            calculation: Some(calculation),
            coupons: vec![coupon],
            ..CouponReply::text(mode, "")
        }
    }

    async fn show_applicable(&self, query: &str, context: &ChatContext) -> CouponReply {
        let mode = CouponMode::ShowApplicable;
        let product = self.resolve_product(query, context).await.unwrap_or_else(|| EnrichedProduct {
            price: Some(0.0),
            ..EnrichedProduct::stub(PLACEHOLDER_PRODUCT)
        });

        let cart_total = context.cart_total();
        let applicable = self
            .coupons
            .get_applicable_coupons(&product, cart_total, context.user_email.as_deref())
            .await;
        let Some(first) = applicable.first() else {
            return CouponReply::text(
                mode,
                "No coupons apply to your current selection. Ask 'what coupons do you have' to see all available coupons.",
            );
        };

        let text = format!(
            "You can use coupon **{}** on {}. Ask me to calculate the final price if you'd like!",
            first.code, product.name
        );
        let cart = (cart_total > 0.0).then_some(cart_total);
        let pitches = applicable.iter().map(|coupon| build_pitch(&product, coupon, cart)).collect();

        CouponReply { text, coupons: applicable, pitches, ..CouponReply::text(mode, "") }
    }

    /// Context first, then the first catalog hit for a product word in the query.
    async fn resolve_product(&self, query: &str, context: &ChatContext) -> Option<EnrichedProduct> {
        if let Some(product) = context.last_viewed() {
            return Some(product);
        }

        let lowered = query.to_lowercase();
        for keyword in PRODUCT_KEYWORDS.iter().filter(|keyword| lowered.contains(*keyword)) {
            if let Some(hit) = self.lookup.multi_strategy(keyword, 1).await.first() {
                return Some(enrich_record(hit));
            }
        }
        None
    }
}

fn restriction_lines(coupon: &NormalizedCoupon) -> Vec<String> {
    let mut lines = Vec::new();
    if !coupon.product_ids.is_empty() {
        lines.push(format!("Specific products only (IDs: {})", coupon.product_ids.join(", ")));
    } else if !coupon.product_categories.is_empty() {
        lines.push(format!("Categories: {}", coupon.product_categories.join(", ")));
    } else {
        lines.push("All products".to_string());
    }
    if let Some(minimum) = coupon.minimum_amount.filter(|minimum| *minimum > 0.0) {
        lines.push(format!("Minimum order: ${minimum:.2}"));
    }
    lines
}

fn build_pitch(
    product: &EnrichedProduct,
    coupon: &NormalizedCoupon,
    cart_total: Option<f64>,
) -> CouponPitch {
    let computation = compute_final_price(product, coupon, cart_total);
    let description = coupon
        .description
        .clone()
        .filter(|description| !description.trim().is_empty())
        .unwrap_or_else(|| format!("Save ${:.2}", computation.savings));

    let pitch_text = if product.name.is_empty() || product.name == PLACEHOLDER_PRODUCT {
        format!(
            "Use coupon {} - {description}. Applies to cart total for additional savings!",
            coupon.code
        )
    } else {
        format!(
            "Use coupon {} on {} - {description}. Original: ${:.2}, Final: ${:.2}, You save: ${:.2}!",
            coupon.code,
            product.name,
            computation.original_price,
            computation.final_price,
            computation.savings
        )
    };

    CouponPitch {
        coupon_code: coupon.code.clone(),
        description: coupon.description.clone(),
        product: PitchProduct {
            name: product.name.clone(),
            image: product.image.clone(),
            status: Some(product.stock_status.clone()).filter(|status| !status.is_empty()),
            short_description: product.description.clone(),
            link: product.url.clone(),
        },
        original_price: computation.original_price,
        final_price: computation.final_price,
        savings: computation.savings,
        pitch_text,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use shopmate_core::catalog::{IndexNames, InMemoryIndex, ProductSearch};
    use shopmate_core::coupons::CouponService;

    use super::{CouponCodeMatcher, CouponMode, CouponRouter};
    use crate::conversation::ChatContext;

    fn index() -> Arc<InMemoryIndex> {
        let index = Arc::new(InMemoryIndex::new());
        index.seed(
            "products",
            vec![
                json!({"id": "12", "name": "Logo Hoodie", "price": 100.0, "category": "Clothing", "description": "Fleece hoodie"}),
                json!({"id": "20", "name": "Beach Towel", "price": 15.0, "category": "Accessories"}),
            ],
        );
        index.seed(
            "coupons",
            vec![
                json!({"id": "1", "code": "sale 30", "amount_numeric": 30.0, "discount_type": "percent", "active_bool": true, "description": "30% off everything"}),
                json!({"id": "2", "code": "test10", "amount_numeric": 10.0, "discount_type": "fixed_product", "active_bool": true, "product_ids": ["20"], "minimum_amount": 25.0}),
                json!({"id": "3", "code": "winter50", "amount_numeric": 50.0, "discount_type": "percent", "active_bool": false, "date_expires": "2024-12-31"}),
            ],
        );
        index
    }

    fn router(index: Arc<InMemoryIndex>) -> CouponRouter {
        let search = ProductSearch::new(index.clone(), IndexNames::default());
        CouponRouter::new(CouponService::new(index, "coupons"), Arc::new(search))
    }

    #[test]
    fn matcher_handles_spacing_and_unknown_codes() {
        let matcher = CouponCodeMatcher::default();

        assert_eq!(matcher.find("Can I use SALE30?").as_deref(), Some("sale 30"));
        assert_eq!(matcher.find("is sale 30 valid").as_deref(), Some("sale 30"));
        assert_eq!(matcher.find("apply test10!").as_deref(), Some("test10"));
        assert_eq!(matcher.find("try mytest10 please"), None);
        assert_eq!(matcher.find("any code works?"), None);
    }

    #[test]
    fn mode_selection_needs_a_code_for_eligibility() {
        let router = router(index());

        assert_eq!(router.select_mode("What coupons do you offer?"), CouponMode::ListAll);
        assert_eq!(
            router.select_mode("Which product can sale 30 apply to?"),
            CouponMode::CheckEligibility
        );
        assert_eq!(router.select_mode("which product is this for"), CouponMode::ShowApplicable);
        assert_eq!(router.select_mode("calculate it with test10"), CouponMode::CalculatePrice);
    }

    #[tokio::test]
    async fn list_all_marks_inactive_coupons() {
        let reply = router(index()).handle("show me all coupons", &ChatContext::default()).await;

        assert_eq!(reply.mode, CouponMode::ListAll);
        assert!(reply.text.starts_with("Here are all available coupons:\n\n"));
        assert!(reply.text.contains("• **sale 30** - 30% off ✅ Active"));
        assert!(reply.text.contains("• **winter50** - 50% off (expires 2024-12-31) ❌ Inactive"));
        assert_eq!(reply.coupons.len(), 3);
    }

    #[tokio::test]
    async fn eligibility_reports_targeting_and_minimum() {
        let router = router(index());

        let open = router.handle("Which product can sale 30 apply to?", &ChatContext::default()).await;
        assert_eq!(open.text, "**sale 30** eligibility:\n• All products");

        let targeted = router.handle("what can use test10", &ChatContext::default()).await;
        assert_eq!(
            targeted.eligibility,
            vec!["Specific products only (IDs: 20)".to_string(), "Minimum order: $25.00".to_string()]
        );

        let missing = router.handle("is diwali40 eligible for hats", &ChatContext::default()).await;
        assert_eq!(missing.text, "Coupon 'diwali40' not found.");
    }

    #[tokio::test]
    async fn calculation_uses_catalog_product_from_keyword() {
        let reply = router(index())
            .handle("Calculate the final price of the hoodie with sale 30", &ChatContext::default())
            .await;

        assert_eq!(reply.mode, CouponMode::CalculatePrice);
        let calculation = reply.calculation.expect("price computed");
        assert_eq!(calculation.final_price, 70.0);
        assert_eq!(calculation.savings, 30.0);
        assert!(reply.text.contains("**Logo Hoodie** with **sale 30**"));
        assert!(reply.text.contains("• Final: $70.00"));
    }

    #[tokio::test]
    async fn calculation_asks_for_missing_pieces() {
        let router = router(index());

        let no_code = router.handle("how much is the hoodie", &ChatContext::default()).await;
        assert_eq!(no_code.text, "Please specify which coupon you'd like to use for the calculation.");

        let no_product = router.handle("how much with test10", &ChatContext::default()).await;
        assert_eq!(
            no_product.text,
            "Please specify which product you'd like to calculate the price for."
        );
    }

    #[tokio::test]
    async fn applicable_coupons_prefer_context_product_and_build_pitches() {
        let context = ChatContext {
            last_viewed_product: Some(json!({"id": "20", "name": "Beach Towel", "price": 15.0})),
            cart: Some(json!({"total": 40.0})),
            ..ChatContext::default()
        };
        let reply = router(index()).handle("any deals for me?", &context).await;

        assert_eq!(reply.mode, CouponMode::ShowApplicable);
        assert_eq!(
            reply.text,
            "You can use coupon **sale 30** on Beach Towel. Ask me to calculate the final price if you'd like!"
        );
        assert_eq!(reply.pitches.len(), 2);
        assert_eq!(reply.pitches[1].coupon_code, "test10");
        assert_eq!(reply.pitches[1].final_price, 5.0);
        assert!(reply.pitches[0].pitch_text.starts_with("Use coupon sale 30 on Beach Towel - 30% off everything."));
    }

    #[tokio::test]
    async fn nothing_applicable_points_to_the_full_list() {
        let index = Arc::new(InMemoryIndex::new());
        index.seed("coupons", Vec::new());
        let reply = router(index).handle("discount please", &ChatContext::default()).await;

        assert_eq!(
            reply.text,
            "No coupons apply to your current selection. Ask 'what coupons do you have' to see all available coupons."
        );
        assert!(reply.pitches.is_empty());
    }
}
