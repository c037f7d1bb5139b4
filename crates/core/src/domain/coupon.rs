use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::fields;

/// Coupon payload exactly as the upstream store returns it.
pub type RawCoupon = Map<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiscountKind {
    Percent,
    FixedProduct,
    FixedCart,
    Unsupported,
}

impl DiscountKind {
    pub fn parse(discount_type: &str) -> Self {
        match discount_type.trim() {
            "percent" => Self::Percent,
            "fixed_product" => Self::FixedProduct,
            "fixed_cart" => Self::FixedCart,
            _ => Self::Unsupported,
        }
    }
}

/// Canonical coupon record written to and read back from the coupon index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizedCoupon {
    #[serde(deserialize_with = "fields::lenient_optional_string")]
    pub id: Option<String>,
    #[serde(deserialize_with = "fields::lenient_string")]
    pub code: String,
    #[serde(deserialize_with = "fields::lenient_f64")]
    pub amount_numeric: f64,
    #[serde(deserialize_with = "fields::lenient_string")]
    pub discount_type: String,
    #[serde(deserialize_with = "fields::lenient_optional_string")]
    pub description: Option<String>,
    #[serde(deserialize_with = "fields::lenient_optional_string")]
    pub date_expires: Option<String>,
    pub date_start_epoch: Option<i64>,
    pub date_expires_epoch: Option<i64>,
    #[serde(deserialize_with = "fields::lenient_list")]
    pub product_ids: Vec<String>,
    #[serde(deserialize_with = "fields::lenient_list")]
    pub exclude_product_ids: Vec<String>,
    #[serde(deserialize_with = "fields::lenient_list")]
    pub product_categories: Vec<String>,
    #[serde(deserialize_with = "fields::lenient_list")]
    pub exclude_product_categories: Vec<String>,
    #[serde(deserialize_with = "fields::lenient_list")]
    pub email_restrictions: Vec<String>,
    #[serde(deserialize_with = "fields::lenient_optional_f64")]
    pub minimum_amount: Option<f64>,
    #[serde(deserialize_with = "fields::lenient_optional_f64")]
    pub maximum_amount: Option<f64>,
    pub individual_use: bool,
    pub free_shipping: bool,
    pub exclude_sale_items: bool,
    #[serde(deserialize_with = "fields::lenient_optional_string")]
    pub apply_to: Option<String>,
    #[serde(deserialize_with = "fields::lenient_optional_string")]
    pub status: Option<String>,
    pub active_bool: bool,
    pub last_synced_at: i64,
}

impl Default for NormalizedCoupon {
    fn default() -> Self {
        Self {
            id: None,
            code: String::new(),
            amount_numeric: 0.0,
            discount_type: "fixed_cart".to_string(),
            description: None,
            date_expires: None,
            date_start_epoch: None,
            date_expires_epoch: None,
            product_ids: Vec::new(),
            exclude_product_ids: Vec::new(),
            product_categories: Vec::new(),
            exclude_product_categories: Vec::new(),
            email_restrictions: Vec::new(),
            minimum_amount: None,
            maximum_amount: None,
            individual_use: false,
            free_shipping: false,
            exclude_sale_items: false,
            apply_to: None,
            status: None,
            active_bool: false,
            last_synced_at: 0,
        }
    }
}

impl NormalizedCoupon {
    pub fn discount_kind(&self) -> DiscountKind {
        DiscountKind::parse(&self.discount_type)
    }

    /// Short human label such as `10% off` or `$5 off`.
    pub fn discount_label(&self) -> String {
        let amount = format_amount(self.amount_numeric);
        match self.discount_kind() {
            DiscountKind::Percent => format!("{amount}% off"),
            _ => format!("${amount} off"),
        }
    }
}

fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{amount:.0}")
    } else {
        format!("{amount:.2}")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{DiscountKind, NormalizedCoupon};

    #[test]
    fn discount_kind_rejects_unknown_types() {
        assert_eq!(DiscountKind::parse("percent"), DiscountKind::Percent);
        assert_eq!(DiscountKind::parse("fixed_cart"), DiscountKind::FixedCart);
        assert_eq!(DiscountKind::parse("bogo"), DiscountKind::Unsupported);
    }

    #[test]
    fn indexed_documents_decode_with_loose_field_types() {
        let coupon: NormalizedCoupon = serde_json::from_value(json!({
            "code": "sale 30",
            "amount_numeric": "30",
            "discount_type": "percent",
            "product_ids": [12, 15],
            "minimum_amount": "25.00",
            "active_bool": true
        }))
        .expect("coupon decodes");

        assert_eq!(coupon.amount_numeric, 30.0);
        assert_eq!(coupon.product_ids, vec!["12", "15"]);
        assert_eq!(coupon.minimum_amount, Some(25.0));
        assert_eq!(coupon.discount_label(), "30% off");
    }

    #[test]
    fn fixed_amount_label_uses_currency() {
        let coupon = NormalizedCoupon { amount_numeric: 7.5, ..NormalizedCoupon::default() };
        assert_eq!(coupon.discount_label(), "$7.50 off");
    }
}
