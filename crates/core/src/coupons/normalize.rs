use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use crate::domain::coupon::{NormalizedCoupon, RawCoupon};
use crate::domain::fields;

const NAIVE_DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const ACTIVE_STATUSES: [&str; 3] = ["active", "publish", "enabled"];

pub fn normalize_coupon(raw: &RawCoupon) -> NormalizedCoupon {
    normalize_coupon_at(raw, Utc::now().timestamp())
}

/// Total over arbitrary input: unknown shapes fall back to defaults.
pub fn normalize_coupon_at(raw: &RawCoupon, synced_at: i64) -> NormalizedCoupon {
    let code = fields::first_text(raw, &["code", "coupon", "name"]).unwrap_or_default();
    let amount_numeric =
        raw.get("amount").and_then(fields::number).map(|amount| amount.max(0.0)).unwrap_or(0.0);
    let discount_type =
        raw.get("discount_type").and_then(fields::text).unwrap_or_else(|| "fixed_cart".into());

    let list = |key: &str| raw.get(key).map(fields::list).unwrap_or_default();
    let flag = |key: &str| raw.get(key).map(fields::flag).unwrap_or(false);
    let epoch = |key: &str| raw.get(key).and_then(parse_epoch);

    let status = raw.get("status").and_then(fields::text);
    // A numeric status of 1 counts as `true`.
    let active_bool = match raw.get("status") {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64() == Some(1.0),
        _ => status.as_deref().map(|status| ACTIVE_STATUSES.contains(&status)).unwrap_or(false),
    };

    NormalizedCoupon {
        id: raw.get("id").and_then(fields::text),
        code,
        amount_numeric,
        discount_type,
        description: raw.get("description").and_then(fields::text),
        date_expires: raw.get("date_expires").and_then(fields::text),
        date_start_epoch: epoch("date_start"),
        date_expires_epoch: epoch("date_expires"),
        product_ids: list("product_ids"),
        exclude_product_ids: list("exclude_product_ids"),
        product_categories: list("product_categories"),
        exclude_product_categories: list("exclude_product_categories"),
        email_restrictions: list("email_restrictions"),
        minimum_amount: raw.get("minimum_amount").and_then(fields::number),
        maximum_amount: raw.get("maximum_amount").and_then(fields::number),
        individual_use: flag("individual_use"),
        free_shipping: flag("free_shipping"),
        exclude_sale_items: flag("exclude_sale_items"),
        apply_to: raw.get("apply_to").and_then(fields::text),
        status,
        active_bool,
        last_synced_at: synced_at,
    }
}

/// Epoch seconds from a numeric timestamp or one of the accepted date formats.
/// Naive values are read as UTC.
pub fn parse_epoch(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|value| value.is_finite()).map(|v| v.trunc() as i64)),
        Value::String(text) => parse_date_text(text.trim()),
        _ => None,
    }
}

fn parse_date_text(text: &str) -> Option<i64> {
    if text.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|datetime| datetime.and_utc().timestamp());
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(text, format) {
            return Some(datetime.and_utc().timestamp());
        }
    }

    DateTime::parse_from_rfc3339(text).ok().map(|datetime| datetime.timestamp())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::{json, Value};

    use super::{normalize_coupon_at, parse_epoch};
    use crate::domain::coupon::RawCoupon;

    const SYNCED_AT: i64 = 1_700_000_000;

    fn raw(value: Value) -> RawCoupon {
        match value {
            Value::Object(map) => map,
            _ => RawCoupon::new(),
        }
    }

    #[test]
    fn empty_payload_gets_safe_defaults() {
        let coupon = normalize_coupon_at(&RawCoupon::new(), SYNCED_AT);

        assert_eq!(coupon.code, "");
        assert_eq!(coupon.amount_numeric, 0.0);
        assert_eq!(coupon.discount_type, "fixed_cart");
        assert!(!coupon.active_bool);
        assert!(coupon.product_ids.is_empty());
        assert_eq!(coupon.last_synced_at, SYNCED_AT);
    }

    #[test]
    fn code_falls_back_through_coupon_and_name() {
        let from_coupon = normalize_coupon_at(&raw(json!({"coupon": "  WEEKEND20 "})), SYNCED_AT);
        let from_name = normalize_coupon_at(&raw(json!({"code": "", "name": "winter50"})), SYNCED_AT);

        assert_eq!(from_coupon.code, "WEEKEND20");
        assert_eq!(from_name.code, "winter50");
    }

    #[test]
    fn amount_accepts_strings_and_rejects_garbage() {
        let numeric = normalize_coupon_at(&raw(json!({"amount": "12.50"})), SYNCED_AT);
        let garbage = normalize_coupon_at(&raw(json!({"amount": "ten"})), SYNCED_AT);
        let negative = normalize_coupon_at(&raw(json!({"amount": -4})), SYNCED_AT);

        assert_eq!(numeric.amount_numeric, 12.5);
        assert_eq!(garbage.amount_numeric, 0.0);
        assert_eq!(negative.amount_numeric, 0.0);
    }

    #[test]
    fn comma_separated_lists_are_split() {
        let coupon = normalize_coupon_at(
            &raw(json!({
                "product_ids": "12, 15",
                "email_restrictions": ["vip@example.com"],
                "product_categories": "Hoodies"
            })),
            SYNCED_AT,
        );

        assert_eq!(coupon.product_ids, vec!["12", "15"]);
        assert_eq!(coupon.email_restrictions, vec!["vip@example.com"]);
        assert_eq!(coupon.product_categories, vec!["Hoodies"]);
    }

    #[test]
    fn active_flag_tracks_status_vocabulary() {
        for (status, expected) in [
            (json!("publish"), true),
            (json!("active"), true),
            (json!("enabled"), true),
            (json!(true), true),
            (json!(1), true),
            (json!(1.0), true),
            (json!(0), false),
            (json!(2), false),
            (json!(false), false),
            (json!("draft"), false),
            (json!("Publish"), false),
        ] {
            let coupon = normalize_coupon_at(&raw(json!({"status": status})), SYNCED_AT);
            assert_eq!(coupon.active_bool, expected, "status {status}");
        }
    }

    #[test]
    fn dates_parse_in_every_accepted_format() {
        assert_eq!(parse_epoch(&json!(1_735_689_600)), Some(1_735_689_600));
        assert_eq!(parse_epoch(&json!("2025-01-01")), Some(1_735_689_600));
        assert_eq!(parse_epoch(&json!("2025-01-01T00:00:00")), Some(1_735_689_600));
        assert_eq!(parse_epoch(&json!("2025-01-01 00:00:00")), Some(1_735_689_600));
        assert_eq!(parse_epoch(&json!("2025-01-01T00:00")), Some(1_735_689_600));
        assert_eq!(parse_epoch(&json!("2025-01-01 00:00")), Some(1_735_689_600));
        assert_eq!(parse_epoch(&json!("2025-01-01T02:00:00+02:00")), Some(1_735_689_600));
        assert_eq!(parse_epoch(&json!("next tuesday")), None);
        assert_eq!(parse_epoch(&json!(null)), None);
    }

    #[test]
    fn unparseable_expiry_is_treated_as_unset() {
        let coupon = normalize_coupon_at(
            &raw(json!({"date_expires": "soon", "date_start": "2025-01-01"})),
            SYNCED_AT,
        );

        assert_eq!(coupon.date_expires_epoch, None);
        assert_eq!(coupon.date_expires.as_deref(), Some("soon"));
        assert_eq!(coupon.date_start_epoch, Some(1_735_689_600));
    }

    fn field_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|number| json!(number)),
            (-1.0e6f64..1.0e6).prop_map(|number| json!(number)),
            "[ -~]{0,24}".prop_map(Value::String),
            prop::collection::vec("[a-z0-9 ,]{0,8}", 0..4).prop_map(|items| json!(items)),
            Just(json!({"nested": [1, "two"]})),
        ]
    }

    fn raw_coupon() -> impl Strategy<Value = RawCoupon> {
        let keys = prop::sample::select(vec![
            "code",
            "amount",
            "discount_type",
            "status",
            "date_start",
            "date_expires",
            "product_ids",
            "product_categories",
            "email_restrictions",
            "minimum_amount",
            "maximum_amount",
            "individual_use",
            "free_shipping",
            "apply_to",
        ]);
        prop::collection::vec((keys, field_value()), 0..10).prop_map(|pairs| {
            pairs.into_iter().map(|(key, value)| (key.to_string(), value)).collect()
        })
    }

    proptest! {
        #[test]
        fn normalization_depends_only_on_input_and_clock(raw in raw_coupon(), later in 1i64..100_000) {
            let first = normalize_coupon_at(&raw, SYNCED_AT);
            let mut second = normalize_coupon_at(&raw, SYNCED_AT + later);

            prop_assert_eq!(second.last_synced_at, SYNCED_AT + later);
            second.last_synced_at = first.last_synced_at;
            prop_assert_eq!(&first, &second);
            prop_assert!(first.amount_numeric >= 0.0 && first.amount_numeric.is_finite());
        }
    }
}
