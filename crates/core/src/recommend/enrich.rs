//! Turns heterogeneous product records into [`EnrichedProduct`]s.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::fields;
use crate::domain::product::{EnrichedProduct, ProductId};

/// The shapes an image field takes across catalog sources.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageField {
    Url(String),
    List(Vec<ImageField>),
    Object(Map<String, Value>),
}

impl ImageField {
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    /// First usable URL, depth-first.
    pub fn first_url(&self) -> Option<String> {
        match self {
            Self::Url(url) => Some(url.trim().to_string()).filter(|url| !url.is_empty()),
            Self::List(items) => items.iter().find_map(Self::first_url),
            Self::Object(map) => fields::first_text(map, &["src", "url", "image"]),
        }
    }

    pub fn all_urls(&self) -> Vec<String> {
        match self {
            Self::List(items) => items.iter().filter_map(Self::first_url).collect(),
            other => other.first_url().into_iter().collect(),
        }
    }
}

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag regex"));
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

pub fn strip_html(text: &str) -> String {
    let without_tags = TAG_RE.replace_all(text, " ");
    WHITESPACE_RE.replace_all(without_tags.trim(), " ").into_owned()
}

/// Accepts numbers or strings such as `"$1,299.00"`; anything else is `None`.
pub fn parse_price(value: &Value) -> Option<f64> {
    match value {
        Value::Number(_) => fields::number(value),
        Value::String(text) => {
            let cleaned: String =
                text.chars().filter(|ch| ch.is_ascii_digit() || *ch == '.' || *ch == '-').collect();
            if cleaned.is_empty() {
                return None;
            }
            cleaned.parse::<f64>().ok().filter(|price| price.is_finite())
        }
        _ => None,
    }
}

fn category_text(record: &Map<String, Value>) -> Option<String> {
    if let Some(category) = record.get("category").and_then(fields::text) {
        return Some(category);
    }
    let names: Vec<String> = match record.get("categories") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::Object(map) => fields::first_text(map, &["name", "slug"]),
                other => fields::text(other),
            })
            .collect(),
        Some(other) => fields::list(other),
        None => Vec::new(),
    };
    (!names.is_empty()).then(|| names.join(", "))
}

const IMAGE_KEYS: [&str; 7] =
    ["images", "image", "featured_image", "thumbnail", "image_url", "img", "picture"];

pub fn enrich_record(record: &Value) -> EnrichedProduct {
    let map = match record {
        Value::Object(map) => map,
        Value::String(title) => return EnrichedProduct::stub(title),
        _ => return EnrichedProduct::stub(""),
    };

    let image = IMAGE_KEYS
        .iter()
        .filter_map(|key| map.get(*key))
        .filter_map(ImageField::from_value)
        .find_map(|field| field.first_url());

    let price = ["price", "regular_price", "sale_price"]
        .iter()
        .filter_map(|key| map.get(*key))
        .find_map(parse_price);

    let description = fields::first_text(map, &["description", "short_description"])
        .map(|text| strip_html(&text))
        .unwrap_or_default();

    EnrichedProduct {
        id: fields::first_text(map, &["id", "_id", "product_id"]).map(ProductId),
        name: fields::first_text(map, &["name", "title", "product_name"]).unwrap_or_default(),
        description,
        price,
        image,
        url: fields::first_text(map, &["url", "permalink", "link", "product_url"]),
        category: category_text(map),
        stock_status: fields::first_text(map, &["stock_status"])
            .unwrap_or_else(|| "instock".to_string()),
        sku: fields::first_text(map, &["sku"]).unwrap_or_default(),
    }
}
