use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::fields;

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(#[serde(deserialize_with = "fields::lenient_string")] pub String);

impl ProductId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProductId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A catalog record as stored in the product index.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Product {
    pub id: ProductId,
    #[serde(deserialize_with = "fields::lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "fields::lenient_string")]
    pub description: String,
    #[serde(deserialize_with = "fields::lenient_f64")]
    pub price: f64,
    #[serde(deserialize_with = "fields::lenient_string")]
    pub category: String,
    #[serde(deserialize_with = "fields::lenient_string")]
    pub sku: String,
    #[serde(deserialize_with = "fields::lenient_string")]
    pub status: String,
    #[serde(deserialize_with = "fields::lenient_string")]
    pub stock_status: String,
    #[serde(deserialize_with = "fields::lenient_optional_string")]
    pub image: Option<String>,
    #[serde(deserialize_with = "fields::lenient_list")]
    pub images: Vec<String>,
    #[serde(deserialize_with = "fields::lenient_string")]
    pub url: String,
    #[serde(deserialize_with = "fields::lenient_string")]
    pub slug: String,
}

impl Product {
    pub fn from_source(source: &Value) -> Option<Self> {
        if !source.is_object() {
            return None;
        }
        serde_json::from_value(source.clone()).ok()
    }

    /// Category names split out of the comma-joined `category` field.
    pub fn categories(&self) -> Vec<String> {
        self.category
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Category {
    #[serde(deserialize_with = "fields::lenient_string")]
    pub id: String,
    #[serde(deserialize_with = "fields::lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "fields::lenient_string")]
    pub slug: String,
    #[serde(deserialize_with = "fields::lenient_string")]
    pub description: String,
    #[serde(deserialize_with = "fields::lenient_u64")]
    pub count: u64,
    #[serde(deserialize_with = "fields::lenient_string")]
    pub parent: String,
}

impl Category {
    pub fn from_source(source: &Value) -> Option<Self> {
        if !source.is_object() {
            return None;
        }
        serde_json::from_value(source.clone()).ok()
    }
}

/// Display-ready product shape shared by recommendations and coupon flows.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichedProduct {
    pub id: Option<ProductId>,
    pub name: String,
    pub description: String,
    pub price: Option<f64>,
    pub image: Option<String>,
    pub url: Option<String>,
    pub category: Option<String>,
    pub stock_status: String,
    pub sku: String,
}

impl EnrichedProduct {
    /// Placeholder used when nothing in the catalog matches a suggested title.
    pub fn stub(title: &str) -> Self {
        Self {
            name: title.trim().to_string(),
            stock_status: "instock".to_string(),
            ..Self::default()
        }
    }

    pub fn categories(&self) -> Vec<String> {
        self.category
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl From<&Product> for EnrichedProduct {
    fn from(product: &Product) -> Self {
        let non_empty = |value: &str| (!value.is_empty()).then(|| value.to_string());
        Self {
            id: (!product.id.0.is_empty()).then(|| product.id.clone()),
            name: product.name.clone(),
            description: product.description.clone(),
            price: Some(product.price),
            image: product.image.clone().or_else(|| product.images.first().cloned()),
            url: non_empty(&product.url),
            category: non_empty(&product.category),
            stock_status: non_empty(&product.stock_status)
                .unwrap_or_else(|| "instock".to_string()),
            sku: product.sku.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Category, EnrichedProduct, Product, ProductId};

    #[test]
    fn product_source_accepts_numeric_ids_and_string_prices() {
        let product = Product::from_source(&json!({
            "id": 42,
            "name": "Logo Hoodie",
            "price": "39.50",
            "category": "Clothing, Hoodies",
            "images": ["https://cdn.example.com/hoodie.png"]
        }))
        .expect("product decodes");

        assert_eq!(product.id, ProductId::from("42"));
        assert_eq!(product.price, 39.5);
        assert_eq!(product.categories(), vec!["Clothing", "Hoodies"]);
        assert_eq!(product.stock_status, "");
    }

    #[test]
    fn non_object_sources_are_rejected() {
        assert!(Product::from_source(&json!("hoodie")).is_none());
        assert!(Category::from_source(&json!([1, 2])).is_none());
    }

    #[test]
    fn enriched_view_prefers_explicit_image_then_gallery() {
        let product = Product {
            id: ProductId::from("7"),
            name: "Beanie".to_string(),
            price: 12.0,
            images: vec!["https://cdn.example.com/beanie.png".to_string()],
            ..Product::default()
        };

        let enriched = EnrichedProduct::from(&product);
        assert_eq!(enriched.image.as_deref(), Some("https://cdn.example.com/beanie.png"));
        assert_eq!(enriched.stock_status, "instock");
        assert_eq!(enriched.price, Some(12.0));
        assert!(enriched.url.is_none());
    }

    #[test]
    fn stub_keeps_only_the_title() {
        let stub = EnrichedProduct::stub("  Mystery Mug ");
        assert_eq!(stub.name, "Mystery Mug");
        assert!(stub.id.is_none());
        assert!(stub.price.is_none());
    }
}
