//! Maps upstream store payloads onto index records.

use serde_json::Value;

use crate::domain::fields;
use crate::domain::product::{Category, Product, ProductId};
use crate::recommend::enrich::{parse_price, strip_html, ImageField};

pub const DEFAULT_CATEGORY: &str = "Uncategorized";

/// Returns `None` for records without an id or a usable price.
pub fn ingest_product(raw: &Value, product_base_url: &str) -> Option<Product> {
    let map = raw.as_object()?;
    let id = map.get("id").and_then(fields::text)?;
    let price = map.get("price").and_then(parse_price).filter(|price| *price >= 0.0)?;

    let categories: Vec<String> = match map.get("categories") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::Object(category) => fields::first_text(category, &["name", "slug"]),
                other => fields::text(other),
            })
            .collect(),
        Some(other) => fields::list(other),
        None => Vec::new(),
    };
    let category =
        if categories.is_empty() { DEFAULT_CATEGORY.to_string() } else { categories.join(", ") };

    let images = map
        .get("images")
        .and_then(ImageField::from_value)
        .map(|field| field.all_urls())
        .unwrap_or_default();
    let slug = map.get("slug").and_then(fields::text).unwrap_or_default();
    let base = product_base_url.trim_end_matches('/');
    let url = map.get("permalink").and_then(fields::text).unwrap_or_else(|| {
        let path = if slug.is_empty() { id.as_str() } else { slug.as_str() };
        format!("{base}/product/{path}/")
    });

    Some(Product {
        id: ProductId(id.clone()),
        name: map.get("name").and_then(fields::text).unwrap_or_else(|| "Unknown Product".into()),
        description: map
            .get("description")
            .and_then(fields::text)
            .map(|text| strip_html(&text))
            .unwrap_or_default(),
        price,
        category,
        sku: map.get("sku").and_then(fields::text).unwrap_or(id),
        status: map.get("status").and_then(fields::text).unwrap_or_else(|| "publish".into()),
        stock_status: map
            .get("stock_status")
            .and_then(fields::text)
            .unwrap_or_else(|| "instock".into()),
        image: images.first().cloned(),
        images,
        url,
        slug,
    })
}

pub fn ingest_category(raw: &Value) -> Option<Category> {
    let category = Category::from_source(raw)?;
    (!category.id.is_empty() || !category.name.is_empty()).then_some(Category {
        description: strip_html(&category.description),
        ..category
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ingest_category, ingest_product};

    const BASE: &str = "https://shop.example.com/";

    #[test]
    fn products_without_usable_price_are_skipped() {
        assert!(ingest_product(&json!({"id": 1, "name": "Free thing", "price": ""}), BASE).is_none());
        assert!(ingest_product(&json!({"id": 2, "price": "n/a"}), BASE).is_none());
        assert!(ingest_product(&json!({"name": "No id", "price": "5"}), BASE).is_none());
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let product =
            ingest_product(&json!({"id": 5, "price": "12.00"}), BASE).expect("product ingests");

        assert_eq!(product.name, "Unknown Product");
        assert_eq!(product.category, "Uncategorized");
        assert_eq!(product.sku, "5");
        assert_eq!(product.status, "publish");
        assert_eq!(product.stock_status, "instock");
        assert_eq!(product.url, "https://shop.example.com/product/5/");
        assert!(product.image.is_none());
    }

    #[test]
    fn slug_permalink_and_images_are_mapped() {
        let with_slug = ingest_product(
            &json!({
                "id": 8,
                "name": "Beach Towel",
                "price": 15,
                "slug": "beach-towel",
                "categories": ["Accessories", "Summer"],
                "images": ["https://cdn.example.com/towel.png", "https://cdn.example.com/towel-2.png"]
            }),
            BASE,
        )
        .expect("product ingests");

        assert_eq!(with_slug.url, "https://shop.example.com/product/beach-towel/");
        assert_eq!(with_slug.category, "Accessories, Summer");
        assert_eq!(with_slug.image.as_deref(), Some("https://cdn.example.com/towel.png"));
        assert_eq!(with_slug.images.len(), 2);

        let with_permalink = ingest_product(
            &json!({"id": 9, "price": "3", "permalink": "https://shop.example.com/p/9"}),
            BASE,
        )
        .expect("product ingests");
        assert_eq!(with_permalink.url, "https://shop.example.com/p/9");
    }

    #[test]
    fn categories_need_an_id_or_name() {
        let category = ingest_category(&json!({
            "id": 3,
            "name": "Drinks",
            "description": "<p>Cold ones</p>",
            "count": "4"
        }))
        .expect("category ingests");

        assert_eq!(category.id, "3");
        assert_eq!(category.description, "Cold ones");
        assert_eq!(category.count, 4);
        assert!(ingest_category(&json!({"count": 2})).is_none());
    }
}
