//! Index mappings, created on demand before the first write.

use serde_json::{json, Value};
use shopmate_core::catalog::{CatalogIndex, IndexError, IndexNames};
use tracing::info;

pub fn product_mapping() -> Value {
    json!({
        "mappings": {
            "properties": {
                "id": { "type": "keyword" },
                "name": {
                    "type": "text",
                    "analyzer": "standard",
                    "fields": { "keyword": { "type": "keyword", "ignore_above": 256 } }
                },
                "description": { "type": "text" },
                "price": { "type": "float" },
                "category": { "type": "text" },
                "sku": { "type": "keyword" },
                "status": { "type": "keyword" },
                "stock_status": { "type": "keyword" },
                "image": { "type": "keyword" },
                "images": { "type": "keyword" },
                "url": { "type": "keyword" },
                "slug": { "type": "keyword" }
            }
        }
    })
}

pub fn category_mapping() -> Value {
    json!({
        "mappings": {
            "properties": {
                "id": { "type": "keyword" },
                "name": { "type": "text" },
                "slug": { "type": "keyword" },
                "description": { "type": "text" },
                "count": { "type": "integer" },
                "parent": { "type": "keyword" }
            }
        }
    })
}

/// Product ids stay keywords; upstream ids are not guaranteed numeric.
pub fn coupon_mapping() -> Value {
    json!({
        "mappings": {
            "properties": {
                "code": { "type": "keyword" },
                "amount_numeric": { "type": "double" },
                "discount_type": { "type": "keyword" },
                "description": { "type": "text" },
                "date_start_epoch": { "type": "long" },
                "date_expires_epoch": { "type": "long" },
                "product_ids": { "type": "keyword" },
                "exclude_product_ids": { "type": "keyword" },
                "product_categories": { "type": "keyword" },
                "exclude_product_categories": { "type": "keyword" },
                "email_restrictions": { "type": "keyword" },
                "minimum_amount": { "type": "double" },
                "maximum_amount": { "type": "double" },
                "active_bool": { "type": "boolean" },
                "last_synced_at": { "type": "long" }
            }
        }
    })
}

/// Creates any missing index. Returns the names that were created.
pub async fn ensure_indices(
    index: &dyn CatalogIndex,
    names: &IndexNames,
) -> Result<Vec<String>, IndexError> {
    let wanted = [
        (names.products.as_str(), product_mapping()),
        (names.categories.as_str(), category_mapping()),
        (names.coupons.as_str(), coupon_mapping()),
    ];

    let mut created = Vec::new();
    for (name, mapping) in wanted {
        if index.index_exists(name).await? {
            continue;
        }
        index.create_index(name, &mapping).await?;
        info!(event_name = "index.mapping.created", index = name, "created search index");
        created.push(name.to_string());
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use shopmate_core::catalog::{CatalogIndex, InMemoryIndex, IndexNames};

    use super::{ensure_indices, product_mapping};

    #[test]
    fn product_name_has_keyword_subfield_for_exact_titles() {
        let mapping = product_mapping();
        assert_eq!(
            mapping["mappings"]["properties"]["name"]["fields"]["keyword"]["type"],
            "keyword"
        );
    }

    #[tokio::test]
    async fn ensure_indices_only_creates_missing() {
        let index = InMemoryIndex::new();
        index.seed("products", Vec::new());

        let created = ensure_indices(&index, &IndexNames::default()).await.expect("ensure works");
        assert_eq!(created, vec!["categories".to_string(), "coupons".to_string()]);
        assert!(index.index_exists("coupons").await.expect("exists check"));

        let again = ensure_indices(&index, &IndexNames::default()).await.expect("ensure works");
        assert!(again.is_empty());
    }
}
