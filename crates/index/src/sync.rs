//! Pulls the upstream catalog into the search index.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use shopmate_core::cache::{SearchCache, SEARCH_PREFIX};
use shopmate_core::catalog::{
    ingest_category, ingest_product, CatalogIndex, IndexDocument, IndexError, IndexNames,
};
use shopmate_core::coupons::normalize_coupon_at;
use shopmate_core::errors::ApplicationError;
use thiserror::Error;
use tracing::{info, warn};

use crate::mappings::ensure_indices;
use crate::upstream::{CatalogSource, UpstreamError};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error(transparent)]
    Index(#[from] IndexError),
}

impl From<SyncError> for ApplicationError {
    fn from(value: SyncError) -> Self {
        match value {
            SyncError::Upstream(error) => Self::Upstream(error.to_string()),
            SyncError::Index(error) => Self::from(error),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub products: usize,
    pub categories: usize,
    pub coupons: usize,
}

#[derive(Clone)]
pub struct CatalogSync {
    index: Arc<dyn CatalogIndex>,
    source: Arc<dyn CatalogSource>,
    names: IndexNames,
    product_base_url: String,
    cache: Option<Arc<dyn SearchCache>>,
}

impl CatalogSync {
    pub fn new(
        index: Arc<dyn CatalogIndex>,
        source: Arc<dyn CatalogSource>,
        names: IndexNames,
        product_base_url: impl Into<String>,
    ) -> Self {
        Self { index, source, names, product_base_url: product_base_url.into(), cache: None }
    }

    /// Search results are dropped from this cache after every refresh.
    pub fn with_cache(mut self, cache: Arc<dyn SearchCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub async fn refresh_products(&self) -> Result<usize, SyncError> {
        ensure_indices(self.index.as_ref(), &self.names).await?;
        let raw = self.source.fetch_products().await?;
        let fetched = raw.len();

        let documents: Vec<IndexDocument> = raw
            .iter()
            .filter_map(|record| ingest_product(record, &self.product_base_url))
            .filter_map(|product| document(product.id.as_str().to_string(), &product))
            .collect();
        if documents.len() < fetched {
            warn!(
                event_name = "sync.products.skipped",
                skipped = fetched - documents.len(),
                "skipped products without id or usable price"
            );
        }

        let written = self.index.bulk_upsert(&self.names.products, documents).await?;
        self.invalidate_search().await;
        info!(event_name = "sync.products.completed", fetched, written, "product refresh completed");
        Ok(written)
    }

    pub async fn refresh_categories(&self) -> Result<usize, SyncError> {
        ensure_indices(self.index.as_ref(), &self.names).await?;
        let raw = self.source.fetch_categories().await?;

        let documents: Vec<IndexDocument> = raw
            .iter()
            .filter_map(ingest_category)
            .filter_map(|category| {
                let id = if category.id.is_empty() { category.name.clone() } else { category.id.clone() };
                document(id, &category)
            })
            .collect();

        let written = self.index.bulk_upsert(&self.names.categories, documents).await?;
        self.invalidate_search().await;
        info!(
            event_name = "sync.categories.completed",
            fetched = raw.len(),
            written,
            "category refresh completed"
        );
        Ok(written)
    }

    /// Coupons are keyed by code, or by id when the code is blank.
    pub async fn refresh_coupons(&self) -> Result<usize, SyncError> {
        ensure_indices(self.index.as_ref(), &self.names).await?;
        let raw = self.source.fetch_coupons().await?;
        let synced_at = Utc::now().timestamp();

        let documents: Vec<IndexDocument> = raw
            .iter()
            .filter_map(Value::as_object)
            .map(|record| normalize_coupon_at(record, synced_at))
            .filter_map(|coupon| {
                let id = if coupon.code.is_empty() {
                    coupon.id.clone().unwrap_or_default()
                } else {
                    coupon.code.clone()
                };
                if id.is_empty() {
                    return None;
                }
                document(id, &coupon)
            })
            .collect();

        let written = self.index.bulk_upsert(&self.names.coupons, documents).await?;
        self.invalidate_search().await;
        info!(
            event_name = "sync.coupons.completed",
            fetched = raw.len(),
            written,
            "coupon refresh completed"
        );
        Ok(written)
    }

    pub async fn refresh_all(&self) -> Result<SyncReport, SyncError> {
        let categories = self.refresh_categories().await?;
        let products = self.refresh_products().await?;
        let coupons = self.refresh_coupons().await?;
        Ok(SyncReport { products, categories, coupons })
    }

    async fn invalidate_search(&self) {
        if let Some(cache) = &self.cache {
            let dropped = cache.invalidate(SEARCH_PREFIX).await;
            if dropped > 0 {
                info!(event_name = "sync.cache.invalidated", dropped, "search cache invalidated");
            }
        }
    }
}

fn document<T: Serialize>(id: String, record: &T) -> Option<IndexDocument> {
    match serde_json::to_value(record) {
        Ok(body) => Some(IndexDocument { id, body }),
        Err(error) => {
            warn!(event_name = "sync.document.encode_failed", id, error = %error, "skipping record");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{json, Value};
    use shopmate_core::cache::{search_key, InMemorySearchCache, SearchCache};
    use shopmate_core::catalog::{InMemoryIndex, IndexNames};

    use super::{CatalogSync, SyncReport};
    use crate::upstream::{CatalogSource, UpstreamError};

    struct FixedSource {
        products: Vec<Value>,
        categories: Vec<Value>,
        coupons: Vec<Value>,
    }

    #[async_trait]
    impl CatalogSource for FixedSource {
        async fn fetch_products(&self) -> Result<Vec<Value>, UpstreamError> {
            Ok(self.products.clone())
        }

        async fn fetch_categories(&self) -> Result<Vec<Value>, UpstreamError> {
            Ok(self.categories.clone())
        }

        async fn fetch_coupons(&self) -> Result<Vec<Value>, UpstreamError> {
            Ok(self.coupons.clone())
        }
    }

    struct DownSource;

    #[async_trait]
    impl CatalogSource for DownSource {
        async fn fetch_products(&self) -> Result<Vec<Value>, UpstreamError> {
            Err(UpstreamError::NotConfigured)
        }

        async fn fetch_categories(&self) -> Result<Vec<Value>, UpstreamError> {
            Err(UpstreamError::NotConfigured)
        }

        async fn fetch_coupons(&self) -> Result<Vec<Value>, UpstreamError> {
            Err(UpstreamError::NotConfigured)
        }
    }

    fn source() -> Arc<FixedSource> {
        Arc::new(FixedSource {
            products: vec![
                json!({"id": 1, "name": "Logo Hoodie", "price": "45.00", "categories": [{"name": "Clothing"}]}),
                json!({"id": 2, "name": "Broken", "price": ""}),
                json!("not a product"),
            ],
            categories: vec![json!({"id": 7, "name": "Clothing", "count": 3})],
            coupons: vec![
                json!({"code": "sale 30", "amount": "30", "discount_type": "percent", "status": "publish"}),
                json!({"id": 99, "amount": "5"}),
                json!({"amount": "1"}),
            ],
        })
    }

    #[tokio::test]
    async fn refresh_all_indexes_clean_records_and_reports_counts() {
        let index = Arc::new(InMemoryIndex::new());
        let sync =
            CatalogSync::new(index.clone(), source(), IndexNames::default(), "https://shop.test");

        let report = sync.refresh_all().await.expect("refresh succeeds");
        assert_eq!(report, SyncReport { products: 1, categories: 1, coupons: 2 });

        let products = index.documents("products");
        assert_eq!(products[0]["name"], "Logo Hoodie");
        assert_eq!(products[0]["url"], "https://shop.test/product/1/");

        let coupons = index.documents("coupons");
        assert!(coupons.iter().any(|coupon| coupon["code"] == "sale 30" && coupon["active_bool"] == true));
        assert!(coupons.iter().any(|coupon| coupon["id"] == "99"));
        assert!(index.mapping("coupons").is_some());
    }

    #[tokio::test]
    async fn refresh_drops_cached_searches() {
        let index = Arc::new(InMemoryIndex::new());
        let cache = Arc::new(InMemorySearchCache::new());
        cache.set(&search_key("hoodie", 10), json!([]), Duration::from_secs(60)).await;
        cache.set("other:key", json!(1), Duration::from_secs(60)).await;

        let sync = CatalogSync::new(index, source(), IndexNames::default(), "https://shop.test")
            .with_cache(cache.clone());
        sync.refresh_coupons().await.expect("refresh succeeds");

        assert_eq!(cache.len(), 1);
        assert!(cache.get("other:key").await.is_some());
    }

    #[tokio::test]
    async fn upstream_failure_is_returned_to_the_caller() {
        let index = Arc::new(InMemoryIndex::new());
        let sync = CatalogSync::new(index, Arc::new(DownSource), IndexNames::default(), "");

        assert!(sync.refresh_products().await.is_err());
    }
}
