use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use super::index::{CatalogIndex, IndexError, QuerySpec, SearchRequest};
use crate::cache::{search_key, SearchCache};
use crate::config::IndexConfig;
use crate::domain::product::{Category, Product};

/// Index names the search layer reads from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexNames {
    pub products: String,
    pub categories: String,
    pub coupons: String,
}

impl Default for IndexNames {
    fn default() -> Self {
        Self {
            products: "products".to_string(),
            categories: "categories".to_string(),
            coupons: "coupons".to_string(),
        }
    }
}

impl From<&IndexConfig> for IndexNames {
    fn from(config: &IndexConfig) -> Self {
        Self {
            products: config.product_index.clone(),
            categories: config.category_index.clone(),
            coupons: config.coupon_index.clone(),
        }
    }
}

#[derive(Clone)]
struct CacheSettings {
    cache: Arc<dyn SearchCache>,
    ttl: Duration,
}

#[derive(Default)]
struct CascadeOutcome {
    hits: Vec<Value>,
    failed_stages: usize,
}

/// Product and category search over a [`CatalogIndex`].
#[derive(Clone)]
pub struct ProductSearch {
    index: Arc<dyn CatalogIndex>,
    names: IndexNames,
    cache: Option<CacheSettings>,
}

impl ProductSearch {
    pub fn new(index: Arc<dyn CatalogIndex>, names: IndexNames) -> Self {
        Self { index, names, cache: None }
    }

    pub fn with_cache(mut self, cache: Arc<dyn SearchCache>, ttl: Duration) -> Self {
        self.cache = Some(CacheSettings { cache, ttl });
        self
    }

    pub fn names(&self) -> &IndexNames {
        &self.names
    }

    /// Multi-strategy search: boosted, then wildcard, then fuzzy. Stops at the
    /// first stage that returns hits. A failing stage counts as empty.
    pub async fn search_products(&self, query: &str, limit: usize) -> Vec<Product> {
        self.search_product_sources(query, limit)
            .await
            .iter()
            .filter_map(Product::from_source)
            .collect()
    }

    /// Same cascade as [`Self::search_products`], returning raw hit sources.
    pub async fn search_product_sources(&self, query: &str, limit: usize) -> Vec<Value> {
        let key = search_key(query, limit);
        if let Some(settings) = &self.cache {
            if let Some(Value::Array(cached)) = settings.cache.get(&key).await {
                debug!(event_name = "catalog.search.cache_hit", query, limit, "search cache hit");
                return cached;
            }
        }

        let outcome = self.run_cascade(query, limit).await;

        // Empty or partially failed results are not cached; the index may be
        // recovering or still being populated.
        if let Some(settings) = &self.cache {
            if outcome.failed_stages == 0 && !outcome.hits.is_empty() {
                settings.cache.set(&key, Value::Array(outcome.hits.clone()), settings.ttl).await;
            }
        }
        outcome.hits
    }

    async fn run_cascade(&self, query: &str, limit: usize) -> CascadeOutcome {
        let mut outcome = CascadeOutcome::default();
        let trimmed = query.trim();
        let stages = if trimmed.is_empty() {
            vec![QuerySpec::MatchAll]
        } else {
            vec![
                QuerySpec::Boosted { query: trimmed.to_string() },
                QuerySpec::Wildcard { query: trimmed.to_lowercase() },
                QuerySpec::Fuzzy { query: trimmed.to_string() },
            ]
        };

        for spec in stages {
            let kind = spec.kind();
            let Some(hits) = self.stage(spec, limit).await else {
                outcome.failed_stages += 1;
                continue;
            };
            if !hits.is_empty() {
                debug!(
                    event_name = "catalog.search.stage_hit",
                    stage = kind,
                    hits = hits.len(),
                    "product search stage matched"
                );
                outcome.hits = hits;
                break;
            }
        }
        outcome
    }

    /// `None` when the index rejected the query; the failure is logged here.
    async fn stage(&self, spec: QuerySpec, limit: usize) -> Option<Vec<Value>> {
        let kind = spec.kind();
        match self.index.search(&self.names.products, &SearchRequest::new(spec, limit)).await {
            Ok(response) => Some(response.object_sources()),
            Err(error) => {
                warn!(
                    event_name = "catalog.search.stage_failed",
                    stage = kind,
                    error = %error,
                    "product search stage failed"
                );
                None
            }
        }
    }

    /// Single keyword query over the common product text fields.
    pub async fn search_simple(&self, query: &str, limit: usize) -> Result<Vec<Value>, IndexError> {
        let request =
            SearchRequest::new(QuerySpec::Keyword { query: query.trim().to_string() }, limit);
        let response = self.index.search(&self.names.products, &request).await?;
        Ok(response.object_sources())
    }

    pub async fn find_by_title(&self, title: &str) -> Result<Option<Value>, IndexError> {
        let title = title.trim();
        if title.is_empty() {
            return Ok(None);
        }
        let request = SearchRequest::new(QuerySpec::ExactTitle { title: title.to_string() }, 1);
        let response = self.index.search(&self.names.products, &request).await?;
        Ok(response.object_sources().into_iter().next())
    }

    /// Empty query lists categories; errors yield an empty list.
    pub async fn search_categories(&self, query: &str, limit: usize) -> Vec<Category> {
        let trimmed = query.trim();
        let spec = if trimmed.is_empty() {
            QuerySpec::MatchAll
        } else {
            QuerySpec::CategoryMatch { query: trimmed.to_string() }
        };

        match self.index.search(&self.names.categories, &SearchRequest::new(spec, limit)).await {
            Ok(response) => {
                response.object_sources().iter().filter_map(Category::from_source).collect()
            }
            Err(error) => {
                warn!(
                    event_name = "catalog.categories.search_failed",
                    error = %error,
                    "category search failed"
                );
                Vec::new()
            }
        }
    }
}
