use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, warn};

use super::enrich::enrich_record;
use crate::catalog::{IndexError, ProductSearch};
use crate::domain::product::EnrichedProduct;

/// Lookup operations the resolver needs from the catalog.
#[async_trait]
pub trait ProductLookup: Send + Sync {
    async fn exact_title(&self, title: &str) -> Result<Option<Value>, IndexError>;
    async fn keyword(&self, query: &str, limit: usize) -> Result<Vec<Value>, IndexError>;
    async fn multi_strategy(&self, query: &str, limit: usize) -> Vec<Value>;
}

#[async_trait]
impl ProductLookup for ProductSearch {
    async fn exact_title(&self, title: &str) -> Result<Option<Value>, IndexError> {
        self.find_by_title(title).await
    }

    async fn keyword(&self, query: &str, limit: usize) -> Result<Vec<Value>, IndexError> {
        self.search_simple(query, limit).await
    }

    async fn multi_strategy(&self, query: &str, limit: usize) -> Vec<Value> {
        self.search_product_sources(query, limit).await
    }
}

#[async_trait]
impl<T: ProductLookup + ?Sized> ProductLookup for Arc<T> {
    async fn exact_title(&self, title: &str) -> Result<Option<Value>, IndexError> {
        (**self).exact_title(title).await
    }

    async fn keyword(&self, query: &str, limit: usize) -> Result<Vec<Value>, IndexError> {
        (**self).keyword(query, limit).await
    }

    async fn multi_strategy(&self, query: &str, limit: usize) -> Vec<Value> {
        (**self).multi_strategy(query, limit).await
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolveRequest {
    /// One result per title, in input order.
    Titles(Vec<String>),
    /// Multi-strategy search, each hit enriched.
    Query { query: String, limit: usize },
}

pub struct RecommendationResolver<L> {
    lookup: L,
}

impl<L: ProductLookup> RecommendationResolver<L> {
    pub fn new(lookup: L) -> Self {
        Self { lookup }
    }

    pub async fn resolve(&self, request: ResolveRequest) -> Vec<EnrichedProduct> {
        match request {
            ResolveRequest::Titles(titles) => self.resolve_titles(&titles).await,
            ResolveRequest::Query { query, limit } => self.resolve_query(&query, limit).await,
        }
    }

    /// Lookups for different titles run concurrently; output order follows input.
    pub async fn resolve_titles(&self, titles: &[String]) -> Vec<EnrichedProduct> {
        join_all(titles.iter().map(|title| self.resolve_title(title))).await
    }

    /// Exact title, then a one-hit keyword search, then a title-only stub.
    pub async fn resolve_title(&self, title: &str) -> EnrichedProduct {
        let title = title.trim();
        if title.is_empty() {
            return EnrichedProduct::stub(title);
        }

        match self.lookup.exact_title(title).await {
            Ok(Some(record)) => return enrich_record(&record),
            Ok(None) => {}
            Err(error) => warn!(
                event_name = "recommend.resolve.exact_failed",
                title,
                error = %error,
                "exact title lookup failed"
            ),
        }

        match self.lookup.keyword(title, 1).await {
            Ok(records) => {
                if let Some(record) = records.first() {
                    return enrich_record(record);
                }
            }
            Err(error) => warn!(
                event_name = "recommend.resolve.keyword_failed",
                title,
                error = %error,
                "keyword lookup failed"
            ),
        }

        debug!(event_name = "recommend.resolve.stub", title, "no catalog match for title");
        EnrichedProduct::stub(title)
    }

    pub async fn resolve_query(&self, query: &str, limit: usize) -> Vec<EnrichedProduct> {
        self.lookup.multi_strategy(query, limit).await.iter().map(enrich_record).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::{ProductLookup, RecommendationResolver, ResolveRequest};
    use crate::catalog::IndexError;

    #[derive(Default)]
    struct StubLookup {
        exact: HashMap<String, Value>,
        keyword: HashMap<String, Value>,
        failing_exact: bool,
        calls: Mutex<Vec<String>>,
    }

    impl StubLookup {
        fn log(&self, entry: String) {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(entry);
            }
        }
    }

    #[async_trait]
    impl ProductLookup for StubLookup {
        async fn exact_title(&self, title: &str) -> Result<Option<Value>, IndexError> {
            self.log(format!("exact:{title}"));
            if self.failing_exact {
                return Err(IndexError::Transport("down".into()));
            }
            Ok(self.exact.get(title).cloned())
        }

        async fn keyword(&self, query: &str, _limit: usize) -> Result<Vec<Value>, IndexError> {
            self.log(format!("keyword:{query}"));
            Ok(self.keyword.get(query).cloned().into_iter().collect())
        }

        async fn multi_strategy(&self, query: &str, limit: usize) -> Vec<Value> {
            self.log(format!("multi:{query}"));
            (0..limit).map(|n| json!({"id": n, "name": format!("{query} {n}")})).collect()
        }
    }

    fn titles(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[tokio::test]
    async fn each_title_uses_the_first_successful_lookup() {
        let mut lookup = StubLookup::default();
        lookup.exact.insert("A".into(), json!({"id": 1, "name": "A", "price": 10.0}));
        lookup.keyword.insert("B".into(), json!({"id": 2, "name": "B", "price": 20.0}));

        let resolver = RecommendationResolver::new(lookup);
        let resolved = resolver.resolve(ResolveRequest::Titles(titles(&["A", "B", "C"]))).await;

        let names: Vec<_> = resolved.iter().map(|product| product.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert_eq!(resolved[0].price, Some(10.0));
        assert_eq!(resolved[1].price, Some(20.0));
        assert!(resolved[2].id.is_none());
        assert!(resolved[2].price.is_none());

        let calls = resolver.lookup.calls.lock().map(|calls| calls.clone()).unwrap_or_default();
        assert!(calls.contains(&"exact:A".to_string()));
        assert!(!calls.contains(&"keyword:A".to_string()));
        assert!(calls.contains(&"keyword:C".to_string()));
    }

    #[tokio::test]
    async fn lookup_errors_fall_through_to_the_next_step() {
        let mut lookup = StubLookup { failing_exact: true, ..StubLookup::default() };
        lookup.keyword.insert("Hat".into(), json!({"id": 9, "name": "Sun Hat"}));

        let resolver = RecommendationResolver::new(lookup);
        let resolved = resolver.resolve_titles(&titles(&["Hat"])).await;
        assert_eq!(resolved[0].name, "Sun Hat");
    }

    #[tokio::test]
    async fn query_mode_enriches_every_hit() {
        let resolver = RecommendationResolver::new(StubLookup::default());
        let resolved =
            resolver.resolve(ResolveRequest::Query { query: "mug".into(), limit: 2 }).await;

        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[1].name, "mug 1");
    }

    #[tokio::test]
    async fn empty_title_list_resolves_to_nothing() {
        let resolver = RecommendationResolver::new(StubLookup::default());
        assert!(resolver.resolve_titles(&[]).await.is_empty());
    }
}
