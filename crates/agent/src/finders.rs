//! Product and category browsing replies.

use std::sync::Arc;

use shopmate_core::catalog::ProductSearch;
use tracing::warn;

use crate::llm::LlmClient;

pub const BROWSE_LIMIT: usize = 50;
pub const PRODUCT_SEARCH_LIMIT: usize = 10;
pub const CATEGORY_SEARCH_LIMIT: usize = 20;

const SHOW_ALL_PRODUCTS: &[&str] =
    &["all products", "show all", "list all", "every product", "all items", "everything"];
const SHOW_ALL_CATEGORIES: &[&str] = &[
    "all categories",
    "show all categories",
    "list all categories",
    "what categories",
    "categories do you have",
    "product categories",
];

const MAX_TERMS_CHARS: usize = 120;

/// Asks the model for compact search keywords. Falls back to the query itself.
async fn search_terms(llm: &dyn LlmClient, subject: &str, query: &str) -> String {
    let prompt = format!(
        "Rewrite the shopper's request as a short {subject} search query of a few keywords. \
         Reply with the keywords only.\n\nRequest: {query}"
    );
    match llm.generate_text(&prompt, 30).await {
        Ok(reply) => {
            let terms = reply
                .lines()
                .map(|line| line.trim().trim_matches(['"', '\'', '`']).trim())
                .find(|line| !line.is_empty())
                .unwrap_or_default();
            if terms.is_empty() || terms.chars().count() > MAX_TERMS_CHARS {
                query.to_string()
            } else {
                terms.to_string()
            }
        }
        Err(error) => {
            warn!(
                event_name = "agent.finder.terms_failed",
                subject,
                error = %error,
                "search term rewrite failed; using the raw query"
            );
            query.to_string()
        }
    }
}

fn wants_everything(query: &str, phrases: &[&str]) -> bool {
    let lowered = query.to_lowercase();
    phrases.iter().any(|phrase| lowered.contains(phrase))
}

pub struct ProductFinder {
    search: Arc<ProductSearch>,
    llm: Arc<dyn LlmClient>,
}

impl ProductFinder {
    pub fn new(search: Arc<ProductSearch>, llm: Arc<dyn LlmClient>) -> Self {
        Self { search, llm }
    }

    pub async fn respond(&self, query: &str) -> String {
        let show_all = wants_everything(query, SHOW_ALL_PRODUCTS);
        let (products, intro) = if show_all {
            (self.search.search_products("", BROWSE_LIMIT).await, "Here are all our available products:")
        } else {
            let terms = search_terms(self.llm.as_ref(), "product", query).await;
            (
                self.search.search_products(&terms, PRODUCT_SEARCH_LIMIT).await,
                "Here are the products I found:",
            )
        };

        if products.is_empty() {
            return if show_all {
                "I don't have any products available right now. Please try refreshing the product catalog."
                    .to_string()
            } else {
                "I don't have any products matching your criteria right now. Could you try a different search term?"
                    .to_string()
            };
        }

        let lines: Vec<String> = products
            .iter()
            .map(|product| {
                format!("• {} - ${:.2} ({})", product.name, product.price, product.category)
            })
            .collect();
        format!("{intro}\n\n{}\n\nWould you like more details about any of these?", lines.join("\n"))
    }
}

pub struct CategoryFinder {
    search: Arc<ProductSearch>,
    llm: Arc<dyn LlmClient>,
}

impl CategoryFinder {
    pub fn new(search: Arc<ProductSearch>, llm: Arc<dyn LlmClient>) -> Self {
        Self { search, llm }
    }

    pub async fn respond(&self, query: &str) -> String {
        let show_all = wants_everything(query, SHOW_ALL_CATEGORIES);
        let (categories, intro) = if show_all {
            (
                self.search.search_categories("", BROWSE_LIMIT).await,
                "Here are all our product categories:",
            )
        } else {
            let terms = search_terms(self.llm.as_ref(), "category", query).await;
            (
                self.search.search_categories(&terms, CATEGORY_SEARCH_LIMIT).await,
                "Here are the categories I found:",
            )
        };

        if categories.is_empty() {
            return if show_all {
                "I don't have any categories available right now. Please try refreshing the catalog."
                    .to_string()
            } else {
                "I don't have any categories matching your request. Could you try a different search?"
                    .to_string()
            };
        }

        let lines: Vec<String> = categories
            .iter()
            .map(|category| format!("• {} ({} products)", category.name, category.count))
            .collect();
        format!(
            "{intro}\n\n{}\n\nWould you like to see products from any of these categories?",
            lines.join("\n")
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use shopmate_core::catalog::{IndexNames, InMemoryIndex, ProductSearch};

    use super::{CategoryFinder, ProductFinder};
    use crate::llm::ScriptedLlmClient;

    fn search() -> Arc<ProductSearch> {
        let index = Arc::new(InMemoryIndex::new());
        index.seed(
            "products",
            vec![
                json!({"id": "1", "name": "Logo Hoodie", "price": 45.0, "category": "Clothing"}),
                json!({"id": "2", "name": "Green Tea", "price": 6.5, "category": "Beverages"}),
            ],
        );
        index.seed(
            "categories",
            vec![
                json!({"id": "7", "name": "Clothing", "count": 12, "description": "Hoodies and shirts"}),
                json!({"id": "8", "name": "Beverages", "count": 4, "description": "Tea and drinks"}),
            ],
        );
        Arc::new(ProductSearch::new(index, IndexNames::default()))
    }

    #[tokio::test]
    async fn show_all_browses_without_the_model() {
        let llm = Arc::new(ScriptedLlmClient::offline());
        let finder = ProductFinder::new(search(), llm.clone());

        let reply = finder.respond("Show all products please").await;
        assert!(reply.starts_with("Here are all our available products:\n\n"));
        assert!(reply.contains("• Logo Hoodie - $45.00 (Clothing)"));
        assert!(reply.contains("• Green Tea - $6.50 (Beverages)"));
        assert!(llm.prompts().is_empty());
    }

    #[tokio::test]
    async fn rewritten_terms_drive_the_search() {
        let llm = Arc::new(ScriptedLlmClient::new().when("product search query", "\"hoodie\"\n"));
        let finder = ProductFinder::new(search(), llm);

        let reply = finder.respond("do you have something warm to wear with a hood?").await;
        assert!(reply.starts_with("Here are the products I found:"));
        assert!(reply.contains("Logo Hoodie"));
        assert!(!reply.contains("Green Tea"));
    }

    #[tokio::test]
    async fn model_failure_searches_the_raw_query() {
        let finder = ProductFinder::new(search(), Arc::new(ScriptedLlmClient::offline()));

        assert!(finder.respond("green tea").await.contains("Green Tea"));
        assert_eq!(
            finder.respond("zzzz").await,
            "I don't have any products matching your criteria right now. Could you try a different search term?"
        );
    }

    #[tokio::test]
    async fn categories_list_counts() {
        let finder = CategoryFinder::new(search(), Arc::new(ScriptedLlmClient::offline()));

        let all = finder.respond("What categories do you have?").await;
        assert!(all.starts_with("Here are all our product categories:"));
        assert!(all.contains("• Clothing (12 products)"));
        assert!(all.contains("• Beverages (4 products)"));

        let filtered = finder.respond("drinks").await;
        assert!(filtered.contains("• Beverages (4 products)"));
        assert!(!filtered.contains("Clothing"));
    }
}
