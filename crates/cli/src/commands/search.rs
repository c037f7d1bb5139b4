use std::sync::Arc;

use serde_json::json;
use shopmate_core::catalog::{IndexNames, ProductSearch};
use shopmate_core::config::{AppConfig, LoadOptions};
use shopmate_index::connect_with_settings;

use crate::commands::{block_on, CommandResult, EXIT_CONFIG, EXIT_INVALID_INPUT, EXIT_UNAVAILABLE};

pub const DEFAULT_LIMIT: usize = 10;
const MAX_LIMIT: usize = 50;
const MAX_QUERY_CHARS: usize = 200;

pub fn run(query: &str, limit: usize) -> CommandResult {
    let query = match validate(query, limit) {
        Ok(query) => query,
        Err(message) => {
            return CommandResult::failure("search", "invalid_input", message, EXIT_INVALID_INPUT);
        }
    };

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "search",
                "config_validation",
                format!("config validation failed: {error}"),
                EXIT_CONFIG,
            );
        }
    };

    let index = match connect_with_settings(&config.index.url, config.index.timeout_secs) {
        Ok(index) => index,
        Err(error) => {
            return CommandResult::failure(
                "search",
                "client_setup",
                format!("search index client setup failed: {error}"),
                EXIT_UNAVAILABLE,
            );
        }
    };
    let search = ProductSearch::new(Arc::new(index), IndexNames::from(&config.index));

    match block_on(execute(&search, query, limit)) {
        Ok(result) => result,
        Err(error) => {
            CommandResult::failure("search", "runtime", format!("{error:#}"), EXIT_UNAVAILABLE)
        }
    }
}

pub fn validate(query: &str, limit: usize) -> Result<&str, String> {
    let query = query.trim();
    if query.is_empty() {
        return Err("query must not be empty".to_string());
    }
    if query.chars().count() > MAX_QUERY_CHARS {
        return Err(format!("query must be at most {MAX_QUERY_CHARS} characters"));
    }
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(format!("limit must be between 1 and {MAX_LIMIT}"));
    }
    Ok(query)
}

pub async fn execute(search: &ProductSearch, query: &str, limit: usize) -> CommandResult {
    let products = search.search_products(query, limit).await;
    if products.is_empty() {
        return CommandResult::success_with(
            "search",
            format!("no products found for '{query}'"),
            Some(json!([])),
        );
    }

    let mut lines = vec![format!("{} result(s) for '{query}':", products.len())];
    lines.extend(products.iter().map(|product| {
        let category =
            if product.category.is_empty() { "uncategorized" } else { product.category.as_str() };
        format!("• {} - ${:.2} ({category})", product.name, product.price)
    }));

    CommandResult::success_with("search", lines.join("\n"), Some(json!(products)))
}
