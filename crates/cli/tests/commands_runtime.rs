use std::env;
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use serde_json::{json, Value};
use shopmate_cli::commands::{config, doctor, search, sync};
use shopmate_core::catalog::{InMemoryIndex, IndexNames, ProductSearch};
use shopmate_index::{CatalogSource, CatalogSync, UpstreamError};

#[test]
fn config_reports_env_sources_and_redacts_api_key() {
    with_env(
        &[("SHOPMATE_LLM_PROVIDER", "openai"), ("SHOPMATE_LLM_API_KEY", "sk-secret-value")],
        || {
            let output = config::run();

            assert!(output.contains("- llm.provider = OpenAi (source: env (SHOPMATE_LLM_PROVIDER))"));
            assert!(output.contains("- llm.api_key = sk-*** (source: env (SHOPMATE_LLM_API_KEY))"));
            assert!(!output.contains("sk-secret-value"));
        },
    );
}

#[test]
fn doctor_skips_dependent_checks_when_config_is_invalid() {
    with_env(&[("SHOPMATE_LLM_PROVIDER", "openai")], || {
        let payload = parse_payload(&doctor::run(true));

        assert_eq!(payload["overall_status"], "fail");
        let checks = payload["checks"].as_array().expect("checks array");
        assert_eq!(checks[0]["name"], "config_validation");
        assert_eq!(checks[0]["status"], "fail");
        assert!(checks[1..].iter().all(|check| check["status"] == "skipped"));
    });
}

#[test]
fn sync_refuses_to_run_without_upstream_endpoint() {
    with_env(&[], || {
        let result = sync::run();
        assert_eq!(result.exit_code, 4, "expected unavailable exit code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "sync");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "upstream_not_configured");
    });
}

#[test]
fn sync_returns_config_failure_for_invalid_env() {
    with_env(&[("SHOPMATE_SERVER_PORT", "not-a-port")], || {
        let result = sync::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn search_rejects_invalid_input_before_loading_config() {
    with_env(&[("SHOPMATE_SERVER_PORT", "not-a-port")], || {
        let blank = search::run("   ", 10);
        assert_eq!(blank.exit_code, 3);
        assert_eq!(parse_payload(&blank.output)["error_class"], "invalid_input");

        let too_many = search::run("towel", 51);
        assert_eq!(too_many.exit_code, 3);
        assert_eq!(parse_payload(&too_many.output)["message"], "limit must be between 1 and 50");
    });
}

#[tokio::test]
async fn sync_execute_reports_counts() {
    let index = Arc::new(InMemoryIndex::new());
    let sync = CatalogSync::new(
        index.clone(),
        Arc::new(StoreSnapshot),
        IndexNames::default(),
        "https://shop.test",
    );

    let result = sync::execute(&sync).await;
    assert_eq!(result.exit_code, 0);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["message"], "synced 1 categories, 2 products and 1 coupons");
    assert_eq!(payload["data"], json!({"products": 2, "categories": 1, "coupons": 1}));
    assert_eq!(index.documents("products").len(), 2);
}

#[tokio::test]
async fn search_execute_lists_matching_products() {
    let index = Arc::new(InMemoryIndex::new());
    index.seed(
        "products",
        vec![
            json!({"id": 1, "name": "Logo Hoodie", "category": "Clothing", "price": 40.0}),
            json!({"id": 2, "name": "Beach Towel", "category": "Accessories", "price": "15.00"}),
        ],
    );
    let search = ProductSearch::new(index, IndexNames::default());

    let result = search::execute(&search, "towel", 5).await;
    assert_eq!(result.exit_code, 0);

    let payload = parse_payload(&result.output);
    let message = payload["message"].as_str().unwrap_or_default();
    assert!(message.contains("• Beach Towel - $15.00 (Accessories)"));
    assert!(!message.contains("Logo Hoodie"));
    assert_eq!(payload["data"][0]["name"], "Beach Towel");
}

#[tokio::test]
async fn search_execute_with_no_hits_is_still_ok() {
    let search = ProductSearch::new(Arc::new(InMemoryIndex::new()), IndexNames::default());

    let result = search::execute(&search, "kayak", 5).await;
    assert_eq!(result.exit_code, 0);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["message"], "no products found for 'kayak'");
    assert_eq!(payload["data"], json!([]));
}

struct StoreSnapshot;

#[async_trait]
impl CatalogSource for StoreSnapshot {
    async fn fetch_products(&self) -> Result<Vec<Value>, UpstreamError> {
        Ok(vec![
            json!({"id": 1, "name": "Logo Hoodie", "price": "45.00", "categories": [{"name": "Clothing"}]}),
            json!({"id": 2, "name": "Beach Towel", "price": "15.00", "categories": [{"name": "Accessories"}]}),
        ])
    }

    async fn fetch_categories(&self) -> Result<Vec<Value>, UpstreamError> {
        Ok(vec![json!({"id": 7, "name": "Clothing", "count": 3})])
    }

    async fn fetch_coupons(&self) -> Result<Vec<Value>, UpstreamError> {
        Ok(vec![json!({"code": "sale 30", "amount": "30", "discount_type": "percent"})])
    }
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "SHOPMATE_INDEX_URL",
        "SHOPMATE_INDEX_PRODUCT_INDEX",
        "SHOPMATE_INDEX_CATEGORY_INDEX",
        "SHOPMATE_INDEX_COUPON_INDEX",
        "SHOPMATE_INDEX_TIMEOUT_SECS",
        "SHOPMATE_UPSTREAM_ENDPOINT",
        "SHOPMATE_UPSTREAM_TIMEOUT_SECS",
        "SHOPMATE_UPSTREAM_PRODUCT_BASE_URL",
        "SHOPMATE_LLM_PROVIDER",
        "SHOPMATE_LLM_API_KEY",
        "SHOPMATE_LLM_BASE_URL",
        "SHOPMATE_LLM_MODEL",
        "SHOPMATE_LLM_TIMEOUT_SECS",
        "SHOPMATE_LLM_MAX_RETRIES",
        "SHOPMATE_SERVER_BIND_ADDRESS",
        "SHOPMATE_SERVER_PORT",
        "SHOPMATE_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "SHOPMATE_CACHE_ENABLED",
        "SHOPMATE_CACHE_SEARCH_TTL_SECS",
        "SHOPMATE_SYNC_ON_START",
        "SHOPMATE_LOGGING_LEVEL",
        "SHOPMATE_LOGGING_FORMAT",
        "SHOPMATE_LOG_LEVEL",
        "SHOPMATE_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
