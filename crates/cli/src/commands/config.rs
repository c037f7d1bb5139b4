use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use shopmate_core::config::{AppConfig, LoadOptions};
use toml::Value;

const UNSET: &str = "<unset>";

pub fn run() -> String {
    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => render(&config, detect_config_path().as_deref()),
        Err(error) => format!("config validation failed: {error}"),
    }
}

/// Effective values, one line each, with the layer that supplied them.
pub fn render(config: &AppConfig, config_file_path: Option<&Path>) -> String {
    let config_file_doc = load_config_file_doc(config_file_path);

    let fields = [
        field("index.url", config.index.url.clone(), &["SHOPMATE_INDEX_URL"]),
        field("index.product_index", config.index.product_index.clone(), &["SHOPMATE_INDEX_PRODUCT_INDEX"]),
        field("index.category_index", config.index.category_index.clone(), &["SHOPMATE_INDEX_CATEGORY_INDEX"]),
        field("index.coupon_index", config.index.coupon_index.clone(), &["SHOPMATE_INDEX_COUPON_INDEX"]),
        field("index.timeout_secs", config.index.timeout_secs.to_string(), &["SHOPMATE_INDEX_TIMEOUT_SECS"]),
        field(
            "upstream.endpoint",
            config.upstream.endpoint.as_deref().map(redact_url).unwrap_or_else(|| UNSET.to_string()),
            &["SHOPMATE_UPSTREAM_ENDPOINT"],
        ),
        field(
            "upstream.product_base_url",
            config.upstream.product_base_url.clone(),
            &["SHOPMATE_UPSTREAM_PRODUCT_BASE_URL"],
        ),
        field("llm.provider", format!("{:?}", config.llm.provider), &["SHOPMATE_LLM_PROVIDER"]),
        field("llm.model", config.llm.model.clone(), &["SHOPMATE_LLM_MODEL"]),
        field(
            "llm.base_url",
            config.llm.base_url.clone().unwrap_or_else(|| UNSET.to_string()),
            &["SHOPMATE_LLM_BASE_URL"],
        ),
        field(
            "llm.api_key",
            config
                .llm
                .api_key
                .as_ref()
                .map(|key| redact_token(key.expose_secret()))
                .unwrap_or_else(|| UNSET.to_string()),
            &["SHOPMATE_LLM_API_KEY"],
        ),
        field("server.bind_address", config.server.bind_address.clone(), &["SHOPMATE_SERVER_BIND_ADDRESS"]),
        field("server.port", config.server.port.to_string(), &["SHOPMATE_SERVER_PORT"]),
        field("cache.enabled", config.cache.enabled.to_string(), &["SHOPMATE_CACHE_ENABLED"]),
        field(
            "cache.search_ttl_secs",
            config.cache.search_ttl_secs.to_string(),
            &["SHOPMATE_CACHE_SEARCH_TTL_SECS"],
        ),
        field("sync.on_start", config.sync.on_start.to_string(), &["SHOPMATE_SYNC_ON_START"]),
        field(
            "logging.level",
            config.logging.level.clone(),
            &["SHOPMATE_LOGGING_LEVEL", "SHOPMATE_LOG_LEVEL"],
        ),
        field(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["SHOPMATE_LOGGING_FORMAT", "SHOPMATE_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(fields.into_iter().map(|field| {
        let source =
            field_source(field.key, field.env_keys, config_file_doc.as_ref(), config_file_path);
        format!("- {} = {} (source: {source})", field.key, field.value)
    }));
    lines.join("\n")
}

struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

fn field(key: &'static str, value: String, env_keys: &'static [&'static str]) -> Field {
    Field { key, value, env_keys }
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("shopmate.toml"), PathBuf::from("config/shopmate.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

/// Keeps a recognisable prefix such as `sk-`.
pub fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

/// Drops credentials embedded as `user:pass@` in a URL.
pub fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    match rest.split_once('@') {
        Some((credentials, host)) if !credentials.contains('/') => format!("{scheme}://***@{host}"),
        _ => url.to_string(),
    }
}
