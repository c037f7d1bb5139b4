use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub index: IndexConfig,
    pub upstream: UpstreamConfig,
    pub llm: LlmConfig,
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct IndexConfig {
    pub url: String,
    pub product_index: String,
    pub category_index: String,
    pub coupon_index: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct UpstreamConfig {
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
    pub product_base_url: String,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub enabled: bool,
    pub search_ttl_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub on_start: bool,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub index_url: Option<String>,
    pub upstream_endpoint: Option<String>,
    pub server_port: Option<u16>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub sync_on_start: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            index: IndexConfig {
                url: "http://localhost:9200".to_string(),
                product_index: "products".to_string(),
                category_index: "categories".to_string(),
                coupon_index: "coupons".to_string(),
                timeout_secs: 30,
            },
            upstream: UpstreamConfig {
                endpoint: None,
                timeout_secs: 30,
                product_base_url: "http://localhost:8000".to_string(),
            },
            llm: LlmConfig {
                provider: LlmProvider::Ollama,
                api_key: None,
                base_url: Some("http://localhost:11434".to_string()),
                model: "llama3.1".to_string(),
                timeout_secs: 30,
                max_retries: 2,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8000,
                graceful_shutdown_secs: 15,
            },
            cache: CacheConfig { enabled: true, search_ttl_secs: 180 },
            sync: SyncConfig { on_start: true },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("shopmate.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(index) = patch.index {
            if let Some(url) = index.url {
                self.index.url = url;
            }
            if let Some(product_index) = index.product_index {
                self.index.product_index = product_index;
            }
            if let Some(category_index) = index.category_index {
                self.index.category_index = category_index;
            }
            if let Some(coupon_index) = index.coupon_index {
                self.index.coupon_index = coupon_index;
            }
            if let Some(timeout_secs) = index.timeout_secs {
                self.index.timeout_secs = timeout_secs;
            }
        }

        if let Some(upstream) = patch.upstream {
            if let Some(endpoint) = upstream.endpoint {
                self.upstream.endpoint = Some(endpoint);
            }
            if let Some(timeout_secs) = upstream.timeout_secs {
                self.upstream.timeout_secs = timeout_secs;
            }
            if let Some(product_base_url) = upstream.product_base_url {
                self.upstream.product_base_url = product_base_url;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(cache) = patch.cache {
            if let Some(enabled) = cache.enabled {
                self.cache.enabled = enabled;
            }
            if let Some(search_ttl_secs) = cache.search_ttl_secs {
                self.cache.search_ttl_secs = search_ttl_secs;
            }
        }

        if let Some(sync) = patch.sync {
            if let Some(on_start) = sync.on_start {
                self.sync.on_start = on_start;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SHOPMATE_INDEX_URL") {
            self.index.url = value;
        }
        if let Some(value) = read_env("SHOPMATE_INDEX_PRODUCT_INDEX") {
            self.index.product_index = value;
        }
        if let Some(value) = read_env("SHOPMATE_INDEX_CATEGORY_INDEX") {
            self.index.category_index = value;
        }
        if let Some(value) = read_env("SHOPMATE_INDEX_COUPON_INDEX") {
            self.index.coupon_index = value;
        }
        if let Some(value) = read_env("SHOPMATE_INDEX_TIMEOUT_SECS") {
            self.index.timeout_secs = parse_u64("SHOPMATE_INDEX_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SHOPMATE_UPSTREAM_ENDPOINT") {
            self.upstream.endpoint = Some(value);
        }
        if let Some(value) = read_env("SHOPMATE_UPSTREAM_TIMEOUT_SECS") {
            self.upstream.timeout_secs = parse_u64("SHOPMATE_UPSTREAM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("SHOPMATE_UPSTREAM_PRODUCT_BASE_URL") {
            self.upstream.product_base_url = value;
        }

        if let Some(value) = read_env("SHOPMATE_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("SHOPMATE_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("SHOPMATE_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("SHOPMATE_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("SHOPMATE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("SHOPMATE_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("SHOPMATE_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("SHOPMATE_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("SHOPMATE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("SHOPMATE_SERVER_PORT") {
            self.server.port = parse_u16("SHOPMATE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("SHOPMATE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("SHOPMATE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("SHOPMATE_CACHE_ENABLED") {
            self.cache.enabled = parse_bool("SHOPMATE_CACHE_ENABLED", &value)?;
        }
        if let Some(value) = read_env("SHOPMATE_CACHE_SEARCH_TTL_SECS") {
            self.cache.search_ttl_secs = parse_u64("SHOPMATE_CACHE_SEARCH_TTL_SECS", &value)?;
        }

        if let Some(value) = read_env("SHOPMATE_SYNC_ON_START") {
            self.sync.on_start = parse_bool("SHOPMATE_SYNC_ON_START", &value)?;
        }

        let log_level =
            read_env("SHOPMATE_LOGGING_LEVEL").or_else(|| read_env("SHOPMATE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SHOPMATE_LOGGING_FORMAT").or_else(|| read_env("SHOPMATE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(index_url) = overrides.index_url {
            self.index.url = index_url;
        }
        if let Some(endpoint) = overrides.upstream_endpoint {
            self.upstream.endpoint = Some(endpoint);
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(api_key));
        }
        if let Some(on_start) = overrides.sync_on_start {
            self.sync.on_start = on_start;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_index(&self.index)?;
        validate_upstream(&self.upstream)?;
        validate_llm(&self.llm)?;
        validate_server(&self.server)?;
        validate_cache(&self.cache)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("shopmate.toml"), PathBuf::from("config/shopmate.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn is_http_url(value: &str) -> bool {
    let value = value.trim();
    value.starts_with("http://") || value.starts_with("https://")
}

fn validate_index(index: &IndexConfig) -> Result<(), ConfigError> {
    if !is_http_url(&index.url) {
        return Err(ConfigError::Validation(
            "index.url must start with http:// or https://".to_string(),
        ));
    }

    for (key, name) in [
        ("index.product_index", &index.product_index),
        ("index.category_index", &index.category_index),
        ("index.coupon_index", &index.coupon_index),
    ] {
        if name.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{key} must not be empty")));
        }
    }

    if index.timeout_secs == 0 || index.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "index.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_upstream(upstream: &UpstreamConfig) -> Result<(), ConfigError> {
    if let Some(endpoint) = &upstream.endpoint {
        if !is_http_url(endpoint) {
            return Err(ConfigError::Validation(
                "upstream.endpoint must start with http:// or https://".to_string(),
            ));
        }
    }

    if upstream.timeout_secs == 0 || upstream.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "upstream.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if !is_http_url(&upstream.product_base_url) {
        return Err(ConfigError::Validation(
            "upstream.product_base_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    match llm.provider {
        LlmProvider::OpenAi => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for the openai provider".to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {
            let missing =
                llm.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.base_url is required for ollama provider".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_cache(cache: &CacheConfig) -> Result<(), ConfigError> {
    if cache.enabled && cache.search_ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "cache.search_ttl_secs must be greater than zero when the cache is enabled"
                .to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    index: Option<IndexPatch>,
    upstream: Option<UpstreamPatch>,
    llm: Option<LlmPatch>,
    server: Option<ServerPatch>,
    cache: Option<CachePatch>,
    sync: Option<SyncPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct IndexPatch {
    url: Option<String>,
    product_index: Option<String>,
    category_index: Option<String>,
    coupon_index: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct UpstreamPatch {
    endpoint: Option<String>,
    timeout_secs: Option<u64>,
    product_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CachePatch {
    enabled: Option<bool>,
    search_ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SyncPatch {
    on_start: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
