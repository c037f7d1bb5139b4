use std::sync::Arc;
use std::time::Duration;

use shopmate_agent::llm::{LlmClient, LlmError, LlmTranslator};
use shopmate_agent::runtime::AgentRuntime;
use shopmate_core::cache::{InMemorySearchCache, SearchCache};
use shopmate_core::catalog::{IndexError, IndexNames, ProductSearch};
use shopmate_core::config::{AppConfig, ConfigError, LoadOptions};
use shopmate_core::coupons::CouponService;
use shopmate_index::{
    connect_with_settings, CatalogSource, CatalogSync, JsonRpcCatalogClient, SharedIndex,
    UpstreamError,
};
use thiserror::Error;
use tracing::info;

use crate::llm_http::HttpLlmClient;

/// Everything the HTTP layer needs, built once and shared.
pub struct Services {
    pub config: AppConfig,
    pub index: SharedIndex,
    pub cache: Arc<dyn SearchCache>,
    pub search: Arc<ProductSearch>,
    pub coupons: CouponService,
    pub sync: CatalogSync,
    pub agent: AgentRuntime,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("search index client setup failed: {0}")]
    Index(#[source] IndexError),
    #[error("upstream catalog client setup failed: {0}")]
    Upstream(#[source] UpstreamError),
    #[error("language model client setup failed: {0}")]
    Llm(#[source] LlmError),
}

pub fn bootstrap(options: LoadOptions) -> Result<Services, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Services, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let index = connect_with_settings(&config.index.url, config.index.timeout_secs)
        .map_err(BootstrapError::Index)?;
    let source = JsonRpcCatalogClient::new(config.upstream.endpoint.clone(), config.upstream.timeout_secs)
        .map_err(BootstrapError::Upstream)?;
    let llm = HttpLlmClient::from_config(&config.llm).map_err(BootstrapError::Llm)?;

    info!(
        event_name = "system.bootstrap.clients_ready",
        correlation_id = "bootstrap",
        index_url = %config.index.url,
        upstream_configured = source.is_configured(),
        llm_provider = ?config.llm.provider,
        "external clients constructed"
    );

    Ok(Services::from_parts(config, Arc::new(index), Arc::new(source), Arc::new(llm)))
}

impl Services {
    /// Wires the container from already-built adapters.
    pub fn from_parts(
        config: AppConfig,
        index: SharedIndex,
        source: Arc<dyn CatalogSource>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        let names = IndexNames::from(&config.index);
        let cache: Arc<dyn SearchCache> = Arc::new(InMemorySearchCache::new());

        let mut search = ProductSearch::new(index.clone(), names.clone());
        if config.cache.enabled {
            search = search.with_cache(cache.clone(), Duration::from_secs(config.cache.search_ttl_secs));
        }
        let search = Arc::new(search);

        let coupons = CouponService::new(index.clone(), names.coupons.clone());
        let sync = CatalogSync::new(index.clone(), source, names, config.upstream.product_base_url.clone())
            .with_cache(cache.clone());
        let agent = AgentRuntime::new(
            llm.clone(),
            Arc::new(LlmTranslator::new(llm)),
            search.clone(),
            coupons.clone(),
        );

        Self { config, index, cache, search, coupons, sync, agent }
    }
}

#[cfg(test)]
mod tests {
    use shopmate_core::config::{ConfigOverrides, LlmProvider, LoadOptions};

    use crate::bootstrap::bootstrap;

    #[test]
    fn bootstrap_fails_fast_without_openai_key() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                llm_provider: Some(LlmProvider::OpenAi),
                ..ConfigOverrides::default()
            },
            config_path: Some("does-not-exist.toml".into()),
            ..LoadOptions::default()
        });

        let message = result.err().expect("missing key is rejected").to_string();
        assert!(message.contains("llm.api_key"), "unexpected error: {message}");
    }

    #[test]
    fn bootstrap_builds_services_from_valid_overrides() {
        let services = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                index_url: Some("http://127.0.0.1:9200".to_string()),
                llm_provider: Some(LlmProvider::Ollama),
                sync_on_start: Some(false),
                ..ConfigOverrides::default()
            },
            config_path: Some("does-not-exist.toml".into()),
            ..LoadOptions::default()
        })
        .expect("bootstrap should succeed with valid overrides");

        assert_eq!(services.search.names().products, "products");
        assert_eq!(services.coupons.coupon_index(), "coupons");
        assert!(!services.config.sync.on_start);
    }
}
