use std::sync::Arc;

use serde_json::json;
use shopmate_core::catalog::IndexNames;
use shopmate_core::config::{AppConfig, LoadOptions};
use shopmate_index::{connect_with_settings, CatalogSync, JsonRpcCatalogClient, SyncError};

use crate::commands::{block_on, CommandResult, EXIT_CONFIG, EXIT_UNAVAILABLE};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "sync",
                "config_validation",
                format!("config validation failed: {error}"),
                EXIT_CONFIG,
            );
        }
    };

    if config.upstream.endpoint.as_deref().map_or(true, |endpoint| endpoint.trim().is_empty()) {
        return CommandResult::failure(
            "sync",
            "upstream_not_configured",
            "upstream.endpoint is not set; nothing to sync from",
            EXIT_UNAVAILABLE,
        );
    }

    let sync = match build_sync(&config) {
        Ok(sync) => sync,
        Err(message) => {
            return CommandResult::failure("sync", "client_setup", message, EXIT_UNAVAILABLE);
        }
    };

    match block_on(execute(&sync)) {
        Ok(result) => result,
        Err(error) => CommandResult::failure("sync", "runtime", format!("{error:#}"), EXIT_UNAVAILABLE),
    }
}

fn build_sync(config: &AppConfig) -> Result<CatalogSync, String> {
    let index = connect_with_settings(&config.index.url, config.index.timeout_secs)
        .map_err(|error| format!("search index client setup failed: {error}"))?;
    let source =
        JsonRpcCatalogClient::new(config.upstream.endpoint.clone(), config.upstream.timeout_secs)
            .map_err(|error| format!("upstream client setup failed: {error}"))?;
    Ok(CatalogSync::new(
        Arc::new(index),
        Arc::new(source),
        IndexNames::from(&config.index),
        config.upstream.product_base_url.clone(),
    ))
}

/// Full refresh: categories, then products, then coupons.
pub async fn execute(sync: &CatalogSync) -> CommandResult {
    match sync.refresh_all().await {
        Ok(report) => CommandResult::success_with(
            "sync",
            format!(
                "synced {} categories, {} products and {} coupons",
                report.categories, report.products, report.coupons
            ),
            Some(json!(report)),
        ),
        Err(error @ SyncError::Upstream(_)) => {
            CommandResult::failure("sync", "upstream_unavailable", error.to_string(), EXIT_UNAVAILABLE)
        }
        Err(error @ SyncError::Index(_)) => {
            CommandResult::failure("sync", "index_unavailable", error.to_string(), EXIT_UNAVAILABLE)
        }
    }
}
