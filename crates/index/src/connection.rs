use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use shopmate_core::catalog::{CatalogIndex, IndexError};

use crate::elastic::ElasticsearchIndex;

pub type SharedIndex = Arc<dyn CatalogIndex>;

const USER_AGENT: &str = concat!("shopmate/", env!("CARGO_PKG_VERSION"));

pub fn connect(index_url: &str) -> Result<ElasticsearchIndex, IndexError> {
    connect_with_settings(index_url, 30)
}

pub fn connect_with_settings(
    index_url: &str,
    timeout_secs: u64,
) -> Result<ElasticsearchIndex, IndexError> {
    let client = Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .connect_timeout(Duration::from_secs(timeout_secs.clamp(1, 10)))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|error| IndexError::Transport(error.to_string()))?;
    Ok(ElasticsearchIndex::with_client(client, index_url))
}
