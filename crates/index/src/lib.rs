pub mod connection;
pub mod elastic;
pub mod mappings;
pub mod sync;
pub mod upstream;

pub use connection::{connect, connect_with_settings, SharedIndex};
pub use elastic::{query_body, ElasticsearchIndex};
pub use mappings::{category_mapping, coupon_mapping, ensure_indices, product_mapping};
pub use sync::{CatalogSync, SyncError, SyncReport};
pub use upstream::{CatalogSource, JsonRpcCatalogClient, UpstreamError};
