pub mod index;
pub mod ingest;
pub mod memory;
pub mod search;

pub use index::{
    CatalogIndex, IndexDocument, IndexError, QuerySpec, SearchHit, SearchRequest, SearchResponse,
};
pub use ingest::{ingest_category, ingest_product};
pub use memory::InMemoryIndex;
pub use search::{IndexNames, ProductSearch};
