pub mod enrich;
pub mod resolver;

pub use enrich::{enrich_record, parse_price, strip_html, ImageField};
pub use resolver::{ProductLookup, RecommendationResolver, ResolveRequest};
