pub mod cache;
pub mod catalog;
pub mod config;
pub mod coupons;
pub mod domain;
pub mod errors;
pub mod recommend;

pub use cache::{search_key, InMemorySearchCache, SearchCache};
pub use catalog::{
    CatalogIndex, InMemoryIndex, IndexDocument, IndexError, IndexNames, ProductSearch, QuerySpec,
    SearchRequest, SearchResponse,
};
pub use coupons::{compute_final_price, CouponService, PriceComputation};
pub use domain::coupon::{DiscountKind, NormalizedCoupon, RawCoupon};
pub use domain::product::{Category, EnrichedProduct, Product, ProductId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use recommend::{RecommendationResolver, ResolveRequest};
