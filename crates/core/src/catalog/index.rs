use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    #[error("search index transport failure: {0}")]
    Transport(String),
    #[error("search index returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode search index response: {0}")]
    Decode(String),
    #[error("search index `{0}` does not exist")]
    MissingIndex(String),
    #[error("bulk indexing rejected {failed} of {total} documents")]
    BulkRejected { failed: usize, total: usize },
}

/// Backend-neutral description of the queries the assistant issues.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuerySpec {
    MatchAll,
    /// Phrase match on name plus per-field token matches, weighted
    /// name-phrase 10, name 5, category 3, description 2.
    Boosted { query: String },
    /// Case-folded substring match on name, description or category.
    Wildcard { query: String },
    /// Edit-distance tolerant match across name^3, description^2, category.
    Fuzzy { query: String },
    /// Exact, case-insensitive match on the full product name.
    ExactTitle { title: String },
    /// Token match across name^3, title^3, description, short_description,
    /// category and tags.
    Keyword { query: String },
    /// Token match across category name^2 and description.
    CategoryMatch { query: String },
    /// Exact field equality.
    Term { field: String, value: Value },
    /// Case-insensitive match on the coupon `code` field against any candidate.
    CodeLookup { codes: Vec<String> },
}

impl QuerySpec {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MatchAll => "match_all",
            Self::Boosted { .. } => "boosted",
            Self::Wildcard { .. } => "wildcard",
            Self::Fuzzy { .. } => "fuzzy",
            Self::ExactTitle { .. } => "exact_title",
            Self::Keyword { .. } => "keyword",
            Self::CategoryMatch { .. } => "category_match",
            Self::Term { .. } => "term",
            Self::CodeLookup { .. } => "code_lookup",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: QuerySpec,
    pub size: usize,
}

impl SearchRequest {
    pub fn new(query: QuerySpec, size: usize) -> Self {
        Self { query, size }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: Option<String>,
    pub score: f64,
    pub source: Value,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
}

impl SearchResponse {
    /// Hit sources that are JSON objects, in rank order.
    pub fn object_sources(self) -> Vec<Value> {
        self.hits.into_iter().map(|hit| hit.source).filter(Value::is_object).collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub id: String,
    pub body: Value,
}

#[async_trait]
pub trait CatalogIndex: Send + Sync {
    async fn search(&self, index: &str, request: &SearchRequest)
        -> Result<SearchResponse, IndexError>;

    /// Inserts or replaces documents by id. Returns the number written.
    async fn bulk_upsert(&self, index: &str, documents: Vec<IndexDocument>)
        -> Result<usize, IndexError>;

    async fn index_exists(&self, index: &str) -> Result<bool, IndexError>;

    async fn create_index(&self, index: &str, mapping: &Value) -> Result<(), IndexError>;

    /// Round-trip used by health checks.
    async fn ping(&self) -> Result<(), IndexError>;
}
