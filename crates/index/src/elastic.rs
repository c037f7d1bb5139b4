//! Elasticsearch-backed [`CatalogIndex`].

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use shopmate_core::catalog::{
    CatalogIndex, IndexDocument, IndexError, QuerySpec, SearchHit, SearchRequest, SearchResponse,
};
use tracing::{debug, warn};

const KEYWORD_FIELDS: [&str; 6] =
    ["name^3", "title^3", "description", "short_description", "category", "tags"];

#[derive(Clone, Debug)]
pub struct ElasticsearchIndex {
    client: Client,
    base_url: String,
}

impl ElasticsearchIndex {
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self { client, base_url: base_url.trim_end_matches('/').to_string() }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Body>,
    ) -> Result<reqwest::Response, IndexError> {
        let mut request = self.client.request(method, self.url(path));
        request = match body {
            Some(Body::Json(value)) => request.json(&value),
            Some(Body::NdJson(text)) => {
                request.header(reqwest::header::CONTENT_TYPE, "application/x-ndjson").body(text)
            }
            None => request,
        };
        request.send().await.map_err(|error| IndexError::Transport(error.to_string()))
    }
}

enum Body {
    Json(Value),
    NdJson(String),
}

/// Translates a backend-neutral query into the Elasticsearch search body.
pub fn query_body(request: &SearchRequest) -> Value {
    let query = match &request.query {
        QuerySpec::MatchAll => json!({ "match_all": {} }),
        QuerySpec::Boosted { query } => json!({
            "bool": {
                "should": [
                    { "match_phrase": { "name": { "query": query, "boost": 10 } } },
                    { "match": { "name": { "query": query, "boost": 5 } } },
                    { "match": { "description": { "query": query, "boost": 2 } } },
                    { "match": { "category": { "query": query, "boost": 3 } } }
                ],
                "minimum_should_match": 1
            }
        }),
        QuerySpec::Wildcard { query } => {
            let pattern = format!("*{}*", query.to_lowercase());
            let should: Vec<Value> = ["name", "description", "category"]
                .iter()
                .map(|field| {
                    json!({ "wildcard": { *field: { "value": pattern, "case_insensitive": true } } })
                })
                .collect();
            json!({ "bool": { "should": should, "minimum_should_match": 1 } })
        }
        QuerySpec::Fuzzy { query } => json!({
            "multi_match": {
                "query": query,
                "fields": ["name^3", "description^2", "category"],
                "fuzziness": "AUTO"
            }
        }),
        QuerySpec::ExactTitle { title } => json!({
            "term": { "name.keyword": { "value": title, "case_insensitive": true } }
        }),
        QuerySpec::Keyword { query } => json!({
            "multi_match": { "query": query, "fields": KEYWORD_FIELDS, "type": "best_fields" }
        }),
        QuerySpec::CategoryMatch { query } => json!({
            "multi_match": {
                "query": query,
                "fields": ["name^2", "description"],
                "type": "best_fields"
            }
        }),
        QuerySpec::Term { field, value } => json!({ "term": { field.as_str(): value } }),
        QuerySpec::CodeLookup { codes } => {
            let should: Vec<Value> = codes
                .iter()
                .map(|code| json!({ "term": { "code": { "value": code, "case_insensitive": true } } }))
                .collect();
            json!({ "bool": { "should": should, "minimum_should_match": 1 } })
        }
    };

    json!({ "query": query, "size": request.size })
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    hits: HitsEnvelope,
}

#[derive(Debug, Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    hits: Vec<RawHit>,
}

#[derive(Debug, Deserialize)]
struct RawHit {
    #[serde(rename = "_id")]
    id: Option<String>,
    #[serde(rename = "_score")]
    score: Option<f64>,
    #[serde(rename = "_source", default)]
    source: Value,
}

#[derive(Debug, Deserialize)]
struct BulkEnvelope {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<Value>,
}

fn parse_search(body: &str) -> Result<SearchResponse, IndexError> {
    let envelope: SearchEnvelope =
        serde_json::from_str(body).map_err(|error| IndexError::Decode(error.to_string()))?;
    Ok(SearchResponse {
        hits: envelope
            .hits
            .hits
            .into_iter()
            .map(|hit| SearchHit { id: hit.id, score: hit.score.unwrap_or(0.0), source: hit.source })
            .collect(),
    })
}

/// Counts bulk items whose action reported an error.
fn failed_items(items: &[Value]) -> usize {
    items
        .iter()
        .filter(|item| {
            item.as_object()
                .and_then(|actions| actions.values().next())
                .is_some_and(|result| result.get("error").is_some())
        })
        .count()
}

fn bulk_payload(index: &str, documents: &[IndexDocument]) -> Result<String, IndexError> {
    let mut payload = String::new();
    for document in documents {
        let action = json!({ "index": { "_index": index, "_id": document.id } });
        for line in [&action, &document.body] {
            let encoded =
                serde_json::to_string(line).map_err(|error| IndexError::Decode(error.to_string()))?;
            payload.push_str(&encoded);
            payload.push('\n');
        }
    }
    Ok(payload)
}

async fn status_error(response: reqwest::Response) -> IndexError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    IndexError::Status { status, body }
}

#[async_trait]
impl CatalogIndex for ElasticsearchIndex {
    async fn search(
        &self,
        index: &str,
        request: &SearchRequest,
    ) -> Result<SearchResponse, IndexError> {
        let path = format!("{index}/_search");
        let response = self.send(Method::POST, &path, Some(Body::Json(query_body(request)))).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(IndexError::MissingIndex(index.to_string()));
        }
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let body =
            response.text().await.map_err(|error| IndexError::Transport(error.to_string()))?;
        let parsed = parse_search(&body)?;
        debug!(
            event_name = "index.search.completed",
            index,
            kind = request.query.kind(),
            hits = parsed.hits.len(),
            "index search completed"
        );
        Ok(parsed)
    }

    async fn bulk_upsert(
        &self,
        index: &str,
        documents: Vec<IndexDocument>,
    ) -> Result<usize, IndexError> {
        if documents.is_empty() {
            return Ok(0);
        }
        let total = documents.len();
        let payload = bulk_payload(index, &documents)?;
        let response =
            self.send(Method::POST, "_bulk?refresh=wait_for", Some(Body::NdJson(payload))).await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let envelope: BulkEnvelope =
            response.json().await.map_err(|error| IndexError::Decode(error.to_string()))?;
        if envelope.errors {
            let failed = failed_items(&envelope.items).max(1);
            warn!(
                event_name = "index.bulk.rejected",
                index,
                failed,
                total,
                "bulk upsert reported item errors"
            );
            return Err(IndexError::BulkRejected { failed, total });
        }
        Ok(total)
    }

    async fn index_exists(&self, index: &str) -> Result<bool, IndexError> {
        let response = self.send(Method::HEAD, index, None).await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(status_error(response).await),
        }
    }

    async fn create_index(&self, index: &str, mapping: &Value) -> Result<(), IndexError> {
        let response = self.send(Method::PUT, index, Some(Body::Json(mapping.clone()))).await?;
        if response.status().is_success() {
            return Ok(());
        }
        match status_error(response).await {
            IndexError::Status { status: 400, body }
                if body.contains("resource_already_exists_exception") =>
            {
                Ok(())
            }
            other => Err(other),
        }
    }

    async fn ping(&self) -> Result<(), IndexError> {
        let response = self.send(Method::GET, "_cluster/health", None).await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(status_error(response).await)
        }
    }
}
