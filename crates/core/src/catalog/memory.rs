//! In-memory [`CatalogIndex`] used by tests and offline runs.
//!
//! Documents live in insertion order behind `std::sync::RwLock`. Scoring is a
//! small token-overlap approximation of the search server's relevance model;
//! rank order is stable for equal scores.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use super::index::{
    CatalogIndex, IndexDocument, IndexError, QuerySpec, SearchHit, SearchRequest, SearchResponse,
};

#[derive(Default)]
struct StoredIndex {
    mapping: Option<Value>,
    documents: Vec<IndexDocument>,
}

#[derive(Default)]
pub struct InMemoryIndex {
    indices: RwLock<HashMap<String, StoredIndex>>,
    query_calls: Mutex<HashMap<&'static str, usize>>,
    failing_queries: Mutex<HashSet<&'static str>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts documents keyed by their `id` field (or position when absent).
    pub fn seed(&self, index: &str, documents: impl IntoIterator<Item = Value>) {
        let mut indices = self.indices.write().unwrap_or_else(PoisonError::into_inner);
        let stored = indices.entry(index.to_string()).or_default();
        for body in documents {
            let id = body
                .get("id")
                .and_then(crate::domain::fields::text)
                .unwrap_or_else(|| stored.documents.len().to_string());
            upsert(stored, IndexDocument { id, body });
        }
    }

    pub fn documents(&self, index: &str) -> Vec<Value> {
        let indices = self.indices.read().unwrap_or_else(PoisonError::into_inner);
        indices
            .get(index)
            .map(|stored| stored.documents.iter().map(|doc| doc.body.clone()).collect())
            .unwrap_or_default()
    }

    pub fn mapping(&self, index: &str) -> Option<Value> {
        let indices = self.indices.read().unwrap_or_else(PoisonError::into_inner);
        indices.get(index).and_then(|stored| stored.mapping.clone())
    }

    /// Number of searches issued with the given [`QuerySpec::kind`].
    pub fn query_calls(&self, kind: &str) -> usize {
        let calls = self.query_calls.lock().unwrap_or_else(PoisonError::into_inner);
        calls.get(kind).copied().unwrap_or(0)
    }

    /// Makes every later search of this kind fail with a transport error.
    pub fn fail_queries(&self, kind: &'static str) {
        let mut failing = self.failing_queries.lock().unwrap_or_else(PoisonError::into_inner);
        failing.insert(kind);
    }

    fn record_call(&self, kind: &'static str) -> Result<(), IndexError> {
        {
            let mut calls = self.query_calls.lock().unwrap_or_else(PoisonError::into_inner);
            *calls.entry(kind).or_insert(0) += 1;
        }
        let failing = self.failing_queries.lock().unwrap_or_else(PoisonError::into_inner);
        if failing.contains(kind) {
            return Err(IndexError::Transport(format!("injected failure for `{kind}` query")));
        }
        Ok(())
    }
}

fn upsert(stored: &mut StoredIndex, document: IndexDocument) {
    match stored.documents.iter_mut().find(|existing| existing.id == document.id) {
        Some(existing) => *existing = document,
        None => stored.documents.push(document),
    }
}

#[async_trait]
impl CatalogIndex for InMemoryIndex {
    async fn search(
        &self,
        index: &str,
        request: &SearchRequest,
    ) -> Result<SearchResponse, IndexError> {
        self.record_call(request.query.kind())?;

        let indices = self.indices.read().unwrap_or_else(PoisonError::into_inner);
        let stored = indices.get(index).ok_or_else(|| IndexError::MissingIndex(index.into()))?;

        let mut hits: Vec<SearchHit> = stored
            .documents
            .iter()
            .filter_map(|doc| {
                score(&request.query, &doc.body).map(|score| SearchHit {
                    id: Some(doc.id.clone()),
                    score,
                    source: doc.body.clone(),
                })
            })
            .collect();

        hits.sort_by(|left, right| {
            right.score.partial_cmp(&left.score).unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(request.size);

        Ok(SearchResponse { hits })
    }

    async fn bulk_upsert(
        &self,
        index: &str,
        documents: Vec<IndexDocument>,
    ) -> Result<usize, IndexError> {
        let mut indices = self.indices.write().unwrap_or_else(PoisonError::into_inner);
        let stored = indices.entry(index.to_string()).or_default();
        let written = documents.len();
        for document in documents {
            upsert(stored, document);
        }
        Ok(written)
    }

    async fn index_exists(&self, index: &str) -> Result<bool, IndexError> {
        let indices = self.indices.read().unwrap_or_else(PoisonError::into_inner);
        Ok(indices.contains_key(index))
    }

    async fn create_index(&self, index: &str, mapping: &Value) -> Result<(), IndexError> {
        let mut indices = self.indices.write().unwrap_or_else(PoisonError::into_inner);
        let stored = indices.entry(index.to_string()).or_default();
        stored.mapping = Some(mapping.clone());
        Ok(())
    }

    async fn ping(&self) -> Result<(), IndexError> {
        Ok(())
    }
}

/// `None` means the document does not match.
fn score(query: &QuerySpec, doc: &Value) -> Option<f64> {
    let score = match query {
        QuerySpec::MatchAll => 1.0,
        QuerySpec::Boosted { query } => {
            let terms = tokens(query);
            let name = tokens(&field_text(doc, "name"));
            let mut total = 0.0;
            if contains_phrase(&name, &terms) {
                total += 10.0;
            }
            total += 5.0 * overlap(&terms, &name);
            total += 3.0 * overlap(&terms, &tokens(&field_text(doc, "category")));
            total += 2.0 * overlap(&terms, &tokens(&field_text(doc, "description")));
            total
        }
        QuerySpec::Wildcard { query } => {
            let needle = query.trim().to_lowercase();
            let found = ["name", "description", "category"]
                .iter()
                .any(|field| field_text(doc, field).contains(&needle));
            if found {
                1.0
            } else {
                0.0
            }
        }
        QuerySpec::Fuzzy { query } => {
            let weighted = [("name", 3.0), ("description", 2.0), ("category", 1.0)];
            tokens(&query.to_lowercase())
                .iter()
                .map(|term| {
                    weighted
                        .iter()
                        .filter(|(field, _)| {
                            tokens(&field_text(doc, field))
                                .iter()
                                .any(|candidate| within_fuzziness(term, candidate))
                        })
                        .map(|(_, weight)| *weight)
                        .fold(0.0, f64::max)
                })
                .sum()
        }
        QuerySpec::ExactTitle { title } => {
            let title = title.trim();
            let name = doc.get("name").and_then(crate::domain::fields::text).unwrap_or_default();
            if !title.is_empty() && name.eq_ignore_ascii_case(title) {
                1.0
            } else {
                0.0
            }
        }
        QuerySpec::Keyword { query } => weighted_overlap(
            query,
            doc,
            &[
                ("name", 3.0),
                ("title", 3.0),
                ("description", 1.0),
                ("short_description", 1.0),
                ("category", 1.0),
                ("tags", 1.0),
            ],
        ),
        QuerySpec::CategoryMatch { query } => {
            weighted_overlap(query, doc, &[("name", 2.0), ("description", 1.0)])
        }
        QuerySpec::Term { field, value } => match doc.get(field) {
            Some(Value::Array(items)) if items.contains(value) => 1.0,
            Some(found) if found == value => 1.0,
            _ => 0.0,
        },
        QuerySpec::CodeLookup { codes } => {
            let code = field_text(doc, "code");
            if codes.iter().any(|candidate| candidate.to_lowercase() == code) {
                1.0
            } else {
                0.0
            }
        }
    };

    (score > 0.0).then_some(score)
}

fn field_text(doc: &Value, field: &str) -> String {
    match doc.get(field) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(crate::domain::fields::text)
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase(),
        Some(value) => crate::domain::fields::text(value).unwrap_or_default().to_lowercase(),
        None => String::new(),
    }
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|ch: char| !ch.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn contains_phrase(haystack: &[String], phrase: &[String]) -> bool {
    !phrase.is_empty() && haystack.windows(phrase.len()).any(|window| window == phrase)
}

fn overlap(terms: &[String], candidates: &[String]) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }
    let matched = terms.iter().filter(|term| candidates.contains(term)).count();
    matched as f64 / terms.len() as f64
}

fn weighted_overlap(query: &str, doc: &Value, fields: &[(&str, f64)]) -> f64 {
    let terms = tokens(query);
    fields
        .iter()
        .map(|(field, weight)| weight * overlap(&terms, &tokens(&field_text(doc, field))))
        .sum()
}

fn within_fuzziness(term: &str, candidate: &str) -> bool {
    let allowed = match term.chars().count() {
        0..=2 => 0,
        3..=5 => 1,
        _ => 2,
    };
    strsim::osa_distance(term, candidate) <= allowed
}
