//! Time-bounded cache for catalog search results.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};

pub const SEARCH_PREFIX: &str = "search";

#[async_trait]
pub trait SearchCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Value>;
    async fn set(&self, key: &str, value: Value, ttl: Duration);
    /// Drops every entry whose key starts with `prefix`; returns how many went.
    async fn invalidate(&self, prefix: &str) -> usize;
}

/// `search:<digest>` where the digest covers the case-folded query and limit.
pub fn search_key(query: &str, limit: usize) -> String {
    let normalized = format!("{SEARCH_PREFIX}:{}:{limit}", query.trim().to_lowercase());
    let digest = Sha256::digest(normalized.as_bytes());
    let hex: String = digest.iter().take(16).map(|byte| format!("{byte:02x}")).collect();
    format!("{SEARCH_PREFIX}:{hex}")
}

struct Entry {
    value: Value,
    expires_at: Instant,
}

#[derive(Default)]
pub struct InMemorySearchCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemorySearchCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SearchCache for InMemorySearchCache {
    async fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            match entries.get(key) {
                Some(entry) if entry.expires_at > now => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        None
    }

    /// Expired entries are swept on every write so unread keys do not pile up.
    async fn set(&self, key: &str, value: Value, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(key.to_string(), Entry { value, expires_at: now + ttl });
    }

    async fn invalidate(&self, prefix: &str) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        before - entries.len()
    }
}
