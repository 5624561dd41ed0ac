//! Short-lived read-through cache for list and aggregation reads.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use builder_contracts::canonical::canonical_map_string;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadKind {
    List,
    Aggregation,
}

impl ReadKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ReadKind::List => "list",
            ReadKind::Aggregation => "aggregation",
        }
    }
}

/// Fingerprint of `(table_slug, canonical request data, resource_env_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn fingerprint(table_slug: &str, data: &Map<String, Value>, resource_env_id: &str) -> Self {
        let raw = format!(
            "{}-{}-{}",
            table_slug,
            canonical_map_string(data),
            resource_env_id
        );
        Self(STANDARD.encode(raw.as_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    EntryTooLarge { size: usize, limit: usize },
    Serialize(String),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::EntryTooLarge { size, limit } => {
                write!(f, "cache entry of {} bytes exceeds limit of {} bytes", size, limit)
            }
            CacheError::Serialize(message) => write!(f, "cache serialization failed: {}", message),
        }
    }
}

impl std::error::Error for CacheError {}

#[derive(Clone)]
struct CachedPayload {
    bytes: Arc<[u8]>,
    advertised: bool,
    expires_at: Instant,
}

/// A live entry. `advertised` is set when the backend marked the result
/// cacheable rather than only the client asking for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHit {
    pub bytes: Vec<u8>,
    pub advertised: bool,
}

#[derive(Clone)]
pub struct ReadCache {
    cache: Arc<RwLock<HashMap<CacheKey, CachedPayload>>>,
    max_entries: usize,
    max_entry_bytes: usize,
    list_ttl: Duration,
    aggregation_ttl: Duration,
}

impl ReadCache {
    pub fn new(
        max_entries: usize,
        max_entry_bytes: usize,
        list_ttl: Duration,
        aggregation_ttl: Duration,
    ) -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            max_entries,
            max_entry_bytes,
            list_ttl,
            aggregation_ttl,
        }
    }

    pub fn enabled(&self) -> bool {
        self.max_entries > 0
    }

    pub fn ttl_for(&self, kind: ReadKind) -> Duration {
        match kind {
            ReadKind::List => self.list_ttl,
            ReadKind::Aggregation => self.aggregation_ttl,
        }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<CacheHit> {
        if !self.enabled() {
            return None;
        }

        let now = Instant::now();
        let cache = self.cache.read().await;
        cache.get(key).and_then(|entry| {
            (entry.expires_at > now).then(|| CacheHit {
                bytes: entry.bytes.to_vec(),
                advertised: entry.advertised,
            })
        })
    }

    pub async fn setx(&self, key: CacheKey, bytes: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        self.insert(key, bytes, ttl, false).await
    }

    async fn insert(
        &self,
        key: CacheKey,
        bytes: Vec<u8>,
        ttl: Duration,
        advertised: bool,
    ) -> Result<(), CacheError> {
        if !self.enabled() || ttl.is_zero() {
            return Ok(());
        }
        if bytes.len() > self.max_entry_bytes {
            return Err(CacheError::EntryTooLarge {
                size: bytes.len(),
                limit: self.max_entry_bytes,
            });
        }

        let now = Instant::now();
        let expires_at = now + ttl;
        let mut cache = self.cache.write().await;

        cache.retain(|_, entry| entry.expires_at > now);
        cache.insert(
            key,
            CachedPayload {
                bytes: Arc::from(bytes),
                advertised,
                expires_at,
            },
        );

        if cache.len() <= self.max_entries {
            return Ok(());
        }

        // Evict the entries closest to expiry first.
        let mut by_expiry = cache
            .iter()
            .map(|(k, entry)| (entry.expires_at, k.clone()))
            .collect::<Vec<_>>();
        by_expiry.sort_by_key(|(expires_at, _)| *expires_at);
        let overflow = cache.len() - self.max_entries;
        for (_, k) in by_expiry.into_iter().take(overflow) {
            cache.remove(&k);
        }

        Ok(())
    }

    /// Serializes `data` and stores it with the TTL of `kind`.
    pub async fn store_json(
        &self,
        key: CacheKey,
        kind: ReadKind,
        data: &Value,
        advertised: bool,
    ) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(data).map_err(|err| CacheError::Serialize(err.to_string()))?;
        self.insert(key, bytes, self.ttl_for(kind), advertised).await
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }
}
