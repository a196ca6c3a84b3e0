use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, warn};

use crate::fingerprint::cache_key;
use crate::models::CachedArtifact;

/// Artifacts live for 24 hours unless invalidated.
pub const DEFAULT_TTL_SECS: u64 = 86_400;

const MAX_TTL_SECS: u64 = 10 * 365 * DEFAULT_TTL_SECS;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key-value store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("artifact codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// `Ok(None)` for a missing or expired key.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError>;
    async fn put(&self, key: &str, value: Bytes, ttl_secs: u64) -> Result<(), StoreError>;
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

struct Entry {
    value: Bytes,
    expires_at: DateTime<Utc>,
}

/// Process-local store. Expired entries are dropped on read of that key and on every write.
#[derive(Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryStore {
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let now = Utc::now();
        {
            let guard = self.entries.read();
            match guard.get(key) {
                None => return Ok(None),
                Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }
        let mut guard = self.entries.write();
        if guard.get(key).is_some_and(|e| e.expires_at <= now) {
            guard.remove(key);
            debug!(key, "Evicted expired entry");
        }
        Ok(None)
    }

    async fn put(&self, key: &str, value: Bytes, ttl_secs: u64) -> Result<(), StoreError> {
        let now = Utc::now();
        let expires_at = now + Duration::seconds(ttl_secs.min(MAX_TTL_SECS) as i64);
        let mut guard = self.entries.write();
        let before = guard.len();
        guard.retain(|_, e| e.expires_at > now);
        if guard.len() < before {
            debug!(evicted = before - guard.len(), "Swept expired entries");
        }
        guard.insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// Typed view over a [`KeyValueStore`], keyed by fingerprint.
#[derive(Clone)]
pub struct ArtifactCache {
    store: Arc<dyn KeyValueStore>,
    ttl_secs: u64,
}

impl ArtifactCache {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl_secs: u64) -> Self {
        Self { store, ttl_secs }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Look up an artifact. Store faults and undecodable entries count as a miss.
    pub async fn get(&self, fingerprint: &str) -> Option<CachedArtifact> {
        match self.try_get(fingerprint).await {
            Ok(hit) => hit,
            Err(CacheError::Codec(e)) => {
                warn!(model_id = fingerprint, error = %e, "Dropping undecodable cache entry");
                self.invalidate(fingerprint).await;
                None
            }
            Err(e) => {
                warn!(model_id = fingerprint, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    /// Store an artifact. Returns `false` on failure, which callers may ignore.
    pub async fn put(&self, fingerprint: &str, artifact: &CachedArtifact) -> bool {
        match self.try_put(fingerprint, artifact).await {
            Ok(()) => {
                debug!(model_id = fingerprint, ttl_secs = self.ttl_secs, "Cached artifact");
                true
            }
            Err(e) => {
                warn!(model_id = fingerprint, error = %e, "Cache write failed");
                false
            }
        }
    }

    /// Best-effort delete.
    pub async fn invalidate(&self, fingerprint: &str) -> bool {
        match self.store.delete(&cache_key(fingerprint)).await {
            Ok(()) => true,
            Err(e) => {
                warn!(model_id = fingerprint, error = %e, "Cache invalidation failed");
                false
            }
        }
    }

    async fn try_get(&self, fingerprint: &str) -> Result<Option<CachedArtifact>, CacheError> {
        let Some(bytes) = self.store.get(&cache_key(fingerprint)).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn try_put(&self, fingerprint: &str, artifact: &CachedArtifact) -> Result<(), CacheError> {
        let bytes = Bytes::from(serde_json::to_vec(artifact)?);
        self.store
            .put(&cache_key(fingerprint), bytes, self.ttl_secs)
            .await?;
        Ok(())
    }
}
