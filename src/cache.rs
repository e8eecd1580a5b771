//! Best-effort cache for resolved places and computed charts.
//!
//! Every failure (store unreachable, bad JSON) is logged and turned into a
//! miss or a skipped write. Nothing in here can fail a request.

use async_trait::async_trait;
use bb8_redis::{RedisConnectionManager, bb8, redis};
use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use crate::metrics::{CACHE_ERRORS, CACHE_HITS, CACHE_MISSES};
use crate::models::{ChartResponse, Coordinates};

const PLACE_PREFIX: &str = "localidade";
const CHART_PREFIX: &str = "mapa";

// Writes between sweeps of expired entries in the memory backend
const SWEEP_EVERY: usize = 256;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
    #[error("cache value could not be (de)serialized: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Backend(err.to_string())
    }
}

/// Text key-value store with per-entry expiry.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Writes the value and its expiry in one operation.
    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;
}

pub type RedisPool = bb8::Pool<RedisConnectionManager>;

/// Builds the process-wide Redis pool. Connections are opened lazily and a
/// failed connect is reported once, so an unreachable store costs each cache
/// call at most `connect_timeout` before it turns into a miss.
pub fn build_redis_pool(
    url: &str,
    max_size: u32,
    connect_timeout: Duration,
) -> Result<RedisPool, CacheError> {
    let manager = RedisConnectionManager::new(url)?;
    Ok(bb8::Pool::builder()
        .max_size(max_size.max(1))
        .connection_timeout(connect_timeout)
        .retry_connection(false)
        .build_unchecked(manager))
}

pub struct RedisBackend {
    pool: RedisPool,
}

impl RedisBackend {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut *conn).await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        let _: () = redis::cmd("SETEX")
            .arg(key)
            .arg(ttl.as_secs().max(1))
            .arg(value)
            .query_async(&mut *conn)
            .await?;
        Ok(())
    }
}

// Cache entry with timestamp
#[derive(Clone)]
pub struct CacheEntry {
    pub value: String,
    pub created_at: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self) -> bool {
        self.created_at.elapsed() < self.ttl
    }
}

/// In-process backend for single-instance runs and tests. Expired entries
/// are dropped when read and swept every `SWEEP_EVERY` writes.
#[derive(Default)]
pub struct MemoryBackend {
    entries: DashMap<String, CacheEntry>,
    writes: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Drops every expired entry.
    pub fn purge_expired(&self) {
        self.entries.retain(|_, entry| entry.is_fresh());
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.is_fresh() => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        Ok(None)
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        if self.writes.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.purge_expired();
        }
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                created_at: Instant::now(),
                ttl,
            },
        );
        Ok(())
    }
}

/// Key for a place lookup, case-insensitive on the place string.
pub fn place_key(place: &str) -> String {
    format!("{PLACE_PREFIX}:{}", place.to_uppercase())
}

/// Key for a computed chart: date, time and place hashed in that order.
/// Name and timezone are deliberately left out.
pub fn chart_key(birth_date: &str, birth_time: &str, birth_place: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(birth_date.as_bytes());
    hasher.update(b"|");
    hasher.update(birth_time.as_bytes());
    hasher.update(b"|");
    hasher.update(birth_place.as_bytes());
    format!("{CHART_PREFIX}:{:x}", hasher.finalize())
}

pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    place_ttl: Duration,
    chart_ttl: Duration,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn CacheBackend>, place_ttl: Duration, chart_ttl: Duration) -> Self {
        Self {
            backend,
            place_ttl,
            chart_ttl,
        }
    }

    pub async fn get_coordinates(&self, place: &str) -> Option<Coordinates> {
        self.get_json(PLACE_PREFIX, &place_key(place)).await
    }

    pub async fn put_coordinates(&self, place: &str, coordinates: &Coordinates) -> bool {
        self.put_json(&place_key(place), coordinates, self.place_ttl)
            .await
    }

    pub async fn get_chart(&self, key: &str) -> Option<ChartResponse> {
        self.get_json(CHART_PREFIX, key).await
    }

    pub async fn put_chart(&self, key: &str, response: &ChartResponse) -> bool {
        self.put_json(key, response, self.chart_ttl).await
    }

    async fn get_json<T: DeserializeOwned>(&self, kind: &str, key: &str) -> Option<T> {
        let raw = match self.backend.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                CACHE_MISSES.with_label_values(&[kind]).inc();
                return None;
            }
            Err(e) => {
                CACHE_ERRORS.inc();
                CACHE_MISSES.with_label_values(&[kind]).inc();
                tracing::warn!(key, error = %e, "cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                CACHE_HITS.with_label_values(&[kind]).inc();
                tracing::debug!(key, "cache hit");
                Some(value)
            }
            Err(e) => {
                CACHE_ERRORS.inc();
                CACHE_MISSES.with_label_values(&[kind]).inc();
                tracing::warn!(key, error = %e, "malformed cache value, treating as miss");
                None
            }
        }
    }

    async fn put_json<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> bool {
        let result = match serde_json::to_string(value) {
            Ok(json) => self.backend.set_ex(key, json, ttl).await,
            Err(e) => Err(CacheError::from(e)),
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                CACHE_ERRORS.inc();
                tracing::warn!(key, error = %e, "cache write skipped");
                false
            }
        }
    }
}
