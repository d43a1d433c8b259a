//! Similarity-aware response cache.
//!
//! Entries are keyed by the BLAKE3 hash of the normalized query and also keep
//! the query embedding, so a lookup can fall back to the closest earlier query
//! when the exact text was never seen. The fallback is a linear scan over live
//! entries.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use sieve_core::config::CacheConfig;
use sieve_core::vector::cosine_similarity;
use tracing::debug;

pub type CacheKey = blake3::Hash;

/// Source of "now" for expiry decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> { Utc::now() }
}

/// Lowercase, collapse internal whitespace, trim.
pub fn normalize_query(query: &str) -> String { query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase() }

pub fn cache_key(query: &str) -> CacheKey { blake3::hash(normalize_query(query).as_bytes()) }

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub embedding: Vec<f32>,
    pub payload: Value,
    pub last_access: DateTime<Utc>,
    pub access_count: u64,
    /// Position in insertion order; kept when a slot is overwritten.
    inserted: u64,
    /// Monotonic stamp of the last put or hit, breaks `last_access` ties.
    touched: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit {
    pub key: CacheKey,
    pub payload: Value,
    pub similarity: f32,
    /// Hit on the normalized query itself rather than a similar one.
    pub exact: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub avg_access_count: f64,
    pub max_access_count: u64,
    pub capacity: usize,
    pub ttl_secs: u64,
    pub similarity_threshold: f32,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<CacheKey, CacheEntry>,
    seq: u64,
}

impl Inner {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }
}

pub struct SemanticCache {
    config: CacheConfig,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl Default for SemanticCache {
    fn default() -> Self { Self::new(CacheConfig::default()) }
}

impl SemanticCache {
    pub fn new(config: CacheConfig) -> Self { Self::with_clock(config, Arc::new(SystemClock)) }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let ttl = Duration::from_secs(config.ttl_secs);
        Self { config, ttl, clock, inner: Mutex::new(Inner::default()) }
    }

    pub fn config(&self) -> &CacheConfig { &self.config }

    fn expired(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        // A clock that went backwards yields a negative age, which counts as fresh.
        (now - entry.last_access).to_std().is_ok_and(|age| age > self.ttl)
    }

    /// Exact slot first, then the earliest-inserted live entry whose embedding
    /// is at least `similarity_threshold` similar. Hits refresh the entry.
    pub fn get(&self, query: &str, embedding: &[f32]) -> Option<CacheHit> {
        let now = self.clock.now();
        let key = cache_key(query);
        let mut inner = self.inner.lock();

        if let Some(entry) = inner.entries.get(&key) {
            if self.expired(entry, now) {
                debug!(key = %key.to_hex(), "cache entry expired");
                inner.entries.remove(&key);
            } else {
                let touched = inner.next_seq();
                return inner.entries.get_mut(&key).map(|entry| {
                    bump(entry, now, touched);
                    debug!(access_count = entry.access_count, "cache hit (exact)");
                    CacheHit { key, payload: entry.payload.clone(), similarity: 1.0, exact: true }
                });
            }
        }

        let threshold = self.config.similarity_threshold;
        let best = inner
            .entries
            .iter()
            .filter(|(_, e)| !self.expired(e, now))
            .map(|(k, e)| (*k, e.inserted, cosine_similarity(embedding, &e.embedding)))
            .filter(|&(_, _, sim)| sim >= threshold)
            .min_by_key(|&(_, inserted, _)| inserted);

        let Some((hit_key, _, similarity)) = best else {
            debug!("cache miss");
            return None;
        };
        let touched = inner.next_seq();
        inner.entries.get_mut(&hit_key).map(|entry| {
            bump(entry, now, touched);
            debug!(similarity, access_count = entry.access_count, "cache hit (semantic)");
            CacheHit { key: hit_key, payload: entry.payload.clone(), similarity, exact: false }
        })
    }

    /// Store (or overwrite) the slot for `query`, then purge expired entries
    /// and evict the least-used ones until the cache fits its capacity.
    pub fn put(&self, query: &str, embedding: Vec<f32>, payload: Value) {
        let now = self.clock.now();
        let key = cache_key(query);
        let mut inner = self.inner.lock();
        let touched = inner.next_seq();
        let inserted = inner.entries.get(&key).map_or(touched, |e| e.inserted);
        inner.entries.insert(key, CacheEntry { embedding, payload, last_access: now, access_count: 1, inserted, touched });
        self.cleanup(&mut inner, now);
    }

    fn cleanup(&self, inner: &mut Inner, now: DateTime<Utc>) {
        let before = inner.entries.len();
        inner.entries.retain(|_, e| !self.expired(e, now));
        let expired = before - inner.entries.len();

        let mut evicted = 0usize;
        while inner.entries.len() > self.config.capacity {
            let victim = inner.entries.iter().min_by_key(|(_, e)| (e.access_count, e.touched)).map(|(k, _)| *k);
            match victim {
                Some(k) => { inner.entries.remove(&k); evicted += 1; }
                None => break,
            }
        }
        if expired + evicted > 0 { debug!(expired, evicted, remaining = inner.entries.len(), "cache cleanup"); }
    }

    /// Drop one slot by key (e.g. a payload that no longer deserializes).
    pub fn remove(&self, key: &CacheKey) -> bool { self.inner.lock().entries.remove(key).is_some() }

    /// Drop the exact slot for `query`.
    pub fn invalidate(&self, query: &str) -> bool { self.remove(&cache_key(query)) }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let total_entries = inner.entries.len();
        let total_access: u64 = inner.entries.values().map(|e| e.access_count).sum();
        let avg_access_count = if total_entries == 0 { 0.0 } else { total_access as f64 / total_entries as f64 };
        CacheStats {
            total_entries,
            avg_access_count,
            max_access_count: inner.entries.values().map(|e| e.access_count).max().unwrap_or(0),
            capacity: self.config.capacity,
            ttl_secs: self.config.ttl_secs,
            similarity_threshold: self.config.similarity_threshold,
        }
    }

    pub fn clear(&self) { self.inner.lock().entries.clear(); }

    pub fn len(&self) -> usize { self.inner.lock().entries.len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

fn bump(entry: &mut CacheEntry, now: DateTime<Utc>, touched: u64) {
    entry.access_count += 1;
    entry.last_access = now;
    entry.touched = touched;
}
