//! Key-value store with per-entry TTL.
//!
//! `CacheStore` is the seam the score cache and the warmer write through.
//! `MemoryCacheStore` is the in-process implementation: entries live in a
//! map behind an async `RwLock`, expire lazily, and the whole store is
//! bounded by a byte capacity so the health probe can report headroom.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreHealth {
    pub available_memory_bytes: u64,
    pub key_count: usize,
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Idempotent write; the last writer wins.
    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    async fn has_key(&self, key: &str) -> Result<bool>;

    /// Remove every key matching `pattern` (`*` matches any run of
    /// characters). Returns how many keys were removed.
    async fn delete_by_pattern(&self, pattern: &str) -> Result<usize>;

    async fn health(&self) -> Result<StoreHealth>;
}

/// Thread-safe in-memory store.
#[derive(Clone)]
pub struct MemoryCacheStore {
    inner: Arc<RwLock<StoreInner>>,
    capacity_bytes: u64,
}

struct StoreInner {
    entries: HashMap<String, Entry>,
    used_bytes: u64,
}

struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

fn entry_size(key: &str, value: &str) -> u64 {
    (key.len() + value.len()) as u64
}

impl StoreInner {
    fn remove(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(old) => {
                self.used_bytes -= entry_size(key, &old.value);
                true
            }
            None => false,
        }
    }

    fn purge_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| !e.is_live(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }
}

impl MemoryCacheStore {
    pub fn new(capacity_bytes: u64) -> Self {
        MemoryCacheStore {
            inner: Arc::new(RwLock::new(StoreInner {
                entries: HashMap::new(),
                used_bytes: 0,
            })),
            capacity_bytes,
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        let inner = self.inner.read().await;
        Ok(inner
            .entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone()))
    }

    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let now = Instant::now();
        let mut inner = self.inner.write().await;
        inner.remove(key);

        let size = entry_size(key, &value);
        if inner.used_bytes + size > self.capacity_bytes {
            let purged = inner.purge_expired(now);
            debug!("MemoryCacheStore: purged {} expired entries to make room", purged);
        }
        if inner.used_bytes + size > self.capacity_bytes {
            bail!(
                "cache store full: {} of {} bytes used, entry needs {}",
                inner.used_bytes,
                self.capacity_bytes,
                size
            );
        }

        inner.used_bytes += size;
        inner.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn has_key(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        let inner = self.inner.read().await;
        Ok(inner.entries.get(key).map_or(false, |e| e.is_live(now)))
    }

    async fn delete_by_pattern(&self, pattern: &str) -> Result<usize> {
        let mut inner = self.inner.write().await;
        let matching: Vec<String> = inner
            .entries
            .keys()
            .filter(|k| glob_match(pattern, k))
            .cloned()
            .collect();
        for key in &matching {
            inner.remove(key);
        }
        Ok(matching.len())
    }

    async fn health(&self) -> Result<StoreHealth> {
        let mut inner = self.inner.write().await;
        inner.purge_expired(Instant::now());
        Ok(StoreHealth {
            available_memory_bytes: self.capacity_bytes.saturating_sub(inner.used_bytes),
            key_count: inner.entries.len(),
        })
    }
}

/// `*`-only glob match over the whole key.
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let (p, k) = (pattern.as_bytes(), key.as_bytes());
    let (mut pi, mut ki) = (0, 0);
    // Position of the last `*` seen and the key index it was tried at.
    let mut backtrack: Option<(usize, usize)> = None;

    while ki < k.len() {
        if pi < p.len() && p[pi] == b'*' {
            backtrack = Some((pi, ki));
            pi += 1;
        } else if pi < p.len() && p[pi] == k[ki] {
            pi += 1;
            ki += 1;
        } else if let Some((star, matched)) = backtrack {
            pi = star + 1;
            ki = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == b'*')
}
