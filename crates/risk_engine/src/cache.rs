//! In-memory cache of raw provider payloads.
//!
//! Entries are keyed by `(category, source_key)` in a `DashMap`, so reads on
//! the hot path never contend. Refreshes of one key are serialized through a
//! per-key async mutex: concurrent callers that miss on the same key wait for
//! the single in-flight attempt and then reuse its outcome, failures
//! included. Other keys are never blocked.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use common::{CacheStatus, Category, Error, RawMetrics};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub type CacheKey = (Category, String);

/// A cached payload with its freshness window.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub category: Category,
    pub source_key: String,
    pub payload: RawMetrics,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(
        category: Category,
        source_key: impl Into<String>,
        payload: RawMetrics,
        ttl: Duration,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            category,
            source_key: source_key.into(),
            payload,
            fetched_at,
            expires_at: expiry(fetched_at, ttl),
        }
    }

    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }
}

/// `fetched_at + ttl`, saturating for TTLs too large to represent.
fn expiry(fetched_at: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|d| fetched_at.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Where a lookup's payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOrigin {
    /// Unexpired entry, no fetch.
    Fresh,
    /// Fetched by this call.
    Refreshed,
    /// Fetched by a concurrent caller whose refresh this call waited on.
    Shared,
    /// Fetch failed; the previous entry was served instead.
    Fallback,
    /// Fetch failed and nothing was cached; empty payload.
    Default,
}

impl LookupOrigin {
    /// The source now holds data fetched within its TTL.
    pub fn is_current(&self) -> bool {
        matches!(
            self,
            LookupOrigin::Fresh | LookupOrigin::Refreshed | LookupOrigin::Shared
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheLookup {
    pub payload: RawMetrics,
    pub is_stale: bool,
    pub origin: LookupOrigin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Fetch only when the entry is missing or expired.
    IfStale,
    /// Fetch even if the entry is still fresh.
    Force,
}

/// Refresh coordination for one key.
///
/// `attempts` is bumped after every completed attempt while `last` is still
/// locked, so a caller that saw an older count knows an attempt finished
/// after it arrived.
#[derive(Debug, Default)]
struct KeySlot {
    attempts: AtomicU64,
    last: Mutex<Option<CacheLookup>>,
}

/// Thread-safe, cheaply clonable source cache.
#[derive(Debug, Clone, Default)]
pub struct SourceCache {
    entries: Arc<DashMap<CacheKey, CacheEntry>>,
    inflight: Arc<DashMap<CacheKey, Arc<KeySlot>>>,
    fetch_timeout: Option<Duration>,
}

impl SourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound every fetch; a fetch that overruns is handled like any failure.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    /// Return the cached payload if fresh, otherwise fetch and store it.
    ///
    /// Never fails: on fetch failure the previous payload (or an empty one)
    /// is returned with `is_stale = true`.
    pub async fn get_or_refresh<F, Fut>(
        &self,
        category: Category,
        source_key: &str,
        ttl: Duration,
        fetch_fn: F,
    ) -> CacheLookup
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RawMetrics, Error>>,
    {
        self.lookup(category, source_key, ttl, RefreshMode::IfStale, fetch_fn)
            .await
    }

    /// Fetch regardless of freshness. A caller that arrives while another
    /// forced refresh of the same key is running reuses its result.
    pub async fn force_refresh<F, Fut>(
        &self,
        category: Category,
        source_key: &str,
        ttl: Duration,
        fetch_fn: F,
    ) -> CacheLookup
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RawMetrics, Error>>,
    {
        self.lookup(category, source_key, ttl, RefreshMode::Force, fetch_fn)
            .await
    }

    pub async fn lookup<F, Fut>(
        &self,
        category: Category,
        source_key: &str,
        ttl: Duration,
        mode: RefreshMode,
        fetch_fn: F,
    ) -> CacheLookup
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RawMetrics, Error>>,
    {
        let key: CacheKey = (category, source_key.to_string());
        let slot = self.inflight.entry(key.clone()).or_default().clone();
        let seen = slot.attempts.load(Ordering::Acquire);

        if mode == RefreshMode::IfStale {
            if let Some(hit) = self.reusable(&key) {
                debug!("Cache hit for {}/{}", category, source_key);
                return hit;
            }
        }

        let mut last = slot.last.lock().await;

        // An attempt completed while we waited: share its outcome, even a
        // failed one, rather than calling the provider again.
        if slot.attempts.load(Ordering::Acquire) != seen {
            if let Some(outcome) = last.as_ref() {
                debug!("Sharing in-flight refresh of {}/{}", category, source_key);
                return CacheLookup {
                    origin: match outcome.origin {
                        LookupOrigin::Refreshed => LookupOrigin::Shared,
                        other => other,
                    },
                    ..outcome.clone()
                };
            }
        }

        let outcome = self.attempt(&key, ttl, fetch_fn).await;
        *last = Some(outcome.clone());
        slot.attempts.fetch_add(1, Ordering::Release);
        outcome
    }

    async fn attempt<F, Fut>(&self, key: &CacheKey, ttl: Duration, fetch_fn: F) -> CacheLookup
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RawMetrics, Error>>,
    {
        let (category, source_key) = (key.0, key.1.as_str());
        let result = match self.fetch_timeout {
            Some(limit) => match tokio::time::timeout(limit, fetch_fn()).await {
                Ok(r) => r,
                Err(_) => Err(Error::Timeout {
                    source_key: source_key.to_string(),
                    timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                }),
            },
            None => fetch_fn().await,
        };

        match result {
            Ok(payload) if payload.category() == category => {
                let entry = CacheEntry::new(category, source_key, payload.clone(), ttl, Utc::now());
                info!(
                    "Refreshed {}/{} (expires {})",
                    category,
                    source_key,
                    entry.expires_at.format("%Y-%m-%d %H:%M UTC")
                );
                self.entries.insert(key.clone(), entry);
                CacheLookup {
                    payload,
                    is_stale: false,
                    origin: LookupOrigin::Refreshed,
                }
            }
            Ok(payload) => {
                let err = Error::malformed(
                    source_key,
                    format!("expected {} payload, got {}", category, payload.category()),
                );
                self.degrade(key, err)
            }
            Err(e) => self.degrade(key, e),
        }
    }

    fn reusable(&self, key: &CacheKey) -> Option<CacheLookup> {
        let entry = self.entries.get(key)?;
        let entry = entry.value();
        entry.is_fresh().then(|| CacheLookup {
            payload: entry.payload.clone(),
            is_stale: false,
            origin: LookupOrigin::Fresh,
        })
    }

    fn degrade(&self, key: &CacheKey, err: Error) -> CacheLookup {
        let (category, source_key) = key;
        match self.entries.get(key) {
            Some(prior) => {
                warn!(
                    "{}/{} refresh failed ({}); serving data fetched {}",
                    category,
                    source_key,
                    err,
                    prior.fetched_at.format("%Y-%m-%d %H:%M UTC")
                );
                CacheLookup {
                    payload: prior.payload.clone(),
                    is_stale: !prior.is_fresh(),
                    origin: LookupOrigin::Fallback,
                }
            }
            None => {
                warn!(
                    "{}/{} refresh failed ({}); no cached data, using defaults",
                    category, source_key, err
                );
                CacheLookup {
                    payload: RawMetrics::empty(*category),
                    is_stale: true,
                    origin: LookupOrigin::Default,
                }
            }
        }
    }

    /// Peek at an entry without refreshing it.
    pub fn get(&self, category: Category, source_key: &str) -> Option<CacheEntry> {
        self.entries
            .get(&(category, source_key.to_string()))
            .map(|e| e.value().clone())
    }

    pub fn status(&self, category: Category) -> CacheStatus {
        let now = Utc::now();
        let mut sources = Vec::new();
        let mut fresh_count = 0;
        for item in self.entries.iter() {
            if item.key().0 != category {
                continue;
            }
            sources.push(item.key().1.clone());
            if item.value().is_fresh_at(now) {
                fresh_count += 1;
            }
        }
        sources.sort();

        CacheStatus {
            category,
            source_count: sources.len(),
            fresh_count,
            expired_count: sources.len() - fresh_count,
            sources,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
