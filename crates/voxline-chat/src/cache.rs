//! Exact-match response cache.
//!
//! Maps a normalized prompt fingerprint to the assistant reply it produced.
//! Entries live in insertion order; the oldest are evicted first once the
//! capacity is exceeded, and entries past the TTL are ignored by lookups
//! but only physically removed by eviction or [`ResponseCache::clear`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use voxline_core::clock::Clock;
use voxline_core::config::CacheConfig;
use voxline_storage::KvStore;

/// Storage key holding the serialized entry list.
pub const RESPONSES_KEY: &str = "responses";

/// One cached exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub key: String,
    pub response_text: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
}

/// Snapshot of cache occupancy for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStatus {
    pub entries: usize,
    pub size_bytes: usize,
}

/// Fingerprint a prompt: trim, lowercase, then a 32-bit `h * 31 + c`
/// rolling hash rendered as hex.
///
/// Collisions are possible and are served as hits.
pub fn fingerprint(prompt: &str) -> String {
    let normalized = prompt.trim().to_lowercase();
    let hash = normalized
        .chars()
        .fold(0u32, |h, c| h.wrapping_mul(31).wrapping_add(c as u32));
    format!("{:08x}", hash)
}

pub struct ResponseCache {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    entries: Vec<CacheEntry>,
    ttl_ms: i64,
    max_entries: usize,
}

impl ResponseCache {
    /// Open the cache, restoring entries from `store`.
    ///
    /// Unreadable or corrupt storage yields an empty cache.
    pub fn open(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, config: &CacheConfig) -> Self {
        let entries = match store.get(RESPONSES_KEY) {
            Ok(Some(raw)) => serde_json::from_str::<Vec<CacheEntry>>(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "Discarding unreadable response cache");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Failed to load response cache");
                Vec::new()
            }
        };

        let ttl_ms = i64::try_from(config.ttl_hours)
            .unwrap_or(i64::MAX / 3_600_000)
            .saturating_mul(3_600_000);

        let mut cache = Self {
            store,
            clock,
            entries,
            ttl_ms,
            max_entries: config.max_entries,
        };
        cache.evict_overflow();
        debug!(entries = cache.entries.len(), "Response cache opened");
        cache
    }

    /// Cached reply for `prompt`, unless absent or expired.
    pub fn lookup(&self, prompt: &str) -> Option<String> {
        let key = fingerprint(prompt);
        let now = self.clock.now_ms();
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .filter(|entry| now.saturating_sub(entry.created_at) <= self.ttl_ms)
            .map(|entry| entry.response_text.clone())
    }

    /// Record `response` for `prompt`, replacing any previous entry for the
    /// same fingerprint.
    ///
    /// Persistence failures are logged; the in-memory update stands.
    pub fn store(&mut self, prompt: &str, response: &str) {
        let key = fingerprint(prompt);
        self.entries.retain(|entry| entry.key != key);
        self.entries.push(CacheEntry {
            key,
            response_text: response.to_string(),
            created_at: self.clock.now_ms(),
        });
        self.evict_overflow();
        self.persist();
    }

    /// Drop every entry, in memory and in storage.
    pub fn clear(&mut self) {
        self.entries.clear();
        if let Err(e) = self.store.remove(RESPONSES_KEY) {
            warn!(error = %e, "Failed to clear persisted response cache");
        }
    }

    /// Approximate serialized size in bytes. Display only.
    pub fn size_estimate(&self) -> usize {
        serde_json::to_string(&self.entries)
            .map(|s| s.len())
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn status(&self) -> CacheStatus {
        CacheStatus {
            entries: self.entries.len(),
            size_bytes: self.size_estimate(),
        }
    }

    fn evict_overflow(&mut self) {
        if self.entries.len() > self.max_entries {
            let excess = self.entries.len() - self.max_entries;
            self.entries.drain(..excess);
        }
    }

    fn persist(&self) {
        let result = serde_json::to_string(&self.entries)
            .map_err(voxline_core::VoxlineError::from)
            .and_then(|raw| self.store.set(RESPONSES_KEY, &raw));
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist response cache; keeping in memory only");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
