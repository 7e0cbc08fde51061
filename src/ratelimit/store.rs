//! Fixed-window counter storage.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::trace;

use super::clock::{Clock, SystemClock};
use super::key::WindowKey;

/// Counter state for one key in its current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    /// Requests recorded in the current window
    pub count: u64,
    /// Epoch milliseconds at which the window ends
    pub reset_at_ms: u64,
}

impl RateLimitEntry {
    /// Whether the window has ended as of `now_ms`.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.reset_at_ms
    }

    /// Window reset as whole epoch seconds, rounded up.
    pub fn reset_epoch_secs(&self) -> u64 {
        self.reset_at_ms.div_ceil(1000)
    }

    /// Seconds until the window resets, rounded up.
    pub fn retry_after_secs(&self, now_ms: u64) -> u64 {
        self.reset_at_ms.saturating_sub(now_ms).div_ceil(1000)
    }
}

/// Per-key fixed-window counters.
///
/// Entries live in a sharded map; `record_hit` holds the shard lock for
/// the whole expiry-check-and-increment, so two hits on the same key never
/// interleave. Sweeping takes the same shard locks.
pub struct WindowStore {
    entries: DashMap<WindowKey, RateLimitEntry>,
    clock: Arc<dyn Clock>,
}

impl WindowStore {
    /// Create an empty store backed by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store reading time from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Current time according to the store's clock.
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Look up the entry for a key without touching it.
    pub fn get(&self, key: &WindowKey) -> Option<RateLimitEntry> {
        self.entries.get(key).map(|e| *e)
    }

    /// Record one hit for `key` at the clock's current time.
    pub fn record_hit(&self, key: &WindowKey, window: Duration) -> RateLimitEntry {
        self.record_hit_at(key, window, self.now_ms())
    }

    /// Record one hit for `key` as of `now_ms`.
    ///
    /// An absent or expired entry is replaced by a fresh window ending at
    /// `now_ms + window`; otherwise the count is incremented and the reset
    /// instant kept. Returns the entry after the update.
    pub fn record_hit_at(&self, key: &WindowKey, window: Duration, now_ms: u64) -> RateLimitEntry {
        let window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
        let fresh = RateLimitEntry {
            count: 0,
            reset_at_ms: now_ms.saturating_add(window_ms),
        };

        let mut entry = self.entries.entry(key.clone()).or_insert(fresh);
        if entry.is_expired(now_ms) {
            trace!(key = %key, "Window expired, starting a new one");
            *entry = fresh;
        }
        entry.count += 1;

        *entry
    }

    /// Remove every entry whose window ended before `now_ms`.
    ///
    /// Returns the number of entries removed.
    pub fn sweep(&self, now_ms: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.reset_at_ms >= now_ms);
        before.saturating_sub(self.entries.len())
    }

    /// Sweep using the store's clock.
    pub fn sweep_expired(&self) -> usize {
        self.sweep(self.now_ms())
    }

    /// Number of entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl Default for WindowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WindowStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowStore")
            .field("entries", &self.entries.len())
            .finish()
    }
}
