// crates/upgrade-compass-core/src/cache.rs
// ============================================================================
// Module: Bounded Cache
// Description: In-memory memoization with TTL expiry and dual eviction bounds.
// Purpose: Bound memory held by repeated analysis and documentation lookups.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The cache stores JSON-serialized values under validated keys and enforces
//! two bounds together: an entry-count ceiling and an aggregate byte ceiling
//! of `max_value_bytes * max_entries`. Eviction removes the oldest entry per
//! round until both bounds hold. Expiry is lazy: `has` and `get` evict an
//! entry whose age exceeds its TTL as a side effect of the check.
//!
//! ## Invariants
//! - Keys match `[A-Za-z0-9_.:-]+` and are at most 255 bytes.
//! - `memory_usage <= max_value_bytes * max_entries` after every `set`.
//! - Entry count never exceeds `max_entries`.
//! - Time is read through [`TimeSource`]; the cache never consults ambient
//!   wall-clock state directly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default entry time-to-live in seconds.
pub const DEFAULT_TTL_SECS: u64 = 3600;
/// Default maximum number of entries.
pub const DEFAULT_MAX_ENTRIES: usize = 100;
/// Default maximum serialized size of a single value in bytes.
pub const DEFAULT_MAX_VALUE_BYTES: usize = 1024 * 1024;
/// Maximum accepted key length in bytes.
const MAX_KEY_LENGTH: usize = 255;

// ============================================================================
// SECTION: Time Source
// ============================================================================

/// Clock abstraction used for entry timestamps and expiry checks.
pub trait TimeSource: Send + Sync {
    /// Returns the current time in whole seconds.
    fn now_secs(&self) -> u64;
}

/// System clock time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_secs(&self) -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |elapsed| elapsed.as_secs())
    }
}

/// Manually advanced time source for deterministic expiry tests.
#[derive(Debug, Default)]
pub struct ManualTimeSource {
    /// Current time in seconds.
    now: AtomicU64,
}

impl ManualTimeSource {
    /// Creates a manual time source starting at the given second.
    #[must_use]
    pub fn starting_at(now_secs: u64) -> Self {
        Self {
            now: AtomicU64::new(now_secs),
        }
    }

    /// Advances the clock by the given number of seconds.
    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTimeSource {
    fn now_secs(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

// ============================================================================
// SECTION: Cache Types
// ============================================================================

/// A stored cache entry.
///
/// # Invariants
/// - `serialized` is valid JSON produced by a single serialization in `set`.
#[derive(Debug, Clone)]
struct CacheEntry {
    /// JSON-serialized value.
    serialized: String,
    /// Storage timestamp in seconds.
    timestamp_secs: u64,
    /// Time-to-live in seconds for this entry.
    ttl_secs: u64,
}

/// Cache statistics snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Current entry count.
    pub size: usize,
    /// Maximum entry count.
    pub max_size: usize,
    /// Current aggregate serialized bytes.
    pub memory_usage: usize,
    /// Aggregate byte ceiling.
    pub memory_limit: usize,
}

/// Bounded in-memory cache with TTL expiry and LRU-by-timestamp eviction.
pub struct BoundedCache {
    /// Stored entries keyed by validated cache key.
    entries: BTreeMap<String, CacheEntry>,
    /// Running aggregate of serialized bytes.
    current_bytes: usize,
    /// Default entry time-to-live in seconds.
    default_ttl_secs: u64,
    /// Maximum entry count.
    max_entries: usize,
    /// Maximum serialized size of a single value.
    max_value_bytes: usize,
    /// Clock used for timestamps and expiry.
    time: Arc<dyn TimeSource>,
}

// ============================================================================
// SECTION: Implementation
// ============================================================================

impl BoundedCache {
    /// Creates a cache with the given bounds and the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidCapacity`] when either bound is zero.
    pub fn new(
        default_ttl_secs: u64,
        max_entries: usize,
        max_value_bytes: usize,
    ) -> Result<Self, CacheError> {
        Self::with_time_source(
            default_ttl_secs,
            max_entries,
            max_value_bytes,
            Arc::new(SystemTimeSource),
        )
    }

    /// Creates a cache with the given bounds and an explicit clock.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidCapacity`] when either bound is zero.
    pub fn with_time_source(
        default_ttl_secs: u64,
        max_entries: usize,
        max_value_bytes: usize,
        time: Arc<dyn TimeSource>,
    ) -> Result<Self, CacheError> {
        if max_entries == 0 || max_value_bytes == 0 {
            return Err(CacheError::InvalidCapacity);
        }
        Ok(Self {
            entries: BTreeMap::new(),
            current_bytes: 0,
            default_ttl_secs,
            max_entries,
            max_value_bytes,
            time,
        })
    }

    /// Stores a value under a validated key.
    ///
    /// The value is serialized exactly once; an oversized value fails before
    /// any state is mutated. Overwriting a key first releases its prior byte
    /// accounting, then eviction runs until both the count and aggregate-size
    /// bounds hold.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidKey`] or [`CacheError::ValueTooLarge`]
    /// without mutating state, or [`CacheError::Serialization`] when the
    /// value cannot be encoded.
    pub fn set(&mut self, key: &str, value: &Value, ttl_secs: Option<u64>) -> Result<(), CacheError> {
        Self::validate_key(key)?;

        let serialized =
            serde_json::to_string(value).map_err(|err| CacheError::Serialization(err.to_string()))?;
        let size = serialized.len();
        if size > self.max_value_bytes {
            return Err(CacheError::ValueTooLarge {
                key: key.to_string(),
                size,
                limit: self.max_value_bytes,
            });
        }

        // Release the prior entry's bytes but keep it counted as present so
        // an overwrite is exempt from the count bound below.
        if let Some(prior) = self.entries.get_mut(key) {
            self.current_bytes -= prior.serialized.len();
            prior.serialized = String::new();
        }

        let limit = self.memory_limit();
        while (self.entries.len() >= self.max_entries && !self.entries.contains_key(key))
            || self.current_bytes + size > limit
        {
            if !self.evict_oldest() {
                break;
            }
        }

        self.entries.insert(
            key.to_string(),
            CacheEntry {
                serialized,
                timestamp_secs: self.time.now_secs(),
                ttl_secs: ttl_secs.unwrap_or(self.default_ttl_secs),
            },
        );
        self.current_bytes += size;
        Ok(())
    }

    /// Returns the cached value, evicting it first when expired.
    pub fn get(&mut self, key: &str) -> Option<Value> {
        if !self.has(key) {
            return None;
        }
        let entry = self.entries.get(key)?;
        serde_json::from_str(&entry.serialized).ok()
    }

    /// Returns whether the key exists and is not expired.
    ///
    /// An expired entry is evicted as a side effect of the check.
    pub fn has(&mut self, key: &str) -> bool {
        let Some(entry) = self.entries.get(key) else {
            return false;
        };
        let age = self.time.now_secs().saturating_sub(entry.timestamp_secs);
        if age > entry.ttl_secs {
            self.forget(key);
            return false;
        }
        true
    }

    /// Removes an entry and releases its byte accounting.
    pub fn forget(&mut self, key: &str) {
        if let Some(entry) = self.entries.remove(key) {
            self.current_bytes -= entry.serialized.len();
        }
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.current_bytes = 0;
    }

    /// Returns the cached value or computes, stores, and returns it.
    ///
    /// A cached JSON `null` is treated as a miss, so null-equivalent computed
    /// values are stored but recomputed on the next read.
    ///
    /// # Errors
    ///
    /// Propagates the compute error, or a [`CacheError`] from storing the
    /// computed value.
    pub fn remember<E, F>(&mut self, key: &str, ttl_secs: Option<u64>, compute: F) -> Result<Value, E>
    where
        E: From<CacheError>,
        F: FnOnce() -> Result<Value, E>,
    {
        if let Some(value) = self.get(key) {
            if !value.is_null() {
                return Ok(value);
            }
        }
        let value = compute()?;
        self.set(key, &value, ttl_secs)?;
        Ok(value)
    }

    /// Returns a statistics snapshot.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            max_size: self.max_entries,
            memory_usage: self.current_bytes,
            memory_limit: self.memory_limit(),
        }
    }

    /// Aggregate byte ceiling derived from the two configured bounds.
    fn memory_limit(&self) -> usize {
        self.max_value_bytes.saturating_mul(self.max_entries)
    }

    /// Evicts the entry with the oldest timestamp.
    ///
    /// Returns `false` when the cache is empty, which terminates the eviction
    /// loop in `set` even in degenerate configurations.
    fn evict_oldest(&mut self) -> bool {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.timestamp_secs)
            .map(|(key, _)| key.clone());
        match oldest {
            Some(key) => {
                self.forget(&key);
                true
            }
            None => false,
        }
    }

    /// Validates key charset and length.
    fn validate_key(key: &str) -> Result<(), CacheError> {
        let valid = !key.is_empty()
            && key.len() <= MAX_KEY_LENGTH
            && key
                .bytes()
                .all(|byte| byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'.' | b':' | b'-'));
        if valid {
            Ok(())
        } else {
            Err(CacheError::InvalidKey(key.to_string()))
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Cache errors surfaced synchronously to the immediate caller.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The key is empty, too long, or contains disallowed characters.
    #[error("invalid cache key \"{0}\"")]
    InvalidKey(String),
    /// The serialized value exceeds the per-value size limit.
    #[error("cache value for \"{key}\" is {size} bytes; limit is {limit}")]
    ValueTooLarge {
        /// Offending key.
        key: String,
        /// Serialized size in bytes.
        size: usize,
        /// Per-value limit in bytes.
        limit: usize,
    },
    /// A configured bound is zero.
    #[error("cache bounds must be non-zero")]
    InvalidCapacity,
    /// Value serialization failed.
    #[error("cache value serialization failed: {0}")]
    Serialization(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions."
    )]

    use std::sync::Arc;

    use proptest::prelude::*;
    use serde_json::Value;
    use serde_json::json;

    use super::BoundedCache;
    use super::CacheError;
    use super::ManualTimeSource;

    /// Builds a cache driven by a manual clock.
    fn cache_with_clock(
        ttl: u64,
        max_entries: usize,
        max_value_bytes: usize,
    ) -> (BoundedCache, Arc<ManualTimeSource>) {
        let clock = Arc::new(ManualTimeSource::starting_at(1_000));
        let cache =
            BoundedCache::with_time_source(ttl, max_entries, max_value_bytes, clock.clone())
                .unwrap();
        (cache, clock)
    }

    #[test]
    fn rejects_invalid_keys_before_any_mutation() {
        let (mut cache, _clock) = cache_with_clock(60, 4, 1024);
        for key in ["", "has space", "bad/slash", &"k".repeat(256)] {
            let result = cache.set(key, &json!(1), None);
            assert!(matches!(result, Err(CacheError::InvalidKey(_))), "key {key:?}");
        }
        assert_eq!(cache.stats().size, 0);
        assert_eq!(cache.stats().memory_usage, 0);
    }

    #[test]
    fn accepts_full_allowed_charset() {
        let (mut cache, _clock) = cache_with_clock(60, 4, 1024);
        cache.set("aZ0_.:-", &json!(true), None).unwrap();
        assert!(cache.has("aZ0_.:-"));
    }

    #[test]
    fn oversized_value_fails_without_mutation() {
        let (mut cache, _clock) = cache_with_clock(60, 4, 16);
        cache.set("small", &json!(1), None).unwrap();
        let before = cache.stats();
        let result = cache.set("big", &json!("a much larger payload than fits"), None);
        assert!(matches!(result, Err(CacheError::ValueTooLarge { .. })));
        assert_eq!(cache.stats(), before);
    }

    #[test]
    fn count_bound_evicts_oldest_first() {
        let (mut cache, clock) = cache_with_clock(600, 2, 1024);
        cache.set("a", &json!("one"), None).unwrap();
        clock.advance(1);
        cache.set("b", &json!("two"), None).unwrap();
        clock.advance(1);
        cache.set("c", &json!("three"), None).unwrap();
        assert!(!cache.has("a"));
        assert!(cache.has("b"));
        assert!(cache.has("c"));
        assert_eq!(cache.stats().size, 2);
    }

    #[test]
    fn overwriting_a_key_is_exempt_from_the_count_bound() {
        let (mut cache, clock) = cache_with_clock(600, 2, 1024);
        cache.set("a", &json!("one"), None).unwrap();
        clock.advance(1);
        cache.set("b", &json!("two"), None).unwrap();
        clock.advance(1);
        cache.set("a", &json!("replaced"), None).unwrap();
        assert_eq!(cache.get("a"), Some(json!("replaced")));
        assert!(cache.has("b"));
        assert_eq!(cache.stats().size, 2);
    }

    #[test]
    fn overwrite_reaccounts_bytes() {
        let (mut cache, _clock) = cache_with_clock(600, 4, 1024);
        cache.set("k", &json!("aaaaaaaaaa"), None).unwrap();
        let first = cache.stats().memory_usage;
        cache.set("k", &json!("bb"), None).unwrap();
        let second = cache.stats().memory_usage;
        assert!(second < first);
        assert_eq!(second, serde_json::to_string(&json!("bb")).unwrap().len());
    }

    #[test]
    fn eviction_restores_both_bounds_with_mixed_sizes() {
        let (mut cache, clock) = cache_with_clock(600, 3, 32);
        for key in ["a", "b", "c", "d", "e"] {
            clock.advance(1);
            cache.set(key, &json!(format!("payload-for-{key}-padded")), None).unwrap();
            let stats = cache.stats();
            assert!(stats.size <= stats.max_size);
            assert!(stats.memory_usage <= stats.memory_limit);
        }
        assert!(!cache.has("a"));
        assert!(!cache.has("b"));
        assert!(cache.has("e"));
    }

    #[test]
    fn ttl_expiry_is_lazy_and_evicts_on_read() {
        let (mut cache, clock) = cache_with_clock(2, 4, 1024);
        cache.set("k", &json!("v"), None).unwrap();
        clock.advance(3);
        assert_eq!(cache.get("k"), None);
        assert!(!cache.has("k"));
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn per_entry_ttl_overrides_default() {
        let (mut cache, clock) = cache_with_clock(600, 4, 1024);
        cache.set("short", &json!(1), Some(2)).unwrap();
        cache.set("long", &json!(2), None).unwrap();
        clock.advance(3);
        assert!(!cache.has("short"));
        assert!(cache.has("long"));
    }

    #[test]
    fn entry_exactly_at_ttl_is_still_alive() {
        let (mut cache, clock) = cache_with_clock(2, 4, 1024);
        cache.set("k", &json!("v"), None).unwrap();
        clock.advance(2);
        assert!(cache.has("k"));
    }

    #[test]
    fn forget_and_clear_release_accounting() {
        let (mut cache, _clock) = cache_with_clock(600, 4, 1024);
        cache.set("a", &json!("one"), None).unwrap();
        cache.set("b", &json!("two"), None).unwrap();
        cache.forget("a");
        assert!(!cache.has("a"));
        assert!(cache.stats().memory_usage > 0);
        cache.clear();
        assert_eq!(cache.stats().size, 0);
        assert_eq!(cache.stats().memory_usage, 0);
    }

    #[test]
    fn remember_computes_once_and_reuses() {
        let (mut cache, _clock) = cache_with_clock(600, 4, 1024);
        let mut calls = 0;
        let lookup = |cache: &mut BoundedCache, calls: &mut u32| -> Value {
            cache
                .remember::<CacheError, _>("memo", None, || {
                    *calls += 1;
                    Ok(json!("computed"))
                })
                .unwrap()
        };
        assert_eq!(lookup(&mut cache, &mut calls), json!("computed"));
        assert_eq!(lookup(&mut cache, &mut calls), json!("computed"));
        assert_eq!(calls, 1);
    }

    #[test]
    fn remember_treats_cached_null_as_a_miss() {
        let (mut cache, _clock) = cache_with_clock(600, 4, 1024);
        let mut calls = 0;
        for _ in 0..2 {
            let value = cache
                .remember::<CacheError, _>("nullish", None, || {
                    calls += 1;
                    Ok(Value::Null)
                })
                .unwrap();
            assert!(value.is_null());
        }
        assert_eq!(calls, 2, "a stored null must not satisfy the next read");
    }

    #[test]
    fn zero_bounds_are_rejected_at_construction() {
        assert!(matches!(BoundedCache::new(60, 0, 1024), Err(CacheError::InvalidCapacity)));
        assert!(matches!(BoundedCache::new(60, 4, 0), Err(CacheError::InvalidCapacity)));
    }

    proptest! {
        #[test]
        fn bounds_hold_under_arbitrary_insert_sequences(
            keys in proptest::collection::vec("[a-z]{1,8}", 1..64),
        ) {
            let (mut cache, clock) = cache_with_clock(600, 5, 64);
            for (index, key) in keys.iter().enumerate() {
                clock.advance(1);
                let value = json!(format!("value-{index}"));
                cache.set(key, &value, None).unwrap();
                let stats = cache.stats();
                assert!(stats.size <= stats.max_size);
                assert!(stats.memory_usage <= stats.memory_limit);
            }
        }
    }
}
