//! Validation result cache.
//!
//! Validation is pure in the atom and the number of whole days elapsed since
//! its `last_updated` (the staleness check counts whole days), so a result
//! can be reused until either changes.
//!
//! The cache key is derived from:
//! - the canonical JSON of the atom
//! - the whole days between `last_updated` and the validation instant
//!
//! Any field change results in a cache miss and full validation.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use std::hash::Hasher;
use xxhash_rust::xxh64::Xxh64;

use crate::canonical::to_canonical_bytes;
use crate::types::{AtomValidationResult, KnowledgeAtom};

/// Cache key for a validation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValidationCacheKey(u64);

impl ValidationCacheKey {
    /// Compute the key for validating `atom` at `now`.
    ///
    /// Returns `None` if the atom cannot be serialized, in which case the
    /// result is simply not cached.
    pub fn compute(atom: &KnowledgeAtom, now: DateTime<Utc>) -> Option<Self> {
        let bytes = to_canonical_bytes(atom).ok()?;
        let mut hasher = Xxh64::new(0);
        hasher.write(&bytes);
        hasher.write(&(now - atom.last_updated).num_days().to_le_bytes());
        Some(Self(hasher.finish()))
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Current number of entries in the cache.
    pub len: usize,
    /// Maximum capacity of the cache.
    pub cap: usize,
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that required full validation.
    pub misses: u64,
}

impl CacheStats {
    /// Fraction of lookups answered from the cache, 0 when none were made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Bounded LRU cache of validation results with hit/miss counters.
#[derive(Debug)]
pub struct ValidationCache {
    entries: Mutex<LruCache<ValidationCacheKey, AtomValidationResult>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ValidationCache {
    /// Create a cache holding at most `capacity` results (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let size = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(size)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the cached result for `key`, or compute, store and return it.
    pub fn get_or_insert_with(
        &self,
        key: Option<ValidationCacheKey>,
        validate: impl FnOnce() -> AtomValidationResult,
    ) -> AtomValidationResult {
        let Some(key) = key else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return validate();
        };

        if let Some(result) = self.entries.lock().get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return result.clone();
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let result = validate();
        self.entries.lock().put(key, result.clone());
        result
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Current statistics.
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock();
        CacheStats {
            len: entries.len(),
            cap: entries.cap().get(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AtomType, EvidenceLevel, ValidationIssues};
    use chrono::TimeZone;

    fn atom(title: &str) -> KnowledgeAtom {
        KnowledgeAtom::new("a1", AtomType::Fact, "neuro", title, "Long enough content", EvidenceLevel::Weak)
    }

    fn result_for(atom: &KnowledgeAtom) -> AtomValidationResult {
        AtomValidationResult {
            atom_id: atom.id.clone(),
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            quality_score: 100,
            issues: ValidationIssues::default(),
            recommended_actions: Vec::new(),
        }
    }

    #[test]
    fn test_hit_after_miss() {
        let cache = ValidationCache::new(4);
        let a = atom("Vitamin D");
        let now = Utc::now();

        cache.get_or_insert_with(ValidationCacheKey::compute(&a, now), || result_for(&a));
        let mut called = false;
        cache.get_or_insert_with(ValidationCacheKey::compute(&a, now), || {
            called = true;
            result_for(&a)
        });

        assert!(!called);
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.len), (1, 1, 1));
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_key_changes_with_content_and_day() {
        let now = Utc::now();
        let a = atom("Vitamin D");
        let b = atom("Vitamin K");
        assert_ne!(ValidationCacheKey::compute(&a, now), ValidationCacheKey::compute(&b, now));
        assert_ne!(
            ValidationCacheKey::compute(&a, now),
            ValidationCacheKey::compute(&a, now + chrono::Duration::days(1))
        );
    }

    #[test]
    fn test_key_changes_when_elapsed_days_roll_over_within_a_day() {
        let mut a = atom("Vitamin D");
        a.last_updated = Utc.with_ymd_and_hms(2020, 1, 1, 12, 0, 0).unwrap();
        let morning = Utc.with_ymd_and_hms(2025, 1, 1, 6, 0, 0).unwrap();
        let evening = Utc.with_ymd_and_hms(2025, 1, 1, 18, 0, 0).unwrap();

        assert_ne!(ValidationCacheKey::compute(&a, morning), ValidationCacheKey::compute(&a, evening));
        assert_eq!(
            ValidationCacheKey::compute(&a, evening),
            ValidationCacheKey::compute(&a, evening + chrono::Duration::hours(1))
        );
    }

    #[test]
    fn test_capacity_and_clear() {
        let cache = ValidationCache::new(1);
        let now = Utc::now();
        for title in ["First title", "Second title"] {
            let a = atom(title);
            cache.get_or_insert_with(ValidationCacheKey::compute(&a, now), || result_for(&a));
        }
        assert_eq!(cache.stats().len, 1);

        cache.clear();
        assert_eq!(cache.stats().len, 0);
        assert_eq!(cache.stats().misses, 2);
    }
}
