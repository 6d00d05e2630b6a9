/*!
 * Compiled Pattern Cache
 * Deduplicates compiled matchers by source string
 */

use super::matcher::{PatternError, PatternMatcher};
use ahash::RandomState;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Process-lifetime cache of compiled patterns.
///
/// Size is bounded by the number of distinct patterns in the policy, so
/// entries are never evicted. Lookups are lock-free reads on the shared map.
pub struct PatternCache {
    cache: DashMap<String, Arc<PatternMatcher>, RandomState>,
    enabled: AtomicBool,
}

impl PatternCache {
    pub fn new() -> Self {
        Self {
            cache: DashMap::with_hasher(RandomState::new()),
            enabled: AtomicBool::new(true),
        }
    }

    /// Fetch the compiled matcher for `pattern`, compiling on first use.
    pub fn get_or_compile(&self, pattern: &str) -> Result<Arc<PatternMatcher>, PatternError> {
        if !self.enabled.load(Ordering::Relaxed) {
            return PatternMatcher::compile(pattern).map(Arc::new);
        }

        if let Some(matcher) = self.cache.get(pattern) {
            return Ok(Arc::clone(&matcher));
        }

        let matcher = Arc::new(PatternMatcher::compile(pattern)?);
        // A racing insert of the same pattern is harmless; both values are equal
        self.cache
            .insert(pattern.to_string(), Arc::clone(&matcher));
        Ok(matcher)
    }

    /// Number of cached compiled patterns
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Drop all cached matchers
    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }
}

impl Default for PatternCache {
    fn default() -> Self {
        Self::new()
    }
}
