/*!
 * Kernel Configuration
 */

use crate::audit::AuditConfig;
use crate::core::limits::{DEFAULT_CACHE_MAX_SIZE, DEFAULT_CACHE_TTL};
use crate::policy::Acl;
use std::time::Duration;

/// Caching knobs for the evaluation path
#[derive(Debug, Clone)]
pub struct PerformanceConfig {
    /// Cache permission decisions per (user, path, operation)
    pub cache_enabled: bool,
    /// Decision time-to-live; zero falls back to the default (5 minutes)
    pub cache_ttl: Duration,
    /// Decision cache capacity; zero falls back to the default (10 000)
    pub cache_max_size: usize,
    /// Reuse compiled path patterns across checks
    pub pattern_cache_enabled: bool,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_max_size: DEFAULT_CACHE_MAX_SIZE,
            pattern_cache_enabled: true,
        }
    }
}

impl PerformanceConfig {
    /// All caching off; every check evaluates from scratch
    pub fn uncached() -> Self {
        Self {
            cache_enabled: false,
            pattern_cache_enabled: false,
            ..Default::default()
        }
    }

    pub(crate) fn effective_ttl(&self) -> Duration {
        if self.cache_ttl.is_zero() {
            DEFAULT_CACHE_TTL
        } else {
            self.cache_ttl
        }
    }

    pub(crate) fn effective_max_size(&self) -> usize {
        if self.cache_max_size == 0 {
            DEFAULT_CACHE_MAX_SIZE
        } else {
            self.cache_max_size
        }
    }
}

/// Full kernel configuration
#[derive(Debug, Default)]
pub struct Config {
    pub acl: Acl,
    pub performance: PerformanceConfig,
    pub audit: AuditConfig,
}

impl Config {
    /// Configuration with the given policy and library defaults elsewhere
    pub fn new(acl: Acl) -> Self {
        Self {
            acl,
            ..Default::default()
        }
    }
}
