/*!
 * Audit Metrics
 * Concurrent counters aggregated from audit events, with top-N reports
 */

use super::event::{AuditEvent, AuditOutcome};
use crate::core::limits::MAX_METRIC_KEYS;
use ahash::RandomState;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Shared audit counters.
///
/// Scalar counters are atomics; keyed counters live in concurrent maps,
/// bounded so uniquely-keyed paths cannot grow memory without limit.
#[derive(Default)]
pub struct AuditMetrics {
    total: AtomicU64,
    allowed: AtomicU64,
    denied: AtomicU64,
    errors: AtomicU64,
    dropped: AtomicU64,
    total_duration_nanos: AtomicU64,
    operation_counts: DashMap<String, u64, RandomState>,
    user_denials: DashMap<String, u64, RandomState>,
    path_accesses: DashMap<String, u64, RandomState>,
}

impl AuditMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the counters.
    pub fn record(&self, event: &AuditEvent) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.total_duration_nanos
            .fetch_add(event.duration.as_nanos() as u64, Ordering::Relaxed);

        match event.result {
            AuditOutcome::Allowed => {
                self.allowed.fetch_add(1, Ordering::Relaxed);
            }
            AuditOutcome::Denied => {
                self.denied.fetch_add(1, Ordering::Relaxed);
                bump(&self.user_denials, &event.user_id);
            }
            AuditOutcome::Error => {
                self.errors.fetch_add(1, Ordering::Relaxed);
            }
        }

        bump(&self.operation_counts, &event.operation);
        bump(&self.path_accesses, &event.path);
    }

    /// Count an event that overflowed the async queue (it was still written,
    /// synchronously).
    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> AuditStats {
        let total = self.total.load(Ordering::Relaxed);
        let total_duration = Duration::from_nanos(self.total_duration_nanos.load(Ordering::Relaxed));

        AuditStats {
            total_events: total,
            allowed_events: self.allowed.load(Ordering::Relaxed),
            denied_events: self.denied.load(Ordering::Relaxed),
            error_events: self.errors.load(Ordering::Relaxed),
            dropped_events: self.dropped.load(Ordering::Relaxed),
            average_duration: if total == 0 {
                Duration::ZERO
            } else {
                total_duration / total as u32
            },
        }
    }

    /// The `k` users with the most denials, ties broken by user id.
    pub fn top_denied_users(&self, k: usize) -> Vec<UserDenialStat> {
        top_n(&self.user_denials, k)
            .into_iter()
            .map(|(user_id, count)| UserDenialStat { user_id, count })
            .collect()
    }

    /// The `k` most accessed paths, ties broken by path.
    pub fn top_accessed_paths(&self, k: usize) -> Vec<PathAccessStat> {
        top_n(&self.path_accesses, k)
            .into_iter()
            .map(|(path, count)| PathAccessStat { path, count })
            .collect()
    }

    pub fn operation_count(&self, operation: &str) -> u64 {
        self.operation_counts
            .get(operation)
            .map(|entry| *entry)
            .unwrap_or(0)
    }
}

fn bump(map: &DashMap<String, u64, RandomState>, key: &str) {
    if let Some(mut entry) = map.get_mut(key) {
        *entry += 1;
        return;
    }
    if map.len() < MAX_METRIC_KEYS {
        *map.entry(key.to_string()).or_insert(0) += 1;
    }
}

fn top_n(map: &DashMap<String, u64, RandomState>, k: usize) -> Vec<(String, u64)> {
    let mut all: Vec<(String, u64)> = map
        .iter()
        .map(|entry| (entry.key().clone(), *entry.value()))
        .collect();
    // Count descending, key ascending: ties are arbitrary but stable
    all.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    all.truncate(k);
    all
}

/// Aggregate audit statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStats {
    pub total_events: u64,
    pub allowed_events: u64,
    pub denied_events: u64,
    pub error_events: u64,
    pub dropped_events: u64,
    pub average_duration: Duration,
}

/// Denial count for one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDenialStat {
    pub user_id: String,
    pub count: u64,
}

/// Access count for one path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathAccessStat {
    pub path: String,
    pub count: u64,
}
