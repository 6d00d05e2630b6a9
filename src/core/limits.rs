/*!
 * Kernel Limits and Defaults
 *
 * Centralized location for tunable limits and default values.
 * All values include rationale comments explaining WHY they exist.
 */

use std::time::Duration;

// =============================================================================
// DECISION CACHE
// =============================================================================

/// Default capacity of the permission decision cache (entries)
/// Sized for (users x hot paths x operations) on a busy service
/// [PERF] Beyond this, LRU eviction keeps memory bounded
pub const DEFAULT_CACHE_MAX_SIZE: usize = 10_000;

/// Default time-to-live for cached decisions
/// Bounds how long a stale decision can outlive a condition change
/// [SECURITY] Policy mutations invalidate immediately regardless of TTL
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

// =============================================================================
// AUDIT PIPELINE
// =============================================================================

/// Default capacity of the async audit queue
/// When full, events fall back to a synchronous write (never dropped)
pub const DEFAULT_AUDIT_BUFFER_SIZE: usize = 1000;

/// Upper bound on distinct keys in per-user / per-path metric maps
/// Prevents unbounded growth when paths carry unique identifiers
/// [PERF] Oldest-insertion keys beyond this are simply not tracked
pub const MAX_METRIC_KEYS: usize = 100_000;
