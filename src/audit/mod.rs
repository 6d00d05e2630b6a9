/*!
 * Audit Module
 * Structured audit events, filtered emission, and metrics aggregation
 */

mod event;
mod logger;
mod metrics;

pub use event::{AuditEvent, AuditLevel, AuditOutcome};
pub use logger::{AuditConfig, AuditHandler, AuditLogger};
pub use metrics::{AuditMetrics, AuditStats, PathAccessStat, UserDenialStat};
