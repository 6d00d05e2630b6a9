/*!
 * Audit Events
 * One structured record per permission check, serialized as a single JSON line
 */

use crate::core::serde::serde_as;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::DurationMilliSecondsWithFrac;
use std::collections::HashMap;
use std::time::Duration;

/// How verbose the audit pipeline is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditLevel {
    /// Drop every event
    None,
    /// Keep only denied checks
    Denied,
    /// Keep everything
    #[default]
    All,
}

/// Result of the audited check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Allowed,
    Denied,
    Error,
}

/// One audit record. Field names are part of the wire format.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    /// Display form of the required operation set, e.g. `Read|Write`
    pub operation: String,
    pub path: String,
    pub result: AuditOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Wall time the check took, in (fractional) milliseconds
    #[serde_as(as = "DurationMilliSecondsWithFrac<f64>")]
    #[serde(rename = "duration_ms")]
    pub duration: Duration,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
}

impl AuditEvent {
    pub fn new(
        user_id: impl Into<String>,
        operation: impl Into<String>,
        path: impl Into<String>,
        result: AuditOutcome,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            request_id: None,
            user_id: user_id.into(),
            groups: Vec::new(),
            roles: Vec::new(),
            operation: operation.into(),
            path: path.into(),
            result,
            reason: None,
            duration: Duration::ZERO,
            metadata: HashMap::new(),
            source_ip: None,
        }
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}
