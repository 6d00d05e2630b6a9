/*!
 * ACL Entries and Evaluation Context
 */

use super::conditions::Condition;
use super::types::{Effect, Identity, Operation, Subject};
use crate::pattern::{PatternCache, PatternError};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Everything a single permission check is evaluated against.
///
/// Built at the interception boundary with the canonical path and discarded
/// when the check completes.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    pub identity: Arc<Identity>,
    pub path: String,
    pub operation: Operation,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl EvaluationContext {
    pub fn new(
        identity: impl Into<Arc<Identity>>,
        path: impl Into<String>,
        operation: Operation,
    ) -> Self {
        Self {
            identity: identity.into(),
            path: path.into(),
            operation,
            metadata: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// One access-control rule.
#[derive(Debug, Clone)]
pub struct AclEntry {
    /// Who the rule applies to
    pub subject: Subject,
    /// Glob over canonical paths (`*`, `?`, `**`)
    pub path_pattern: String,
    /// Operations granted or refused; must be non-empty to validate
    pub permissions: Operation,
    pub effect: Effect,
    /// Higher priority wins; never negative in a valid policy
    pub priority: i32,
    /// All conditions must pass for the entry to apply
    pub conditions: Vec<Condition>,
}

impl AclEntry {
    pub fn new(
        subject: Subject,
        path_pattern: impl Into<String>,
        permissions: Operation,
        effect: Effect,
    ) -> Self {
        Self {
            subject,
            path_pattern: path_pattern.into(),
            permissions,
            effect,
            priority: 0,
            conditions: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Subject, pattern, and all conditions hold for this context.
    ///
    /// Conditions run only after subject and pattern match; a failing
    /// condition disqualifies the entry as if it never matched.
    pub fn matches(
        &self,
        ctx: &EvaluationContext,
        patterns: &PatternCache,
    ) -> Result<bool, PatternError> {
        if !ctx.identity.matches(&self.subject) {
            return Ok(false);
        }

        let matcher = patterns.get_or_compile(&self.path_pattern)?;
        if !matcher.matches(&ctx.path) {
            return Ok(false);
        }

        Ok(self.conditions.iter().all(|cond| cond.evaluate(ctx)))
    }

    /// Granted set fully covers the required set
    pub fn applies(&self, required: Operation) -> bool {
        self.permissions.has(required)
    }

    /// Rule identity for de-duplication and removal:
    /// (subject, pattern, permissions, effect).
    pub fn same_rule(&self, other: &AclEntry) -> bool {
        self.subject == other.subject
            && self.path_pattern == other.path_pattern
            && self.permissions == other.permissions
            && self.effect == other.effect
    }
}

impl fmt::Display for AclEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} {} on {} (priority: {})",
            self.subject, self.effect, self.permissions, self.path_pattern, self.priority
        )
    }
}

/// An ordered list of entries plus the effect applied when nothing matches.
///
/// Input order is preserved; evaluation depends on it only as a tie-breaker
/// within equal-priority bands.
#[derive(Debug, Clone)]
pub struct Acl {
    pub entries: Vec<AclEntry>,
    pub default_effect: Effect,
}

impl Acl {
    pub fn new(entries: Vec<AclEntry>, default_effect: Effect) -> Self {
        Self {
            entries,
            default_effect,
        }
    }

    /// Empty policy refusing everything
    pub fn deny_all() -> Self {
        Self::new(Vec::new(), Effect::Deny)
    }

    /// Empty policy admitting everything
    pub fn allow_all() -> Self {
        Self::new(Vec::new(), Effect::Allow)
    }
}

impl Default for Acl {
    fn default() -> Self {
        Self::deny_all()
    }
}
