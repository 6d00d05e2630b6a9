/*!
 * Permission Evaluator
 * Selects applicable ACL entries and resolves them to a decision
 *
 * Conflict resolution: higher priority wins; within the winning priority
 * band an explicit deny dominates any allow. A lower-priority deny never
 * overrides a higher-priority allow.
 */

use crate::cache::{CacheKey, CacheStats, DecisionCache};
use crate::pattern::{PatternCache, PatternError};
use crate::policy::{Acl, AclEntry, Effect, EvaluationContext, Identity, Operation};
use log::{debug, trace};
use parking_lot::RwLock;
use std::fmt::Write as _;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;

/// Evaluation-time failures.
///
/// Policy-construction problems are caught by validation; these arise only
/// when rules bypassed validation or user conditions misbehave.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error(transparent)]
    Pattern(#[from] PatternError),

    /// A user-supplied condition panicked; the check must deny
    #[error("condition panic")]
    ConditionPanic,
}

/// Evaluates permissions against a shared ACL.
///
/// The ACL is guarded by a read-write lock; mutations clear the decision
/// cache while still holding the write guard, so a post-mutation read can
/// never observe a stale decision.
pub struct Evaluator {
    acl: RwLock<Acl>,
    cache: Option<Arc<DecisionCache>>,
    patterns: Arc<PatternCache>,
}

impl Evaluator {
    /// Evaluator without decision caching
    pub fn new(acl: Acl) -> Self {
        Self {
            acl: RwLock::new(acl),
            cache: None,
            patterns: Arc::new(PatternCache::new()),
        }
    }

    /// Evaluator with a decision cache and a shared pattern cache
    pub fn with_caches(
        acl: Acl,
        cache: Option<Arc<DecisionCache>>,
        patterns: Arc<PatternCache>,
    ) -> Self {
        Self {
            acl: RwLock::new(acl),
            cache,
            patterns,
        }
    }

    /// Decide whether the context's operation is allowed.
    pub fn evaluate(&self, ctx: &EvaluationContext) -> Result<bool, EvalError> {
        if let Some(cache) = &self.cache {
            let key = CacheKey::new(
                ctx.identity.user_id.clone(),
                ctx.path.clone(),
                ctx.operation,
            );
            if let Some(allowed) = cache.get(&key) {
                trace!("decision cache hit for {}:{}", key.user_id, key.path);
                return Ok(allowed);
            }

            let allowed = self.evaluate_uncached(ctx)?;
            cache.set(key, allowed);
            return Ok(allowed);
        }

        self.evaluate_uncached(ctx)
    }

    fn evaluate_uncached(&self, ctx: &EvaluationContext) -> Result<bool, EvalError> {
        let acl = self.acl.read();

        let mut matching: Vec<&AclEntry> = Vec::new();
        for entry in &acl.entries {
            if self.entry_matches(entry, ctx)? && entry.applies(ctx.operation) {
                matching.push(entry);
            }
        }

        if matching.is_empty() {
            trace!(
                "no entries match {} {} on {}; default {}",
                ctx.identity.user_id,
                ctx.operation,
                ctx.path,
                acl.default_effect
            );
            return Ok(acl.default_effect == Effect::Allow);
        }

        // Stable sort keeps insertion order as the tie-breaker inside a band
        matching.sort_by(|a, b| b.priority.cmp(&a.priority));
        let top_priority = matching[0].priority;
        let top_band = matching.iter().take_while(|e| e.priority == top_priority);

        // Deny dominates allow within the winning band
        for entry in top_band.clone() {
            if entry.effect == Effect::Deny {
                debug!("deny {} {} on {}: {}", ctx.identity.user_id, ctx.operation, ctx.path, entry);
                return Ok(false);
            }
        }
        for entry in top_band {
            if entry.effect == Effect::Allow {
                return Ok(true);
            }
        }

        // Unreachable while Effect has two variants; kept so the decision is
        // total if a band ever carries neither
        for entry in &matching {
            match entry.effect {
                Effect::Deny => return Ok(false),
                Effect::Allow => return Ok(true),
            }
        }
        Ok(false)
    }

    /// Entry match with user-condition panic containment.
    fn entry_matches(
        &self,
        entry: &AclEntry,
        ctx: &EvaluationContext,
    ) -> Result<bool, EvalError> {
        match catch_unwind(AssertUnwindSafe(|| entry.matches(ctx, &self.patterns))) {
            Ok(result) => Ok(result?),
            Err(_) => Err(EvalError::ConditionPanic),
        }
    }

    /// All entries whose subject, pattern, and conditions match the context,
    /// regardless of the operation they grant.
    pub fn matching_entries(
        &self,
        ctx: &EvaluationContext,
    ) -> Result<Vec<AclEntry>, EvalError> {
        let acl = self.acl.read();
        let mut matching = Vec::new();
        for entry in &acl.entries {
            if self.entry_matches(entry, ctx)? {
                matching.push(entry.clone());
            }
        }
        Ok(matching)
    }

    /// Entries whose pattern matches the path, regardless of subject.
    pub fn entries_for_path(&self, path: &str) -> Result<Vec<AclEntry>, PatternError> {
        let acl = self.acl.read();
        let mut effective = Vec::new();
        for entry in &acl.entries {
            if self.patterns.get_or_compile(&entry.path_pattern)?.matches(path) {
                effective.push(entry.clone());
            }
        }
        Ok(effective)
    }

    /// OR of the basic operations the identity may perform on the path.
    /// Evaluation failures count as not-allowed for that bit.
    pub fn effective_permissions(&self, identity: &Arc<Identity>, path: &str) -> Operation {
        let mut granted = Operation::empty();
        for op in Operation::BASIC {
            let ctx = EvaluationContext::new(Arc::clone(identity), path, op);
            if self.evaluate(&ctx).unwrap_or(false) {
                granted |= op;
            }
        }
        granted
    }

    /// Append a rule and clear the decision cache atomically.
    pub fn add_rule(&self, entry: AclEntry) {
        let mut acl = self.acl.write();
        debug!("policy mutation: add rule {entry}");
        acl.entries.push(entry);
        self.invalidate_for_mutation();
    }

    /// Remove all rules equal to `entry` on (subject, pattern, permissions,
    /// effect) and clear the decision cache atomically. A second identical
    /// call is a no-op but still clears the cache.
    pub fn remove_rule(&self, entry: &AclEntry) {
        let mut acl = self.acl.write();
        debug!("policy mutation: remove rule {entry}");
        acl.entries.retain(|existing| !existing.same_rule(entry));
        self.invalidate_for_mutation();
    }

    /// Replace the whole policy, clearing the decision cache atomically.
    pub fn replace_acl(&self, new_acl: Acl) {
        let mut acl = self.acl.write();
        *acl = new_acl;
        self.invalidate_for_mutation();
    }

    // Called with the ACL write guard held: readers blocked on the guard are
    // guaranteed to see the cleared cache.
    fn invalidate_for_mutation(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    /// Clone of the current policy
    pub fn snapshot(&self) -> Acl {
        self.acl.read().clone()
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    pub fn invalidate_cache(&self, user_id: Option<&str>, path_prefix: Option<&str>) {
        if let Some(cache) = &self.cache {
            cache.invalidate(user_id, path_prefix);
        }
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|cache| cache.stats())
    }

    /// Toggle the decision cache at runtime. While disabled, lookups miss
    /// and stores are dropped; stored decisions from before stay until they
    /// expire or are invalidated.
    pub fn set_cache_enabled(&self, enabled: bool) {
        if let Some(cache) = &self.cache {
            if enabled {
                cache.enable();
            } else {
                cache.disable();
            }
        }
    }

    pub fn patterns(&self) -> &Arc<PatternCache> {
        &self.patterns
    }
}

/// Outcome of a simulated permission check, for explanation tooling.
#[derive(Debug, Clone)]
pub struct PermissionTestResult {
    pub allowed: bool,
    pub matching_entries: Vec<AclEntry>,
    pub path: String,
    pub operation: Operation,
    pub identity: Arc<Identity>,
}

impl PermissionTestResult {
    /// Human-readable report of the decision and every rule that matched.
    pub fn explain(&self) -> String {
        let mut out = String::new();
        let verdict = if self.allowed { "ALLOWED" } else { "DENIED" };
        let _ = writeln!(
            out,
            "Permission test: {} attempting {} on {}",
            self.identity.user_id, self.operation, self.path
        );
        let _ = writeln!(out, "Result: {verdict}");
        let _ = writeln!(out);

        if self.matching_entries.is_empty() {
            let _ = writeln!(out, "No matching rules (default policy applied)");
        } else {
            let _ = writeln!(out, "Matching rules ({}):", self.matching_entries.len());
            for (index, entry) in self.matching_entries.iter().enumerate() {
                let _ = writeln!(out, "{}. {entry}", index + 1);
            }
        }

        out
    }
}
