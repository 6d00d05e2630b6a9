/*!
 * Permission Kernel Façade
 * Intercepts filesystem calls: resolve identity, map to a required
 * permission set, consult the cache, evaluate, audit, then delegate
 */

use super::auth::Authenticator;
use super::config::Config;
use super::context::RequestContext;
use super::mapper::FsCall;
use crate::audit::{AuditEvent, AuditLogger, AuditMetrics, AuditOutcome, AuditStats};
use crate::cache::{CacheStats, DecisionCache};
use crate::core::errors::{KernelError, KernelResult, PermissionError};
use crate::evaluator::{EvalError, Evaluator, PermissionTestResult};
use crate::pattern::{clean_path, PatternCache};
use crate::policy::{
    validate_acl, Acl, AclEntry, EvaluationContext, Identity, Operation, SOURCE_IP_KEY,
};
use crate::vfs::{DirEntry, FileMode, FileSystem, Metadata, OpenFile, OpenFlags};
use log::{debug, info};
use std::path::Path;
use std::sync::Arc;
use std::time::{Instant, SystemTime};

/// The permission-enforcement kernel.
///
/// Wraps a backend [`FileSystem`] and refuses any call the configured policy
/// does not permit. Construction validates the policy; per-call work is
/// identity resolution, one (possibly cached) evaluation, and one audit
/// event.
pub struct WardenFs {
    backend: Arc<dyn FileSystem>,
    evaluator: Arc<Evaluator>,
    audit: Arc<AuditLogger>,
    authenticator: Option<Arc<dyn Authenticator>>,
}

impl WardenFs {
    /// Build a kernel over `backend`. Fails with
    /// [`KernelError::InvalidConfig`] when the policy does not validate, so
    /// pattern problems never surface during a hot check.
    pub fn new(backend: Arc<dyn FileSystem>, config: Config) -> KernelResult<Self> {
        let report = validate_acl(&config.acl);
        if !report.is_valid() {
            let summary = report
                .errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(KernelError::InvalidConfig(summary));
        }

        let decision_cache = if config.performance.cache_enabled {
            Some(Arc::new(DecisionCache::new(
                config.performance.effective_max_size(),
                config.performance.effective_ttl(),
            )))
        } else {
            None
        };

        let patterns = Arc::new(PatternCache::new());
        patterns.set_enabled(config.performance.pattern_cache_enabled);

        info!(
            "permission kernel over {} backend: {} rules, default {}, cache {}",
            backend.name(),
            config.acl.entries.len(),
            config.acl.default_effect,
            if decision_cache.is_some() { "on" } else { "off" }
        );

        Ok(Self {
            backend,
            evaluator: Arc::new(Evaluator::with_caches(
                config.acl,
                decision_cache,
                patterns,
            )),
            audit: Arc::new(AuditLogger::new(config.audit)),
            authenticator: None,
        })
    }

    /// Resolve identities through `authenticator` when a request context
    /// carries none of its own.
    #[must_use]
    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    // ------------------------------------------------------------------
    // Intercepted filesystem surface
    // ------------------------------------------------------------------

    pub fn open_file(
        &self,
        ctx: &RequestContext,
        path: &Path,
        flags: OpenFlags,
        mode: FileMode,
    ) -> KernelResult<Box<dyn OpenFile>> {
        self.check(ctx, path, FsCall::OpenFile(flags).required())?;
        Ok(self.backend.open_file(path, flags, mode)?)
    }

    pub fn mkdir(&self, ctx: &RequestContext, path: &Path, mode: FileMode) -> KernelResult<()> {
        self.check(ctx, path, FsCall::Mkdir.required())?;
        Ok(self.backend.mkdir(path, mode)?)
    }

    pub fn mkdir_all(&self, ctx: &RequestContext, path: &Path, mode: FileMode) -> KernelResult<()> {
        self.check(ctx, path, FsCall::MkdirAll.required())?;
        Ok(self.backend.mkdir_all(path, mode)?)
    }

    pub fn remove(&self, ctx: &RequestContext, path: &Path) -> KernelResult<()> {
        self.check(ctx, path, FsCall::Remove.required())?;
        Ok(self.backend.remove(path)?)
    }

    pub fn remove_all(&self, ctx: &RequestContext, path: &Path) -> KernelResult<()> {
        self.check(ctx, path, FsCall::RemoveAll.required())?;
        Ok(self.backend.remove_all(path)?)
    }

    /// Two independent checks with two audit events: delete on the source,
    /// write on the destination. A denied source skips the second check.
    pub fn rename(&self, ctx: &RequestContext, from: &Path, to: &Path) -> KernelResult<()> {
        self.check(ctx, from, FsCall::RenameSource.required())?;
        self.check(ctx, to, FsCall::RenameTarget.required())?;
        Ok(self.backend.rename(from, to)?)
    }

    pub fn stat(&self, ctx: &RequestContext, path: &Path) -> KernelResult<Metadata> {
        self.check(ctx, path, FsCall::Stat.required())?;
        Ok(self.backend.stat(path)?)
    }

    pub fn lstat(&self, ctx: &RequestContext, path: &Path) -> KernelResult<Metadata> {
        self.check(ctx, path, FsCall::Lstat.required())?;
        Ok(self.backend.lstat(path)?)
    }

    pub fn read_dir(&self, ctx: &RequestContext, path: &Path) -> KernelResult<Vec<DirEntry>> {
        self.check(ctx, path, FsCall::ReadDir.required())?;
        Ok(self.backend.read_dir(path)?)
    }

    pub fn chmod(&self, ctx: &RequestContext, path: &Path, mode: FileMode) -> KernelResult<()> {
        self.check(ctx, path, FsCall::Chmod.required())?;
        Ok(self.backend.chmod(path, mode)?)
    }

    pub fn chown(&self, ctx: &RequestContext, path: &Path, uid: u32, gid: u32) -> KernelResult<()> {
        self.check(ctx, path, FsCall::Chown.required())?;
        Ok(self.backend.chown(path, uid, gid)?)
    }

    pub fn chtimes(
        &self,
        ctx: &RequestContext,
        path: &Path,
        accessed: SystemTime,
        modified: SystemTime,
    ) -> KernelResult<()> {
        self.check(ctx, path, FsCall::Chtimes.required())?;
        Ok(self.backend.chtimes(path, accessed, modified)?)
    }

    // ------------------------------------------------------------------
    // Policy maintenance
    // ------------------------------------------------------------------

    /// Append a rule. The decision cache is invalidated atomically with the
    /// mutation.
    pub fn add_rule(&self, entry: AclEntry) {
        self.evaluator.add_rule(entry);
    }

    /// Remove all rules matching on (subject, pattern, permissions, effect).
    /// Idempotent; always invalidates the decision cache.
    pub fn remove_rule(&self, entry: &AclEntry) {
        self.evaluator.remove_rule(entry);
    }

    /// Replace the entire policy after validating it.
    pub fn replace_policy(&self, acl: Acl) -> KernelResult<()> {
        let report = validate_acl(&acl);
        if !report.is_valid() {
            let summary = report
                .errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(KernelError::InvalidConfig(summary));
        }
        self.evaluator.replace_acl(acl);
        Ok(())
    }

    /// Clone of the current policy, for export or inspection
    pub fn policy_snapshot(&self) -> Acl {
        self.evaluator.snapshot()
    }

    /// OR of the basic operations granted to the context's identity on
    /// `path`.
    pub fn get_permissions(&self, ctx: &RequestContext, path: &Path) -> KernelResult<Operation> {
        let identity = self.resolve_identity(ctx)?;
        let canonical = canonicalize(path);
        Ok(self.evaluator.effective_permissions(&identity, &canonical))
    }

    /// Every rule whose pattern matches `path`, regardless of subject.
    pub fn get_effective_rules(&self, path: &Path) -> KernelResult<Vec<AclEntry>> {
        let canonical = canonicalize(path);
        Ok(self.evaluator.entries_for_path(&canonical)?)
    }

    /// Simulate a check without touching the backend or emitting audit
    /// events; the result lists every matching rule for explanation.
    pub fn test_permission(
        &self,
        identity: &Arc<Identity>,
        path: &Path,
        operation: Operation,
    ) -> (bool, PermissionTestResult) {
        let canonical = canonicalize(path);
        let eval_ctx =
            EvaluationContext::new(Arc::clone(identity), canonical.clone(), operation);

        let allowed = self.evaluator.evaluate(&eval_ctx).unwrap_or(false);
        let matching_entries = self
            .evaluator
            .matching_entries(&eval_ctx)
            .unwrap_or_default()
            .into_iter()
            .filter(|entry| entry.applies(operation))
            .collect();

        let result = PermissionTestResult {
            allowed,
            matching_entries,
            path: canonical,
            operation,
            identity: Arc::clone(identity),
        };
        (allowed, result)
    }

    // ------------------------------------------------------------------
    // Cache and audit surface
    // ------------------------------------------------------------------

    pub fn clear_cache(&self) {
        self.evaluator.clear_cache();
    }

    pub fn invalidate_cache(&self, user_id: Option<&str>, path_prefix: Option<&str>) {
        self.evaluator.invalidate_cache(user_id, path_prefix);
    }

    pub fn get_cache_stats(&self) -> Option<CacheStats> {
        self.evaluator.cache_stats()
    }

    /// Toggle decision caching at runtime; a no-op when the kernel was
    /// built without a cache.
    pub fn set_cache_enabled(&self, enabled: bool) {
        self.evaluator.set_cache_enabled(enabled);
    }

    pub fn get_audit_stats(&self) -> AuditStats {
        self.audit.stats()
    }

    pub fn get_audit_metrics(&self) -> Arc<AuditMetrics> {
        Arc::clone(self.audit.metrics())
    }

    /// Stop the audit worker, drain its queue, and flush the sink.
    /// Idempotent.
    pub fn close(&self) {
        self.audit.close();
    }

    /// The wrapped backend, for callers that need out-of-band access
    pub fn backend(&self) -> &Arc<dyn FileSystem> {
        &self.backend
    }

    // ------------------------------------------------------------------
    // Interception core
    // ------------------------------------------------------------------

    fn resolve_identity(&self, ctx: &RequestContext) -> KernelResult<Arc<Identity>> {
        if let Some(identity) = ctx.identity() {
            if identity.user_id.is_empty() {
                return Err(KernelError::NoIdentity);
            }
            return Ok(Arc::clone(identity));
        }

        match &self.authenticator {
            Some(authenticator) => {
                let identity = authenticator.authenticate(ctx)?;
                if identity.user_id.is_empty() {
                    return Err(KernelError::NoIdentity);
                }
                Ok(identity)
            }
            None => Err(KernelError::NoIdentity),
        }
    }

    /// One permission check: cancellation gate, identity, evaluation, audit.
    ///
    /// `NoIdentity` and cancellation short-circuit before evaluation and are
    /// not audited. Evaluation failures audit as `Error` and still refuse
    /// the call.
    fn check(&self, ctx: &RequestContext, path: &Path, required: Operation) -> KernelResult<()> {
        let started = Instant::now();

        if ctx.is_cancelled() {
            return Err(KernelError::Cancelled);
        }
        let identity = self.resolve_identity(ctx)?;

        let canonical = canonicalize(path);
        let eval_ctx = EvaluationContext::new(
            Arc::clone(&identity),
            canonical.clone(),
            required,
        )
        .with_metadata(ctx.metadata().clone());

        let outcome = self.evaluator.evaluate(&eval_ctx);
        let duration = started.elapsed();

        let (result, reason) = match &outcome {
            Ok(true) => (AuditOutcome::Allowed, None),
            Ok(false) => (AuditOutcome::Denied, Some("access denied by policy")),
            Err(EvalError::ConditionPanic) => (AuditOutcome::Error, Some("condition panic")),
            Err(EvalError::Pattern(_)) => (AuditOutcome::Error, Some("invalid pattern")),
        };

        let mut event = AuditEvent::new(
            identity.user_id.clone(),
            required.to_string(),
            canonical.clone(),
            result,
        )
        .with_duration(duration);
        event.request_id = ctx.request_id().map(str::to_string);
        event.groups = identity.groups.iter().cloned().collect();
        event.roles = identity.roles.iter().cloned().collect();
        event.reason = reason.map(str::to_string);
        event.metadata = ctx.metadata().clone();
        event.source_ip = ctx
            .metadata()
            .get(SOURCE_IP_KEY)
            .and_then(|v| v.as_str())
            .map(str::to_string);
        self.audit.log(event);

        match outcome {
            Ok(true) => Ok(()),
            Ok(false) => {
                debug!(
                    "denied: {} {} on {}",
                    identity.user_id, required, canonical
                );
                Err(PermissionError::new(
                    canonical,
                    required,
                    identity.user_id.clone(),
                    "access denied by policy",
                )
                .into())
            }
            Err(EvalError::ConditionPanic) => Err(PermissionError::new(
                canonical,
                required,
                identity.user_id.clone(),
                "condition panic",
            )
            .into()),
            Err(EvalError::Pattern(err)) => Err(err.into()),
        }
    }
}

impl std::fmt::Debug for WardenFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WardenFs")
            .field("backend", &self.backend.name())
            .field("has_authenticator", &self.authenticator.is_some())
            .finish_non_exhaustive()
    }
}

fn canonicalize(path: &Path) -> String {
    clean_path(&path.to_string_lossy())
}
