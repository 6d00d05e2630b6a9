/*!
 * Request Context
 * Per-call identity, metadata, request id, and cancellation
 */

use crate::policy::Identity;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Cooperative cancellation flag shared between a caller and its requests.
///
/// Cancellation is observed once, at the interception boundary; a check that
/// already started runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Everything the kernel knows about one caller request.
///
/// Immutable once handed to a filesystem call; built with the `with_*`
/// methods beforehand.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    identity: Option<Arc<Identity>>,
    token: Option<String>,
    request_id: Option<String>,
    metadata: HashMap<String, serde_json::Value>,
    cancel: Option<CancelToken>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a fully resolved identity
    #[must_use]
    pub fn with_identity(mut self, identity: impl Into<Arc<Identity>>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Attach an identity carrying only a user id
    #[must_use]
    pub fn with_user(self, user_id: impl Into<String>) -> Self {
        self.with_identity(Identity::user(user_id))
    }

    /// Attach an opaque credential for an authenticator to resolve
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Attach a fresh v4 UUID as the request id
    #[must_use]
    pub fn with_generated_request_id(self) -> Self {
        let id = Uuid::new_v4().to_string();
        self.with_request_id(id)
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    #[must_use]
    pub fn insert_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn identity(&self) -> Option<&Arc<Identity>> {
        self.identity.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn metadata(&self) -> &HashMap<String, serde_json::Value> {
        &self.metadata
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder() {
        let ctx = RequestContext::new()
            .with_user("alice")
            .with_token("tok-123")
            .with_request_id("req-1")
            .insert_metadata("source_ip", json!("10.0.0.1"));

        assert_eq!(ctx.identity().unwrap().user_id, "alice");
        assert_eq!(ctx.token(), Some("tok-123"));
        assert_eq!(ctx.request_id(), Some("req-1"));
        assert_eq!(ctx.metadata()["source_ip"], json!("10.0.0.1"));
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn test_generated_request_id_is_unique() {
        let a = RequestContext::new().with_generated_request_id();
        let b = RequestContext::new().with_generated_request_id();
        assert_ne!(a.request_id(), b.request_id());
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        let ctx = RequestContext::new()
            .with_user("alice")
            .with_cancel_token(token.clone());

        assert!(!ctx.is_cancelled());
        token.cancel();
        assert!(ctx.is_cancelled());
        // Clones share the flag
        assert!(token.clone().is_cancelled());
    }
}
