/*!
 * Authenticators
 * Pluggable identity resolution for requests that arrive without one
 */

use super::context::RequestContext;
use crate::core::errors::KernelError;
use crate::policy::Identity;
use std::collections::HashMap;
use std::sync::Arc;

/// Context metadata key the API-key authenticator reads
pub const API_KEY_METADATA_KEY: &str = "api_key";

/// Resolves an identity from a request context.
///
/// Called by the kernel only when the context carries no identity already.
/// Failure to resolve yields [`KernelError::NoIdentity`].
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, ctx: &RequestContext) -> Result<Arc<Identity>, KernelError>;
}

/// Fixed token-to-identity table, for tests and simple deployments.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthenticator {
    users: HashMap<String, Arc<Identity>>,
}

impl StaticAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user whose token is their user id.
    pub fn add_user(
        &mut self,
        user_id: impl Into<String>,
        groups: &[&str],
        roles: &[&str],
    ) {
        let user_id = user_id.into();
        let mut identity = Identity::user(user_id.clone());
        identity.groups = groups.iter().map(|g| (*g).to_string()).collect();
        identity.roles = roles.iter().map(|r| (*r).to_string()).collect();
        self.users.insert(user_id, Arc::new(identity));
    }

    fn lookup(&self, token: &str) -> Result<Arc<Identity>, KernelError> {
        self.users
            .get(token)
            .cloned()
            .ok_or(KernelError::NoIdentity)
    }
}

impl Authenticator for StaticAuthenticator {
    fn authenticate(&self, ctx: &RequestContext) -> Result<Arc<Identity>, KernelError> {
        if let Some(identity) = ctx.identity() {
            return Ok(Arc::clone(identity));
        }
        match ctx.token() {
            Some(token) => self.lookup(token),
            None => Err(KernelError::NoIdentity),
        }
    }
}

/// Maps opaque API keys to identities.
///
/// The key is read from request metadata under [`API_KEY_METADATA_KEY`],
/// falling back to the context token.
#[derive(Debug, Clone, Default)]
pub struct ApiKeyAuthenticator {
    keys: HashMap<String, Arc<Identity>>,
}

impl ApiKeyAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_key(&mut self, api_key: impl Into<String>, identity: Identity) {
        self.keys.insert(api_key.into(), Arc::new(identity));
    }
}

impl Authenticator for ApiKeyAuthenticator {
    fn authenticate(&self, ctx: &RequestContext) -> Result<Arc<Identity>, KernelError> {
        let from_metadata = ctx
            .metadata()
            .get(API_KEY_METADATA_KEY)
            .and_then(|v| v.as_str());

        let key = from_metadata.or_else(|| ctx.token());
        key.and_then(|k| self.keys.get(k).cloned())
            .ok_or(KernelError::NoIdentity)
    }
}

/// Builds an identity from request metadata fields, the way a proxy passes
/// user headers through.
#[derive(Debug, Clone)]
pub struct HeaderAuthenticator {
    user_key: String,
    groups_key: String,
    roles_key: String,
    separator: String,
}

impl HeaderAuthenticator {
    pub fn new(
        user_key: impl Into<String>,
        groups_key: impl Into<String>,
        roles_key: impl Into<String>,
    ) -> Self {
        Self {
            user_key: user_key.into(),
            groups_key: groups_key.into(),
            roles_key: roles_key.into(),
            separator: ",".into(),
        }
    }

    #[must_use]
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    fn split(&self, value: Option<&str>) -> impl Iterator<Item = String> + '_ {
        value
            .unwrap_or("")
            .split(&self.separator)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>()
            .into_iter()
    }
}

impl Authenticator for HeaderAuthenticator {
    fn authenticate(&self, ctx: &RequestContext) -> Result<Arc<Identity>, KernelError> {
        let metadata = ctx.metadata();
        let user_id = metadata
            .get(&self.user_key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or(KernelError::NoIdentity)?;

        let mut identity = Identity::user(user_id);
        identity.groups = self
            .split(metadata.get(&self.groups_key).and_then(|v| v.as_str()))
            .collect();
        identity.roles = self
            .split(metadata.get(&self.roles_key).and_then(|v| v.as_str()))
            .collect();

        Ok(Arc::new(identity))
    }
}

/// Tries authenticators in order; the first success wins.
#[derive(Default)]
pub struct ChainAuthenticator {
    chain: Vec<Box<dyn Authenticator>>,
}

impl ChainAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn push(mut self, authenticator: impl Authenticator + 'static) -> Self {
        self.chain.push(Box::new(authenticator));
        self
    }
}

impl Authenticator for ChainAuthenticator {
    fn authenticate(&self, ctx: &RequestContext) -> Result<Arc<Identity>, KernelError> {
        for authenticator in &self.chain {
            if let Ok(identity) = authenticator.authenticate(ctx) {
                return Ok(identity);
            }
        }
        Err(KernelError::NoIdentity)
    }
}

/// Wraps a closure as an authenticator.
pub struct FuncAuthenticator<F>(pub F);

impl<F> Authenticator for FuncAuthenticator<F>
where
    F: Fn(&RequestContext) -> Result<Arc<Identity>, KernelError> + Send + Sync,
{
    fn authenticate(&self, ctx: &RequestContext) -> Result<Arc<Identity>, KernelError> {
        (self.0)(ctx)
    }
}
