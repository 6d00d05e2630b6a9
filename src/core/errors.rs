/*!
 * Kernel Error Surface
 * Structured, type-safe errors for the interception boundary
 */

use crate::pattern::PatternError;
use crate::policy::Operation;
use crate::vfs::VfsError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for kernel operations
///
/// # Must Use
/// Permission checks can fail and must be handled
#[must_use = "permission checks can fail and must be handled"]
pub type KernelResult<T> = Result<T, KernelError>;

/// A refused access, with enough context to report or alert on.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[error("permission denied: user {user_id} cannot perform {operation} on {path}: {reason}")]
pub struct PermissionError {
    /// Path that was refused
    pub path: String,
    /// Operation set that was required
    pub operation: Operation,
    /// User who was refused
    pub user_id: String,
    /// Why the check refused
    pub reason: String,
}

impl PermissionError {
    pub fn new(
        path: impl Into<String>,
        operation: Operation,
        user_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            operation,
            user_id: user_id.into(),
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by the permission kernel.
///
/// Backend errors pass through unchanged; authorization failures carry a
/// structured [`PermissionError`] testable via
/// [`KernelError::is_permission_denied`].
#[derive(Error, Debug)]
pub enum KernelError {
    /// The check ran and refused access
    #[error(transparent)]
    Denied(#[from] PermissionError),

    /// The request context carried no identity; nothing was evaluated
    #[error("no identity in request context")]
    NoIdentity,

    /// The caller cancelled before evaluation began
    #[error("request cancelled")]
    Cancelled,

    /// Kernel construction was given an unusable configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A path pattern failed to compile during evaluation
    #[error(transparent)]
    Pattern(#[from] PatternError),

    /// The wrapped filesystem failed; surfaced verbatim
    #[error(transparent)]
    Backend(#[from] VfsError),
}

impl KernelError {
    /// Stable predicate for authorization failures
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, KernelError::Denied(_))
    }

    /// The structured denial, if this is one
    pub fn as_denied(&self) -> Option<&PermissionError> {
        match self {
            KernelError::Denied(e) => Some(e),
            _ => None,
        }
    }
}
