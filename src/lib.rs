//! wardenfs
//! Permission-enforcement kernel for abstract filesystems
//!
//! Interposes a configurable access-control policy between an application and
//! a backend filesystem: every call is mapped to a required permission set,
//! evaluated against an ACL with priority-based conflict resolution, cached,
//! audited, and only then delegated.
//!
//! ## Usage
//! ```
//! use std::path::Path;
//! use std::sync::Arc;
//! use wardenfs::kernel::{Config, RequestContext, WardenFs};
//! use wardenfs::policy::{Acl, AclEntry, Effect, Operation, Subject};
//! use wardenfs::vfs::MemFs;
//!
//! let acl = Acl::new(
//!     vec![AclEntry::new(
//!         Subject::User("alice".into()),
//!         "/home/alice/**",
//!         Operation::READ_WRITE,
//!         Effect::Allow,
//!     )
//!     .with_priority(100)],
//!     Effect::Deny,
//! );
//!
//! let fs = WardenFs::new(Arc::new(MemFs::new()), Config::new(acl)).unwrap();
//! let ctx = RequestContext::new().with_user("alice");
//!
//! assert!(fs.read_dir(&ctx, Path::new("/etc")).is_err());
//! fs.close();
//! ```

pub mod audit;
pub mod cache;
pub mod core;
pub mod evaluator;
pub mod kernel;
pub mod pattern;
pub mod policy;
pub mod vfs;

pub use self::core::errors::{KernelError, KernelResult, PermissionError};
pub use kernel::{Config, RequestContext, WardenFs};
pub use policy::{Acl, AclEntry, Effect, Identity, Operation, Subject};
