/*!
 * Policy Core Types
 * Operations, effects, subjects, and caller identity
 */

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Filesystem operation set, stored as a bit-field.
///
/// A request carries the operations it requires; an ACL entry carries the
/// operations it grants. An entry applies to a request only when the granted
/// set fully covers the required set.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Operation(u32);

impl Operation {
    /// Open files for reading, list directories
    pub const READ: Operation = Operation(1 << 0);
    /// Create, modify, or append to files
    pub const WRITE: Operation = Operation(1 << 1);
    /// Execute files
    pub const EXECUTE: Operation = Operation(1 << 2);
    /// Remove files or directories
    pub const DELETE: Operation = Operation(1 << 3);
    /// Read or modify attributes, permissions, timestamps
    pub const METADATA: Operation = Operation(1 << 4);
    /// Full control including ownership changes
    pub const ADMIN: Operation = Operation(1 << 5);

    /// Every operation bit set
    pub const ALL: Operation = Operation(0b11_1111);
    /// Read and write
    pub const READ_WRITE: Operation = Operation(0b11);

    /// The empty set
    pub const fn empty() -> Self {
        Operation(0)
    }

    /// True if no bits are set
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// True if this set fully covers `other`
    pub const fn has(&self, other: Operation) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if this set shares at least one bit with `other`
    pub const fn intersects(&self, other: Operation) -> bool {
        self.0 & other.0 != 0
    }

    /// The six single-bit operations, in canonical order
    pub const BASIC: [Operation; 6] = [
        Operation::READ,
        Operation::WRITE,
        Operation::EXECUTE,
        Operation::DELETE,
        Operation::METADATA,
        Operation::ADMIN,
    ];

    fn name_of(bit: Operation) -> &'static str {
        match bit {
            Operation::READ => "Read",
            Operation::WRITE => "Write",
            Operation::EXECUTE => "Execute",
            Operation::DELETE => "Delete",
            Operation::METADATA => "Metadata",
            Operation::ADMIN => "Admin",
            _ => "Unknown",
        }
    }
}

impl BitOr for Operation {
    type Output = Operation;

    fn bitor(self, rhs: Operation) -> Operation {
        Operation(self.0 | rhs.0)
    }
}

impl BitOrAssign for Operation {
    fn bitor_assign(&mut self, rhs: Operation) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Operation::ALL {
            return f.write_str("All");
        }
        if self.is_empty() {
            return f.write_str("None");
        }
        let mut first = true;
        for bit in Operation::BASIC {
            if self.has(bit) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(Operation::name_of(bit))?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Whether a matching entry grants or refuses access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// Refuse access (dominates allow at equal priority)
    Deny,
    /// Grant access
    Allow,
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Allow => f.write_str("Allow"),
            Effect::Deny => f.write_str("Deny"),
        }
    }
}

/// Who an ACL entry applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "id")]
pub enum Subject {
    /// A specific user id
    User(String),
    /// All members of a group
    Group(String),
    /// All holders of a role
    Role(String),
    /// Every caller, unconditionally
    Everyone,
}

impl Subject {
    /// The id this subject names, if any
    pub fn id(&self) -> Option<&str> {
        match self {
            Subject::User(id) | Subject::Group(id) | Subject::Role(id) => Some(id),
            Subject::Everyone => None,
        }
    }

    /// True if the two subjects can match a common identity.
    ///
    /// `Everyone` overlaps with anything; otherwise the variants and ids must
    /// be equal. Used by conflict detection.
    pub fn overlaps(&self, other: &Subject) -> bool {
        matches!(self, Subject::Everyone) || matches!(other, Subject::Everyone) || self == other
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::User(id) => write!(f, "User:{id}"),
            Subject::Group(id) => write!(f, "Group:{id}"),
            Subject::Role(id) => write!(f, "Role:{id}"),
            Subject::Everyone => f.write_str("Everyone"),
        }
    }
}

/// A caller's resolved identity: user id plus group/role memberships.
///
/// Built once at the interception boundary and immutable for the life of one
/// call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Identity {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub groups: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub roles: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Identity {
    /// Identity with only a user id
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    /// Add a group membership
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.insert(group.into());
        self
    }

    /// Add a role
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    /// Attach an identity metadata entry
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn has_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// True if this identity matches the given subject
    pub fn matches(&self, subject: &Subject) -> bool {
        match subject {
            Subject::User(id) => self.user_id == *id,
            Subject::Group(id) => self.has_group(id),
            Subject::Role(id) => self.has_role(id),
            Subject::Everyone => true,
        }
    }
}
