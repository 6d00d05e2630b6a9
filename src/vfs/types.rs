/*!
 * Backend Filesystem Types
 * Structured types shared by every backend implementation
 */

use crate::core::serde::{is_default, is_false, serde_as, TimestampSeconds};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;
use thiserror::Error;

/// Backend operation result
///
/// # Must Use
/// Filesystem operations can fail and must be handled
#[must_use = "filesystem operations can fail and must be handled"]
pub type VfsResult<T> = Result<T, VfsError>;

/// Backend filesystem errors with structured, serializable variants.
///
/// The kernel never reclassifies these; they pass through the interception
/// layer verbatim once a check permits the call.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "error", content = "details")]
pub enum VfsError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("is a directory: {0}")]
    IsADirectory(String),

    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("not supported: {0}")]
    NotSupported(String),

    #[error("out of space")]
    OutOfSpace,

    #[error("read-only filesystem")]
    ReadOnly,
}

/// File type of a backend object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    File,
    Directory,
    Symlink,
    #[default]
    Unknown,
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileType::File => f.write_str("file"),
            FileType::Directory => f.write_str("directory"),
            FileType::Symlink => f.write_str("symlink"),
            FileType::Unknown => f.write_str("unknown"),
        }
    }
}

/// Unix-style permission bits
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileMode {
    pub mode: u32,
}

impl FileMode {
    /// Mode masked to the valid permission bits
    #[inline]
    #[must_use]
    pub const fn new(mode: u32) -> Self {
        Self { mode: mode & 0o7777 }
    }

    #[inline]
    #[must_use]
    pub const fn readonly() -> Self {
        Self { mode: 0o444 }
    }

    #[inline]
    #[must_use]
    pub const fn readwrite() -> Self {
        Self { mode: 0o644 }
    }

    #[inline]
    #[must_use]
    pub const fn is_readonly(&self) -> bool {
        self.mode & 0o200 == 0
    }
}

impl Default for FileMode {
    fn default() -> Self {
        Self::readwrite()
    }
}

/// Backend object metadata
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Metadata {
    pub file_type: FileType,
    #[serde(skip_serializing_if = "is_default", default)]
    pub size: u64,
    #[serde(skip_serializing_if = "is_default", default)]
    pub mode: FileMode,
    #[serde(skip_serializing_if = "is_default", default)]
    pub uid: u32,
    #[serde(skip_serializing_if = "is_default", default)]
    pub gid: u32,
    #[serde_as(as = "TimestampSeconds<i64>")]
    pub created: SystemTime,
    #[serde_as(as = "TimestampSeconds<i64>")]
    pub modified: SystemTime,
    #[serde_as(as = "TimestampSeconds<i64>")]
    pub accessed: SystemTime,
}

impl Metadata {
    #[inline]
    #[must_use]
    pub const fn is_dir(&self) -> bool {
        matches!(self.file_type, FileType::Directory)
    }

    #[inline]
    #[must_use]
    pub const fn is_file(&self) -> bool {
        matches!(self.file_type, FileType::File)
    }
}

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DirEntry {
    pub name: String,
    #[serde(skip_serializing_if = "is_default", default)]
    pub file_type: FileType,
}

impl DirEntry {
    /// Construct with name validation: non-empty, no separators, no NUL
    pub fn new(name: impl Into<String>, file_type: FileType) -> VfsResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(VfsError::InvalidPath("entry name cannot be empty".into()));
        }
        if name.contains('\0') || name.contains('/') || name.contains('\\') {
            return Err(VfsError::InvalidPath(format!(
                "entry name contains forbidden characters: {name}"
            )));
        }
        Ok(Self { name, file_type })
    }
}

/// File open flags. Only set flags appear in serialized form.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct OpenFlags {
    #[serde(skip_serializing_if = "is_false")]
    pub read: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub write: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub append: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub truncate: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub create: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub create_new: bool,
}

impl OpenFlags {
    #[inline]
    #[must_use]
    pub fn read_only() -> Self {
        Self {
            read: true,
            ..Default::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn write_only() -> Self {
        Self {
            write: true,
            ..Default::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn read_write() -> Self {
        Self {
            read: true,
            write: true,
            ..Default::default()
        }
    }

    /// Write + create
    #[inline]
    #[must_use]
    pub fn create() -> Self {
        Self {
            write: true,
            create: true,
            ..Default::default()
        }
    }

    /// Write + append
    #[inline]
    #[must_use]
    pub fn append_only() -> Self {
        Self {
            write: true,
            append: true,
            ..Default::default()
        }
    }

    /// Any form of write access requested
    #[inline]
    #[must_use]
    pub const fn is_writable(&self) -> bool {
        self.write || self.append || self.truncate || self.create || self.create_new
    }

    /// This open may create the file
    #[inline]
    #[must_use]
    pub const fn will_create(&self) -> bool {
        self.create || self.create_new
    }

    /// No read access requested
    #[inline]
    #[must_use]
    pub const fn is_write_only(&self) -> bool {
        !self.read && (self.write || self.append)
    }

    /// Reject contradictory flag combinations
    #[must_use = "validation result must be checked"]
    pub fn validate(&self) -> VfsResult<()> {
        if self.create_new && !self.write {
            return Err(VfsError::InvalidArgument(
                "create_new requires write flag".into(),
            ));
        }
        if self.truncate && !self.write {
            return Err(VfsError::InvalidArgument(
                "truncate requires write flag".into(),
            ));
        }
        if self.append && self.truncate {
            return Err(VfsError::InvalidArgument(
                "cannot use both append and truncate".into(),
            ));
        }
        Ok(())
    }
}
