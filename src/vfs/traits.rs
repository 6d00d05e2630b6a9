/*!
 * Backend Filesystem Traits
 * The abstraction the permission kernel wraps
 */

use std::io::{Read, Seek, Write};
use std::path::Path;
use std::time::SystemTime;

use super::types::{DirEntry, FileMode, Metadata, OpenFlags, VfsResult};

/// The wrapped filesystem.
///
/// The kernel invokes these methods only after a permission check permits
/// the call; implementations never see refused requests. Operations should
/// be atomic where possible and return structured errors on failure.
pub trait FileSystem: Send + Sync {
    /// Open a file with the given flags and creation mode
    fn open_file(
        &self,
        path: &Path,
        flags: OpenFlags,
        mode: FileMode,
    ) -> VfsResult<Box<dyn OpenFile>>;

    /// Create a directory; the parent must exist
    fn mkdir(&self, path: &Path, mode: FileMode) -> VfsResult<()>;

    /// Create a directory and all missing parents
    fn mkdir_all(&self, path: &Path, mode: FileMode) -> VfsResult<()>;

    /// Remove a file or empty directory
    fn remove(&self, path: &Path) -> VfsResult<()>;

    /// Remove a path and any children it contains
    fn remove_all(&self, path: &Path) -> VfsResult<()>;

    /// Rename (move) a file or directory
    fn rename(&self, from: &Path, to: &Path) -> VfsResult<()>;

    /// Object metadata, following symlinks
    fn stat(&self, path: &Path) -> VfsResult<Metadata>;

    /// Object metadata, without following symlinks
    fn lstat(&self, path: &Path) -> VfsResult<Metadata>;

    /// List directory contents
    fn read_dir(&self, path: &Path) -> VfsResult<Vec<DirEntry>>;

    /// Change permission bits
    fn chmod(&self, path: &Path, mode: FileMode) -> VfsResult<()>;

    /// Change ownership
    fn chown(&self, path: &Path, uid: u32, gid: u32) -> VfsResult<()>;

    /// Change access and modification times
    fn chtimes(&self, path: &Path, accessed: SystemTime, modified: SystemTime) -> VfsResult<()>;

    /// Backend name, for diagnostics
    fn name(&self) -> &str;

    /// Whole-backend write protection
    fn readonly(&self) -> bool {
        false
    }
}

/// An open file handle. Closed when dropped.
pub trait OpenFile: Read + Write + Seek + Send + std::fmt::Debug {
    /// Flush file contents to storage
    fn sync(&mut self) -> VfsResult<()>;

    /// Metadata of the open file
    fn metadata(&self) -> VfsResult<Metadata>;

    /// Truncate or extend to the given size
    fn set_len(&mut self, size: u64) -> VfsResult<()>;
}
