/*!
 * VFS Module
 * Backend filesystem abstraction and the in-memory reference backend
 */

pub mod memory;
pub mod traits;
pub mod types;

pub use memory::MemFs;
pub use traits::{FileSystem, OpenFile};
pub use types::{DirEntry, FileMode, FileType, Metadata, OpenFlags, VfsError, VfsResult};
