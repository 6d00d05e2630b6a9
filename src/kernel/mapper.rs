/*!
 * Operation Mapper
 * Translates filesystem calls and their flags into required permission sets
 *
 * Opens produce a single combined required set (e.g. Read|Write); an ACL
 * entry applies only when it grants the whole set, which preserves
 * deny-dominance at the operation-set level.
 */

use crate::policy::Operation;
use crate::vfs::OpenFlags;

/// A filesystem call as seen by the interception layer.
///
/// Rename is two independent checks and therefore two values here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsCall {
    OpenFile(OpenFlags),
    Mkdir,
    MkdirAll,
    Remove,
    RemoveAll,
    /// Rename, checked against the source path
    RenameSource,
    /// Rename, checked against the destination path
    RenameTarget,
    Stat,
    Lstat,
    ReadDir,
    Chmod,
    Chown,
    Chtimes,
}

impl FsCall {
    /// The permission set this call requires.
    pub fn required(self) -> Operation {
        match self {
            FsCall::OpenFile(flags) => open_required(flags),
            FsCall::Mkdir | FsCall::MkdirAll | FsCall::RenameTarget => Operation::WRITE,
            FsCall::Remove | FsCall::RemoveAll | FsCall::RenameSource => Operation::DELETE,
            FsCall::Stat | FsCall::Lstat | FsCall::Chmod | FsCall::Chtimes => Operation::METADATA,
            FsCall::ReadDir => Operation::READ,
            FsCall::Chown => Operation::ADMIN,
        }
    }
}

/// Read unless the open is write-only; write for any mutating flag.
fn open_required(flags: OpenFlags) -> Operation {
    let mut required = Operation::empty();
    if flags.is_writable() {
        required |= Operation::WRITE;
    }
    if !flags.is_write_only() {
        required |= Operation::READ;
    }
    required
}
