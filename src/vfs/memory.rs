/*!
 * In-Memory Backend
 * Volatile filesystem for tests, examples, and ephemeral storage
 */

use ahash::RandomState;
use dashmap::DashMap;
use parking_lot::RwLock;
use path_clean::PathClean;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use super::traits::{FileSystem, OpenFile};
use super::types::{DirEntry, FileMode, FileType, Metadata, OpenFlags, VfsError, VfsResult};

#[derive(Debug, Clone)]
struct NodeMeta {
    mode: FileMode,
    uid: u32,
    gid: u32,
    created: SystemTime,
    modified: SystemTime,
    accessed: SystemTime,
}

impl NodeMeta {
    fn new(mode: FileMode) -> Self {
        let now = SystemTime::now();
        Self {
            mode,
            uid: 0,
            gid: 0,
            created: now,
            modified: now,
            accessed: now,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    File {
        data: Arc<RwLock<Vec<u8>>>,
        meta: NodeMeta,
    },
    Directory {
        meta: NodeMeta,
    },
}

impl Node {
    fn is_dir(&self) -> bool {
        matches!(self, Node::Directory { .. })
    }

    fn meta(&self) -> &NodeMeta {
        match self {
            Node::File { meta, .. } | Node::Directory { meta } => meta,
        }
    }

    fn meta_mut(&mut self) -> &mut NodeMeta {
        match self {
            Node::File { meta, .. } | Node::Directory { meta } => meta,
        }
    }

    fn metadata(&self) -> Metadata {
        let meta = self.meta();
        Metadata {
            file_type: if self.is_dir() {
                FileType::Directory
            } else {
                FileType::File
            },
            size: match self {
                Node::File { data, .. } => data.read().len() as u64,
                Node::Directory { .. } => 0,
            },
            mode: meta.mode,
            uid: meta.uid,
            gid: meta.gid,
            created: meta.created,
            modified: meta.modified,
            accessed: meta.accessed,
        }
    }
}

/// In-memory filesystem keyed by normalized absolute paths.
///
/// Directory structure is implicit in the key space; listings scan for
/// direct children. Suitable as a test and demo backend, not as a
/// high-fan-out production store.
#[derive(Clone, Default)]
pub struct MemFs {
    nodes: Arc<DashMap<PathBuf, Node, RandomState>>,
}

impl MemFs {
    pub fn new() -> Self {
        let nodes: DashMap<PathBuf, Node, RandomState> = DashMap::with_hasher(RandomState::new());
        nodes.insert(
            PathBuf::from("/"),
            Node::Directory {
                meta: NodeMeta::new(FileMode::new(0o755)),
            },
        );
        Self {
            nodes: Arc::new(nodes),
        }
    }

    fn normalize(&self, path: &Path) -> PathBuf {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            Path::new("/").join(path)
        };
        absolute.clean()
    }

    fn ensure_parent_dir(&self, path: &Path) -> VfsResult<()> {
        let Some(parent) = path.parent() else {
            return Ok(());
        };
        match self.nodes.get(parent) {
            Some(node) if node.is_dir() => Ok(()),
            Some(_) => Err(VfsError::NotADirectory(parent.display().to_string())),
            None => Err(VfsError::NotFound(parent.display().to_string())),
        }
    }

    fn children_of<'a>(&'a self, path: &'a Path) -> impl Iterator<Item = PathBuf> + 'a {
        self.nodes.iter().filter_map(move |entry| {
            let key = entry.key();
            (key.as_path() != path && key.parent() == Some(path)).then(|| key.clone())
        })
    }
}

impl FileSystem for MemFs {
    fn open_file(
        &self,
        path: &Path,
        flags: OpenFlags,
        mode: FileMode,
    ) -> VfsResult<Box<dyn OpenFile>> {
        flags.validate()?;
        let path = self.normalize(path);

        let data = match self.nodes.get_mut(&path) {
            Some(mut node) => match &mut *node {
                Node::Directory { .. } => {
                    return Err(VfsError::IsADirectory(path.display().to_string()))
                }
                Node::File { data, meta } => {
                    if flags.create_new {
                        return Err(VfsError::AlreadyExists(path.display().to_string()));
                    }
                    if flags.truncate {
                        data.write().clear();
                        meta.modified = SystemTime::now();
                    }
                    Arc::clone(data)
                }
            },
            None => {
                if !flags.will_create() {
                    return Err(VfsError::NotFound(path.display().to_string()));
                }
                self.ensure_parent_dir(&path)?;
                let data = Arc::new(RwLock::new(Vec::new()));
                self.nodes.insert(
                    path.clone(),
                    Node::File {
                        data: Arc::clone(&data),
                        meta: NodeMeta::new(mode),
                    },
                );
                data
            }
        };

        let position = if flags.append { data.read().len() as u64 } else { 0 };
        Ok(Box::new(MemFile {
            data,
            position,
            flags,
            mode,
        }))
    }

    fn mkdir(&self, path: &Path, mode: FileMode) -> VfsResult<()> {
        let path = self.normalize(path);
        if self.nodes.contains_key(&path) {
            return Err(VfsError::AlreadyExists(path.display().to_string()));
        }
        self.ensure_parent_dir(&path)?;
        self.nodes.insert(
            path,
            Node::Directory {
                meta: NodeMeta::new(mode),
            },
        );
        Ok(())
    }

    fn mkdir_all(&self, path: &Path, mode: FileMode) -> VfsResult<()> {
        let path = self.normalize(path);
        let mut ancestors: Vec<&Path> = path.ancestors().collect();
        ancestors.reverse();

        for ancestor in ancestors {
            match self.nodes.get(ancestor) {
                Some(node) if node.is_dir() => {}
                Some(_) => {
                    return Err(VfsError::NotADirectory(ancestor.display().to_string()))
                }
                None => {
                    self.nodes.insert(
                        ancestor.to_path_buf(),
                        Node::Directory {
                            meta: NodeMeta::new(mode),
                        },
                    );
                }
            }
        }
        Ok(())
    }

    fn remove(&self, path: &Path) -> VfsResult<()> {
        let path = self.normalize(path);
        let Some(node) = self.nodes.get(&path) else {
            return Err(VfsError::NotFound(path.display().to_string()));
        };

        if node.is_dir() && self.children_of(&path).next().is_some() {
            return Err(VfsError::DirectoryNotEmpty(path.display().to_string()));
        }
        drop(node);

        self.nodes.remove(&path);
        Ok(())
    }

    fn remove_all(&self, path: &Path) -> VfsResult<()> {
        let path = self.normalize(path);
        if !self.nodes.contains_key(&path) {
            return Err(VfsError::NotFound(path.display().to_string()));
        }

        let doomed: Vec<PathBuf> = self
            .nodes
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|key| key == &path || key.starts_with(&path))
            .collect();
        for key in doomed {
            self.nodes.remove(&key);
        }
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> VfsResult<()> {
        let from = self.normalize(from);
        let to = self.normalize(to);
        if from == to {
            return Ok(());
        }

        if !self.nodes.contains_key(&from) {
            return Err(VfsError::NotFound(from.display().to_string()));
        }
        if self.nodes.get(&to).is_some_and(|node| node.is_dir()) {
            return Err(VfsError::AlreadyExists(to.display().to_string()));
        }
        self.ensure_parent_dir(&to)?;

        let moved: Vec<PathBuf> = self
            .nodes
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|key| key == &from || key.starts_with(&from))
            .collect();

        for old_key in moved {
            if let Some((_, node)) = self.nodes.remove(&old_key) {
                let suffix = old_key.strip_prefix(&from).expect("prefix-filtered key");
                let new_key = if suffix.as_os_str().is_empty() {
                    to.clone()
                } else {
                    to.join(suffix)
                };
                self.nodes.insert(new_key, node);
            }
        }
        Ok(())
    }

    fn stat(&self, path: &Path) -> VfsResult<Metadata> {
        let path = self.normalize(path);
        self.nodes
            .get(&path)
            .map(|node| node.metadata())
            .ok_or_else(|| VfsError::NotFound(path.display().to_string()))
    }

    fn lstat(&self, path: &Path) -> VfsResult<Metadata> {
        // No symlinks in the memory backend
        self.stat(path)
    }

    fn read_dir(&self, path: &Path) -> VfsResult<Vec<DirEntry>> {
        let path = self.normalize(path);
        match self.nodes.get(&path) {
            Some(node) if node.is_dir() => {}
            Some(_) => return Err(VfsError::NotADirectory(path.display().to_string())),
            None => return Err(VfsError::NotFound(path.display().to_string())),
        }

        let mut entries: Vec<DirEntry> = self
            .children_of(&path)
            .filter_map(|child| {
                let name = child.file_name()?.to_str()?.to_string();
                let file_type = self.nodes.get(&child).map(|node| {
                    if node.is_dir() {
                        FileType::Directory
                    } else {
                        FileType::File
                    }
                })?;
                Some(DirEntry { name, file_type })
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn chmod(&self, path: &Path, mode: FileMode) -> VfsResult<()> {
        let path = self.normalize(path);
        let mut node = self
            .nodes
            .get_mut(&path)
            .ok_or_else(|| VfsError::NotFound(path.display().to_string()))?;
        node.meta_mut().mode = mode;
        Ok(())
    }

    fn chown(&self, path: &Path, uid: u32, gid: u32) -> VfsResult<()> {
        let path = self.normalize(path);
        let mut node = self
            .nodes
            .get_mut(&path)
            .ok_or_else(|| VfsError::NotFound(path.display().to_string()))?;
        let meta = node.meta_mut();
        meta.uid = uid;
        meta.gid = gid;
        Ok(())
    }

    fn chtimes(&self, path: &Path, accessed: SystemTime, modified: SystemTime) -> VfsResult<()> {
        let path = self.normalize(path);
        let mut node = self
            .nodes
            .get_mut(&path)
            .ok_or_else(|| VfsError::NotFound(path.display().to_string()))?;
        let meta = node.meta_mut();
        meta.accessed = accessed;
        meta.modified = modified;
        Ok(())
    }

    fn name(&self) -> &str {
        "memfs"
    }
}

/// Open handle into a [`MemFs`] file
#[derive(Debug)]
struct MemFile {
    data: Arc<RwLock<Vec<u8>>>,
    position: u64,
    flags: OpenFlags,
    mode: FileMode,
}

impl Read for MemFile {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.flags.is_write_only() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "file not opened for reading",
            ));
        }
        let data = self.data.read();
        let start = (self.position as usize).min(data.len());
        let count = buf.len().min(data.len() - start);
        buf[..count].copy_from_slice(&data[start..start + count]);
        self.position += count as u64;
        Ok(count)
    }
}

impl Write for MemFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if !self.flags.is_writable() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "file not opened for writing",
            ));
        }
        let mut data = self.data.write();
        if self.flags.append {
            self.position = data.len() as u64;
        }
        let start = self.position as usize;
        if start + buf.len() > data.len() {
            data.resize(start + buf.len(), 0);
        }
        data[start..start + buf.len()].copy_from_slice(buf);
        self.position += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Seek for MemFile {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let len = self.data.read().len() as i64;
        let target = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(offset) => len + offset,
            SeekFrom::Current(offset) => self.position as i64 + offset,
        };
        if target < 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "seek before start of file",
            ));
        }
        self.position = target as u64;
        Ok(self.position)
    }
}

impl OpenFile for MemFile {
    fn sync(&mut self) -> VfsResult<()> {
        Ok(())
    }

    fn metadata(&self) -> VfsResult<Metadata> {
        let now = SystemTime::now();
        Ok(Metadata {
            file_type: FileType::File,
            size: self.data.read().len() as u64,
            mode: self.mode,
            uid: 0,
            gid: 0,
            created: now,
            modified: now,
            accessed: now,
        })
    }

    fn set_len(&mut self, size: u64) -> VfsResult<()> {
        if !self.flags.is_writable() {
            return Err(VfsError::InvalidArgument(
                "file not opened for writing".into(),
            ));
        }
        self.data.write().resize(size as usize, 0);
        Ok(())
    }
}
