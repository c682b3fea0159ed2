//! Path-based filesystem operations over the node tree
//!
//! Each operation resolves its path first; structural operations resolve
//! the parent directory and hand the leaf name to it.

use crate::error::{FsError, FsResult};
use crate::vfs::{Node, NodeAttr, NodeType, links, resolve};
use log::debug;
use std::sync::Arc;

pub struct Dispatcher {
    root: Arc<Node>,
    mount_point: Option<String>,
}

/// Split an absolute path into its parent directory and leaf name.
/// The root has no leaf and yields `None`.
pub fn split_path(path: &str) -> FsResult<Option<(String, String)>> {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return if path.starts_with('/') {
            Ok(None)
        } else {
            Err(FsError::NotFound)
        };
    }
    let Some(pos) = trimmed.rfind('/') else {
        return Err(FsError::NotFound);
    };
    let parent = if pos == 0 { "/" } else { &trimmed[..pos] };
    Ok(Some((parent.to_string(), trimmed[pos + 1..].to_string())))
}

impl Dispatcher {
    pub fn new(root: Arc<Node>) -> Self {
        Self {
            root,
            mount_point: None,
        }
    }

    /// Absolute link targets under this directory are taken relative to the
    /// tree root.
    pub fn with_mount_point(mut self, mount_point: impl Into<String>) -> Self {
        let mount_point = mount_point.into();
        self.mount_point = Some(mount_point.trim_end_matches('/').to_string());
        self
    }

    pub fn root(&self) -> &Arc<Node> {
        &self.root
    }

    pub fn resolve(&self, path: &str, follow: bool) -> FsResult<Arc<Node>> {
        resolve(&self.root, path, follow)
    }

    fn parent_dir(&self, parent: &str) -> FsResult<Arc<Node>> {
        let dir = self.resolve(parent, true)?;
        if !dir.is_dir() {
            return Err(FsError::NotADirectory);
        }
        Ok(dir)
    }

    /// Resolve the parent of a path that must not exist yet.
    fn creation_target(&self, path: &str) -> FsResult<(Arc<Node>, String)> {
        if self.resolve(path, false).is_ok() {
            return Err(FsError::AlreadyExists);
        }
        let (parent, name) = split_path(path)?.ok_or(FsError::AlreadyExists)?;
        Ok((self.parent_dir(&parent)?, name))
    }

    fn file(&self, path: &str) -> FsResult<Arc<Node>> {
        let node = self.resolve(path, true)?;
        if node.is_dir() {
            return Err(FsError::IsADirectory);
        }
        Ok(node)
    }

    pub fn getattr(&self, path: &str) -> FsResult<NodeAttr> {
        debug!("getattr {}", path);
        let node = self.resolve(path, false)?;
        node.refresh_attr()?;
        Ok(node.attr())
    }

    pub fn readdir(&self, path: &str) -> FsResult<Vec<(String, NodeType)>> {
        debug!("readdir {}", path);
        let node = self.resolve(path, true)?;
        if !node.is_dir() {
            return Err(FsError::NotADirectory);
        }
        let mut entries: Vec<(String, NodeType)> = node
            .entries()?
            .iter()
            .map(|child| (child.name().to_string(), child.attr().kind))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }

    pub fn open(&self, path: &str) -> FsResult<()> {
        debug!("open {}", path);
        self.file(path)?.open()
    }

    pub fn read(&self, path: &str, offset: u64, size: usize) -> FsResult<Vec<u8>> {
        debug!("read {} offset={} size={}", path, offset, size);
        self.file(path)?.read(offset, size)
    }

    pub fn write(&self, path: &str, offset: u64, data: &[u8]) -> FsResult<usize> {
        debug!("write {} offset={} len={}", path, offset, data.len());
        self.file(path)?.write(offset, data)
    }

    pub fn release(&self, path: &str) -> FsResult<()> {
        debug!("release {}", path);
        self.file(path)?.release()
    }

    pub fn truncate(&self, path: &str, size: u64) -> FsResult<()> {
        debug!("truncate {} size={}", path, size);
        self.file(path)?.truncate(size)
    }

    pub fn create(&self, path: &str) -> FsResult<()> {
        debug!("create {}", path);
        let (dir, name) = self.creation_target(path)?;
        dir.create(&name)
    }

    pub fn mkdir(&self, path: &str) -> FsResult<()> {
        debug!("mkdir {}", path);
        let (dir, name) = self.creation_target(path)?;
        dir.mkdir(&name)
    }

    pub fn symlink(&self, target: &str, path: &str) -> FsResult<()> {
        debug!("symlink {} -> {}", path, target);
        let (dir, name) = self.creation_target(path)?;
        dir.symlink(&name, self.tree_target(target))
    }

    pub fn readlink(&self, path: &str) -> FsResult<String> {
        debug!("readlink {}", path);
        let node = self.resolve(path, false)?;
        if !node.is_link() {
            return Err(FsError::InvalidArgument);
        }
        links::readlink(&node)
    }

    pub fn unlink(&self, path: &str) -> FsResult<()> {
        debug!("unlink {}", path);
        match split_path(path)? {
            Some((parent, name)) => self.parent_dir(&parent)?.unlink(&name),
            None => self.root.remove(),
        }
    }

    pub fn rmdir(&self, path: &str) -> FsResult<()> {
        debug!("rmdir {}", path);
        match split_path(path)? {
            Some((parent, name)) => self.parent_dir(&parent)?.rmdir(&name),
            None => self.root.remove(),
        }
    }

    fn tree_target<'a>(&self, target: &'a str) -> &'a str {
        let Some(mount_point) = &self.mount_point else {
            return target;
        };
        match target.strip_prefix(mount_point.as_str()) {
            Some(rest) if rest.is_empty() => "/",
            Some(rest) if rest.starts_with('/') => rest,
            _ => target,
        }
    }
}
