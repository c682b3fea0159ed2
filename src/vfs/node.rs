//! The tree entity and its generic operations
//!
//! Every directory owns its children through a `HashMap` guarded by the
//! directory's own lock. Parent, root and link references are `Weak`, so
//! dropping the edge from a parent is what destroys a subtree.

use super::cache::{CachePolicy, Freshness};
use super::directories::{self, DirRole};
use super::leaves::Leaf;
use super::links;
use super::tree::TreeContext;
use crate::error::{FsError, FsResult};
use log::debug;
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant, SystemTime};

pub struct Node {
    name: String,
    parent: Option<Weak<Node>>,
    root: Weak<Node>,
    ctx: Arc<TreeContext>,
    created: SystemTime,
    size: AtomicU64,
    kind: NodeKind,
}

pub enum NodeKind {
    Directory(Directory),
    Leaf(Leaf),
    /// Non-owning reference to the node the link stands for.
    Link(Weak<Node>),
}

impl NodeKind {
    pub fn directory(role: DirRole, ttl: Option<Duration>) -> Self {
        NodeKind::Directory(Directory {
            role,
            state: Mutex::new(DirState {
                children: HashMap::new(),
                cache: CachePolicy::new(ttl),
            }),
        })
    }

    pub fn link(source: &Arc<Node>) -> Self {
        NodeKind::Link(Arc::downgrade(source))
    }
}

pub struct Directory {
    role: DirRole,
    state: Mutex<DirState>,
}

pub(crate) struct DirState {
    pub(crate) children: HashMap<String, Arc<Node>>,
    pub(crate) cache: CachePolicy,
}

impl Directory {
    pub fn role(&self) -> &DirRole {
        &self.role
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, DirState> {
        self.state.lock()
    }
}

/// Back-references handed to nodes created under a directory.
#[derive(Clone)]
pub struct Lineage {
    parent: Weak<Node>,
    root: Weak<Node>,
    ctx: Arc<TreeContext>,
}

impl Lineage {
    pub fn node(&self, name: impl Into<String>, kind: NodeKind) -> Arc<Node> {
        self.node_created(name, kind, None)
    }

    pub fn node_created(
        &self,
        name: impl Into<String>,
        kind: NodeKind,
        created: Option<SystemTime>,
    ) -> Arc<Node> {
        let size = match &kind {
            NodeKind::Leaf(leaf) => leaf.initial_len(),
            _ => 0,
        };
        Arc::new(Node {
            name: name.into(),
            parent: Some(self.parent.clone()),
            root: self.root.clone(),
            ctx: self.ctx.clone(),
            created: created.unwrap_or_else(SystemTime::now),
            size: AtomicU64::new(size),
            kind,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Directory,
    File,
    Symlink,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeAttr {
    pub kind: NodeType,
    pub size: u64,
    pub created: SystemTime,
    pub perm: u16,
}

/// Merge `new_nodes` into `children`, keeping the existing instance for
/// every name present on both sides.
pub fn reconcile_children(children: &mut HashMap<String, Arc<Node>>, new_nodes: Vec<Arc<Node>>) {
    let mut merged = HashMap::with_capacity(new_nodes.len());
    for node in new_nodes {
        let name = node.name.clone();
        let kept = children.remove(&name).unwrap_or(node);
        merged.insert(name, kept);
    }
    *children = merged;
}

impl Node {
    pub fn new_root(ctx: Arc<TreeContext>) -> Arc<Node> {
        Arc::new_cyclic(|root| Node {
            name: String::new(),
            parent: None,
            root: root.clone(),
            ctx,
            created: SystemTime::now(),
            size: AtomicU64::new(0),
            kind: NodeKind::directory(DirRole::Root, None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn context(&self) -> &Arc<TreeContext> {
        &self.ctx
    }

    pub fn parent(&self) -> Option<Arc<Node>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    pub fn root(&self) -> Option<Arc<Node>> {
        self.root.upgrade()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory(_))
    }

    pub fn is_link(&self) -> bool {
        matches!(self.kind, NodeKind::Link(_))
    }

    pub fn as_directory(&self) -> Option<&Directory> {
        match &self.kind {
            NodeKind::Directory(dir) => Some(dir),
            _ => None,
        }
    }

    pub fn role(&self) -> Option<&DirRole> {
        self.as_directory().map(Directory::role)
    }

    pub fn as_leaf(&self) -> Option<&Leaf> {
        match &self.kind {
            NodeKind::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }

    /// Source of a link, `None` for other kinds or a dangling link.
    pub fn link_source(&self) -> Option<Arc<Node>> {
        match &self.kind {
            NodeKind::Link(source) => source.upgrade(),
            _ => None,
        }
    }

    /// The node content operations act on: the source for a link, the node
    /// itself otherwise.
    pub fn target(self: &Arc<Self>) -> FsResult<Arc<Node>> {
        match &self.kind {
            NodeKind::Link(source) => source.upgrade().ok_or(FsError::NotFound),
            _ => Ok(self.clone()),
        }
    }

    pub fn lineage(self: &Arc<Self>) -> Lineage {
        Lineage {
            parent: Arc::downgrade(self),
            root: self.root.clone(),
            ctx: self.ctx.clone(),
        }
    }

    pub fn absolute_path(&self) -> String {
        let mut names = vec![self.name.clone()];
        let mut current = self.parent();
        while let Some(node) = current {
            if !node.is_root() {
                names.push(node.name.clone());
            }
            current = node.parent();
        }
        if self.is_root() {
            return "/".to_string();
        }
        names.reverse();
        format!("/{}", names.join("/"))
    }

    pub fn created(&self) -> SystemTime {
        self.created
    }

    pub fn size(&self) -> u64 {
        self.size.load(Ordering::Relaxed)
    }

    pub(crate) fn set_size(&self, size: u64) {
        self.size.store(size, Ordering::Relaxed);
    }

    pub fn attr(&self) -> NodeAttr {
        let (kind, size, perm) = match &self.kind {
            NodeKind::Directory(_) => (NodeType::Directory, 0, 0o755),
            NodeKind::Leaf(_) => (NodeType::File, self.size(), 0o644),
            NodeKind::Link(_) => {
                let size = links::readlink(self).map(|path| path.len() as u64).unwrap_or(0);
                (NodeType::Symlink, size, 0o777)
            }
        };
        NodeAttr {
            kind,
            size,
            created: self.created,
            perm,
        }
    }

    /// Load lazily fetched leaf content so the reported size is current.
    pub fn refresh_attr(&self) -> FsResult<()> {
        match &self.kind {
            NodeKind::Leaf(leaf) => leaf.ensure_loaded(self),
            _ => Ok(()),
        }
    }

    // Cache state

    pub fn is_initialized(&self) -> bool {
        self.as_directory()
            .is_some_and(|dir| dir.state().cache.is_initialized())
    }

    pub fn freshness(&self) -> Option<Freshness> {
        self.as_directory()
            .map(|dir| dir.state().cache.freshness(Instant::now()))
    }

    pub fn set_ttl(&self, ttl: Duration) {
        if let Some(dir) = self.as_directory() {
            dir.state().cache.set_ttl(ttl, Instant::now());
        }
    }

    pub fn invalidate(&self) {
        if let Some(dir) = self.as_directory() {
            dir.state().cache.invalidate();
        }
    }

    /// Reconcile with the remote collection unless the cached children are
    /// fresh. Runs under the directory lock, so at most one refresh per
    /// directory is in flight; a failed fetch leaves the cache untouched.
    pub fn ensure_fresh(self: &Arc<Self>) -> FsResult<()> {
        let Some(dir) = self.as_directory() else {
            return Ok(());
        };
        let mut state = dir.state();
        if state.cache.freshness(Instant::now()) == Freshness::Fresh {
            return Ok(());
        }
        debug!("Reconciling {}", self.absolute_path());
        let listing = directories::fetch(self, &dir.role)?;
        listing.merge_into(self, &mut state.children);
        state.cache.mark_refreshed(Instant::now());
        Ok(())
    }

    // Children

    /// Insert or overwrite a child by name.
    pub fn add_child(&self, node: Arc<Node>) {
        if let Some(dir) = self.as_directory() {
            dir.state().children.insert(node.name.clone(), node);
        }
    }

    pub fn reconcile(&self, new_nodes: Vec<Arc<Node>>) {
        if let Some(dir) = self.as_directory() {
            reconcile_children(&mut dir.state().children, new_nodes);
        }
    }

    pub fn child(self: &Arc<Self>, name: &str) -> FsResult<Option<Arc<Node>>> {
        self.ensure_fresh()?;
        Ok(self.cached_child(name))
    }

    /// Child lookup that never triggers a reconciliation.
    pub fn cached_child(&self, name: &str) -> Option<Arc<Node>> {
        self.as_directory()?.state().children.get(name).cloned()
    }

    pub fn entries(self: &Arc<Self>) -> FsResult<Vec<Arc<Node>>> {
        let dir = self.as_directory().ok_or(FsError::NotADirectory)?;
        self.ensure_fresh()?;
        Ok(dir.state().children.values().cloned().collect())
    }

    pub fn list_entries(self: &Arc<Self>) -> FsResult<Vec<String>> {
        let mut names: Vec<String> = self
            .entries()?
            .iter()
            .map(|node| node.name.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    /// Detach this node from its parent.
    pub fn remove(self: &Arc<Self>) -> FsResult<()> {
        let Some(parent) = self.parent() else {
            return Err(FsError::PermissionDenied);
        };
        if let Some(dir) = self.as_directory() {
            if !dir.state().children.is_empty() {
                return Err(FsError::NotEmpty);
            }
        }
        parent.detach_child(self);
        Ok(())
    }

    fn detach_child(&self, child: &Arc<Node>) {
        let Some(dir) = self.as_directory() else {
            return;
        };
        let mut state = dir.state();
        if state
            .children
            .get(&child.name)
            .is_some_and(|existing| Arc::ptr_eq(existing, child))
        {
            state.children.remove(&child.name);
        }
    }

    // Structural operations, invoked on the parent directory

    pub fn create(self: &Arc<Self>, name: &str) -> FsResult<()> {
        debug!("create '{}' under {} is a no-op", name, self.absolute_path());
        Ok(())
    }

    pub fn mkdir(self: &Arc<Self>, name: &str) -> FsResult<()> {
        match self.as_directory() {
            Some(dir) => directories::mkdir(self, &dir.role, name),
            None => Ok(()),
        }
    }

    pub fn symlink(self: &Arc<Self>, name: &str, target: &str) -> FsResult<()> {
        match self.as_directory() {
            Some(dir) => links::establish(self, &dir.role, name, target),
            None => Ok(()),
        }
    }

    pub fn unlink(self: &Arc<Self>, name: &str) -> FsResult<()> {
        let dir = self.as_directory().ok_or(FsError::NotADirectory)?;
        let child = self.child(name)?.ok_or(FsError::NotFound)?;
        match &child.kind {
            NodeKind::Directory(_) => return Err(FsError::IsADirectory),
            NodeKind::Link(_) => links::dissolve(self, &dir.role, &child)?,
            NodeKind::Leaf(leaf) => leaf.on_unlink(&child)?,
        }
        child.remove()
    }

    pub fn rmdir(self: &Arc<Self>, name: &str) -> FsResult<()> {
        self.as_directory().ok_or(FsError::NotADirectory)?;
        let child = self.child(name)?.ok_or(FsError::NotFound)?;
        let Some(target) = child.as_directory() else {
            return Err(FsError::NotADirectory);
        };
        child.ensure_fresh()?;
        if !target.state().children.is_empty() {
            return Err(FsError::NotEmpty);
        }
        directories::remove_remote(&child, &target.role)?;
        child.remove()
    }

    // Content operations; links act on their source

    pub fn open(self: &Arc<Self>) -> FsResult<()> {
        let node = self.target()?;
        match &node.kind {
            NodeKind::Leaf(leaf) => leaf.open(&node),
            _ => Ok(()),
        }
    }

    pub fn read(self: &Arc<Self>, offset: u64, size: usize) -> FsResult<Vec<u8>> {
        let node = self.target()?;
        match &node.kind {
            NodeKind::Leaf(leaf) => leaf.read(&node, offset, size),
            _ => Ok(Vec::new()),
        }
    }

    pub fn write(self: &Arc<Self>, offset: u64, data: &[u8]) -> FsResult<usize> {
        let node = self.target()?;
        match &node.kind {
            NodeKind::Leaf(leaf) => leaf.write(&node, offset, data),
            _ => Ok(0),
        }
    }

    pub fn release(self: &Arc<Self>) -> FsResult<()> {
        let node = self.target()?;
        match &node.kind {
            NodeKind::Leaf(leaf) => leaf.release(&node),
            _ => Ok(()),
        }
    }

    pub fn truncate(self: &Arc<Self>, size: u64) -> FsResult<()> {
        let node = self.target()?;
        match &node.kind {
            NodeKind::Leaf(leaf) => leaf.truncate(&node, size),
            _ => Ok(()),
        }
    }
}
