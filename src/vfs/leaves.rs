//! File nodes: static info, remote documents, the publish buffer and
//! received messages

use super::directories::VERSIONS;
use super::node::Node;
use crate::error::{FsError, FsResult};
use log::{debug, info};
use parking_lot::Mutex;

pub const DOCUMENT_MAX_SIZE: usize = 64 * 1024;
pub const SHADOW_MAX_SIZE: usize = 8 * 1024;
pub const PUBLISH_MAX_SIZE: usize = 128 * 1024;

pub enum Leaf {
    Info(Vec<u8>),
    Document(DocumentLeaf),
    Publish(PublishLeaf),
    Message(Vec<u8>),
}

fn slice(content: &[u8], offset: u64, size: usize) -> Vec<u8> {
    let start = usize::try_from(offset).unwrap_or(usize::MAX).min(content.len());
    let end = start.saturating_add(size).min(content.len());
    content[start..end].to_vec()
}

/// Copy `data` into `content` at `offset`, padding any gap with spaces.
fn splice(content: &mut Vec<u8>, offset: u64, data: &[u8], max_size: usize) -> FsResult<()> {
    let start = usize::try_from(offset).map_err(|_| FsError::NoSpace)?;
    let end = start.checked_add(data.len()).ok_or(FsError::NoSpace)?;
    if end > max_size {
        return Err(FsError::NoSpace);
    }
    if end > content.len() {
        content.resize(end, b' ');
    }
    content[start..end].copy_from_slice(data);
    Ok(())
}

fn resize(content: &mut Vec<u8>, size: u64, max_size: usize) -> FsResult<()> {
    let size = usize::try_from(size).map_err(|_| FsError::NoSpace)?;
    if size > max_size {
        return Err(FsError::NoSpace);
    }
    content.resize(size, b' ');
    Ok(())
}

impl Leaf {
    pub fn info(text: impl Into<String>) -> Self {
        Leaf::Info(text.into().into_bytes())
    }

    pub fn document(source: DocumentSource) -> Self {
        Leaf::Document(DocumentLeaf::new(source))
    }

    pub fn publish(topic: String) -> Self {
        Leaf::Publish(PublishLeaf::new(topic))
    }

    pub fn message(payload: Vec<u8>) -> Self {
        Leaf::Message(payload)
    }

    pub(crate) fn initial_len(&self) -> u64 {
        match self {
            Leaf::Info(content) | Leaf::Message(content) => content.len() as u64,
            Leaf::Document(_) | Leaf::Publish(_) => 0,
        }
    }

    pub(crate) fn ensure_loaded(&self, node: &Node) -> FsResult<()> {
        match self {
            Leaf::Document(document) if !document.is_loaded() => document.refresh(node),
            _ => Ok(()),
        }
    }

    pub(crate) fn open(&self, node: &Node) -> FsResult<()> {
        match self {
            Leaf::Document(document) => document.refresh(node),
            _ => Ok(()),
        }
    }

    pub(crate) fn read(&self, node: &Node, offset: u64, size: usize) -> FsResult<Vec<u8>> {
        match self {
            Leaf::Info(content) | Leaf::Message(content) => Ok(slice(content, offset, size)),
            Leaf::Document(document) => document.read(node, offset, size),
            Leaf::Publish(publish) => Ok(publish.read(offset, size)),
        }
    }

    pub(crate) fn write(&self, node: &Node, offset: u64, data: &[u8]) -> FsResult<usize> {
        match self {
            Leaf::Info(_) | Leaf::Message(_) => Err(FsError::PermissionDenied),
            Leaf::Document(document) => document.write(node, offset, data),
            Leaf::Publish(publish) => publish.write(node, offset, data),
        }
    }

    pub(crate) fn release(&self, node: &Node) -> FsResult<()> {
        match self {
            Leaf::Document(document) => document.release(node),
            Leaf::Publish(publish) => publish.release(node),
            _ => Ok(()),
        }
    }

    pub(crate) fn truncate(&self, node: &Node, size: u64) -> FsResult<()> {
        match self {
            Leaf::Info(_) | Leaf::Message(_) => Err(FsError::PermissionDenied),
            Leaf::Document(document) => document.truncate(node, size),
            Leaf::Publish(publish) => publish.truncate(node, size),
        }
    }

    /// Remote side effect of removing this leaf, run before it is detached.
    pub(crate) fn on_unlink(&self, node: &Node) -> FsResult<()> {
        match self {
            Leaf::Document(document) => document.on_unlink(node),
            _ => Ok(()),
        }
    }
}

/// Where a document's content comes from and goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    Endpoint,
    ThingShadow { thing: String },
    /// The policy's default version; writing creates a new default version.
    PolicyDefault { policy: String },
    PolicyVersion { policy: String, version: String },
}

impl DocumentSource {
    fn writable(&self) -> bool {
        matches!(
            self,
            DocumentSource::ThingShadow { .. } | DocumentSource::PolicyDefault { .. }
        )
    }

    fn max_size(&self) -> usize {
        match self {
            DocumentSource::ThingShadow { .. } => SHADOW_MAX_SIZE,
            _ => DOCUMENT_MAX_SIZE,
        }
    }
}

#[derive(Default)]
struct DocumentState {
    content: Vec<u8>,
    loaded: bool,
    dirty: bool,
}

/// Remote document cached in memory between open and release.
pub struct DocumentLeaf {
    source: DocumentSource,
    state: Mutex<DocumentState>,
}

impl DocumentLeaf {
    fn new(source: DocumentSource) -> Self {
        Self {
            source,
            state: Mutex::new(DocumentState::default()),
        }
    }

    pub fn policy_version(&self) -> Option<&str> {
        match &self.source {
            DocumentSource::PolicyVersion { version, .. } => Some(version),
            _ => None,
        }
    }

    fn is_loaded(&self) -> bool {
        self.state.lock().loaded
    }

    fn fetch(&self, node: &Node) -> FsResult<Vec<u8>> {
        let remote = &node.context().remote;
        let catalog = remote.catalog();
        match &self.source {
            DocumentSource::Endpoint => remote
                .call("DescribeEndpoint", catalog.describe_endpoint())
                .map(String::into_bytes),
            DocumentSource::ThingShadow { thing } => remote
                .call("GetThingShadow", catalog.get_thing_shadow(thing))
                .map(Option::unwrap_or_default),
            DocumentSource::PolicyDefault { policy } => remote
                .call("GetPolicy", catalog.get_policy_document(policy, None))
                .map(String::into_bytes),
            DocumentSource::PolicyVersion { policy, version } => remote
                .call(
                    "GetPolicyVersion",
                    catalog.get_policy_document(policy, Some(version)),
                )
                .map(String::into_bytes),
        }
    }

    /// Replace the cached content with the remote one unless local edits
    /// are pending.
    fn refresh(&self, node: &Node) -> FsResult<()> {
        let mut state = self.state.lock();
        if state.dirty {
            return Ok(());
        }
        let content = self.fetch(node)?;
        node.set_size(content.len() as u64);
        state.content = content;
        state.loaded = true;
        Ok(())
    }

    fn read(&self, node: &Node, offset: u64, size: usize) -> FsResult<Vec<u8>> {
        if offset == 0 || !self.is_loaded() {
            self.refresh(node)?;
        }
        Ok(slice(&self.state.lock().content, offset, size))
    }

    fn write(&self, node: &Node, offset: u64, data: &[u8]) -> FsResult<usize> {
        if !self.source.writable() {
            return Err(FsError::PermissionDenied);
        }
        let mut state = self.state.lock();
        splice(&mut state.content, offset, data, self.source.max_size())?;
        state.dirty = true;
        node.set_size(state.content.len() as u64);
        Ok(data.len())
    }

    fn truncate(&self, node: &Node, size: u64) -> FsResult<()> {
        if !self.source.writable() {
            return Err(FsError::PermissionDenied);
        }
        let mut state = self.state.lock();
        resize(&mut state.content, size, self.source.max_size())?;
        state.dirty = true;
        node.set_size(state.content.len() as u64);
        Ok(())
    }

    /// Push pending edits. A rejected push drops them so the next open
    /// shows the remote content again.
    fn release(&self, node: &Node) -> FsResult<()> {
        let mut state = self.state.lock();
        if !state.dirty {
            return Ok(());
        }
        state.dirty = false;
        let result = self.push(node, &state.content);
        if result.is_err() {
            state.loaded = false;
        }
        result
    }

    fn push(&self, node: &Node, content: &[u8]) -> FsResult<()> {
        let remote = &node.context().remote;
        let catalog = remote.catalog();
        match &self.source {
            DocumentSource::ThingShadow { thing } => {
                remote.call(
                    "UpdateThingShadow",
                    catalog.update_thing_shadow(thing, content),
                )?;
                debug!("Updated shadow of {} ({} bytes)", thing, content.len());
                Ok(())
            }
            DocumentSource::PolicyDefault { policy } => {
                let document =
                    std::str::from_utf8(content).map_err(|_| FsError::InvalidArgument)?;
                let version = remote.call(
                    "CreatePolicyVersion",
                    catalog.create_policy_version(policy, document.trim_end(), true),
                )?;
                info!("Policy {} now defaults to version {}", policy, version);
                if let Some(versions) = node.parent().and_then(|parent| parent.cached_child(VERSIONS))
                {
                    versions.invalidate();
                }
                Ok(())
            }
            _ => Err(FsError::PermissionDenied),
        }
    }

    fn on_unlink(&self, node: &Node) -> FsResult<()> {
        if let DocumentSource::PolicyVersion { policy, version } = &self.source {
            let remote = &node.context().remote;
            remote.call(
                "DeletePolicyVersion",
                remote.catalog().delete_policy_version(policy, version),
            )?;
            info!("Deleted version {} of policy {}", version, policy);
        }
        Ok(())
    }
}

#[derive(Default)]
struct PublishState {
    payload: Vec<u8>,
    pending: bool,
}

/// Outbound buffer of a topic; each release with pending bytes publishes
/// them once.
pub struct PublishLeaf {
    topic: String,
    state: Mutex<PublishState>,
}

impl PublishLeaf {
    fn new(topic: String) -> Self {
        Self {
            topic,
            state: Mutex::new(PublishState::default()),
        }
    }

    fn read(&self, offset: u64, size: usize) -> Vec<u8> {
        slice(&self.state.lock().payload, offset, size)
    }

    fn write(&self, node: &Node, offset: u64, data: &[u8]) -> FsResult<usize> {
        let mut state = self.state.lock();
        splice(&mut state.payload, offset, data, PUBLISH_MAX_SIZE)?;
        state.pending = true;
        node.set_size(state.payload.len() as u64);
        Ok(data.len())
    }

    fn truncate(&self, node: &Node, size: u64) -> FsResult<()> {
        let mut state = self.state.lock();
        resize(&mut state.payload, size, PUBLISH_MAX_SIZE)?;
        node.set_size(state.payload.len() as u64);
        Ok(())
    }

    fn release(&self, node: &Node) -> FsResult<()> {
        let mut state = self.state.lock();
        if !state.pending {
            return Ok(());
        }
        state.pending = false;
        let remote = &node.context().remote;
        remote.call(
            "Publish",
            remote.transport().publish(&self.topic, &state.payload),
        )?;
        info!("Published {} bytes to '{}'", state.payload.len(), self.topic);
        Ok(())
    }
}
