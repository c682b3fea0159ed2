//! Tree construction and inbound message fan-in

use super::directories::{self, MESSAGES, TOPICS, sanitize_topic};
use super::node::Node;
use super::remote::Remote;
use super::resolver::resolve;
use crate::error::FsResult;
use crate::transport::MessageHandler;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct TreeOptions {
    /// Interval after which collection directories are listed again.
    pub collection_ttl: Option<Duration>,
    /// Messages kept per topic, 0 keeps all of them.
    pub messages_retained: usize,
    pub topics: Vec<String>,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            collection_ttl: Some(Duration::from_secs(30)),
            messages_retained: 100,
            topics: Vec::new(),
        }
    }
}

/// Shared by every node of one tree.
pub struct TreeContext {
    pub remote: Remote,
    pub options: TreeOptions,
}

pub struct IotTree {
    root: Arc<Node>,
}

impl IotTree {
    /// Build the root and subscribe to every configured topic. A failed
    /// subscription is logged; the topic directory still exists.
    pub fn new(remote: Remote, options: TreeOptions) -> Self {
        let ctx = Arc::new(TreeContext { remote, options });
        let tree = Self {
            root: Node::new_root(ctx),
        };
        tree.subscribe_topics();
        tree
    }

    pub fn root(&self) -> &Arc<Node> {
        &self.root
    }

    pub fn context(&self) -> &Arc<TreeContext> {
        self.root.context()
    }

    fn subscribe_topics(&self) {
        let ctx = self.context().clone();
        for topic in &ctx.options.topics {
            let root = Arc::downgrade(&self.root);
            let handler: MessageHandler = Arc::new(move |topic: &str, payload: &[u8]| {
                let Some(root) = root.upgrade() else {
                    return;
                };
                if let Err(err) = deliver(&root, topic, payload) {
                    warn!("Dropping message on '{}': {}", topic, err);
                }
            });
            match ctx.remote.run(ctx.remote.transport().subscribe(topic, handler)) {
                Ok(()) => info!("Subscribed to '{}'", topic),
                Err(err) => warn!("Failed to subscribe to '{}': {}", topic, err),
            }
        }
    }
}

/// Store an inbound message under `/topics/<topic>/messages`.
pub fn deliver(root: &Arc<Node>, topic: &str, payload: &[u8]) -> FsResult<()> {
    let path = format!("/{}/{}/{}", TOPICS, sanitize_topic(topic), MESSAGES);
    let messages = resolve(root, &path, true)?;
    directories::push_message(&messages, payload)
}
