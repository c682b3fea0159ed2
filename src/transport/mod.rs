//! Message transport collaborator used by the topic subtree

pub mod retained;

use crate::error::RemoteError;
use async_trait::async_trait;
use std::sync::Arc;

/// Callback receiving `(topic, payload)` for every inbound message.
pub type MessageHandler = Arc<dyn Fn(&str, &[u8]) + Send + Sync>;

#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), RemoteError>;

    /// Start delivering messages on `topic` to `handler`.
    async fn subscribe(&self, topic: &str, handler: MessageHandler) -> Result<(), RemoteError>;
}
