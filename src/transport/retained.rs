//! Transport over the IoT data plane
//!
//! Publishing goes straight to the data plane. Inbound delivery polls the
//! retained message of each subscribed topic and hands over a message
//! whenever its modification stamp moves.
//!
//! This is not a subscription: only retained messages are seen, at most one
//! per poll interval. The message retained before the first poll counts as
//! already delivered.

use super::{MessageHandler, MessageTransport};
use crate::catalog::aws_client::{IntoOption, classify};
use crate::error::RemoteError;
use async_trait::async_trait;
use aws_sdk_iotdataplane::Client;
use aws_sdk_iotdataplane::primitives::Blob;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Tracks the last retained message seen on one topic.
#[derive(Debug, Default)]
pub struct RetainedCursor {
    seeded: bool,
    last_seen: Option<i64>,
}

impl RetainedCursor {
    /// Record a poll result and report whether it carries a new message.
    /// `None` means the topic has no retained message.
    pub fn observe(&mut self, stamp: Option<i64>) -> bool {
        if !self.seeded {
            self.seeded = true;
            self.last_seen = stamp;
            return false;
        }
        if stamp.is_none() || stamp == self.last_seen {
            return false;
        }
        self.last_seen = stamp;
        true
    }
}

pub struct RetainedMessageTransport {
    client: Client,
    retain: bool,
    poll_interval: Duration,
    pollers: Mutex<Vec<JoinHandle<()>>>,
}

impl RetainedMessageTransport {
    pub fn new(client: Client, retain: bool, poll_interval: Duration) -> Self {
        Self {
            client,
            retain,
            poll_interval,
            pollers: Mutex::new(Vec::new()),
        }
    }

    /// Abort every polling task.
    pub fn stop(&self) {
        for handle in self.pollers.lock().drain(..) {
            handle.abort();
        }
    }

    fn spawn_poller(&self, topic: String, handler: MessageHandler) -> JoinHandle<()> {
        let client = self.client.clone();
        let period = self.poll_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            let mut cursor = RetainedCursor::default();

            loop {
                interval.tick().await;

                let output = match client.get_retained_message().topic(&topic).send().await {
                    Ok(output) => output,
                    Err(err) => {
                        match classify(err) {
                            RemoteError::NotFound(_) => {
                                debug!("No retained message on '{}' yet", topic);
                                cursor.observe(None);
                            }
                            other => warn!("Polling '{}' failed: {}", topic, other),
                        }
                        continue;
                    }
                };

                let stamp = output.last_modified_time().into_option();
                if !cursor.observe(stamp) {
                    continue;
                }

                if let Some(payload) = output.payload() {
                    debug!("Delivering {} bytes from '{}'", payload.as_ref().len(), topic);
                    handler(&topic, payload.as_ref());
                }
            }
        })
    }
}

impl Drop for RetainedMessageTransport {
    fn drop(&mut self) {
        self.stop();
    }
}

#[async_trait]
impl MessageTransport for RetainedMessageTransport {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), RemoteError> {
        self.client
            .publish()
            .topic(topic)
            .qos(1)
            .retain(self.retain)
            .payload(Blob::new(payload.to_vec()))
            .send()
            .await
            .map_err(classify)?;
        debug!("Published {} bytes to '{}'", payload.len(), topic);
        Ok(())
    }

    async fn subscribe(&self, topic: &str, handler: MessageHandler) -> Result<(), RemoteError> {
        info!(
            "Polling '{}' every {:?} for retained messages",
            topic, self.poll_interval
        );
        let handle = self.spawn_poller(topic.to_string(), handler);
        self.pollers.lock().push(handle);
        Ok(())
    }
}
