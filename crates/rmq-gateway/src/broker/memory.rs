//! In-process broker for local development and tests

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use pem_transport::CertPaths;
use serde_json::Value;
use tokio::sync::Mutex;

use super::{Broker, BrokerMessage, QueueInfo};
use crate::error::{GatewayError, Result};

#[derive(Debug, Clone)]
struct Stored {
    body: Vec<u8>,
    redelivered: bool,
}

/// Queues held in memory
///
/// Peeked messages stay at the head of their queue and are flagged as
/// redelivered, the way a broker flags requeued messages.
#[derive(Debug, Default)]
pub struct MemoryBroker {
    queues: Mutex<HashMap<String, VecDeque<Stored>>>,
    connected: AtomicBool,
    unreachable: bool,
}

impl MemoryBroker {
    /// Create an empty broker
    pub fn new() -> Self {
        Self::default()
    }

    /// A broker that refuses every connection attempt
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    async fn ensure_connected(&self) -> Result<()> {
        if self.unreachable {
            return Err(GatewayError::NotConnected(
                "in-memory broker is unreachable".to_string(),
            ));
        }
        if !self.connected.swap(true, Ordering::SeqCst) {
            debug!("In-memory broker connected");
        }
        Ok(())
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> Result<()> {
        self.ensure_connected().await
    }

    async fn publish(&self, queue: &str, message: &Value) -> Result<()> {
        self.ensure_connected().await?;
        let body = serde_json::to_vec(message)?;
        self.queues
            .lock()
            .await
            .entry(queue.to_string())
            .or_default()
            .push_back(Stored {
                body,
                redelivered: false,
            });
        Ok(())
    }

    async fn peek(&self, queue: &str, count: usize) -> Result<Vec<BrokerMessage>> {
        self.ensure_connected().await?;
        let mut queues = self.queues.lock().await;
        let stored = queues
            .get_mut(queue)
            .ok_or_else(|| GatewayError::QueueNotFound(queue.to_string()))?;

        Ok(stored
            .iter_mut()
            .take(count)
            .map(|message| {
                let peeked = BrokerMessage::from_body(&message.body, message.redelivered);
                message.redelivered = true;
                peeked
            })
            .collect())
    }

    async fn consume(&self, queue: &str, count: usize) -> Result<Vec<BrokerMessage>> {
        self.ensure_connected().await?;
        let mut queues = self.queues.lock().await;
        let stored = queues
            .get_mut(queue)
            .ok_or_else(|| GatewayError::QueueNotFound(queue.to_string()))?;

        let take = count.min(stored.len());
        Ok(stored
            .drain(..take)
            .map(|message| BrokerMessage::from_body(&message.body, message.redelivered))
            .collect())
    }

    async fn queue_info(&self, queue: &str) -> Result<QueueInfo> {
        self.ensure_connected().await?;
        let queues = self.queues.lock().await;
        let stored = queues
            .get(queue)
            .ok_or_else(|| GatewayError::QueueNotFound(queue.to_string()))?;

        Ok(QueueInfo {
            queue: queue.to_string(),
            message_count: u32::try_from(stored.len()).unwrap_or(u32::MAX),
            consumer_count: 0,
        })
    }

    async fn cert_paths(&self) -> Option<CertPaths> {
        None
    }

    async fn close(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}
