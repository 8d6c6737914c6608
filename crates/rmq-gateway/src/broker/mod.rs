//! Broker client abstraction
//!
//! [`Broker`] is what the HTTP layer talks to. [`AmqpBroker`] speaks AMQP
//! 0-9-1 to RabbitMQ and owns the materialized certificate files of its live
//! connection; [`MemoryBroker`] keeps queues in process for local development
//! and tests.

mod amqp;
mod memory;

pub use amqp::AmqpBroker;
pub use memory::MemoryBroker;

use async_trait::async_trait;
use pem_transport::CertPaths;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Upper bound on messages returned by one peek or consume call
pub const MAX_FETCH: usize = 100;

/// Message and consumer counts of one queue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueInfo {
    /// Queue name
    pub queue: String,
    /// Messages ready for delivery
    pub message_count: u32,
    /// Active consumers
    pub consumer_count: u32,
}

/// A message read from a queue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrokerMessage {
    /// Body, as JSON when it parses, else as a string
    pub body: Value,
    /// Whether the broker delivered this message before
    pub redelivered: bool,
}

impl BrokerMessage {
    /// Build a message from a raw body
    pub fn from_body(body: &[u8], redelivered: bool) -> Self {
        let body = serde_json::from_slice(body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()));
        Self { body, redelivered }
    }
}

/// Trait for broker backends.
///
/// Connections are established lazily: every operation connects first if
/// needed. A failed operation tears the connection down so the next call
/// starts fresh.
///
/// All implementations must be `Send + Sync` to be shared between request
/// handlers.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Whether a connection is currently open
    async fn is_connected(&self) -> bool;

    /// Open a connection unless one is already open
    async fn connect(&self) -> Result<()>;

    /// Publish `message` as a persistent JSON message to `queue`, declaring
    /// the queue as durable first
    async fn publish(&self, queue: &str, message: &Value) -> Result<()>;

    /// Read up to `count` messages without removing them
    async fn peek(&self, queue: &str, count: usize) -> Result<Vec<BrokerMessage>>;

    /// Read and acknowledge up to `count` messages
    async fn consume(&self, queue: &str, count: usize) -> Result<Vec<BrokerMessage>>;

    /// Message and consumer counts of an existing queue
    async fn queue_info(&self, queue: &str) -> Result<QueueInfo>;

    /// Certificate files materialized for the live connection, if any
    async fn cert_paths(&self) -> Option<CertPaths>;

    /// Close the connection and release everything it holds
    async fn close(&self) -> Result<()>;
}
