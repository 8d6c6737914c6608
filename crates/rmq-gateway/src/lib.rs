//! rmq-gateway - HTTP gateway to a RabbitMQ broker
//!
//! This library provides:
//! - Broker settings from a platform service binding (`VCAP_SERVICES`) or
//!   `RMQ_*` environment variables
//! - TLS to the broker, with certificates delivered as encoded content and
//!   materialized per connection through [`pem_transport`]
//! - An HTTP API for publishing, peeking, consuming and inspecting queues
//! - Provisioning helpers that turn PEM files into a credentials record

#[macro_use]
mod logging;

pub mod broker;
pub mod config;
pub mod error;
pub mod provision;
pub mod server;
pub mod status;
pub mod tls;

pub use broker::{AmqpBroker, Broker, BrokerMessage, MemoryBroker, QueueInfo};
pub use config::{BrokerSettings, GatewayConfig, VcapServices};
pub use error::{GatewayError, Result};
pub use server::AppState;
pub use status::TlsStatusReport;
pub use tls::{TlsClientConfig, TlsConnector, TlsError, TlsVerifyMode};
