//! Shared request-handler state

use std::sync::Arc;

use crate::broker::Broker;
use crate::config::{BrokerSettings, VcapServices};

/// Name reported by the health endpoint
pub const SERVICE_NAME: &str = "rmq-gateway";

/// State shared by all handlers
#[derive(Clone)]
pub struct AppState {
    /// Broker backend
    pub broker: Arc<dyn Broker>,
    /// Bound platform services
    pub services: Arc<VcapServices>,
    /// Resolved broker settings
    pub settings: Arc<BrokerSettings>,
}

impl AppState {
    /// Create handler state
    pub fn new(broker: Arc<dyn Broker>, services: VcapServices, settings: BrokerSettings) -> Self {
        Self {
            broker,
            services: Arc::new(services),
            settings: Arc::new(settings),
        }
    }
}
