//! Configuration for rmq-gateway
//!
//! Two independent inputs:
//!
//! - the optional gateway config file (listener, scratch directory, timeouts,
//!   logging), with environment overrides
//! - the broker settings, taken from the broker's platform service binding in
//!   `VCAP_SERVICES` or, for local development, from `RMQ_*` variables
//!
//! ```yaml
//! server:
//!   listen_port: 5000
//! broker:
//!   service_name_patterns: ["rabbitmq", "rmq"]
//!   connect_timeout_secs: 30
//! ```

mod env;
mod loader;
mod settings;
mod types;
mod vcap;

pub use env::{parse_bool, EnvSource, ProcessEnv};
pub use loader::{apply_env_overrides, load_config, parse_config};
pub use settings::{
    BrokerSettings, CertSource, SettingsSource, DEFAULT_PLAIN_PORT, DEFAULT_SSL_PORT,
};
pub use types::*;
pub use vcap::{ServiceBinding, ServiceSummary, VcapServices, VCAP_SERVICES};
