//! Logging macros that set target to "rmq_gateway" for all log calls.
//!
//! Without an explicit target, tracing uses the full module path
//! (e.g., "rmq_gateway::broker::amqp"). These macros keep a single
//! "rmq_gateway" target so one `RUST_LOG` directive covers the crate.

macro_rules! debug {
    ($($arg:tt)*) => { ::tracing::debug!(target: "rmq_gateway", $($arg)*) };
}

macro_rules! info {
    ($($arg:tt)*) => { ::tracing::info!(target: "rmq_gateway", $($arg)*) };
}

macro_rules! warn {
    ($($arg:tt)*) => { ::tracing::warn!(target: "rmq_gateway", $($arg)*) };
}

macro_rules! error {
    ($($arg:tt)*) => { ::tracing::error!(target: "rmq_gateway", $($arg)*) };
}
