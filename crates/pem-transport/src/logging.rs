//! Logging macros that set target to "pem_transport" for all log calls.
//!
//! The gateway filters this crate's output with a single directive
//! (`pem_transport=debug`) instead of one per module path.

macro_rules! debug {
    ($($arg:tt)*) => { ::tracing::debug!(target: "pem_transport", $($arg)*) };
}

macro_rules! warn {
    ($($arg:tt)*) => { ::tracing::warn!(target: "pem_transport", $($arg)*) };
}
