//! Environment variable lookup
//!
//! Resolution code reads variables through [`EnvSource`] so tests can supply
//! a map instead of mutating the process environment.

use std::collections::HashMap;

/// Source of environment variables
pub trait EnvSource {
    /// Value of `key`, or `None` when unset or not valid Unicode
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl EnvSource for HashMap<&str, &str> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.to_string())
    }
}

/// Parse a boolean flag the way bindings and shells spell them
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool(" TRUE "), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("False"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_map_source() {
        let env: HashMap<&str, &str> = [("RMQ_HOST", "broker")].into_iter().collect();
        assert_eq!(env.var("RMQ_HOST"), Some("broker".to_string()));
        assert_eq!(env.var("RMQ_PORT"), None);
    }
}
