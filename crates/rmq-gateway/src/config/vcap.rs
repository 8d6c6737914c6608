//! Platform service bindings (`VCAP_SERVICES`)
//!
//! The platform injects bound services as JSON, keyed by service label:
//!
//! ```json
//! {
//!   "user-provided": [
//!     {
//!       "name": "my-rabbitmq",
//!       "label": "user-provided",
//!       "tags": [],
//!       "credentials": { "hostname": "rmq.internal", "port": 5671, "...": "..." }
//!     }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::env::EnvSource;
use crate::error::Result;

/// Environment variable holding the bindings
pub const VCAP_SERVICES: &str = "VCAP_SERVICES";

/// One bound service instance
#[derive(Clone, Deserialize)]
pub struct ServiceBinding {
    /// Instance name chosen when the service was created
    pub name: String,
    /// Service offering label (e.g. `user-provided`)
    #[serde(default)]
    pub label: Option<String>,
    /// Service plan
    #[serde(default)]
    pub plan: Option<String>,
    /// Tags attached to the instance
    #[serde(default)]
    pub tags: Vec<String>,
    /// Credentials record
    #[serde(default)]
    pub credentials: Map<String, Value>,
}

impl fmt::Debug for ServiceBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceBinding")
            .field("name", &self.name)
            .field("label", &self.label)
            .field("plan", &self.plan)
            .field("tags", &self.tags)
            .field("credentials", &self.credentials.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Public summary of a binding, without credentials
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceSummary {
    /// Instance name
    pub name: String,
    /// Service offering label
    pub label: Option<String>,
    /// Service plan
    pub plan: Option<String>,
    /// Tags
    pub tags: Vec<String>,
}

impl From<&ServiceBinding> for ServiceSummary {
    fn from(binding: &ServiceBinding) -> Self {
        Self {
            name: binding.name.clone(),
            label: binding.label.clone(),
            plan: binding.plan.clone(),
            tags: binding.tags.clone(),
        }
    }
}

/// All bindings visible to the process
///
/// Bindings are ordered by label, then by their position under that label.
#[derive(Debug, Clone, Default)]
pub struct VcapServices {
    bindings: Vec<ServiceBinding>,
}

impl VcapServices {
    /// Parse the `VCAP_SERVICES` document
    pub fn parse(json: &str) -> Result<Self> {
        let by_label: BTreeMap<String, Vec<ServiceBinding>> = serde_json::from_str(json)?;
        Ok(Self {
            bindings: by_label.into_values().flatten().collect(),
        })
    }

    /// Read bindings from the environment; unset or blank means none
    pub fn from_env(env: &dyn EnvSource) -> Result<Self> {
        match env.var(VCAP_SERVICES) {
            Some(json) if !json.trim().is_empty() => Self::parse(&json),
            _ => Ok(Self::default()),
        }
    }

    /// All bindings
    pub fn bindings(&self) -> &[ServiceBinding] {
        &self.bindings
    }

    /// Whether no service is bound
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// First binding whose name contains one of `patterns`, ignoring case
    pub fn find_by_name(&self, patterns: &[String]) -> Option<&ServiceBinding> {
        let patterns: Vec<String> = patterns
            .iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();

        self.bindings.iter().find(|binding| {
            let name = binding.name.to_lowercase();
            patterns.iter().any(|p| name.contains(p.as_str()))
        })
    }

    /// Credential-free summaries of every binding
    pub fn summaries(&self) -> Vec<ServiceSummary> {
        self.bindings.iter().map(ServiceSummary::from).collect()
    }
}
