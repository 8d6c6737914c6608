//! Broker connection settings
//!
//! Settings come from the credentials record of the broker's service binding
//! when one is bound, otherwise from `RMQ_*` environment variables. Each TLS
//! credential may be given as encoded content or as a path; content wins.

use std::fmt;
use std::path::Path;

use pem_transport::{CertKind, CertPaths, EncodedCerts};
use serde::Serialize;
use serde_json::{Map, Value};
use zeroize::Zeroizing;

use super::env::{parse_bool, EnvSource};
use super::vcap::{ServiceBinding, VcapServices};
use crate::error::{GatewayError, Result};
use crate::tls::{TlsClientConfig, TlsVerifyMode};

/// Default AMQPS port
pub const DEFAULT_SSL_PORT: u16 = 5671;

/// Default plaintext AMQP port
pub const DEFAULT_PLAIN_PORT: u16 = 5672;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_USER: &str = "guest";
const DEFAULT_VHOST: &str = "/";

/// Where the settings were read from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SettingsSource {
    /// Credentials record of a bound service
    Binding {
        /// Binding name
        name: String,
    },
    /// `RMQ_*` environment variables
    Environment,
}

/// How one TLS credential is supplied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertSource<'a> {
    /// Encoded content, to be materialized per connection
    Content(&'a str),
    /// Existing file
    Path(&'a Path),
}

/// Everything needed to open a broker connection
#[derive(Clone)]
pub struct BrokerSettings {
    /// Broker host name or address
    pub host: String,
    /// Broker port
    pub port: u16,
    /// AMQP user
    pub username: String,
    password: Zeroizing<String>,
    /// Virtual host
    pub vhost: String,
    /// Connect over TLS
    pub ssl_enabled: bool,
    /// Verify the broker certificate chain
    pub ssl_verify: bool,
    /// Verify the broker host name against its certificate
    pub ssl_verify_hostname: bool,
    content: EncodedCerts,
    paths: CertPaths,
    /// Where these settings came from
    pub source: SettingsSource,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PLAIN_PORT,
            username: DEFAULT_USER.to_string(),
            password: Zeroizing::new(DEFAULT_USER.to_string()),
            vhost: DEFAULT_VHOST.to_string(),
            ssl_enabled: false,
            ssl_verify: true,
            ssl_verify_hostname: true,
            content: EncodedCerts::new(),
            paths: CertPaths::new(),
            source: SettingsSource::Environment,
        }
    }
}

impl fmt::Debug for BrokerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("vhost", &self.vhost)
            .field("ssl_enabled", &self.ssl_enabled)
            .field("ssl_verify", &self.ssl_verify)
            .field("ssl_verify_hostname", &self.ssl_verify_hostname)
            .field("content", &self.content)
            .field("paths", &self.paths)
            .field("source", &self.source)
            .finish()
    }
}

impl BrokerSettings {
    /// Use the first binding matching `patterns`, else the environment
    pub fn resolve(
        services: &VcapServices,
        patterns: &[String],
        env: &dyn EnvSource,
    ) -> Result<Self> {
        match services.find_by_name(patterns) {
            Some(binding) => {
                info!(service = %binding.name, "Found broker service binding");
                Self::from_binding(binding)
            }
            None => {
                info!("No broker service binding, using environment variables");
                Self::from_env(env)
            }
        }
    }

    /// Read settings from a binding's credentials record
    pub fn from_binding(binding: &ServiceBinding) -> Result<Self> {
        let lookup = Lookup::Record(&binding.credentials);
        let host = lookup
            .string("hostname")?
            .or(lookup.string("host")?)
            .ok_or_else(|| {
                GatewayError::Config(format!(
                    "service binding '{}' has no hostname",
                    binding.name
                ))
            })?;
        Self::build(
            host,
            &lookup,
            SettingsSource::Binding {
                name: binding.name.clone(),
            },
        )
    }

    /// Read settings from `RMQ_*` environment variables
    pub fn from_env(env: &dyn EnvSource) -> Result<Self> {
        let lookup = Lookup::Env(env);
        let host = lookup
            .string("hostname")?
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        Self::build(host, &lookup, SettingsSource::Environment)
    }

    fn build(host: String, lookup: &Lookup<'_>, source: SettingsSource) -> Result<Self> {
        let ssl_enabled = lookup.flag("ssl_enabled")?.unwrap_or(false);
        let default_port = if ssl_enabled {
            DEFAULT_SSL_PORT
        } else {
            DEFAULT_PLAIN_PORT
        };

        let mut content = EncodedCerts::new();
        let mut paths = CertPaths::new();
        for kind in CertKind::ALL {
            if let Some(encoded) = lookup.string(kind.content_field())? {
                content.set(kind, encoded);
            }
            if let Some(path) = lookup.string(kind.path_field())? {
                paths.set(kind, path);
            }
        }

        Ok(Self {
            host,
            port: lookup.port("port")?.unwrap_or(default_port),
            username: lookup
                .string("username")?
                .unwrap_or_else(|| DEFAULT_USER.to_string()),
            password: Zeroizing::new(
                lookup
                    .string("password")?
                    .unwrap_or_else(|| DEFAULT_USER.to_string()),
            ),
            vhost: lookup
                .string("vhost")?
                .unwrap_or_else(|| DEFAULT_VHOST.to_string()),
            ssl_enabled,
            ssl_verify: lookup.flag("ssl_verify")?.unwrap_or(true),
            ssl_verify_hostname: lookup.flag("ssl_verify_hostname")?.unwrap_or(true),
            content,
            paths,
            source,
        })
    }

    /// AMQP password
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Set the AMQP password
    pub fn set_password(&mut self, password: impl Into<String>) {
        self.password = Zeroizing::new(password.into());
    }

    /// Verification mode derived from the verify flags
    pub fn verify_mode(&self) -> TlsVerifyMode {
        TlsVerifyMode::from_flags(self.ssl_verify, self.ssl_verify_hostname)
    }

    /// Set one credential as encoded content
    pub fn set_content(&mut self, kind: CertKind, encoded: impl Into<String>) {
        self.content.set(kind, encoded);
    }

    /// Set one credential as a file path
    pub fn set_path(&mut self, kind: CertKind, path: impl Into<std::path::PathBuf>) {
        self.paths.set(kind, path);
    }

    /// Credentials supplied as encoded content
    pub fn content_certs(&self) -> &EncodedCerts {
        &self.content
    }

    /// How `kind` is supplied; content takes precedence over a path
    pub fn cert_source(&self, kind: CertKind) -> Option<CertSource<'_>> {
        self.content
            .get(kind)
            .map(CertSource::Content)
            .or_else(|| self.paths.get(kind).map(CertSource::Path))
    }

    /// Whether any TLS credential is configured
    pub fn has_certs(&self) -> bool {
        CertKind::ALL.iter().any(|kind| self.cert_source(*kind).is_some())
    }

    /// Final file path of every credential
    ///
    /// Content credentials resolve to their materialized file in
    /// `materialized`; path credentials resolve to themselves.
    pub fn resolve_tls_paths(&self, materialized: Option<&CertPaths>) -> CertPaths {
        let mut resolved = CertPaths::new();
        for kind in CertKind::ALL {
            let path = match self.cert_source(kind) {
                Some(CertSource::Content(_)) => materialized.and_then(|m| m.get(kind)),
                Some(CertSource::Path(path)) => Some(path),
                None => None,
            };
            if let Some(path) = path {
                resolved.set(kind, path);
            }
        }
        resolved
    }

    /// TLS configuration for one connection attempt
    pub fn tls_client_config(&self, materialized: Option<&CertPaths>) -> TlsClientConfig {
        TlsClientConfig {
            enabled: self.ssl_enabled,
            ..TlsClientConfig::from_paths(self.verify_mode(), &self.resolve_tls_paths(materialized))
        }
    }

    /// Fails with `MissingCredential` when only half a client identity is
    /// configured
    pub fn check_client_identity(&self) -> Result<()> {
        let cert = self.cert_source(CertKind::ClientCert).is_some();
        let key = self.cert_source(CertKind::ClientKey).is_some();
        match (cert, key) {
            (true, false) => Err(GatewayError::missing_credential(
                CertKind::ClientKey,
                "client certificate configured without a key, client authentication disabled",
            )),
            (false, true) => Err(GatewayError::missing_credential(
                CertKind::ClientCert,
                "client key configured without a certificate, client authentication disabled",
            )),
            _ => Ok(()),
        }
    }
}

/// Field lookup over either a credentials record or the environment
enum Lookup<'a> {
    Record(&'a Map<String, Value>),
    Env(&'a dyn EnvSource),
}

impl Lookup<'_> {
    fn env_name(field: &str) -> String {
        match field {
            "hostname" => "RMQ_HOST".to_string(),
            other => format!("RMQ_{}", other.to_ascii_uppercase()),
        }
    }

    /// Non-empty string value of `field`
    fn string(&self, field: &str) -> Result<Option<String>> {
        let value = match self {
            Lookup::Record(record) => match record.get(field) {
                None | Some(Value::Null) => None,
                Some(Value::String(s)) => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                Some(Value::Bool(b)) => Some(b.to_string()),
                Some(_) => {
                    return Err(GatewayError::Config(format!(
                        "credential field '{}' must be a string",
                        field
                    )))
                }
            },
            Lookup::Env(env) => env.var(&Self::env_name(field)),
        };
        Ok(value.filter(|v| !v.is_empty()))
    }

    fn flag(&self, field: &str) -> Result<Option<bool>> {
        match self.string(field)? {
            None => Ok(None),
            Some(raw) => parse_bool(&raw).map(Some).ok_or_else(|| {
                GatewayError::Config(format!("'{}' is not a boolean: {}", field, raw))
            }),
        }
    }

    fn port(&self, field: &str) -> Result<Option<u16>> {
        match self.string(field)? {
            None => Ok(None),
            Some(raw) => raw.trim().parse::<u16>().map(Some).map_err(|_| {
                GatewayError::Config(format!("'{}' is not a valid port: {}", field, raw))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn binding(credentials: Value) -> ServiceBinding {
        serde_json::from_value(serde_json::json!({
            "name": "rabbitmq-service",
            "label": "user-provided",
            "credentials": credentials,
        }))
        .unwrap()
    }

    #[test]
    fn test_env_defaults() {
        let env: HashMap<&str, &str> = HashMap::new();
        let settings = BrokerSettings::from_env(&env).unwrap();
        assert_eq!(settings.host, "localhost");
        assert_eq!(settings.port, 5672);
        assert_eq!(settings.username, "guest");
        assert_eq!(settings.password(), "guest");
        assert_eq!(settings.vhost, "/");
        assert!(!settings.ssl_enabled);
        assert!(settings.ssl_verify);
        assert!(settings.ssl_verify_hostname);
        assert!(!settings.has_certs());
        assert_eq!(settings.source, SettingsSource::Environment);
    }

    #[test]
    fn test_env_with_tls() {
        let env: HashMap<&str, &str> = [
            ("RMQ_HOST", "rmq.internal"),
            ("RMQ_USERNAME", "app"),
            ("RMQ_PASSWORD", "pw"),
            ("RMQ_VHOST", "orders"),
            ("RMQ_SSL_ENABLED", "true"),
            ("RMQ_SSL_VERIFY", "false"),
            ("RMQ_CA_CERT_PATH", "/etc/ssl/ca.pem"),
            ("RMQ_CLIENT_CERT_CONTENT", "-----BEGIN CERTIFICATE-----\\nQQ==\\n-----END CERTIFICATE-----"),
        ]
        .into_iter()
        .collect();

        let settings = BrokerSettings::from_env(&env).unwrap();
        assert_eq!(settings.host, "rmq.internal");
        assert_eq!(settings.port, 5671);
        assert_eq!(settings.vhost, "orders");
        assert_eq!(settings.verify_mode(), TlsVerifyMode::None);
        assert_eq!(
            settings.cert_source(CertKind::CaCert),
            Some(CertSource::Path(Path::new("/etc/ssl/ca.pem")))
        );
        assert!(matches!(
            settings.cert_source(CertKind::ClientCert),
            Some(CertSource::Content(_))
        ));
        assert_eq!(settings.cert_source(CertKind::ClientKey), None);
    }

    #[test]
    fn test_binding_record() {
        let settings = BrokerSettings::from_binding(&binding(serde_json::json!({
            "hostname": "rmq.example.com",
            "port": 5671,
            "username": "svc",
            "password": "secret",
            "vhost": "prod",
            "ssl_enabled": true,
            "ssl_verify": true,
            "ssl_verify_hostname": false,
        })))
        .unwrap();

        assert_eq!(settings.host, "rmq.example.com");
        assert_eq!(settings.port, 5671);
        assert_eq!(settings.password(), "secret");
        assert_eq!(settings.verify_mode(), TlsVerifyMode::VerifyCa);
        assert_eq!(
            settings.source,
            SettingsSource::Binding {
                name: "rabbitmq-service".to_string()
            }
        );
    }

    #[test]
    fn test_binding_accepts_host_alias_and_string_values() {
        let settings = BrokerSettings::from_binding(&binding(serde_json::json!({
            "host": "10.0.0.5",
            "port": "5673",
            "ssl_enabled": "true",
        })))
        .unwrap();
        assert_eq!(settings.host, "10.0.0.5");
        assert_eq!(settings.port, 5673);
        assert!(settings.ssl_enabled);
    }

    #[test]
    fn test_binding_port_defaults_follow_ssl() {
        let plain = BrokerSettings::from_binding(&binding(serde_json::json!({"hostname": "h"}))).unwrap();
        assert_eq!(plain.port, DEFAULT_PLAIN_PORT);

        let tls = BrokerSettings::from_binding(&binding(
            serde_json::json!({"hostname": "h", "ssl_enabled": true}),
        ))
        .unwrap();
        assert_eq!(tls.port, DEFAULT_SSL_PORT);
    }

    #[test]
    fn test_binding_without_hostname_is_an_error() {
        let err = BrokerSettings::from_binding(&binding(serde_json::json!({"port": 5672}))).unwrap_err();
        assert!(err.to_string().contains("rabbitmq-service"));
    }

    #[test]
    fn test_invalid_values() {
        assert!(BrokerSettings::from_binding(&binding(
            serde_json::json!({"hostname": "h", "port": 70000})
        ))
        .is_err());
        assert!(BrokerSettings::from_binding(&binding(
            serde_json::json!({"hostname": "h", "ssl_verify": "sometimes"})
        ))
        .is_err());
        assert!(BrokerSettings::from_binding(&binding(
            serde_json::json!({"hostname": "h", "username": ["a"]})
        ))
        .is_err());
    }

    #[test]
    fn test_empty_fields_count_as_absent() {
        let settings = BrokerSettings::from_binding(&binding(serde_json::json!({
            "hostname": "h",
            "ca_cert_content": "",
            "ca_cert_path": "/certs/ca.pem",
        })))
        .unwrap();
        assert_eq!(
            settings.cert_source(CertKind::CaCert),
            Some(CertSource::Path(Path::new("/certs/ca.pem")))
        );
    }

    #[test]
    fn test_content_takes_precedence_over_path() {
        let mut settings = BrokerSettings::default();
        settings.set_path(CertKind::CaCert, "/certs/ca.pem");
        settings.set_content(CertKind::CaCert, "encoded");
        assert_eq!(
            settings.cert_source(CertKind::CaCert),
            Some(CertSource::Content("encoded"))
        );

        let mut materialized = CertPaths::new();
        materialized.set(CertKind::CaCert, "/tmp/rmq-certs-abc/ca-cert.pem");

        let resolved = settings.resolve_tls_paths(Some(&materialized));
        assert_eq!(
            resolved.get(CertKind::CaCert),
            Some(Path::new("/tmp/rmq-certs-abc/ca-cert.pem"))
        );

        // Without a materialization the content credential has no file yet
        assert!(settings.resolve_tls_paths(None).get(CertKind::CaCert).is_none());
    }

    #[test]
    fn test_tls_client_config_mixes_sources() {
        let mut settings = BrokerSettings {
            ssl_enabled: true,
            ..Default::default()
        };
        settings.set_path(CertKind::CaCert, "/certs/ca.pem");
        settings.set_content(CertKind::ClientCert, "cert");
        settings.set_content(CertKind::ClientKey, "key");

        let mut materialized = CertPaths::new();
        materialized.set(CertKind::ClientCert, "/tmp/d/client-cert.pem");
        materialized.set(CertKind::ClientKey, "/tmp/d/client-key.pem");

        let config = settings.tls_client_config(Some(&materialized));
        assert!(config.enabled);
        assert_eq!(config.verify_mode, TlsVerifyMode::Verify);
        assert_eq!(config.ca_path, Some(PathBuf::from("/certs/ca.pem")));
        assert_eq!(
            config.client_key_path,
            Some(PathBuf::from("/tmp/d/client-key.pem"))
        );
    }

    #[test]
    fn test_partial_identity_is_missing_credential() {
        let mut settings = BrokerSettings::default();
        assert!(settings.check_client_identity().is_ok());

        settings.set_content(CertKind::ClientCert, "cert");
        match settings.check_client_identity() {
            Err(GatewayError::MissingCredential { kind, .. }) => {
                assert_eq!(kind, CertKind::ClientKey)
            }
            other => panic!("expected MissingCredential, got {:?}", other),
        }

        settings.set_path(CertKind::ClientKey, "/certs/key.pem");
        assert!(settings.check_client_identity().is_ok());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut settings = BrokerSettings::default();
        settings.set_password("hunter2");
        settings.set_content(CertKind::ClientKey, "PRIVATE-KEY-MATERIAL");
        let debug = format!("{:?}", settings);
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("PRIVATE-KEY-MATERIAL"));
    }

    #[test]
    fn test_resolve_prefers_binding() {
        let services = VcapServices::parse(
            r#"{"user-provided":[{"name":"my-rmq","credentials":{"hostname":"bound"}}]}"#,
        )
        .unwrap();
        let env: HashMap<&str, &str> = [("RMQ_HOST", "from-env")].into_iter().collect();
        let patterns = vec!["rmq".to_string()];

        let settings = BrokerSettings::resolve(&services, &patterns, &env).unwrap();
        assert_eq!(settings.host, "bound");

        let settings = BrokerSettings::resolve(&VcapServices::default(), &patterns, &env).unwrap();
        assert_eq!(settings.host, "from-env");
    }
}
