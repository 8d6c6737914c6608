//! TLS status introspection
//!
//! A read-only report of how the broker connection would be secured: for each
//! credential, how it is supplied and whether its file exists and is
//! non-empty, plus the port and verification settings.

use std::path::{Path, PathBuf};

use pem_transport::{CertKind, CertPaths};
use serde::Serialize;

use crate::config::{BrokerSettings, CertSource, SettingsSource, DEFAULT_PLAIN_PORT, DEFAULT_SSL_PORT};
use crate::tls::TlsVerifyMode;

/// How a credential is supplied
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CredentialOrigin {
    /// Encoded content in the binding or environment
    Content,
    /// Existing file path
    Path,
    /// Not configured
    None,
}

/// State of one credential
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CredentialStatus {
    /// `ca_cert`, `client_cert` or `client_key`
    pub credential: &'static str,
    /// Whether the credential is configured at all
    pub configured: bool,
    /// How it is configured
    pub origin: CredentialOrigin,
    /// File the TLS layer reads; for content, only while a connection holds
    /// the materialized file
    pub path: Option<PathBuf>,
    /// Whether `path` exists
    pub exists: bool,
    /// Whether `path` has content
    pub non_empty: bool,
}

/// Full TLS status report
#[derive(Debug, Clone, Serialize)]
pub struct TlsStatusReport {
    /// Where the settings came from
    pub source: SettingsSource,
    /// Broker host
    pub host: String,
    /// TLS enabled
    pub ssl_enabled: bool,
    /// Chain verification enabled
    pub ssl_verify: bool,
    /// Hostname verification enabled
    pub ssl_verify_hostname: bool,
    /// Effective verification mode
    pub verify_mode: TlsVerifyMode,
    /// Port the gateway connects to
    pub port: u16,
    /// Conventional AMQPS port
    pub ssl_port: u16,
    /// Conventional plaintext AMQP port
    pub plaintext_port: u16,
    /// Whether `port` is the conventional port for the TLS setting
    pub port_matches_protocol: bool,
    /// Per-credential state, in CA / client cert / client key order
    pub credentials: Vec<CredentialStatus>,
}

impl TlsStatusReport {
    /// Build a report for `settings`
    ///
    /// `materialized` holds the files of the live connection, if any.
    pub fn new(settings: &BrokerSettings, materialized: Option<&CertPaths>) -> Self {
        let expected_port = if settings.ssl_enabled {
            DEFAULT_SSL_PORT
        } else {
            DEFAULT_PLAIN_PORT
        };

        Self {
            source: settings.source.clone(),
            host: settings.host.clone(),
            ssl_enabled: settings.ssl_enabled,
            ssl_verify: settings.ssl_verify,
            ssl_verify_hostname: settings.ssl_verify_hostname,
            verify_mode: settings.verify_mode(),
            port: settings.port,
            ssl_port: DEFAULT_SSL_PORT,
            plaintext_port: DEFAULT_PLAIN_PORT,
            port_matches_protocol: settings.port == expected_port,
            credentials: CertKind::ALL
                .into_iter()
                .map(|kind| credential_status(settings, materialized, kind))
                .collect(),
        }
    }
}

fn credential_status(
    settings: &BrokerSettings,
    materialized: Option<&CertPaths>,
    kind: CertKind,
) -> CredentialStatus {
    let (origin, path) = match settings.cert_source(kind) {
        Some(CertSource::Content(_)) => (
            CredentialOrigin::Content,
            materialized.and_then(|m| m.get(kind)).map(Path::to_path_buf),
        ),
        Some(CertSource::Path(path)) => (CredentialOrigin::Path, Some(path.to_path_buf())),
        None => (CredentialOrigin::None, None),
    };

    let metadata = path.as_deref().and_then(|p| std::fs::metadata(p).ok());

    CredentialStatus {
        credential: kind.id(),
        configured: origin != CredentialOrigin::None,
        origin,
        exists: metadata.as_ref().is_some_and(|m| m.is_file()),
        non_empty: metadata.as_ref().is_some_and(|m| m.is_file() && m.len() > 0),
        path,
    }
}
