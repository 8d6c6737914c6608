//! Provisioning: PEM files to a credentials record
//!
//! The encoded content is embedded into the JSON record *textually*: the
//! `\n` and `\"` escapes produced by the encoder double as JSON string
//! escapes, so the platform's JSON parse is the only unescaping layer and the
//! binding ends up holding the original PEM text. Content with any other
//! backslash sequence is embedded as an ordinary JSON string instead; the
//! decoder accepts both forms.

use std::path::Path;

use clap::ValueEnum;
use pem_transport::{encode_bytes, CertKind, CertPaths, EncodedCerts};
use serde::Serialize;
use serde_json::value::RawValue;
use zeroize::Zeroizing;

use crate::config::{DEFAULT_PLAIN_PORT, DEFAULT_SSL_PORT};
use crate::error::{GatewayError, Result};

/// Output format of the `provision` command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Credentials record for a user-provided service
    #[default]
    Json,
    /// `export RMQ_*_CONTENT="..."` lines for a shell
    Env,
}

/// Connection fields of the record to provision
#[derive(Clone)]
pub struct ProvisionRequest {
    /// Broker host
    pub hostname: String,
    /// Broker port; defaults to the conventional port for `ssl_enabled`
    pub port: Option<u16>,
    /// AMQP user
    pub username: String,
    /// AMQP password
    pub password: Zeroizing<String>,
    /// Virtual host
    pub vhost: String,
    /// Connect over TLS
    pub ssl_enabled: bool,
    /// Verify the broker certificate chain
    pub ssl_verify: bool,
    /// Verify the broker host name
    pub ssl_verify_hostname: bool,
}

impl ProvisionRequest {
    fn port(&self) -> u16 {
        self.port.unwrap_or(if self.ssl_enabled {
            DEFAULT_SSL_PORT
        } else {
            DEFAULT_PLAIN_PORT
        })
    }
}

#[derive(Serialize)]
struct CredentialsRecord<'a> {
    hostname: &'a str,
    port: u16,
    username: &'a str,
    password: &'a str,
    vhost: &'a str,
    ssl_enabled: bool,
    ssl_verify: bool,
    ssl_verify_hostname: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    ca_cert_content: Option<Box<RawValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_cert_content: Option<Box<RawValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_key_content: Option<Box<RawValue>>,
}

/// Read and encode every credential file in `files`
pub fn read_cert_files(files: &CertPaths) -> Result<EncodedCerts> {
    let mut certs = EncodedCerts::new();
    for (kind, path) in files.iter() {
        certs.set(kind, read_one(kind, path)?);
        debug!(credential = %kind, path = %path.display(), "Encoded credential file");
    }
    Ok(certs)
}

fn read_one(kind: CertKind, path: &Path) -> Result<String> {
    let bytes = Zeroizing::new(std::fs::read(path).map_err(|e| {
        GatewayError::Config(format!("cannot read {} from {}: {}", kind, path.display(), e))
    })?);
    let encoded = encode_bytes(&bytes)
        .map_err(|e| GatewayError::Config(format!("{} at {}: {}", kind, path.display(), e)))?;
    if encoded.is_empty() {
        return Err(GatewayError::Config(format!(
            "{} at {} is empty",
            kind,
            path.display()
        )));
    }
    Ok(encoded)
}

/// Render the credentials record as pretty-printed JSON
pub fn render_json(request: &ProvisionRequest, certs: &EncodedCerts) -> Result<String> {
    let embed = |kind: CertKind| certs.get(kind).map(embed_encoded).transpose();

    let record = CredentialsRecord {
        hostname: &request.hostname,
        port: request.port(),
        username: &request.username,
        password: &request.password,
        vhost: &request.vhost,
        ssl_enabled: request.ssl_enabled,
        ssl_verify: request.ssl_verify,
        ssl_verify_hostname: request.ssl_verify_hostname,
        ca_cert_content: embed(CertKind::CaCert)?,
        client_cert_content: embed(CertKind::ClientCert)?,
        client_key_content: embed(CertKind::ClientKey)?,
    };

    Ok(serde_json::to_string_pretty(&record)?)
}

/// Render `export` lines for every present credential
pub fn render_env(certs: &EncodedCerts) -> String {
    certs
        .kinds()
        .filter_map(|kind| {
            certs
                .get(kind)
                .map(|encoded| format!("export {}=\"{}\"\n", kind.content_env(), shell_escape(encoded)))
        })
        .collect()
}

/// Embed encoded content as a JSON string literal without re-escaping it
fn embed_encoded(encoded: &str) -> Result<Box<RawValue>> {
    if has_only_transport_escapes(encoded) {
        if let Ok(raw) = RawValue::from_string(format!("\"{}\"", encoded)) {
            return Ok(raw);
        }
    }
    debug!("Credential content is not a plain JSON literal, embedding it escaped");
    Ok(serde_json::value::to_raw_value(encoded)?)
}

/// Whether every backslash in `encoded` starts a `\n` or `\"` escape
fn has_only_transport_escapes(encoded: &str) -> bool {
    let mut chars = encoded.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' && !matches!(chars.next(), Some('n') | Some('"')) {
            return false;
        }
    }
    true
}

/// Escape the characters a double-quoted shell word would expand
fn shell_escape(encoded: &str) -> String {
    let mut escaped = String::with_capacity(encoded.len());
    for ch in encoded.chars() {
        if matches!(ch, '$' | '`') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
