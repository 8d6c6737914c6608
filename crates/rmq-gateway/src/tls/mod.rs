//! TLS support for the broker connection
//!
//! The gateway is always the TLS client. Certificates arrive either as file
//! paths or as encoded content that was materialized just before connecting;
//! by the time this module sees them they are plain paths.
//!
//! ```text
//! ┌──────────────┐   AMQPS (5671)   ┌──────────┐
//! │ rmq-gateway  │ ──────────────── │ RabbitMQ │
//! │ (TLS client) │                  │          │
//! └──────────────┘                  └──────────┘
//! ```
//!
//! # Verification modes
//!
//! | `ssl_verify` | `ssl_verify_hostname` | mode        |
//! |--------------|-----------------------|-------------|
//! | `false`      | any                   | `none`      |
//! | `true`       | `false`               | `verify_ca` |
//! | `true`       | `true` (default)      | `verify`    |

mod config;
mod connector;
mod error;
mod verifier;

pub use config::{TlsClientConfig, TlsVerifyMode};
pub use connector::{build_client_config, TlsConnector};
pub use error::TlsError;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use pem_transport::CertKind;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};

/// Load certificates from a PEM file
///
/// Reads all certificates from a PEM-encoded file. This supports
/// certificate chains.
pub(crate) fn load_certificates(
    kind: CertKind,
    path: &Path,
) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let file = File::open(path).map_err(|e| TlsError::cert_load(kind, path, e.to_string()))?;

    let mut reader = BufReader::new(file);

    rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TlsError::cert_load(kind, path, e.to_string()))
}

/// Load a private key from a PEM file
///
/// Supports RSA, PKCS8, and EC keys.
pub(crate) fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let file = File::open(path).map_err(|e| TlsError::key_load(path, e.to_string()))?;

    let mut reader = BufReader::new(file);

    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| TlsError::key_load(path, e.to_string()))?
        .ok_or_else(|| TlsError::key_load(path, "no private key found in file"))
}
