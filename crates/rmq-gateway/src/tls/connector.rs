//! TLS connector for the broker connection
//!
//! Turns a [`TlsClientConfig`] into a `rustls::ClientConfig` using the ring
//! provider. The verification mode decides which server certificate verifier
//! is installed; the client identity is attached only when both halves exist.

use std::sync::Arc;

use pem_transport::CertKind;
use rustls::{ClientConfig, RootCertStore};

use crate::tls::verifier::{ChainOnlyVerification, NoCertificateVerification};
use crate::tls::{load_certificates, load_private_key, TlsClientConfig, TlsError, TlsVerifyMode};

/// TLS connector for establishing TLS connections to the broker
///
/// Wraps `tokio_rustls::TlsConnector` with configuration loading
/// and error handling.
#[derive(Clone)]
pub struct TlsConnector {
    inner: tokio_rustls::TlsConnector,
}

impl TlsConnector {
    /// Create a new TLS connector from configuration
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending credential when the CA file,
    /// the client certificate or the client key cannot be read or parsed.
    pub fn new(config: &TlsClientConfig) -> Result<Self, TlsError> {
        let client_config = build_client_config(config)?;
        Ok(Self {
            inner: tokio_rustls::TlsConnector::from(client_config),
        })
    }

    /// The underlying `tokio_rustls` connector
    pub fn into_inner(self) -> tokio_rustls::TlsConnector {
        self.inner
    }
}

/// Build the rustls client configuration for `config`
pub fn build_client_config(config: &TlsClientConfig) -> Result<Arc<ClientConfig>, TlsError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());

    let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .map_err(|e| TlsError::config(format!("Failed to set protocol versions: {}", e)))?;

    let builder = match config.verify_mode {
        TlsVerifyMode::Verify => builder.with_root_certificates(build_root_store(config)?),
        TlsVerifyMode::VerifyCa => {
            let roots = build_root_store(config)?;
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(ChainOnlyVerification::new(
                    roots,
                    Arc::clone(&provider),
                )))
        }
        TlsVerifyMode::None => builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoCertificateVerification::new(
                Arc::clone(&provider),
            ))),
    };

    if let Some(missing) = config.missing_identity_part() {
        warn!(
            missing = %missing,
            "Incomplete client identity, connecting without client authentication"
        );
    }

    let client_config = match config.client_identity() {
        Some((cert_path, key_path)) => {
            let certs = load_certificates(CertKind::ClientCert, cert_path)?;
            if certs.is_empty() {
                return Err(TlsError::cert_load(
                    CertKind::ClientCert,
                    cert_path,
                    "no certificates found in file",
                ));
            }
            let key = load_private_key(key_path)?;

            builder
                .with_client_auth_cert(certs, key)
                .map_err(|e| TlsError::ClientIdentity(e.to_string()))?
        }
        None => builder.with_no_client_auth(),
    };

    debug!(
        verify_mode = ?config.verify_mode,
        custom_ca = config.ca_path.is_some(),
        client_auth = config.client_identity().is_some(),
        "Built broker TLS configuration"
    );

    Ok(Arc::new(client_config))
}

/// Build the root certificate store from the CA file, or webpki roots
fn build_root_store(config: &TlsClientConfig) -> Result<RootCertStore, TlsError> {
    let mut root_store = RootCertStore::empty();

    match &config.ca_path {
        Some(ca_path) => {
            let certs = load_certificates(CertKind::CaCert, ca_path)?;
            if certs.is_empty() {
                return Err(TlsError::cert_load(
                    CertKind::CaCert,
                    ca_path,
                    "no certificates found in file",
                ));
            }
            for cert in certs {
                root_store
                    .add(cert)
                    .map_err(|e| TlsError::cert_load(CertKind::CaCert, ca_path, e.to_string()))?;
            }
        }
        None => root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned()),
    }

    Ok(root_store)
}
