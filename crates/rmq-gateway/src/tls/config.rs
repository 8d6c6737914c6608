//! TLS configuration types for the broker connection

use std::path::{Path, PathBuf};

use pem_transport::{CertKind, CertPaths};
use serde::{Deserialize, Serialize};

/// Client-side TLS configuration (gateway connecting to the broker)
///
/// Built per connection attempt from the resolved broker settings, after any
/// content credentials have been materialized to disk.
#[derive(Debug, Clone, Default)]
pub struct TlsClientConfig {
    /// Connect over TLS
    pub enabled: bool,

    /// Certificate verification mode
    pub verify_mode: TlsVerifyMode,

    /// CA certificate bundle in PEM format
    ///
    /// If not specified, the webpki root store is used.
    pub ca_path: Option<PathBuf>,

    /// Client certificate in PEM format
    pub client_cert_path: Option<PathBuf>,

    /// Client private key in PEM format
    pub client_key_path: Option<PathBuf>,
}

/// Certificate verification mode for client-side TLS
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TlsVerifyMode {
    /// Full verification: CA chain + hostname match
    #[default]
    Verify,

    /// Verify CA chain only, skip hostname check
    ///
    /// Useful when the broker is reached by IP address or through an alias
    /// that is not in its certificate.
    #[serde(rename = "verify_ca")]
    VerifyCa,

    /// No verification (INSECURE - development only!)
    ///
    /// Any certificate is accepted, including self-signed and expired.
    None,
}

impl TlsVerifyMode {
    /// Map the credentials-record flags to a verification mode
    ///
    /// `ssl_verify = false` disables chain and hostname checks together.
    pub fn from_flags(verify: bool, verify_hostname: bool) -> Self {
        match (verify, verify_hostname) {
            (false, _) => TlsVerifyMode::None,
            (true, false) => TlsVerifyMode::VerifyCa,
            (true, true) => TlsVerifyMode::Verify,
        }
    }
}

impl TlsClientConfig {
    /// Build an enabled configuration pointing at `paths`
    pub fn from_paths(verify_mode: TlsVerifyMode, paths: &CertPaths) -> Self {
        Self {
            enabled: true,
            verify_mode,
            ca_path: paths.get(CertKind::CaCert).map(Path::to_path_buf),
            client_cert_path: paths.get(CertKind::ClientCert).map(Path::to_path_buf),
            client_key_path: paths.get(CertKind::ClientKey).map(Path::to_path_buf),
        }
    }

    /// Client certificate and key, when both are configured
    pub fn client_identity(&self) -> Option<(&Path, &Path)> {
        match (&self.client_cert_path, &self.client_key_path) {
            (Some(cert), Some(key)) => Some((cert, key)),
            _ => None,
        }
    }

    /// The half of the client identity that is missing, if exactly one half
    /// is configured
    pub fn missing_identity_part(&self) -> Option<CertKind> {
        match (&self.client_cert_path, &self.client_key_path) {
            (Some(_), None) => Some(CertKind::ClientKey),
            (None, Some(_)) => Some(CertKind::ClientCert),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tls_client_config_defaults() {
        let config = TlsClientConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.verify_mode, TlsVerifyMode::Verify);
        assert!(config.ca_path.is_none());
        assert!(config.client_identity().is_none());
        assert!(config.missing_identity_part().is_none());
    }

    #[test]
    fn test_verify_mode_report_names() {
        assert_eq!(serde_json::to_value(TlsVerifyMode::Verify).unwrap(), "verify");
        assert_eq!(serde_json::to_value(TlsVerifyMode::VerifyCa).unwrap(), "verify_ca");
        assert_eq!(serde_json::to_value(TlsVerifyMode::None).unwrap(), "none");

        let parsed: TlsVerifyMode = serde_json::from_str("\"verify_ca\"").unwrap();
        assert_eq!(parsed, TlsVerifyMode::VerifyCa);
    }

    #[test]
    fn test_verify_mode_from_flags() {
        assert_eq!(TlsVerifyMode::from_flags(false, true), TlsVerifyMode::None);
        assert_eq!(TlsVerifyMode::from_flags(false, false), TlsVerifyMode::None);
        assert_eq!(TlsVerifyMode::from_flags(true, false), TlsVerifyMode::VerifyCa);
        assert_eq!(TlsVerifyMode::from_flags(true, true), TlsVerifyMode::Verify);
    }

    #[test]
    fn test_from_paths() {
        let mut paths = CertPaths::new();
        paths.set(CertKind::CaCert, "/certs/ca.pem");
        paths.set(CertKind::ClientCert, "/certs/client.pem");

        let config = TlsClientConfig::from_paths(TlsVerifyMode::VerifyCa, &paths);
        assert!(config.enabled);
        assert_eq!(config.ca_path, Some(PathBuf::from("/certs/ca.pem")));
        assert!(config.client_identity().is_none());
        assert_eq!(config.missing_identity_part(), Some(CertKind::ClientKey));
    }

    #[test]
    fn test_complete_client_identity() {
        let config = TlsClientConfig {
            enabled: true,
            client_cert_path: Some(PathBuf::from("/certs/client-cert.pem")),
            client_key_path: Some(PathBuf::from("/certs/client-key.pem")),
            ..Default::default()
        };
        let (cert, key) = config.client_identity().unwrap();
        assert_eq!(cert, Path::new("/certs/client-cert.pem"));
        assert_eq!(key, Path::new("/certs/client-key.pem"));
        assert!(config.missing_identity_part().is_none());
    }
}
