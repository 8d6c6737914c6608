//! The three credentials that travel through a service binding

use std::fmt;
use std::path::{Path, PathBuf};

use zeroize::Zeroizing;

/// One of the TLS credentials a broker connection can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CertKind {
    /// CA certificate used to verify the broker
    CaCert,
    /// Client certificate presented to the broker
    ClientCert,
    /// Private key matching the client certificate
    ClientKey,
}

impl CertKind {
    /// All kinds, in materialization order
    pub const ALL: [CertKind; 3] = [CertKind::CaCert, CertKind::ClientCert, CertKind::ClientKey];

    /// Credentials-record field holding the encoded content
    pub fn content_field(self) -> &'static str {
        match self {
            CertKind::CaCert => "ca_cert_content",
            CertKind::ClientCert => "client_cert_content",
            CertKind::ClientKey => "client_key_content",
        }
    }

    /// Credentials-record field holding a filesystem path
    pub fn path_field(self) -> &'static str {
        match self {
            CertKind::CaCert => "ca_cert_path",
            CertKind::ClientCert => "client_cert_path",
            CertKind::ClientKey => "client_key_path",
        }
    }

    /// Environment variable holding the encoded content
    pub fn content_env(self) -> &'static str {
        match self {
            CertKind::CaCert => "RMQ_CA_CERT_CONTENT",
            CertKind::ClientCert => "RMQ_CLIENT_CERT_CONTENT",
            CertKind::ClientKey => "RMQ_CLIENT_KEY_CONTENT",
        }
    }

    /// Environment variable holding a filesystem path
    pub fn path_env(self) -> &'static str {
        match self {
            CertKind::CaCert => "RMQ_CA_CERT_PATH",
            CertKind::ClientCert => "RMQ_CLIENT_CERT_PATH",
            CertKind::ClientKey => "RMQ_CLIENT_KEY_PATH",
        }
    }

    /// File name used inside a materialized directory
    pub fn file_name(self) -> &'static str {
        match self {
            CertKind::CaCert => "ca-cert.pem",
            CertKind::ClientCert => "client-cert.pem",
            CertKind::ClientKey => "client-key.pem",
        }
    }

    /// Whether the material is secret (never logged, never group/world readable)
    pub fn is_secret(self) -> bool {
        matches!(self, CertKind::ClientKey)
    }

    /// Short identifier used in reports and diagnostics
    pub fn id(self) -> &'static str {
        match self {
            CertKind::CaCert => "ca_cert",
            CertKind::ClientCert => "client_cert",
            CertKind::ClientKey => "client_key",
        }
    }
}

impl fmt::Display for CertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CertKind::CaCert => "CA certificate",
            CertKind::ClientCert => "client certificate",
            CertKind::ClientKey => "client private key",
        };
        f.write_str(label)
    }
}

/// Zero to three encoded credential strings, each optional and independent.
///
/// The client key is held in [`Zeroizing`] memory. `Debug` output shows only
/// which credentials are present.
#[derive(Clone, Default)]
pub struct EncodedCerts {
    ca_cert: Option<String>,
    client_cert: Option<String>,
    client_key: Option<Zeroizing<String>>,
}

impl EncodedCerts {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one credential (builder pattern)
    pub fn with(mut self, kind: CertKind, encoded: impl Into<String>) -> Self {
        self.set(kind, encoded);
        self
    }

    /// Set one credential, replacing any previous value
    pub fn set(&mut self, kind: CertKind, encoded: impl Into<String>) {
        let encoded = encoded.into();
        match kind {
            CertKind::CaCert => self.ca_cert = Some(encoded),
            CertKind::ClientCert => self.client_cert = Some(encoded),
            CertKind::ClientKey => self.client_key = Some(Zeroizing::new(encoded)),
        }
    }

    /// Encoded content for `kind`, if present
    pub fn get(&self, kind: CertKind) -> Option<&str> {
        match kind {
            CertKind::CaCert => self.ca_cert.as_deref(),
            CertKind::ClientCert => self.client_cert.as_deref(),
            CertKind::ClientKey => self.client_key.as_ref().map(|key| key.as_str()),
        }
    }

    /// Whether `kind` is present
    pub fn contains(&self, kind: CertKind) -> bool {
        self.get(kind).is_some()
    }

    /// Whether no credential is present
    pub fn is_empty(&self) -> bool {
        CertKind::ALL.iter().all(|kind| !self.contains(*kind))
    }

    /// Kinds that are present, in materialization order
    pub fn kinds(&self) -> impl Iterator<Item = CertKind> + '_ {
        CertKind::ALL.into_iter().filter(|kind| self.contains(*kind))
    }
}

impl fmt::Debug for EncodedCerts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedCerts")
            .field("ca_cert", &self.ca_cert.is_some())
            .field("client_cert", &self.client_cert.is_some())
            .field("client_key", &self.client_key.is_some())
            .finish()
    }
}

/// Filesystem paths of credentials, one optional path per [`CertKind`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertPaths {
    ca_cert: Option<PathBuf>,
    client_cert: Option<PathBuf>,
    client_key: Option<PathBuf>,
}

impl CertPaths {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Path for `kind`, if present
    pub fn get(&self, kind: CertKind) -> Option<&Path> {
        match kind {
            CertKind::CaCert => self.ca_cert.as_deref(),
            CertKind::ClientCert => self.client_cert.as_deref(),
            CertKind::ClientKey => self.client_key.as_deref(),
        }
    }

    /// Set the path for `kind`
    pub fn set(&mut self, kind: CertKind, path: impl Into<PathBuf>) {
        let path = Some(path.into());
        match kind {
            CertKind::CaCert => self.ca_cert = path,
            CertKind::ClientCert => self.client_cert = path,
            CertKind::ClientKey => self.client_key = path,
        }
    }

    /// Whether no path is present
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Present `(kind, path)` pairs, in materialization order
    pub fn iter(&self) -> impl Iterator<Item = (CertKind, &Path)> + '_ {
        CertKind::ALL
            .into_iter()
            .filter_map(|kind| self.get(kind).map(|path| (kind, path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_and_env_names() {
        assert_eq!(CertKind::CaCert.content_field(), "ca_cert_content");
        assert_eq!(CertKind::ClientKey.path_field(), "client_key_path");
        assert_eq!(CertKind::ClientCert.content_env(), "RMQ_CLIENT_CERT_CONTENT");
        assert_eq!(CertKind::CaCert.path_env(), "RMQ_CA_CERT_PATH");
    }

    #[test]
    fn test_only_the_key_is_secret() {
        assert!(CertKind::ClientKey.is_secret());
        assert!(!CertKind::ClientCert.is_secret());
        assert!(!CertKind::CaCert.is_secret());
    }

    #[test]
    fn test_encoded_certs_presence() {
        let certs = EncodedCerts::new()
            .with(CertKind::CaCert, "ca")
            .with(CertKind::ClientKey, "key");
        assert!(!certs.is_empty());
        assert_eq!(certs.get(CertKind::CaCert), Some("ca"));
        assert_eq!(certs.get(CertKind::ClientCert), None);
        assert_eq!(
            certs.kinds().collect::<Vec<_>>(),
            vec![CertKind::CaCert, CertKind::ClientKey]
        );
        assert!(EncodedCerts::new().is_empty());
    }

    #[test]
    fn test_encoded_certs_debug_redacts_content() {
        let certs = EncodedCerts::new().with(CertKind::ClientKey, "super-secret-key");
        let debug = format!("{:?}", certs);
        assert!(!debug.contains("super-secret-key"));
        assert!(debug.contains("client_key: true"));
    }

    #[test]
    fn test_cert_paths_iter() {
        let mut paths = CertPaths::new();
        assert!(paths.is_empty());
        paths.set(CertKind::ClientCert, "/tmp/client.pem");
        let collected: Vec<_> = paths.iter().collect();
        assert_eq!(
            collected,
            vec![(CertKind::ClientCert, Path::new("/tmp/client.pem"))]
        );
    }
}
