//! TLS-specific error types
//!
//! Load failures carry the [`CertKind`] of the offending file so the message
//! tells the operator which of the three credentials the TLS layer rejected.

use std::path::PathBuf;

use pem_transport::CertKind;
use thiserror::Error;

/// TLS-specific errors
#[derive(Error, Debug)]
pub enum TlsError {
    /// A certificate file could not be read or parsed
    #[error("Failed to load {kind} from {path}: {reason}")]
    CertificateLoad {
        /// Which credential the file holds
        kind: CertKind,
        /// Path to the certificate file
        path: PathBuf,
        /// Reason for the failure
        reason: String,
    },

    /// The private key file could not be read or parsed
    #[error("Failed to load {kind} from {path}: {reason}")]
    PrivateKeyLoad {
        /// Which credential the file holds
        kind: CertKind,
        /// Path to the key file
        path: PathBuf,
        /// Reason for the failure
        reason: String,
    },

    /// The client certificate and key were rejected as a pair
    #[error("Client identity rejected: {0}")]
    ClientIdentity(String),

    /// TLS configuration error
    #[error("TLS configuration error: {0}")]
    Config(String),
}

impl TlsError {
    /// Create a certificate load error
    pub fn cert_load(kind: CertKind, path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        TlsError::CertificateLoad {
            kind,
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a private key load error
    pub fn key_load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        TlsError::PrivateKeyLoad {
            kind: CertKind::ClientKey,
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        TlsError::Config(reason.into())
    }

    /// The credential this error is about, if it concerns a single file
    pub fn kind(&self) -> Option<CertKind> {
        match self {
            TlsError::CertificateLoad { kind, .. } | TlsError::PrivateKeyLoad { kind, .. } => {
                Some(*kind)
            }
            TlsError::ClientIdentity(_) | TlsError::Config(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_certificate_load_error_names_the_credential() {
        let err = TlsError::cert_load(CertKind::CaCert, "/tmp/rmq-certs-x/ca-cert.pem", "no certificates found");
        let msg = err.to_string();
        assert!(msg.contains("CA certificate"));
        assert!(msg.contains("/tmp/rmq-certs-x/ca-cert.pem"));
        assert!(msg.contains("no certificates found"));
        assert_eq!(err.kind(), Some(CertKind::CaCert));
    }

    #[test]
    fn test_private_key_load_error_names_the_key() {
        let err = TlsError::key_load("/path/to/key.pem", "invalid format");
        assert!(err.to_string().contains("client private key"));
        assert_eq!(err.kind(), Some(CertKind::ClientKey));
    }

    #[test]
    fn test_config_error_display() {
        let err = TlsError::config("no protocol versions");
        assert_eq!(err.to_string(), "TLS configuration error: no protocol versions");
        assert_eq!(err.kind(), None);
    }
}
