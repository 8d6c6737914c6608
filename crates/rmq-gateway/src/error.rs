//! Error types for rmq-gateway

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pem_transport::{CertKind, MaterializeError};
use thiserror::Error;

use crate::tls::TlsError;

/// Main error type for the gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    /// I/O error (network, file)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// An optional TLS credential is absent
    ///
    /// Never fatal: the feature it enables is skipped with a warning.
    #[error("Missing credential: {kind}: {reason}")]
    MissingCredential {
        /// The absent credential
        kind: CertKind,
        /// What is skipped because of it
        reason: String,
    },

    /// The TLS layer rejected a certificate or key file
    #[error("TLS configuration error: {0}")]
    TlsConfiguration(#[from] TlsError),

    /// Certificate files could not be written
    #[error(transparent)]
    ResourceUnavailable(#[from] MaterializeError),

    /// No broker connection could be established
    #[error("Not connected to broker: {0}")]
    NotConnected(String),

    /// Broker operation failed
    #[error("Broker error: {0}")]
    Broker(String),

    /// The named queue does not exist
    #[error("Queue not found: {0}")]
    QueueNotFound(String),

    /// Timeout error
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Malformed client request
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Result type alias for GatewayError
pub type Result<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    /// Create a missing-credential error
    pub fn missing_credential(kind: CertKind, reason: impl Into<String>) -> Self {
        GatewayError::MissingCredential {
            kind,
            reason: reason.into(),
        }
    }

    /// HTTP status used when this error reaches a client
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::QueueNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::NotConnected(_)
            | GatewayError::Timeout(_)
            | GatewayError::TlsConfiguration(_)
            | GatewayError::ResourceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Broker(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Io(_)
            | GatewayError::Config(_)
            | GatewayError::MissingCredential { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({
            "status": "error",
            "message": self.to_string(),
        });
        (status, axum::Json(body)).into_response()
    }
}

impl From<serde_yaml::Error> for GatewayError {
    fn from(err: serde_yaml::Error) -> Self {
        GatewayError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Config(err.to_string())
    }
}

impl From<amqprs::error::Error> for GatewayError {
    fn from(err: amqprs::error::Error) -> Self {
        GatewayError::Broker(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credential_display() {
        let err = GatewayError::missing_credential(CertKind::ClientKey, "client authentication disabled");
        let msg = err.to_string();
        assert!(msg.contains("client private key"));
        assert!(msg.contains("client authentication disabled"));
    }

    #[test]
    fn test_tls_error_keeps_the_credential_name() {
        let err: GatewayError =
            TlsError::cert_load(CertKind::ClientCert, "/tmp/client-cert.pem", "bad PEM").into();
        assert!(err.to_string().contains("client certificate"));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_resource_unavailable_is_transparent() {
        let err: GatewayError = MaterializeError::resource(
            "/readonly",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        )
        .into();
        assert!(err.to_string().starts_with("Resource unavailable"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            GatewayError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::QueueNotFound("orders".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            GatewayError::Broker("channel closed".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[tokio::test]
    async fn test_into_response_body() {
        let response = GatewayError::QueueNotFound("orders".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "Queue not found: orders");
    }
}
