//! Error types for pem-transport

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised by the byte-level encoder entry point.
#[derive(Error, Debug)]
pub enum CodecError {
    /// The credential file is not UTF-8 text
    #[error("credential content is not valid UTF-8 text: {0}")]
    NotUtf8(#[from] std::str::Utf8Error),
}

/// Errors raised while writing decoded credentials to disk
#[derive(Error, Debug)]
pub enum MaterializeError {
    /// The filesystem refused to create the private directory or a file in it
    ///
    /// Fatal to the connection attempt that requested the files.
    #[error("Resource unavailable: cannot materialize certificate files at {path}: {source}")]
    ResourceUnavailable {
        /// Directory or file that could not be created or removed
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },
}

impl MaterializeError {
    /// Create a resource-unavailable error for `path`
    pub fn resource(path: impl AsRef<Path>, source: io::Error) -> Self {
        MaterializeError::ResourceUnavailable {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_unavailable_display() {
        let err = MaterializeError::resource(
            "/var/empty/certs",
            io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/var/empty/certs"));
        assert!(msg.contains("permission denied"));
        assert!(msg.starts_with("Resource unavailable"));
    }

    #[test]
    fn test_not_utf8_display() {
        let bytes = [0x2d, 0x2d, 0xff, 0xfe];
        let err: CodecError = std::str::from_utf8(&bytes).unwrap_err().into();
        assert!(err.to_string().contains("not valid UTF-8"));
    }
}
