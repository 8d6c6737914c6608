//! pem-transport - carry PEM credentials through string-only configuration
//!
//! Platform service bindings hold credentials as flat strings and the
//! application has no persistent filesystem. This crate provides the two
//! halves of getting TLS material across that boundary:
//!
//! - [`encode`] / [`decode`]: a lossless single-line encoding of PEM text that
//!   survives one layer of JSON or shell quoting
//! - [`MaterializedCerts`]: decoded files in a private, per-connection
//!   directory that is removed when the connection ends
//!
//! # Example
//!
//! ```
//! use pem_transport::{encode, CertKind, EncodedCerts, MaterializedCerts};
//!
//! let pem = "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n";
//! let certs = EncodedCerts::new().with(CertKind::CaCert, encode(pem));
//!
//! let scratch = tempfile::tempdir().unwrap();
//! let files = MaterializedCerts::materialize(scratch.path(), &certs).unwrap();
//! let ca_path = files.path(CertKind::CaCert).unwrap();
//! assert_eq!(std::fs::read_to_string(ca_path).unwrap(), pem);
//! ```

#[macro_use]
mod logging;

pub mod codec;
pub mod error;
pub mod kind;
pub mod materialize;

pub use codec::{decode, encode, encode_bytes};
pub use error::{CodecError, MaterializeError};
pub use kind::{CertKind, CertPaths, EncodedCerts};
pub use materialize::{write_private_file, MaterializedCerts};
