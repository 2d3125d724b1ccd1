//! Key provisioning error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while generating or reading key material.
#[derive(Debug, Error)]
pub enum KeyError {
    /// Filesystem failure.
    #[error("key material I/O error at {}: {source}", path.display())]
    Io {
        /// Path being written or read.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// The RNG or the key generator failed.
    #[error("failed to generate a {bits}-bit RSA key: {message}")]
    Generate {
        /// Requested modulus size.
        bits: usize,
        /// Generator message.
        message: String,
    },

    /// DER encoding or decoding failed.
    #[error("key encoding error for {}: {message}", path.display())]
    Encoding {
        /// Key file concerned.
        path: PathBuf,
        /// Encoder/decoder message.
        message: String,
    },
}

impl KeyError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
