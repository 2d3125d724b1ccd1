//! Topology error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::identity::Role;

/// Fatal configuration errors. Raised before any participant is launched.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The topology file does not exist.
    #[error("topology file not found: {}", path.display())]
    NotFound {
        /// Missing file.
        path: PathBuf,
    },

    /// The topology file exists but could not be read.
    #[error("failed to read topology file {}: {source}", path.display())]
    Io {
        /// Unreadable file.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// The topology file is not a valid record array.
    #[error("malformed topology file {}: {source}", path.display())]
    Malformed {
        /// Offending file.
        path: PathBuf,
        /// Parse failure.
        source: serde_json::Error,
    },

    /// Two records of the same role share an id.
    #[error("duplicate {role} id {id} in {}", path.display())]
    DuplicateIdentity {
        /// Role of the duplicated records.
        role: Role,
        /// Duplicated id.
        id: u32,
        /// File containing the duplicate.
        path: PathBuf,
    },

    /// The requested scenario is not in the catalog.
    #[error("unknown scenario {name:?} (known: {})", known.join(", "))]
    UnknownScenario {
        /// Requested name.
        name: String,
        /// Names the catalog does know.
        known: Vec<String>,
    },
}
