//! Participant identities.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Role of a participant in the cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Consensus node.
    Node,
    /// Workload driver.
    Client,
}

impl Role {
    /// Lowercase name, used in key directories and log file names.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Client => "client",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One participant of a session, unique by `(role, id)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantIdentity {
    id: u32,
    role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    script_path: Option<PathBuf>,
}

impl ParticipantIdentity {
    /// A node identity.
    pub fn node(id: u32) -> Self {
        Self {
            id,
            role: Role::Node,
            script_path: None,
        }
    }

    /// A client identity without a script.
    pub fn client(id: u32) -> Self {
        Self {
            id,
            role: Role::Client,
            script_path: None,
        }
    }

    /// Attach a workload script. Only meaningful for clients.
    #[must_use]
    pub fn with_script(mut self, path: impl Into<PathBuf>) -> Self {
        self.script_path = Some(path.into());
        self
    }

    /// Numeric id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Declared script path, if any.
    pub fn script_path(&self) -> Option<&Path> {
        self.script_path.as_deref()
    }

    /// Whether the participant runs a scripted workload.
    ///
    /// Decided by the presence of a script path alone.
    pub fn is_scripted(&self) -> bool {
        self.script_path.is_some()
    }

    /// Uniqueness key within a session.
    pub fn key(&self) -> (Role, u32) {
        (self.role, self.id)
    }
}

impl fmt::Display for ParticipantIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.role, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_role_and_id() {
        assert_eq!(ParticipantIdentity::node(3).to_string(), "node 3");
        assert_eq!(ParticipantIdentity::client(1).to_string(), "client 1");
    }

    #[test]
    fn scripted_only_with_path() {
        let plain = ParticipantIdentity::client(1);
        assert!(!plain.is_scripted());
        let scripted = plain.clone().with_script("script.txt");
        assert!(scripted.is_scripted());
        assert_eq!(scripted.script_path(), Some(Path::new("script.txt")));
        assert_eq!(plain.key(), scripted.key());
    }

    #[test]
    fn keys_differ_by_role() {
        assert_ne!(
            ParticipantIdentity::node(1).key(),
            ParticipantIdentity::client(1).key()
        );
    }
}
