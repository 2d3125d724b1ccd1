//! On-disk topology descriptors.
//!
//! A descriptor is a JSON array of participant records. The orchestrator only
//! reads `id` and, for clients, `scriptPath`; every other field belongs to the
//! participant workload and is carried through untouched so a descriptor can
//! be rewritten without loss.
//!
//! ```json
//! [
//!   { "id": "1", "hostname": "localhost", "port": 3001, "behavior": "REGULAR" },
//!   { "id": 2, "hostname": "localhost", "port": 3002, "scriptPath": "script.txt" }
//! ]
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::ConfigError;
use crate::identity::{ParticipantIdentity, Role};

/// One record of a topology file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantRecord {
    /// Participant id. Accepts a JSON number or a numeric string.
    #[serde(deserialize_with = "deserialize_id")]
    pub id: u32,
    /// Workload script; its presence turns a client into a scripted client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_path: Option<String>,
    /// Fields owned by the participant workload.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ParticipantRecord {
    /// Identity for this record under the given role.
    ///
    /// A script path on a node record is ignored.
    pub fn identity(&self, role: Role) -> ParticipantIdentity {
        match role {
            Role::Node => {
                if self.script_path.is_some() {
                    debug!(id = self.id, "ignoring scriptPath on node record");
                }
                ParticipantIdentity::node(self.id)
            }
            Role::Client => {
                let identity = ParticipantIdentity::client(self.id);
                match &self.script_path {
                    Some(path) => identity.with_script(path),
                    None => identity,
                }
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Number(u32),
    Text(String),
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    match IdRepr::deserialize(deserializer)? {
        IdRepr::Number(n) => Ok(n),
        IdRepr::Text(s) => s.trim().parse().map_err(|_| {
            serde::de::Error::custom(format!("id {s:?} is not a non-negative integer"))
        }),
    }
}

/// Parse a descriptor from JSON text.
pub fn parse_records(json: &str) -> Result<Vec<ParticipantRecord>, serde_json::Error> {
    serde_json::from_str(json)
}

/// Serialize records back to pretty JSON.
pub fn render_records(records: &[ParticipantRecord]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(records)
}

/// Read a descriptor file.
pub fn read_records(path: &Path) -> Result<Vec<ParticipantRecord>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    parse_records(&content).map_err(|source| ConfigError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a descriptor file and turn it into identities of one role.
///
/// Order is preserved. Duplicate ids are rejected.
pub fn load_identities(path: &Path, role: Role) -> Result<Vec<ParticipantIdentity>, ConfigError> {
    let records = read_records(path)?;
    identities_from_records(&records, role, path)
}

/// Convert parsed records to identities, rejecting duplicate ids.
///
/// `origin` is only used in error messages.
pub fn identities_from_records(
    records: &[ParticipantRecord],
    role: Role,
    origin: &Path,
) -> Result<Vec<ParticipantIdentity>, ConfigError> {
    let mut seen = HashSet::with_capacity(records.len());
    let mut identities = Vec::with_capacity(records.len());
    for record in records {
        if !seen.insert(record.id) {
            return Err(ConfigError::DuplicateIdentity {
                role,
                id: record.id,
                path: PathBuf::from(origin),
            });
        }
        identities.push(record.identity(role));
    }
    Ok(identities)
}
