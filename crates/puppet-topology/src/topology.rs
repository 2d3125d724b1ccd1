//! The loaded participant set of one scenario.

use std::path::Path;

use tracing::info;

use crate::descriptor::load_identities;
use crate::errors::ConfigError;
use crate::identity::{ParticipantIdentity, Role};
use crate::scenario::ScenarioConfig;

/// Nodes and clients of one scenario, in file order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Topology {
    nodes: Vec<ParticipantIdentity>,
    clients: Vec<ParticipantIdentity>,
}

impl Topology {
    /// Assemble a topology from already-validated identity lists.
    pub fn new(nodes: Vec<ParticipantIdentity>, clients: Vec<ParticipantIdentity>) -> Self {
        Self { nodes, clients }
    }

    /// Ids `1..=nodes` and `1..=clients`, for key generation without a
    /// topology file.
    pub fn numbered(nodes: u32, clients: u32) -> Self {
        Self {
            nodes: (1..=nodes).map(ParticipantIdentity::node).collect(),
            clients: (1..=clients).map(ParticipantIdentity::client).collect(),
        }
    }

    /// Load both topology files of a scenario.
    pub fn load(
        scenario: &ScenarioConfig,
        node_dir: &Path,
        client_dir: &Path,
    ) -> Result<Self, ConfigError> {
        let nodes = load_identities(&node_dir.join(&scenario.node_file), Role::Node)?;
        let clients = load_identities(&client_dir.join(&scenario.client_file), Role::Client)?;
        info!(
            scenario = %scenario.name,
            nodes = nodes.len(),
            clients = clients.len(),
            "topology loaded"
        );
        Ok(Self { nodes, clients })
    }

    /// Node identities.
    pub fn nodes(&self) -> &[ParticipantIdentity] {
        &self.nodes
    }

    /// Client identities.
    pub fn clients(&self) -> &[ParticipantIdentity] {
        &self.clients
    }

    /// Total participant count.
    pub fn len(&self) -> usize {
        self.nodes.len() + self.clients.len()
    }

    /// Whether there is nobody to launch.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Launch order: every node, then every client, each in file order.
    pub fn fan_out_order(&self) -> impl Iterator<Item = &ParticipantIdentity> {
        self.nodes.iter().chain(self.clients.iter())
    }
}
