//! Scenarios: named pairs of node and client topology files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// The topology pair chosen for one session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Scenario name.
    pub name: String,
    /// Node topology file name.
    pub node_file: String,
    /// Client topology file name.
    pub client_file: String,
}

impl ScenarioConfig {
    /// Build a scenario from its parts.
    pub fn new(
        name: impl Into<String>,
        node_file: impl Into<String>,
        client_file: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            node_file: node_file.into(),
            client_file: client_file.into(),
        }
    }
}

const REGULAR_CLIENTS: &str = "regular-client-config.json";

/// Node-side fault scenarios shipped with the ledger, all run against
/// regular clients.
const NODE_SCENARIOS: &[(&str, &str)] = &[
    ("regular", "regular-node-config.json"),
    ("crash-0s", "crash-node-config-0s.json"),
    ("crash-10s", "crash-node-config-10s.json"),
    ("leader-impersonation", "leader-impersonation-node-config.json"),
    (
        "non-leader-start-consensus",
        "non-leader-start-consensus-node-config.json",
    ),
    ("corrupt-broadcasting", "corrupt-broadcasting-node-config.json"),
    ("corrupt-leader", "corrupt-leader-node-config.json"),
    ("quiet-leader", "quiet-leader-node-config.json"),
    ("bully-leader", "bully-leader-node-config.json"),
    ("robber-leader", "robber-leader-node-config.json"),
];

/// Named scenarios available to a session.
#[derive(Clone, Debug, Default)]
pub struct ScenarioCatalog {
    scenarios: BTreeMap<String, ScenarioConfig>,
}

impl ScenarioCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// The scenarios shipped with the ledger.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        for (name, node_file) in NODE_SCENARIOS {
            catalog.insert(ScenarioConfig::new(*name, *node_file, REGULAR_CLIENTS));
        }
        catalog.insert(ScenarioConfig::new(
            "robber-client",
            "regular-node-config.json",
            "robber-client-config.json",
        ));
        catalog
    }

    /// Add a scenario, replacing any with the same name.
    pub fn insert(&mut self, scenario: ScenarioConfig) {
        let _ = self.scenarios.insert(scenario.name.clone(), scenario);
    }

    /// Scenario names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.scenarios.keys().cloned().collect()
    }

    /// Number of scenarios.
    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    /// Look up the scenario for this session.
    pub fn select(&self, name: &str) -> Result<ScenarioConfig, ConfigError> {
        self.scenarios
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownScenario {
                name: name.to_string(),
                known: self.names(),
            })
    }
}
