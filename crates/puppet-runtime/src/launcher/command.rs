//! Launch commands as data.
//!
//! A [`LaunchCommand`] is a program plus an argv vector; no shell ever parses
//! it. Participant arguments are `[id, own topology file, other topology file]`
//! with `-script` appended for scripted clients.

use std::io;
use std::path::{Path, PathBuf};

use puppet_settings::{ArgStyle, PuppetSettings, TerminalSettings, WorkloadSettings};
use puppet_topology::{ParticipantIdentity, Role, ScenarioConfig, Topology};

use crate::errors::LaunchError;

/// Flag telling a client workload to run its script instead of a prompt.
pub const SCRIPT_FLAG: &str = "-script";

/// Everything needed to start one participant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchCommand {
    identity: ParticipantIdentity,
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl LaunchCommand {
    /// Build a command from its parts.
    pub fn new(
        identity: ParticipantIdentity,
        program: impl Into<String>,
        args: Vec<String>,
        working_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            identity,
            program: program.into(),
            args,
            working_dir,
        }
    }

    /// Participant this command starts.
    pub fn identity(&self) -> &ParticipantIdentity {
        &self.identity
    }

    /// Executable.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments, without the program.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Working directory, if any.
    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    /// Program followed by its arguments.
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }

    /// The same command run inside a terminal emulator:
    /// `terminal.program terminal.args... program args...`.
    #[must_use]
    pub fn wrapped_in(&self, terminal: &TerminalSettings) -> Self {
        let args = terminal
            .args
            .iter()
            .cloned()
            .chain(std::iter::once(self.program.clone()))
            .chain(self.args.iter().cloned())
            .collect();
        Self {
            identity: self.identity.clone(),
            program: terminal.program.clone(),
            args,
            working_dir: self.working_dir.clone(),
        }
    }

    /// Fail with [`LaunchError::WorkingDir`] unless the working directory,
    /// if any, exists and is a directory.
    pub(crate) async fn check_working_dir(&self) -> Result<(), LaunchError> {
        let Some(dir) = self.working_dir() else {
            return Ok(());
        };
        ensure_dir(dir).await.map_err(|source| LaunchError::WorkingDir {
            identity: self.identity.clone(),
            path: dir.to_path_buf(),
            source,
        })
    }
}

/// Ok if `path` is an existing directory.
pub(crate) async fn ensure_dir(path: &Path) -> io::Result<()> {
    let meta = tokio::fs::metadata(path).await?;
    if meta.is_dir() {
        Ok(())
    } else {
        Err(io::Error::new(io::ErrorKind::NotADirectory, "not a directory"))
    }
}

/// Arguments the workload itself expects.
///
/// Each role reads its own topology file first: nodes get
/// `[id, node_file, client_file]`, clients `[id, client_file, node_file]`.
pub fn participant_args(identity: &ParticipantIdentity, scenario: &ScenarioConfig) -> Vec<String> {
    let (own, other) = match identity.role() {
        Role::Node => (&scenario.node_file, &scenario.client_file),
        Role::Client => (&scenario.client_file, &scenario.node_file),
    };
    let mut args = vec![identity.id().to_string(), own.clone(), other.clone()];
    if identity.role() == Role::Client && identity.is_scripted() {
        args.push(SCRIPT_FLAG.to_string());
    }
    args
}

/// Turns identities into launch commands for one scenario.
#[derive(Clone, Debug)]
pub struct CommandPlanner {
    scenario: ScenarioConfig,
    nodes: WorkloadSettings,
    clients: WorkloadSettings,
}

impl CommandPlanner {
    /// Planner with explicit per-role workloads.
    pub fn new(scenario: ScenarioConfig, nodes: WorkloadSettings, clients: WorkloadSettings) -> Self {
        Self {
            scenario,
            nodes,
            clients,
        }
    }

    /// Planner using the workloads from settings.
    pub fn from_settings(scenario: ScenarioConfig, settings: &PuppetSettings) -> Self {
        Self::new(
            scenario,
            settings.nodes.workload.clone(),
            settings.clients.workload.clone(),
        )
    }

    /// Scenario being planned.
    pub fn scenario(&self) -> &ScenarioConfig {
        &self.scenario
    }

    /// Command for one participant.
    pub fn command_for(&self, identity: &ParticipantIdentity) -> LaunchCommand {
        let workload = match identity.role() {
            Role::Node => &self.nodes,
            Role::Client => &self.clients,
        };
        let participant = participant_args(identity, &self.scenario);

        let mut args = workload.args.clone();
        match workload.arg_style {
            ArgStyle::Positional => args.extend(participant),
            ArgStyle::Joined => args.push(format!(
                "{}{}",
                workload.joined_arg_prefix,
                participant.join(" ")
            )),
        }

        LaunchCommand::new(
            identity.clone(),
            workload.program.clone(),
            args,
            workload
                .working_dir
                .as_deref()
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from),
        )
    }

    /// Commands for the whole topology in fan-out order.
    pub fn plan(&self, topology: &Topology) -> Vec<LaunchCommand> {
        topology
            .fan_out_order()
            .map(|identity| self.command_for(identity))
            .collect()
    }
}
