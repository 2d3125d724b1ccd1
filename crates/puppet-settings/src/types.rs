//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and `#[serde(default)]`,
//! so a settings file only needs the keys it changes. Defaults reproduce the
//! layout of the HDS ledger checkout: node configs under `Service/`, client
//! configs under `Client/`, both started with `mvn exec:java`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root settings type for the orchestrator.
///
/// # JSON Format
///
/// ```json
/// {
///   "scenario": "crash-10s",
///   "launcher": { "strategy": "spawn", "logsDir": "logs" },
///   "build": { "enabled": false }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PuppetSettings {
    /// Name of the scenario to run for this session.
    pub scenario: String,
    /// Extra or overriding scenario definitions, keyed by name.
    pub scenarios: BTreeMap<String, ScenarioFiles>,
    /// Node topology location and workload command.
    pub nodes: RoleSettings,
    /// Client topology location and workload command.
    pub clients: RoleSettings,
    /// One-time build of the workload before fan-out.
    pub build: BuildSettings,
    /// Process launch strategy and terminal wrapping.
    pub launcher: LauncherSettings,
    /// Key material provisioning.
    pub keys: KeySettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for PuppetSettings {
    fn default() -> Self {
        Self {
            scenario: "regular".to_string(),
            scenarios: BTreeMap::new(),
            nodes: RoleSettings::nodes(),
            clients: RoleSettings::clients(),
            build: BuildSettings::default(),
            launcher: LauncherSettings::default(),
            keys: KeySettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// File names of one scenario's topology pair.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScenarioFiles {
    /// Node topology file name, relative to `nodes.configDir`.
    pub nodes: String,
    /// Client topology file name, relative to `clients.configDir`.
    pub clients: String,
}

/// Per-role settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoleSettings {
    /// Directory holding this role's topology files.
    pub config_dir: String,
    /// Command that starts one participant of this role.
    pub workload: WorkloadSettings,
}

impl RoleSettings {
    fn nodes() -> Self {
        Self {
            config_dir: "Service/src/main/resources".to_string(),
            workload: WorkloadSettings::maven("Service"),
        }
    }

    fn clients() -> Self {
        Self {
            config_dir: "Client/src/main/resources".to_string(),
            workload: WorkloadSettings::maven("Client"),
        }
    }
}

impl Default for RoleSettings {
    fn default() -> Self {
        Self::nodes()
    }
}

/// How participant arguments are handed to the workload program.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgStyle {
    /// Each argument is a separate argv entry.
    Positional,
    /// All arguments joined with spaces into one argv entry behind a prefix.
    #[default]
    Joined,
}

/// Command that starts one participant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkloadSettings {
    /// Executable to run.
    pub program: String,
    /// Arguments placed before the participant arguments.
    pub args: Vec<String>,
    /// Working directory for the workload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    /// How participant arguments are appended.
    pub arg_style: ArgStyle,
    /// Prefix of the single argument used by [`ArgStyle::Joined`].
    pub joined_arg_prefix: String,
}

impl WorkloadSettings {
    fn maven(module: &str) -> Self {
        Self {
            program: "mvn".to_string(),
            args: vec!["exec:java".to_string()],
            working_dir: Some(module.to_string()),
            arg_style: ArgStyle::Joined,
            joined_arg_prefix: "-Dexec.args=".to_string(),
        }
    }
}

impl Default for WorkloadSettings {
    fn default() -> Self {
        Self::maven("Service")
    }
}

/// Build step run once before any participant starts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildSettings {
    /// Whether the build runs at all.
    pub enabled: bool,
    /// Build executable.
    pub program: String,
    /// Build arguments.
    pub args: Vec<String>,
    /// Working directory for the build.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            program: "mvn".to_string(),
            args: vec!["clean".to_string(), "install".to_string()],
            working_dir: None,
        }
    }
}

/// Requested launch strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategySetting {
    /// Pick by host platform.
    #[default]
    Auto,
    /// Waitable child processes.
    Spawn,
    /// Fire-and-forget terminal windows, torn down by pattern kill.
    Detached,
}

/// Launcher settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LauncherSettings {
    /// Requested strategy.
    pub strategy: StrategySetting,
    /// Terminal emulator wrapping each participant.
    pub terminal: TerminalSettings,
    /// Directory for per-participant output when no terminal is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs_dir: Option<String>,
}

/// Terminal emulator used to give each participant its own window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TerminalSettings {
    /// Whether participants are wrapped in a terminal at all.
    pub enabled: bool,
    /// Terminal executable.
    pub program: String,
    /// Terminal arguments placed before the workload command.
    pub args: Vec<String>,
    /// Process name pattern matched by the detached teardown sweep.
    pub kill_pattern: String,
}

impl Default for TerminalSettings {
    fn default() -> Self {
        if cfg!(windows) {
            Self {
                enabled: true,
                program: "cmd".to_string(),
                args: ["/c", "start", "/wait"]
                    .into_iter()
                    .map(String::from)
                    .collect(),
                kill_pattern: "cmd".to_string(),
            }
        } else {
            Self {
                enabled: true,
                program: "kitty".to_string(),
                args: vec!["--hold".to_string()],
                kill_pattern: "kitty".to_string(),
            }
        }
    }
}

/// Key material settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeySettings {
    /// Root directory of the per-identity key directories.
    pub dir: String,
    /// Provision missing keys before the build step.
    pub provision_on_start: bool,
    /// RSA modulus size for generated keys.
    pub bits: usize,
}

impl Default for KeySettings {
    fn default() -> Self {
        Self {
            dir: "keypairs".to_string(),
            provision_on_start: true,
            bits: 2048,
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive. `RUST_LOG` takes precedence.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
