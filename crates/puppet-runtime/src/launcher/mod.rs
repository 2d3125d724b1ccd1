//! Launching and terminating participant processes.
//!
//! The controller only talks to [`ProcessLauncher`]. Two implementations
//! exist: [`SpawnLauncher`] keeps a waitable child per participant and kills
//! it directly, [`DetachedLauncher`] opens terminal windows it cannot wait on
//! and tears them down with one pattern sweep.

pub mod command;
pub mod detached;
pub mod handle;
pub mod spawn;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use puppet_settings::{LauncherSettings, StrategySetting};
use tracing::debug;

use crate::errors::{LaunchError, TerminationError};

pub use command::{CommandPlanner, LaunchCommand, SCRIPT_FLAG, participant_args};
pub use detached::DetachedLauncher;
pub use handle::ProcessHandle;
pub use spawn::SpawnLauncher;

/// Starts and stops participant processes.
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Strategy this launcher implements.
    fn strategy(&self) -> LaunchStrategy;

    /// Start one participant. Must not block on the participant's lifetime.
    async fn launch(&self, command: &LaunchCommand) -> Result<ProcessHandle, LaunchError>;

    /// Stop one participant. A process that already exited counts as
    /// terminated.
    async fn terminate(&self, handle: ProcessHandle) -> Result<(), TerminationError>;
}

/// Concrete launch strategy after resolving `auto`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LaunchStrategy {
    /// Waitable children, killed individually.
    Spawn,
    /// Fire-and-forget windows, killed by pattern.
    Detached,
}

impl LaunchStrategy {
    /// Resolve the configured strategy for a host.
    ///
    /// `auto` picks spawn on Windows, where the terminal wrapper stays
    /// waitable, and otherwise detached only when a terminal is enabled.
    pub fn resolve(setting: StrategySetting, terminal_enabled: bool, host: HostPlatform) -> Self {
        match setting {
            StrategySetting::Spawn => Self::Spawn,
            StrategySetting::Detached => Self::Detached,
            StrategySetting::Auto => match host {
                HostPlatform::Windows => Self::Spawn,
                HostPlatform::Unix if terminal_enabled => Self::Detached,
                HostPlatform::Unix => Self::Spawn,
            },
        }
    }
}

impl fmt::Display for LaunchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Spawn => "spawn",
            Self::Detached => "detached",
        })
    }
}

/// Host family, as far as launching is concerned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostPlatform {
    /// Linux, macOS and other Unix hosts.
    Unix,
    /// Windows hosts.
    Windows,
}

impl HostPlatform {
    /// Platform this binary was built for.
    pub const fn current() -> Self {
        if cfg!(windows) { Self::Windows } else { Self::Unix }
    }
}

/// Build the launcher the settings ask for on this host.
pub fn launcher_for(settings: &LauncherSettings) -> Arc<dyn ProcessLauncher> {
    let strategy = LaunchStrategy::resolve(
        settings.strategy,
        settings.terminal.enabled,
        HostPlatform::current(),
    );
    debug!(%strategy, terminal = settings.terminal.enabled, "launcher selected");
    match strategy {
        LaunchStrategy::Spawn => Arc::new(SpawnLauncher::from_settings(settings)),
        LaunchStrategy::Detached => Arc::new(DetachedLauncher::new(settings.terminal.clone())),
    }
}
