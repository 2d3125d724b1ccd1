//! Waitable child processes.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use puppet_settings::{LauncherSettings, TerminalSettings};
use puppet_topology::ParticipantIdentity;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::{LaunchCommand, LaunchStrategy, ProcessHandle, ProcessLauncher};
use crate::errors::{LaunchError, TerminationError};

/// Launches each participant as a child the orchestrator owns and can wait on.
#[derive(Clone, Debug, Default)]
pub struct SpawnLauncher {
    terminal: Option<TerminalSettings>,
    logs_dir: Option<PathBuf>,
}

impl SpawnLauncher {
    /// Bare launcher: no terminal, inherited output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap every command in this terminal.
    #[must_use]
    pub fn with_terminal(mut self, terminal: TerminalSettings) -> Self {
        self.terminal = Some(terminal);
        self
    }

    /// Send participant output to `{dir}/{role}-{id}.log`.
    #[must_use]
    pub fn with_logs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.logs_dir = Some(dir.into());
        self
    }

    /// Launcher configured from settings.
    pub fn from_settings(settings: &LauncherSettings) -> Self {
        let mut launcher = Self::new();
        if settings.terminal.enabled {
            launcher = launcher.with_terminal(settings.terminal.clone());
        }
        if let Some(dir) = &settings.logs_dir {
            launcher = launcher.with_logs_dir(dir);
        }
        launcher
    }

    /// Log file path for a participant, when output capture is on.
    pub fn log_path(&self, identity: &ParticipantIdentity) -> Option<PathBuf> {
        self.logs_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}-{}.log", identity.role(), identity.id())))
    }

    fn open_log(
        &self,
        identity: &ParticipantIdentity,
        path: &Path,
    ) -> Result<(Stdio, Stdio), LaunchError> {
        let open = || -> std::io::Result<(Stdio, Stdio)> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let stdout = File::create(path)?;
            let stderr = stdout.try_clone()?;
            Ok((Stdio::from(stdout), Stdio::from(stderr)))
        };
        open().map_err(|source| LaunchError::OutputLog {
            identity: identity.clone(),
            path: path.to_path_buf(),
            source,
        })
    }
}

#[async_trait]
impl ProcessLauncher for SpawnLauncher {
    fn strategy(&self) -> LaunchStrategy {
        LaunchStrategy::Spawn
    }

    async fn launch(&self, command: &LaunchCommand) -> Result<ProcessHandle, LaunchError> {
        let command = match &self.terminal {
            Some(terminal) => command.wrapped_in(terminal),
            None => command.clone(),
        };
        let identity = command.identity();
        command.check_working_dir().await?;

        let mut cmd = Command::new(command.program());
        let _ = cmd
            .args(command.args())
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = command.working_dir() {
            let _ = cmd.current_dir(dir);
        }
        #[cfg(unix)]
        {
            let _ = cmd.process_group(0);
        }

        // A terminal window shows the output itself.
        if self.terminal.is_none() {
            if let Some(path) = self.log_path(identity) {
                let (stdout, stderr) = self.open_log(identity, &path)?;
                let _ = cmd.stdout(stdout).stderr(stderr);
            }
        }

        debug!(%identity, argv = ?command.argv(), "spawning participant");
        let child = cmd.spawn().map_err(|source| LaunchError::SpawnFailed {
            identity: identity.clone(),
            program: command.program().to_string(),
            source,
        })?;

        let handle = ProcessHandle::tracked(identity.clone(), child);
        info!(%identity, pid = ?handle.pid(), "participant launched");
        Ok(handle)
    }

    async fn terminate(&self, handle: ProcessHandle) -> Result<(), TerminationError> {
        let identity = handle.identity().clone();
        let pid = handle.pid();
        let Some(mut child) = handle.into_child() else {
            return Err(TerminationError::NotTracked { identity });
        };

        match child.try_wait() {
            Ok(Some(status)) => {
                debug!(%identity, %status, "participant already exited");
                return Ok(());
            }
            Ok(None) => {}
            Err(error) => warn!(%identity, %error, "could not poll participant"),
        }

        kill_child(&identity, pid, &mut child).await?;
        info!(%identity, ?pid, "participant terminated");
        Ok(())
    }
}

#[cfg(not(windows))]
async fn kill_child(
    identity: &ParticipantIdentity,
    _pid: Option<u32>,
    child: &mut Child,
) -> Result<(), TerminationError> {
    child
        .kill()
        .await
        .map_err(|source| TerminationError::KillFailed {
            identity: identity.clone(),
            source,
        })
}

/// `taskkill /T` takes down the whole tree, which `kill` would not do for a
/// terminal wrapper.
#[cfg(windows)]
async fn kill_child(
    identity: &ParticipantIdentity,
    pid: Option<u32>,
    child: &mut Child,
) -> Result<(), TerminationError> {
    const TASKKILL: &str = "taskkill";

    let Some(pid) = pid else {
        return child
            .kill()
            .await
            .map_err(|source| TerminationError::KillFailed {
                identity: identity.clone(),
                source,
            });
    };

    let status = Command::new(TASKKILL)
        .args(["/PID", &pid.to_string(), "/T", "/F"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map_err(|source| TerminationError::KillFailed {
            identity: identity.clone(),
            source,
        })?;

    if !status.success() {
        // Exited between the poll and the kill.
        if let Ok(Some(_)) = child.try_wait() {
            return Ok(());
        }
        return Err(TerminationError::KillCommandFailed {
            identity: identity.clone(),
            program: TASKKILL.to_string(),
            status,
        });
    }
    let _ = child.wait().await;
    Ok(())
}
