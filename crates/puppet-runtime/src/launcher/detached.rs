//! Fire-and-forget terminal windows.
//!
//! Each participant gets its own terminal window, which keeps running after
//! the orchestrator lets go of it. Nothing is waited on; teardown is a single
//! pattern kill of the terminal class, so it also takes down windows that
//! belong to other sessions of the same terminal.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use puppet_settings::TerminalSettings;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{LaunchCommand, LaunchStrategy, ProcessHandle, ProcessLauncher};
use crate::errors::{LaunchError, TerminationError};

/// Exit code of the sweep command when no process matched.
#[cfg(not(windows))]
const NOTHING_MATCHED: i32 = 1;
#[cfg(windows)]
const NOTHING_MATCHED: i32 = 128;

/// Kill command for every process of a terminal class.
#[cfg(not(windows))]
pub fn default_sweep(pattern: &str) -> Vec<String> {
    ["pkill", "-KILL", "-i", pattern]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Kill command for every process of a terminal class.
#[cfg(windows)]
pub fn default_sweep(pattern: &str) -> Vec<String> {
    let image = if pattern.ends_with(".exe") {
        pattern.to_string()
    } else {
        format!("{pattern}.exe")
    };
    ["taskkill", "/F", "/T", "/IM", image.as_str()]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Launches participants in terminal windows it does not track.
#[derive(Debug)]
pub struct DetachedLauncher {
    terminal: TerminalSettings,
    sweep: Vec<String>,
    swept: AtomicBool,
}

impl DetachedLauncher {
    /// Launcher for a terminal, swept by its kill pattern.
    pub fn new(terminal: TerminalSettings) -> Self {
        let sweep = default_sweep(&terminal.kill_pattern);
        Self {
            terminal,
            sweep,
            swept: AtomicBool::new(false),
        }
    }

    /// Replace the teardown sweep command.
    #[must_use]
    pub fn with_sweep(mut self, sweep: Vec<String>) -> Self {
        self.sweep = sweep;
        self
    }

    /// Terminal every participant is wrapped in.
    pub fn terminal(&self) -> &TerminalSettings {
        &self.terminal
    }

    async fn run_sweep(&self, handle: &ProcessHandle) -> Result<(), TerminationError> {
        let identity = handle.identity();
        let Some((program, args)) = self.sweep.split_first() else {
            warn!(%identity, "no sweep command configured; leaving terminals open");
            return Ok(());
        };

        debug!(sweep = ?self.sweep, "sweeping terminal windows");
        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|source| TerminationError::KillFailed {
                identity: identity.clone(),
                source,
            })?;

        match status.code() {
            Some(0) => {
                info!(pattern = %self.terminal.kill_pattern, "terminal windows killed");
                Ok(())
            }
            Some(NOTHING_MATCHED) => {
                debug!(pattern = %self.terminal.kill_pattern, "no terminal windows left");
                Ok(())
            }
            _ => Err(TerminationError::KillCommandFailed {
                identity: identity.clone(),
                program: program.clone(),
                status,
            }),
        }
    }
}

#[async_trait]
impl ProcessLauncher for DetachedLauncher {
    fn strategy(&self) -> LaunchStrategy {
        LaunchStrategy::Detached
    }

    async fn launch(&self, command: &LaunchCommand) -> Result<ProcessHandle, LaunchError> {
        let wrapped = command.wrapped_in(&self.terminal);
        let identity = wrapped.identity();
        wrapped.check_working_dir().await?;

        let mut cmd = Command::new(wrapped.program());
        let _ = cmd
            .args(wrapped.args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(dir) = wrapped.working_dir() {
            let _ = cmd.current_dir(dir);
        }
        #[cfg(unix)]
        {
            let _ = cmd.process_group(0);
        }

        debug!(%identity, argv = ?wrapped.argv(), "opening terminal");
        let child = cmd.spawn().map_err(|source| LaunchError::SpawnFailed {
            identity: identity.clone(),
            program: wrapped.program().to_string(),
            source,
        })?;

        // Dropping the child leaves the window running; the runtime reaps it.
        let handle = ProcessHandle::detached(identity.clone(), child.id());
        drop(child);
        info!(%identity, pid = ?handle.pid(), "participant launched in terminal");
        Ok(handle)
    }

    async fn terminate(&self, handle: ProcessHandle) -> Result<(), TerminationError> {
        if self.swept.swap(true, Ordering::SeqCst) {
            debug!(identity = %handle.identity(), "terminals already swept");
            return Ok(());
        }
        let result = self.run_sweep(&handle).await;
        if result.is_err() {
            self.swept.store(false, Ordering::SeqCst);
        }
        result
    }
}

#[cfg(all(test, unix))]
mod tests {
    use assert_matches::assert_matches;
    use puppet_topology::ParticipantIdentity;

    use super::*;

    fn terminal(program: &str) -> TerminalSettings {
        TerminalSettings {
            enabled: true,
            program: program.into(),
            args: Vec::new(),
            kill_pattern: "puppet-test-terminal".into(),
        }
    }

    fn shell(script: &str) -> Vec<String> {
        vec!["sh".into(), "-c".into(), script.into()]
    }

    fn command() -> LaunchCommand {
        LaunchCommand::new(ParticipantIdentity::node(1), "workload", Vec::new(), None)
    }

    #[test]
    fn default_sweep_is_case_insensitive_pkill() {
        assert_eq!(default_sweep("kitty"), vec!["pkill", "-KILL", "-i", "kitty"]);
        let launcher = DetachedLauncher::new(terminal("kitty"));
        assert_eq!(launcher.sweep, default_sweep("puppet-test-terminal"));
    }

    #[tokio::test]
    async fn launch_returns_untracked_handle() {
        let launcher = DetachedLauncher::new(terminal("true"));
        let handle = launcher.launch(&command()).await.unwrap();
        assert!(!handle.is_waitable());
        assert!(handle.pid().is_some());
        assert_eq!(handle.identity(), &ParticipantIdentity::node(1));
    }

    #[tokio::test]
    async fn missing_terminal_is_spawn_failure() {
        let launcher = DetachedLauncher::new(terminal("no-such-terminal-puppet"));
        assert_matches!(
            launcher.launch(&command()).await,
            Err(LaunchError::SpawnFailed { program, .. }) if program == "no-such-terminal-puppet"
        );
    }

    #[tokio::test]
    async fn nothing_matched_counts_as_success() {
        let launcher = DetachedLauncher::new(terminal("true")).with_sweep(shell("exit 1"));
        let handle = ProcessHandle::detached(ParticipantIdentity::node(1), None);
        launcher.terminate(handle).await.unwrap();
    }

    #[tokio::test]
    async fn sweep_runs_once_per_launcher() {
        let dir = tempfile::tempdir().unwrap();
        let counter = dir.path().join("sweeps");
        let script = format!("echo swept >> '{}'", counter.display());
        let launcher = DetachedLauncher::new(terminal("true")).with_sweep(shell(&script));

        for id in 1..=3 {
            let handle = ProcessHandle::detached(ParticipantIdentity::node(id), None);
            launcher.terminate(handle).await.unwrap();
        }

        let lines = std::fs::read_to_string(&counter).unwrap();
        assert_eq!(lines.lines().count(), 1);
    }

    #[tokio::test]
    async fn failed_sweep_is_retried() {
        let launcher = DetachedLauncher::new(terminal("true")).with_sweep(shell("exit 2"));

        for id in 1..=2 {
            let handle = ProcessHandle::detached(ParticipantIdentity::client(id), None);
            assert_matches!(
                launcher.terminate(handle).await,
                Err(TerminationError::KillCommandFailed { identity, .. })
                    if identity == ParticipantIdentity::client(id)
            );
        }
    }

    #[tokio::test]
    async fn empty_sweep_is_a_no_op() {
        let launcher = DetachedLauncher::new(terminal("true")).with_sweep(Vec::new());
        let handle = ProcessHandle::detached(ParticipantIdentity::node(1), None);
        launcher.terminate(handle).await.unwrap();
    }
}
