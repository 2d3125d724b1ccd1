//! Lifecycle controller: fan-out, wait for shutdown, teardown.
//!
//! The controller is the only code that moves a [`Session`] through its
//! states. The shutdown token is shared with the interrupt listener, so a
//! signal during fan-out stops further launches and a signal while waiting
//! ends the wait.

use std::sync::Arc;

use puppet_topology::ParticipantIdentity;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::errors::{LaunchError, TerminationError};
use crate::input::LineSource;
use crate::launcher::{LaunchCommand, ProcessHandle, ProcessLauncher};
use crate::session::{RejectReason, Rejected, Session};

/// Input line that ends the session.
pub const QUIT_COMMAND: &str = "quit";

/// Reminder printed before every prompt.
pub const QUIT_HINT: &str = "Type quit to quit";

/// Interactive prompt.
pub const PROMPT: &str = ">> ";

/// Outcome of launching every participant.
#[derive(Debug, Default)]
pub struct FanOutReport {
    /// Participants now running, in launch order.
    pub launched: Vec<ParticipantIdentity>,
    /// Participants that failed to start.
    pub failures: Vec<LaunchError>,
    /// Participants never attempted because shutdown was requested.
    pub skipped: Vec<ParticipantIdentity>,
}

impl FanOutReport {
    /// Whether every participant was attempted.
    pub fn completed(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// What ended the running phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The operator typed `quit`.
    Quit,
    /// An interrupt signal arrived.
    Interrupt,
    /// Standard input was closed.
    InputClosed,
}

/// Outcome of terminating every tracked participant.
#[derive(Debug, Default)]
pub struct TeardownReport {
    /// Participants terminated, in launch order.
    pub terminated: Vec<ParticipantIdentity>,
    /// Participants that could not be terminated.
    pub failures: Vec<TerminationError>,
}

/// Everything that happened in one [`LifecycleController::run`].
#[derive(Debug)]
pub struct RunSummary {
    /// Fan-out results.
    pub fan_out: FanOutReport,
    /// Why the session ended.
    pub reason: ShutdownReason,
    /// Teardown results.
    pub teardown: TeardownReport,
}

/// Drives one session from fan-out to teardown.
pub struct LifecycleController {
    session: Arc<Session>,
    launcher: Arc<dyn ProcessLauncher>,
    shutdown: CancellationToken,
}

impl LifecycleController {
    /// Controller over a session, launching through `launcher`.
    pub fn new(
        session: Arc<Session>,
        launcher: Arc<dyn ProcessLauncher>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            session,
            launcher,
            shutdown,
        }
    }

    /// Session being driven.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Token that requests shutdown.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Launch every command in order.
    ///
    /// A failed launch is logged and collected; the remaining participants
    /// are still launched. Once shutdown is requested the rest are skipped.
    pub async fn fan_out(&self, commands: &[LaunchCommand]) -> FanOutReport {
        let mut report = FanOutReport::default();
        info!(
            session = %self.session.id(),
            scenario = %self.session.scenario().name,
            strategy = %self.launcher.strategy(),
            participants = commands.len(),
            "fan-out starting"
        );

        for (index, command) in commands.iter().enumerate() {
            if self.shutdown.is_cancelled() {
                report.skipped = commands[index..]
                    .iter()
                    .map(|c| c.identity().clone())
                    .collect();
                warn!(skipped = report.skipped.len(), "shutdown requested during fan-out");
                break;
            }

            let identity = command.identity();
            if self.session.is_live(identity) {
                warn!(%identity, "participant already running");
                report.failures.push(LaunchError::AlreadyRunning {
                    identity: identity.clone(),
                });
                continue;
            }

            match self.launcher.launch(command).await {
                Ok(handle) => match self.session.record(handle) {
                    Ok(()) => report.launched.push(identity.clone()),
                    Err(Rejected { handle, reason }) => {
                        self.discard(handle).await;
                        match reason {
                            RejectReason::Duplicate => {
                                report.failures.push(LaunchError::AlreadyRunning {
                                    identity: identity.clone(),
                                });
                            }
                            RejectReason::Terminating => report.skipped.push(identity.clone()),
                        }
                    }
                },
                Err(error) => {
                    error!(%identity, %error, "participant failed to launch");
                    report.failures.push(error);
                }
            }
        }

        if report.completed() && self.session.mark_running() {
            info!(
                launched = report.launched.len(),
                failed = report.failures.len(),
                "all participants launched"
            );
        }
        report
    }

    /// Read operator input until `quit`, end of input or an interrupt.
    ///
    /// Output errors are ignored; a closed stdout must not keep the cluster
    /// alive.
    pub async fn wait_for_shutdown<L, W>(&self, mut input: L, output: &mut W) -> ShutdownReason
    where
        L: LineSource,
        W: AsyncWrite + Unpin,
    {
        loop {
            if self.shutdown.is_cancelled() {
                return ShutdownReason::Interrupt;
            }
            let _ = output
                .write_all(format!("{QUIT_HINT}\n{PROMPT}").as_bytes())
                .await;
            let _ = output.flush().await;

            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => {
                    info!("interrupt received");
                    return ShutdownReason::Interrupt;
                }
                line = input.next_line() => match line {
                    Ok(Some(line)) if line.trim() == QUIT_COMMAND => {
                        info!("quit requested");
                        return ShutdownReason::Quit;
                    }
                    Ok(Some(line)) => debug!(input = %line.trim(), "ignoring input"),
                    Ok(None) => {
                        info!("input closed");
                        return ShutdownReason::InputClosed;
                    }
                    Err(error) => {
                        warn!(%error, "failed to read input");
                        return ShutdownReason::InputClosed;
                    }
                },
            }
        }
    }

    /// Terminate every tracked participant.
    ///
    /// Failures are logged and collected; every handle is attempted. Calling
    /// this again is a no-op that returns an empty report.
    pub async fn teardown(&self) -> TeardownReport {
        self.shutdown.cancel();
        let Some(handles) = self.session.begin_teardown() else {
            debug!(session = %self.session.id(), "teardown already done");
            return TeardownReport::default();
        };

        info!(session = %self.session.id(), participants = handles.len(), "tearing down");
        let mut report = TeardownReport::default();
        for handle in handles {
            let identity = handle.identity().clone();
            match self.launcher.terminate(handle).await {
                Ok(()) => report.terminated.push(identity),
                Err(error) => {
                    warn!(%identity, %error, "participant failed to terminate");
                    report.failures.push(error);
                }
            }
        }
        info!(
            terminated = report.terminated.len(),
            failed = report.failures.len(),
            "teardown complete"
        );
        report
    }

    /// Fan out, wait for shutdown, tear down.
    ///
    /// Launch failures are written to `output` before the first prompt.
    #[tracing::instrument(skip_all, fields(session = %self.session.id()))]
    pub async fn run<L, W>(&self, commands: &[LaunchCommand], input: L, output: &mut W) -> RunSummary
    where
        L: LineSource,
        W: AsyncWrite + Unpin + Send,
    {
        let fan_out = self.fan_out(commands).await;
        if !fan_out.failures.is_empty() {
            let _ = output
                .write_all(launch_failure_summary(&fan_out.failures).as_bytes())
                .await;
            let _ = output.flush().await;
        }
        let reason = if fan_out.completed() {
            self.wait_for_shutdown(input, output).await
        } else {
            ShutdownReason::Interrupt
        };
        let teardown = self.teardown().await;
        RunSummary {
            fan_out,
            reason,
            teardown,
        }
    }

    async fn discard(&self, handle: ProcessHandle) {
        let identity = handle.identity().clone();
        warn!(%identity, "session refused handle; terminating it");
        if let Err(error) = self.launcher.terminate(handle).await {
            warn!(%identity, %error, "failed to terminate refused handle");
        }
    }
}

fn launch_failure_summary(failures: &[LaunchError]) -> String {
    let mut summary = format!("{} participant(s) failed to launch:\n", failures.len());
    for failure in failures {
        summary.push_str("  ");
        summary.push_str(&failure.to_string());
        summary.push('\n');
    }
    summary
}
