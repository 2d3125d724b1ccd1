//! Runtime error types.
//!
//! [`BuildError`] is fatal and stops the session before anything is launched.
//! [`LaunchError`] and [`TerminationError`] are per participant: they are
//! logged and collected, and the surrounding fan-out or teardown carries on.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use puppet_topology::ParticipantIdentity;
use thiserror::Error;

/// The one-time workload build failed.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The build program could not be started.
    #[error("failed to start build command {program:?}: {source}")]
    Spawn {
        /// Build executable.
        program: String,
        /// OS error.
        source: io::Error,
    },

    /// The configured build directory cannot be entered.
    #[error("build working directory \"{}\" is not usable: {source}", path.display())]
    WorkingDir {
        /// Directory the build was to run in.
        path: PathBuf,
        /// OS error from inspecting it.
        source: io::Error,
    },

    /// The build ran and reported failure.
    #[error("build command {program:?} failed with {status}")]
    Failed {
        /// Build executable.
        program: String,
        /// Exit status of the build.
        status: ExitStatus,
    },
}

/// A single participant could not be started.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The OS refused to create the process (missing executable, limits, ...).
    #[error("failed to spawn {identity} ({program:?}): {source}")]
    SpawnFailed {
        /// Participant that failed to start.
        identity: ParticipantIdentity,
        /// Executable that was invoked.
        program: String,
        /// OS error.
        source: io::Error,
    },

    /// The configured working directory cannot be entered.
    ///
    /// Checked before spawning, since the OS reports a missing directory the
    /// same way as a missing executable.
    #[error("working directory \"{}\" for {identity} is not usable: {source}", path.display())]
    WorkingDir {
        /// Participant that failed to start.
        identity: ParticipantIdentity,
        /// Directory the process was to start in.
        path: PathBuf,
        /// OS error from inspecting it.
        source: io::Error,
    },

    /// The participant's output log could not be opened.
    #[error("failed to open output log {} for {identity}: {source}", path.display())]
    OutputLog {
        /// Participant concerned.
        identity: ParticipantIdentity,
        /// Log file path.
        path: PathBuf,
        /// OS error.
        source: io::Error,
    },

    /// The identity already has a live process in this session.
    #[error("{identity} is already running")]
    AlreadyRunning {
        /// Participant concerned.
        identity: ParticipantIdentity,
    },
}

impl LaunchError {
    /// Participant the error is about.
    pub fn identity(&self) -> &ParticipantIdentity {
        match self {
            Self::SpawnFailed { identity, .. }
            | Self::WorkingDir { identity, .. }
            | Self::OutputLog { identity, .. }
            | Self::AlreadyRunning { identity } => identity,
        }
    }
}

/// A tracked participant could not be terminated.
#[derive(Debug, Error)]
pub enum TerminationError {
    /// Sending the kill failed.
    #[error("failed to kill {identity}: {source}")]
    KillFailed {
        /// Participant concerned.
        identity: ParticipantIdentity,
        /// OS error.
        source: io::Error,
    },

    /// An external kill command reported failure.
    #[error("{program:?} exited with {status} while terminating {identity}")]
    KillCommandFailed {
        /// Participant concerned.
        identity: ParticipantIdentity,
        /// Kill program that was run.
        program: String,
        /// Its exit status.
        status: ExitStatus,
    },

    /// The handle carries no waitable process, so this launcher cannot kill it.
    #[error("{identity} has no waitable process")]
    NotTracked {
        /// Participant concerned.
        identity: ParticipantIdentity,
    },
}

impl TerminationError {
    /// Participant the error is about.
    pub fn identity(&self) -> &ParticipantIdentity {
        match self {
            Self::KillFailed { identity, .. }
            | Self::KillCommandFailed { identity, .. }
            | Self::NotTracked { identity } => identity,
        }
    }
}
