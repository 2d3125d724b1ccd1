//! # puppet-runtime
//!
//! Starts and supervises the processes of a test cluster.
//!
//! - [`launcher`]: turning identities into commands and commands into
//!   processes, through the [`ProcessLauncher`] trait
//! - [`session`]: the set of live handles and its lifecycle state
//! - [`controller`]: fan-out, the operator prompt, teardown
//! - [`input`]: operator lines read off the async runtime
//! - [`build`]: the one-time workload build
//! - [`signal`]: Ctrl-C to shutdown token

#![deny(unsafe_code)]

pub mod build;
pub mod controller;
pub mod errors;
pub mod input;
pub mod launcher;
pub mod session;
pub mod signal;

pub use build::{BuildOutcome, run_build};
pub use controller::{
    FanOutReport, LifecycleController, PROMPT, QUIT_COMMAND, QUIT_HINT, RunSummary,
    ShutdownReason, TeardownReport,
};
pub use errors::{BuildError, LaunchError, TerminationError};
pub use input::{LineSource, OperatorInput};
pub use launcher::{
    CommandPlanner, DetachedLauncher, HostPlatform, LaunchCommand, LaunchStrategy, ProcessHandle,
    ProcessLauncher, SpawnLauncher, launcher_for,
};
pub use session::{LifecycleState, RejectReason, Rejected, Session};
pub use signal::spawn_interrupt_listener;
