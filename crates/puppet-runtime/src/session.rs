//! The live process set of one orchestration run.
//!
//! A session owns every [`ProcessHandle`] from launch until teardown drains
//! them. State changes go through one lock so a handle recorded concurrently
//! with teardown is either drained by it or rejected, never lost.

use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use puppet_topology::{ParticipantIdentity, ScenarioConfig};
use tracing::debug;
use uuid::Uuid;

use crate::launcher::ProcessHandle;

/// Lifecycle of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    /// Created; fan-out not finished.
    Idle,
    /// Every participant launch was attempted; waiting for shutdown.
    Running,
    /// Teardown started. Terminal state.
    Terminating,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Terminating => "terminating",
        })
    }
}

/// Why [`Session::record`] refused a handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// The identity already has a live handle.
    Duplicate,
    /// Teardown already drained the session.
    Terminating,
}

/// A handle the session would not take. The caller still owns the process.
#[derive(Debug)]
pub struct Rejected {
    /// The refused handle.
    pub handle: ProcessHandle,
    /// Why it was refused.
    pub reason: RejectReason,
}

struct Inner {
    state: LifecycleState,
    handles: Vec<ProcessHandle>,
}

/// One orchestration run.
pub struct Session {
    id: Uuid,
    scenario: ScenarioConfig,
    started_at: DateTime<Utc>,
    inner: Mutex<Inner>,
}

impl Session {
    /// New idle session for a scenario.
    pub fn new(scenario: ScenarioConfig) -> Self {
        Self {
            id: Uuid::now_v7(),
            scenario,
            started_at: Utc::now(),
            inner: Mutex::new(Inner {
                state: LifecycleState::Idle,
                handles: Vec::new(),
            }),
        }
    }

    /// Session id, for log correlation.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Scenario this session runs.
    pub fn scenario(&self) -> &ScenarioConfig {
        &self.scenario
    }

    /// Creation time.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.inner.lock().state
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.inner.lock().handles.len()
    }

    /// Whether no handle is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identities with a live handle, in launch order.
    pub fn identities(&self) -> Vec<ParticipantIdentity> {
        self.inner
            .lock()
            .handles
            .iter()
            .map(|h| h.identity().clone())
            .collect()
    }

    /// Whether an identity has a live handle.
    pub fn is_live(&self, identity: &ParticipantIdentity) -> bool {
        self.inner
            .lock()
            .handles
            .iter()
            .any(|h| h.identity().key() == identity.key())
    }

    /// Take ownership of a freshly launched handle.
    pub fn record(&self, handle: ProcessHandle) -> Result<(), Rejected> {
        let mut inner = self.inner.lock();
        if inner.state == LifecycleState::Terminating {
            return Err(Rejected {
                handle,
                reason: RejectReason::Terminating,
            });
        }
        let key = handle.identity().key();
        if inner.handles.iter().any(|h| h.identity().key() == key) {
            return Err(Rejected {
                handle,
                reason: RejectReason::Duplicate,
            });
        }
        debug!(session = %self.id, identity = %handle.identity(), "handle recorded");
        inner.handles.push(handle);
        Ok(())
    }

    /// `Idle -> Running`. Returns false if the session was not idle.
    pub fn mark_running(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != LifecycleState::Idle {
            return false;
        }
        inner.state = LifecycleState::Running;
        true
    }

    /// Enter `Terminating` and take every handle.
    ///
    /// Returns `None` if teardown already happened.
    pub fn begin_teardown(&self) -> Option<Vec<ProcessHandle>> {
        let mut inner = self.inner.lock();
        if inner.state == LifecycleState::Terminating {
            return None;
        }
        inner.state = LifecycleState::Terminating;
        Some(std::mem::take(&mut inner.handles))
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("scenario", &self.scenario.name)
            .field("state", &inner.state)
            .field("handles", &inner.handles.len())
            .finish_non_exhaustive()
    }
}
