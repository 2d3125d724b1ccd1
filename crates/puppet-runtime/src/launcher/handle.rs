//! Handles to launched participants.

use chrono::{DateTime, Utc};
use puppet_topology::ParticipantIdentity;
use tokio::process::Child;

/// A launched participant. Owned by the session until terminated.
///
/// Handles from the spawn strategy carry the waitable child; detached handles
/// only remember the pid the OS reported at spawn time.
#[derive(Debug)]
pub struct ProcessHandle {
    identity: ParticipantIdentity,
    pid: Option<u32>,
    launched_at: DateTime<Utc>,
    child: Option<Child>,
}

impl ProcessHandle {
    /// Handle that owns a waitable child process.
    pub fn tracked(identity: ParticipantIdentity, child: Child) -> Self {
        Self {
            identity,
            pid: child.id(),
            launched_at: Utc::now(),
            child: Some(child),
        }
    }

    /// Handle for a process the launcher does not wait on.
    pub fn detached(identity: ParticipantIdentity, pid: Option<u32>) -> Self {
        Self {
            identity,
            pid,
            launched_at: Utc::now(),
            child: None,
        }
    }

    /// Participant this handle belongs to.
    pub fn identity(&self) -> &ParticipantIdentity {
        &self.identity
    }

    /// OS process id at launch, when known.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// When the process was started.
    pub fn launched_at(&self) -> DateTime<Utc> {
        self.launched_at
    }

    /// Whether the handle owns a waitable child.
    pub fn is_waitable(&self) -> bool {
        self.child.is_some()
    }

    /// Give up the handle, keeping the child if there is one.
    pub fn into_child(self) -> Option<Child> {
        self.child
    }
}
