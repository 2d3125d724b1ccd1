//! # puppet-topology
//!
//! Declarative description of a test cluster: who the participants are and
//! which pair of topology files a scenario uses. Pure data; nothing here
//! starts a process.

#![deny(unsafe_code)]

pub mod descriptor;
pub mod errors;
pub mod identity;
pub mod scenario;
pub mod topology;

pub use descriptor::ParticipantRecord;
pub use errors::ConfigError;
pub use identity::{ParticipantIdentity, Role};
pub use scenario::{ScenarioCatalog, ScenarioConfig};
pub use topology::Topology;
