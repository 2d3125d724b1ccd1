//! # puppet-keys
//!
//! Per-participant key material. Each identity gets an RSA key pair
//! (PKCS#8 private, SPKI public, both DER) under `{root}/{role}_{id}/`, read
//! by the participant workload at its own startup. The orchestrator never
//! loads these keys itself.

#![deny(unsafe_code)]

pub mod errors;
pub mod provisioner;

pub use errors::KeyError;
pub use provisioner::{
    DEFAULT_KEY_BITS, KeyProvisioner, PRIVATE_KEY_FILE, PUBLIC_KEY_FILE, ProvisionReport,
    Provisioned,
};
