//! Key provisioning per participant identity.
//!
//! ## File Layout
//!
//! ```text
//! {root}/
//! ├── node_1/
//! │   ├── private_key.der   # PKCS#8 DER, RSA (0600 on Unix)
//! │   └── public_key.der    # SubjectPublicKeyInfo DER
//! └── client_1/
//!     └── ...
//! ```
//!
//! An identity whose directory already exists is skipped. New key pairs are
//! written to a staging directory and renamed into place, so a directory that
//! exists is always complete.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use puppet_topology::ParticipantIdentity;
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use tracing::{debug, info};

use crate::errors::KeyError;

/// Private key file name inside an identity directory.
pub const PRIVATE_KEY_FILE: &str = "private_key.der";
/// Public key file name inside an identity directory.
pub const PUBLIC_KEY_FILE: &str = "public_key.der";
/// Modulus size the workload's `SHA256withRSA` signatures are built for.
pub const DEFAULT_KEY_BITS: usize = 2048;

/// Outcome of provisioning one identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provisioned {
    /// A new key pair was written to this directory.
    Generated(PathBuf),
    /// The directory already existed and was left alone.
    Skipped(PathBuf),
}

/// Outcome of provisioning a set of identities.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    /// Identities that received new keys.
    pub generated: Vec<ParticipantIdentity>,
    /// Identities whose directory already existed.
    pub skipped: Vec<ParticipantIdentity>,
}

/// Writes key pairs below a root directory.
#[derive(Clone, Debug)]
pub struct KeyProvisioner {
    root: PathBuf,
    bits: usize,
}

impl KeyProvisioner {
    /// Provisioner rooted at `root`, generating [`DEFAULT_KEY_BITS`] keys.
    /// Nothing is created until first use.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            bits: DEFAULT_KEY_BITS,
        }
    }

    /// Use a different RSA modulus size for new keys.
    #[must_use]
    pub fn with_key_bits(mut self, bits: usize) -> Self {
        self.bits = bits;
        self
    }

    /// Modulus size of new keys.
    pub fn key_bits(&self) -> usize {
        self.bits
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one identity's keys, e.g. `{root}/client_2`.
    pub fn identity_dir(&self, identity: &ParticipantIdentity) -> PathBuf {
        self.root
            .join(format!("{}_{}", identity.role(), identity.id()))
    }

    /// Ensure one identity has key material.
    pub fn provision(&self, identity: &ParticipantIdentity) -> Result<Provisioned, KeyError> {
        let dir = self.identity_dir(identity);
        if dir.exists() {
            debug!(%identity, dir = %dir.display(), "key directory exists, skipping");
            return Ok(Provisioned::Skipped(dir));
        }

        fs::create_dir_all(&self.root).map_err(|e| KeyError::io(&self.root, e))?;

        let staging = self.root.join(format!(
            ".{}_{}.staging",
            identity.role(),
            identity.id()
        ));
        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(|e| KeyError::io(&staging, e))?;
        }
        fs::create_dir(&staging).map_err(|e| KeyError::io(&staging, e))?;

        write_key_pair(&staging, self.bits)?;

        fs::rename(&staging, &dir).map_err(|e| KeyError::io(&dir, e))?;
        info!(%identity, dir = %dir.display(), "generated key pair");
        Ok(Provisioned::Generated(dir))
    }

    /// Ensure every identity has key material, stopping at the first error.
    pub fn provision_all<'a, I>(&self, identities: I) -> Result<ProvisionReport, KeyError>
    where
        I: IntoIterator<Item = &'a ParticipantIdentity>,
    {
        let mut report = ProvisionReport::default();
        for identity in identities {
            match self.provision(identity)? {
                Provisioned::Generated(_) => report.generated.push(identity.clone()),
                Provisioned::Skipped(_) => report.skipped.push(identity.clone()),
            }
        }
        Ok(report)
    }

    /// Read back an identity's public key.
    pub fn load_public_key(&self, identity: &ParticipantIdentity) -> Result<RsaPublicKey, KeyError> {
        let path = self.identity_dir(identity).join(PUBLIC_KEY_FILE);
        let der = fs::read(&path).map_err(|e| KeyError::io(&path, e))?;
        RsaPublicKey::from_public_key_der(&der).map_err(|e| KeyError::Encoding {
            path,
            message: e.to_string(),
        })
    }
}

fn write_key_pair(dir: &Path, bits: usize) -> Result<(), KeyError> {
    let private_key = RsaPrivateKey::new(&mut OsRng, bits).map_err(|e| KeyError::Generate {
        bits,
        message: e.to_string(),
    })?;

    let private_path = dir.join(PRIVATE_KEY_FILE);
    let private_der = private_key
        .to_pkcs8_der()
        .map_err(|e| KeyError::Encoding {
            path: private_path.clone(),
            message: e.to_string(),
        })?;
    write_private(&private_path, private_der.as_bytes())?;

    let public_path = dir.join(PUBLIC_KEY_FILE);
    let public_der = RsaPublicKey::from(&private_key)
        .to_public_key_der()
        .map_err(|e| KeyError::Encoding {
            path: public_path.clone(),
            message: e.to_string(),
        })?;
    fs::write(&public_path, public_der.as_bytes()).map_err(|e| KeyError::io(&public_path, e))?;
    Ok(())
}

fn write_private(path: &Path, bytes: &[u8]) -> Result<(), KeyError> {
    let mut options = OpenOptions::new();
    let _ = options.create_new(true).write(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        let _ = options.mode(0o600);
    }
    let mut file = options.open(path).map_err(|e| KeyError::io(path, e))?;
    file.write_all(bytes).map_err(|e| KeyError::io(path, e))?;
    file.sync_all().map_err(|e| KeyError::io(path, e))
}
