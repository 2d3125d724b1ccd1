//! One-time workload build.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use puppet_settings::BuildSettings;
use tokio::process::Command;
use tracing::{info, warn};

use crate::errors::BuildError;
use crate::launcher::command::ensure_dir;

/// What [`run_build`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Building is disabled.
    Skipped,
    /// The build ran and succeeded.
    Built,
}

/// Run the configured build to completion, before anything is launched.
///
/// Build output goes straight to the orchestrator's terminal.
pub async fn run_build(settings: &BuildSettings) -> Result<BuildOutcome, BuildError> {
    if !settings.enabled {
        info!("build disabled, skipping");
        return Ok(BuildOutcome::Skipped);
    }

    let start = Instant::now();
    let mut cmd = Command::new(&settings.program);
    let _ = cmd.args(&settings.args).stdin(Stdio::null());
    if let Some(dir) = settings.working_dir.as_deref().filter(|dir| !dir.is_empty()) {
        ensure_dir(Path::new(dir))
            .await
            .map_err(|source| BuildError::WorkingDir {
                path: PathBuf::from(dir),
                source,
            })?;
        let _ = cmd.current_dir(dir);
    }

    info!(program = %settings.program, args = ?settings.args, "building workload");
    let status = cmd.status().await.map_err(|source| BuildError::Spawn {
        program: settings.program.clone(),
        source,
    })?;

    let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    if !status.success() {
        warn!(%status, duration_ms, "build failed");
        return Err(BuildError::Failed {
            program: settings.program.clone(),
            status,
        });
    }
    info!(duration_ms, "build finished");
    Ok(BuildOutcome::Built)
}
