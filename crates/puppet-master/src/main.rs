//! # puppet-master
//!
//! Test-cluster orchestrator. Loads the scenario topology, provisions key
//! material, builds the workload once, launches one process per node and
//! client, then waits for `quit` or Ctrl-C and tears everything down.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use puppet_keys::{KeyProvisioner, ProvisionReport};
use puppet_runtime::{
    CommandPlanner, LifecycleController, OperatorInput, RunSummary, Session, launcher_for,
    run_build, spawn_interrupt_listener,
};
use puppet_settings::PuppetSettings;
use puppet_topology::{ScenarioCatalog, ScenarioConfig, Topology};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Node count `keygen` uses when only `--clients` is given.
const DEFAULT_KEYGEN_NODES: u32 = 5;
/// Client count `keygen` uses when only `--nodes` is given.
const DEFAULT_KEYGEN_CLIENTS: u32 = 3;

/// Test-cluster orchestrator.
#[derive(Parser, Debug)]
#[command(name = "puppet-master", about = "Launch and supervise a ledger test cluster")]
struct Cli {
    /// Settings file (defaults to `$PUPPET_SETTINGS` or `./puppet.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Skip the workload build even if it is enabled in settings.
    #[arg(long, global = true)]
    skip_build: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Run the configured scenario (default).
    Run,
    /// Generate missing key pairs without launching anything.
    Keygen {
        /// Generate for node ids `1..=N` instead of the scenario topology.
        #[arg(long)]
        nodes: Option<u32>,
        /// Generate for client ids `1..=M` instead of the scenario topology.
        #[arg(long)]
        clients: Option<u32>,
    },
}

fn load_settings(path: Option<&Path>) -> Result<PuppetSettings> {
    match path {
        Some(path) => puppet_settings::load_settings_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display())),
        None => puppet_settings::load_settings().context("Failed to load settings"),
    }
}

/// Built-in scenarios plus any declared in settings, which win on name clashes.
fn scenario_catalog(settings: &PuppetSettings) -> ScenarioCatalog {
    let mut catalog = ScenarioCatalog::builtin();
    for (name, files) in &settings.scenarios {
        catalog.insert(ScenarioConfig::new(
            name.clone(),
            files.nodes.clone(),
            files.clients.clone(),
        ));
    }
    catalog
}

fn load_topology(settings: &PuppetSettings) -> Result<(ScenarioConfig, Topology)> {
    let scenario = scenario_catalog(settings).select(&settings.scenario)?;
    let topology = Topology::load(
        &scenario,
        Path::new(&settings.nodes.config_dir),
        Path::new(&settings.clients.config_dir),
    )
    .with_context(|| format!("Failed to load topology for scenario {:?}", scenario.name))?;
    Ok((scenario, topology))
}

fn provision_keys(settings: &PuppetSettings, topology: &Topology) -> Result<ProvisionReport> {
    let provisioner = KeyProvisioner::new(&settings.keys.dir).with_key_bits(settings.keys.bits);
    let report = provisioner
        .provision_all(topology.fan_out_order())
        .with_context(|| format!("Failed to provision keys under {}", settings.keys.dir))?;
    info!(
        dir = %settings.keys.dir,
        generated = report.generated.len(),
        skipped = report.skipped.len(),
        "key material ready"
    );
    Ok(report)
}

/// Identities `keygen` should cover.
fn keygen_topology(
    settings: &PuppetSettings,
    nodes: Option<u32>,
    clients: Option<u32>,
) -> Result<Topology> {
    if nodes.is_none() && clients.is_none() {
        return load_topology(settings).map(|(_, topology)| topology);
    }
    Ok(Topology::numbered(
        nodes.unwrap_or(DEFAULT_KEYGEN_NODES),
        clients.unwrap_or(DEFAULT_KEYGEN_CLIENTS),
    ))
}

fn keygen(settings: &PuppetSettings, nodes: Option<u32>, clients: Option<u32>) -> Result<ProvisionReport> {
    let topology = keygen_topology(settings, nodes, clients)?;
    provision_keys(settings, &topology)
}

async fn run(settings: &PuppetSettings, skip_build: bool) -> Result<RunSummary> {
    let (scenario, topology) = load_topology(settings)?;
    info!(
        scenario = %scenario.name,
        nodes = topology.nodes().len(),
        clients = topology.clients().len(),
        "scenario selected"
    );

    if settings.keys.provision_on_start {
        let _ = provision_keys(settings, &topology)?;
    }

    if skip_build {
        info!("build skipped by flag");
    } else {
        let _ = run_build(&settings.build)
            .await
            .context("Workload build failed")?;
    }

    let commands = CommandPlanner::from_settings(scenario.clone(), settings).plan(&topology);
    let input = OperatorInput::stdin().context("Failed to start the stdin reader")?;
    let shutdown = CancellationToken::new();
    let listener = spawn_interrupt_listener(shutdown.clone());
    let controller = LifecycleController::new(
        Arc::new(Session::new(scenario)),
        launcher_for(&settings.launcher),
        shutdown,
    );

    let mut stdout = tokio::io::stdout();
    let summary = controller.run(&commands, input, &mut stdout).await;
    listener.abort();
    Ok(summary)
}

/// Launch failures were already shown before the prompt.
fn report(summary: &RunSummary) {
    for failure in &summary.teardown.failures {
        warn!(identity = %failure.identity(), error = %failure, "termination failure");
    }
    info!(
        reason = ?summary.reason,
        launched = summary.fan_out.launched.len(),
        launch_failures = summary.fan_out.failures.len(),
        skipped = summary.fan_out.skipped.len(),
        terminated = summary.teardown.terminated.len(),
        termination_failures = summary.teardown.failures.len(),
        "session finished"
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = puppet_logging::with_bootstrap(|| load_settings(cli.settings.as_deref()))?;
    puppet_logging::init(&settings.logging);

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let summary = run(&settings, cli.skip_build).await?;
            report(&summary);
        }
        Command::Keygen { nodes, clients } => {
            let report = keygen(&settings, nodes, clients)?;
            println!(
                "generated {} key pair(s), {} already present, under {}",
                report.generated.len(),
                report.skipped.len(),
                settings.keys.dir
            );
        }
    }
    Ok(())
}
