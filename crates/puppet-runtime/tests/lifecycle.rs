//! Session lifecycle against a recording launcher, plus one run with real
//! child processes.

use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::sync::mpsc;
use tokio::sync::Notify;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use puppet_runtime::{
    CommandPlanner, LaunchCommand, LaunchError, LaunchStrategy, LifecycleController,
    LifecycleState, OperatorInput, ProcessHandle, ProcessLauncher, QUIT_HINT, Session,
    ShutdownReason, SpawnLauncher, TerminationError,
};
use puppet_settings::{ArgStyle, WorkloadSettings};
use puppet_topology::{ParticipantIdentity, ScenarioCatalog, ScenarioConfig, Topology};

const TIMEOUT: Duration = Duration::from_secs(5);

/// Launcher that records calls instead of starting processes.
#[derive(Default)]
struct RecordingLauncher {
    launched: Mutex<Vec<ParticipantIdentity>>,
    terminated: Mutex<Vec<ParticipantIdentity>>,
    fail_launch: HashSet<ParticipantIdentity>,
    fail_terminate: HashSet<ParticipantIdentity>,
    /// Cancel this token once this many launches succeeded.
    interrupt_after: Option<(usize, CancellationToken)>,
    /// Block the launch of one identity until released.
    gate: Option<Gate>,
}

struct Gate {
    identity: ParticipantIdentity,
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl RecordingLauncher {
    fn launched(&self) -> Vec<ParticipantIdentity> {
        self.launched.lock().clone()
    }

    fn terminated(&self) -> Vec<ParticipantIdentity> {
        self.terminated.lock().clone()
    }
}

#[async_trait]
impl ProcessLauncher for RecordingLauncher {
    fn strategy(&self) -> LaunchStrategy {
        LaunchStrategy::Spawn
    }

    async fn launch(&self, command: &LaunchCommand) -> Result<ProcessHandle, LaunchError> {
        let identity = command.identity().clone();
        if let Some(gate) = &self.gate {
            if gate.identity == identity {
                gate.entered.notify_one();
                gate.release.notified().await;
            }
        }
        if self.fail_launch.contains(&identity) {
            return Err(LaunchError::SpawnFailed {
                identity,
                program: command.program().to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
            });
        }

        let count = {
            let mut launched = self.launched.lock();
            launched.push(identity.clone());
            launched.len()
        };
        if let Some((after, token)) = &self.interrupt_after {
            if count == *after {
                token.cancel();
            }
        }
        let pid = u32::try_from(count).ok().map(|n| 1000 + n);
        Ok(ProcessHandle::detached(identity, pid))
    }

    async fn terminate(&self, handle: ProcessHandle) -> Result<(), TerminationError> {
        let identity = handle.identity().clone();
        if self.fail_terminate.contains(&identity) {
            return Err(TerminationError::NotTracked { identity });
        }
        self.terminated.lock().push(identity);
        Ok(())
    }
}

fn scenario() -> ScenarioConfig {
    ScenarioConfig::new(
        "regular",
        "regular-node-config.json",
        "regular-client-config.json",
    )
}

fn positional(program: &str) -> WorkloadSettings {
    WorkloadSettings {
        program: program.into(),
        args: Vec::new(),
        working_dir: None,
        arg_style: ArgStyle::Positional,
        joined_arg_prefix: String::new(),
    }
}

fn commands(topology: &Topology) -> Vec<LaunchCommand> {
    CommandPlanner::new(scenario(), positional("node"), positional("client")).plan(topology)
}

fn controller(
    launcher: Arc<RecordingLauncher>,
    token: CancellationToken,
) -> LifecycleController {
    LifecycleController::new(Arc::new(Session::new(scenario())), launcher, token)
}

fn input(text: &str) -> Lines<BufReader<Cursor<Vec<u8>>>> {
    BufReader::new(Cursor::new(text.as_bytes().to_vec())).lines()
}

fn ids(identities: &[ParticipantIdentity]) -> Vec<String> {
    identities.iter().map(ToString::to_string).collect()
}

#[tokio::test]
async fn fan_out_launches_nodes_then_clients() {
    let launcher = Arc::new(RecordingLauncher::default());
    let controller = controller(Arc::clone(&launcher), CancellationToken::new());

    let report = controller
        .fan_out(&commands(&Topology::numbered(2, 1)))
        .await;

    assert_eq!(ids(&report.launched), vec!["node 1", "node 2", "client 1"]);
    assert_eq!(launcher.launched(), report.launched);
    assert!(report.failures.is_empty());
    assert!(report.completed());
    assert_eq!(controller.session().state(), LifecycleState::Running);
    assert_eq!(controller.session().len(), 3);
}

#[tokio::test]
async fn quit_terminates_every_participant() {
    let launcher = Arc::new(RecordingLauncher::default());
    let controller = controller(Arc::clone(&launcher), CancellationToken::new());
    let mut output = Vec::new();

    let summary = timeout(
        TIMEOUT,
        controller.run(&commands(&Topology::numbered(2, 1)), input("quit\n"), &mut output),
    )
    .await
    .unwrap();

    assert_eq!(summary.reason, ShutdownReason::Quit);
    assert_eq!(ids(&summary.teardown.terminated), vec!["node 1", "node 2", "client 1"]);
    assert_eq!(launcher.terminated(), summary.teardown.terminated);
    assert_eq!(controller.session().state(), LifecycleState::Terminating);
    assert!(controller.session().is_empty());
    assert!(String::from_utf8(output).unwrap().contains("Type quit to quit"));
}

#[tokio::test]
async fn end_of_input_also_tears_down() {
    let launcher = Arc::new(RecordingLauncher::default());
    let controller = controller(Arc::clone(&launcher), CancellationToken::new());
    let mut sink = tokio::io::sink();

    let summary = controller
        .run(&commands(&Topology::numbered(1, 1)), input("status\n"), &mut sink)
        .await;

    assert_eq!(summary.reason, ShutdownReason::InputClosed);
    assert_eq!(launcher.terminated().len(), 2);
}

#[tokio::test]
async fn second_teardown_is_a_no_op() {
    let launcher = Arc::new(RecordingLauncher::default());
    let controller = controller(Arc::clone(&launcher), CancellationToken::new());
    let _ = controller.fan_out(&commands(&Topology::numbered(3, 2))).await;

    let first = controller.teardown().await;
    let second = controller.teardown().await;

    assert_eq!(first.terminated.len(), 5);
    assert!(second.terminated.is_empty());
    assert!(second.failures.is_empty());
    assert_eq!(launcher.terminated().len(), 5);
}

#[tokio::test]
async fn launch_failure_does_not_stop_fan_out() {
    let launcher = Arc::new(RecordingLauncher {
        fail_launch: [ParticipantIdentity::node(2), ParticipantIdentity::client(1)]
            .into_iter()
            .collect(),
        ..RecordingLauncher::default()
    });
    let controller = controller(Arc::clone(&launcher), CancellationToken::new());

    let report = controller
        .fan_out(&commands(&Topology::numbered(3, 2)))
        .await;

    assert_eq!(
        ids(&report.launched),
        vec!["node 1", "node 3", "client 2"]
    );
    assert_eq!(report.failures.len(), 2);
    assert_matches!(&report.failures[0], LaunchError::SpawnFailed { identity, .. } if *identity == ParticipantIdentity::node(2));
    assert_eq!(controller.session().len(), 5 - 2);
    assert_eq!(controller.session().state(), LifecycleState::Running);

    let teardown = controller.teardown().await;
    assert_eq!(teardown.terminated, report.launched);
}

#[tokio::test]
async fn launch_failures_are_reported_before_the_prompt() {
    let launcher = Arc::new(RecordingLauncher {
        fail_launch: std::iter::once(ParticipantIdentity::node(2)).collect(),
        ..RecordingLauncher::default()
    });
    let controller = controller(Arc::clone(&launcher), CancellationToken::new());
    let mut output = Vec::new();

    let summary = timeout(
        TIMEOUT,
        controller.run(&commands(&Topology::numbered(2, 1)), input("quit\n"), &mut output),
    )
    .await
    .unwrap();

    assert_eq!(summary.fan_out.failures.len(), 1);
    let output = String::from_utf8(output).unwrap();
    let failure = output.find("failed to spawn node 2").unwrap();
    let prompt = output.find(QUIT_HINT).unwrap();
    assert!(failure < prompt, "{output}");
    assert!(output.starts_with("1 participant(s) failed to launch:\n"));
}

#[tokio::test]
async fn termination_failure_does_not_stop_teardown() {
    let launcher = Arc::new(RecordingLauncher {
        fail_terminate: std::iter::once(ParticipantIdentity::node(1)).collect(),
        ..RecordingLauncher::default()
    });
    let controller = controller(Arc::clone(&launcher), CancellationToken::new());
    let _ = controller.fan_out(&commands(&Topology::numbered(2, 1))).await;

    let report = controller.teardown().await;

    assert_eq!(ids(&report.terminated), vec!["node 2", "client 1"]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].identity(), &ParticipantIdentity::node(1));
    assert!(controller.session().is_empty());
}

#[tokio::test]
async fn fan_out_order_is_deterministic() {
    let topology = Topology::new(
        vec![ParticipantIdentity::node(4), ParticipantIdentity::node(1)],
        vec![
            ParticipantIdentity::client(9).with_script("s.txt"),
            ParticipantIdentity::client(2),
        ],
    );

    let mut runs = Vec::new();
    for _ in 0..3 {
        let launcher = Arc::new(RecordingLauncher::default());
        let controller = controller(Arc::clone(&launcher), CancellationToken::new());
        let _ = controller.fan_out(&commands(&topology)).await;
        runs.push(launcher.launched());
    }

    assert_eq!(ids(&runs[0]), vec!["node 4", "node 1", "client 9", "client 2"]);
    assert!(runs.windows(2).all(|pair| pair[0] == pair[1]));
}

#[tokio::test]
async fn interrupt_during_fan_out_skips_the_rest() {
    let token = CancellationToken::new();
    let launcher = Arc::new(RecordingLauncher {
        interrupt_after: Some((2, token.clone())),
        ..RecordingLauncher::default()
    });
    let controller = controller(Arc::clone(&launcher), token);
    let mut sink = tokio::io::sink();

    let summary = timeout(
        TIMEOUT,
        controller.run(&commands(&Topology::numbered(3, 2)), input(""), &mut sink),
    )
    .await
    .unwrap();

    assert_eq!(ids(&summary.fan_out.launched), vec!["node 1", "node 2"]);
    assert_eq!(
        ids(&summary.fan_out.skipped),
        vec!["node 3", "client 1", "client 2"]
    );
    assert_eq!(summary.reason, ShutdownReason::Interrupt);
    assert_eq!(summary.teardown.terminated, summary.fan_out.launched);
}

#[tokio::test]
async fn interrupt_while_running_tears_down() {
    let token = CancellationToken::new();
    let launcher = Arc::new(RecordingLauncher::default());
    let controller = Arc::new(controller(Arc::clone(&launcher), token.clone()));
    let (_operator, lines) = mpsc::channel(1);
    let input = OperatorInput::from(lines);

    let run = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move {
            let mut sink = tokio::io::sink();
            controller
                .run(&commands(&Topology::numbered(2, 2)), input, &mut sink)
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    token.cancel();
    let summary = timeout(TIMEOUT, run).await.unwrap().unwrap();

    assert_eq!(summary.reason, ShutdownReason::Interrupt);
    assert_eq!(summary.teardown.terminated.len(), 4);
}

#[tokio::test]
async fn handle_arriving_after_teardown_is_killed() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let launcher = Arc::new(RecordingLauncher {
        gate: Some(Gate {
            identity: ParticipantIdentity::client(1),
            entered: Arc::clone(&entered),
            release: Arc::clone(&release),
        }),
        ..RecordingLauncher::default()
    });
    let controller = Arc::new(controller(Arc::clone(&launcher), CancellationToken::new()));

    let fan_out = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move {
            controller
                .fan_out(&commands(&Topology::numbered(1, 1)))
                .await
        })
    };

    timeout(TIMEOUT, entered.notified()).await.unwrap();
    let teardown = controller.teardown().await;
    release.notify_one();
    let report = timeout(TIMEOUT, fan_out).await.unwrap().unwrap();

    assert_eq!(ids(&teardown.terminated), vec!["node 1"]);
    assert_eq!(ids(&report.skipped), vec!["client 1"]);
    assert_eq!(ids(&launcher.terminated()), vec!["node 1", "client 1"]);
    assert!(controller.session().is_empty());
    assert_eq!(controller.session().state(), LifecycleState::Terminating);
}

#[tokio::test]
async fn duplicate_identity_is_already_running() {
    let launcher = Arc::new(RecordingLauncher::default());
    let controller = controller(Arc::clone(&launcher), CancellationToken::new());
    let mut planned = commands(&Topology::numbered(1, 0));
    planned.push(planned[0].clone());

    let report = controller.fan_out(&planned).await;

    assert_eq!(report.launched.len(), 1);
    assert_matches!(&report.failures[..], [LaunchError::AlreadyRunning { .. }]);
    assert_eq!(launcher.launched().len(), 1);
}

#[tokio::test]
async fn scenario_files_drive_the_launch_plan() {
    let dir = tempfile::tempdir().unwrap();
    let nodes = dir.path().join("nodes");
    let clients = dir.path().join("clients");
    std::fs::create_dir_all(&nodes).unwrap();
    std::fs::create_dir_all(&clients).unwrap();
    write(
        &nodes.join("robber-leader-node-config.json"),
        r#"[{"id": "1", "port": 3001}, {"id": "2", "port": 3002}]"#,
    );
    write(
        &clients.join("regular-client-config.json"),
        r#"[{"id": 1, "scriptPath": "append.txt"}]"#,
    );

    let scenario = ScenarioCatalog::builtin().select("robber-leader").unwrap();
    let topology = Topology::load(&scenario, &nodes, &clients).unwrap();
    let planned = CommandPlanner::new(scenario, positional("node"), positional("client"))
        .plan(&topology);

    let argv: Vec<Vec<&str>> = planned.iter().map(LaunchCommand::argv).collect();
    assert_eq!(
        argv,
        vec![
            vec!["node", "1", "robber-leader-node-config.json", "regular-client-config.json"],
            vec!["node", "2", "robber-leader-node-config.json", "regular-client-config.json"],
            vec![
                "client",
                "1",
                "regular-client-config.json",
                "robber-leader-node-config.json",
                "-script"
            ],
        ]
    );
}

#[cfg(unix)]
#[tokio::test]
async fn real_processes_are_killed_on_quit() {
    // Participant arguments land in $1.. and are ignored.
    let shell = WorkloadSettings {
        args: vec!["-c".into(), "exec sleep 30".into(), "participant".into()],
        ..positional("sh")
    };
    let planned = CommandPlanner::new(scenario(), shell.clone(), shell)
        .plan(&Topology::numbered(2, 1));

    let controller = LifecycleController::new(
        Arc::new(Session::new(scenario())),
        Arc::new(SpawnLauncher::new()),
        CancellationToken::new(),
    );
    let mut sink = tokio::io::sink();

    let summary = timeout(TIMEOUT, controller.run(&planned, input("quit\n"), &mut sink))
        .await
        .unwrap();

    assert_eq!(summary.fan_out.launched.len(), 3);
    assert_eq!(summary.teardown.terminated.len(), 3);
    assert!(summary.teardown.failures.is_empty());
}

fn write(path: &Path, contents: &str) {
    std::fs::write(path, contents).unwrap();
}
