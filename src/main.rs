/*!
 * synchsim - Main Entry Point
 *
 * Runs the two synchronization engines end to end:
 * - Seeded multi-threaded traffic through the intersection controller
 * - A fork/exit/wait workload on the process lifecycle manager
 *
 * Both reports are printed as JSON on stdout.
 */

use miette::IntoDiagnostic;
use serde::Serialize;
use tracing::{info, warn};

use synch_kernel::process::{LifecycleEvent, ProcessManager, ProcessState};
use synch_kernel::traffic::run_simulation;
use synch_kernel::{init_tracing, ExitStatus, KernelError, Pid, SimulationConfig, WaitOptions};

const WORKERS: i32 = 8;

#[derive(Debug, Serialize)]
struct ChildOutcome {
    pid: Pid,
    status: ExitStatus,
}

#[derive(Debug, Serialize)]
struct ProcessReport {
    children: Vec<ChildOutcome>,
    orphan: Option<Pid>,
    orphan_disposition: Option<ProcessState>,
    events: usize,
    remaining: usize,
}

fn load_config() -> Result<SimulationConfig, KernelError> {
    let config = match std::env::var("SYNCH_SIM_CONFIG") {
        Ok(path) => {
            info!(path = %path, "Loading simulation config from file");
            SimulationConfig::from_json_file(&path)?.with_env_overrides()?
        }
        Err(_) => SimulationConfig::from_env()?,
    };
    Ok(config)
}

fn run_process_workload() -> Result<ProcessReport, KernelError> {
    let (events_tx, events_rx) = flume::unbounded();
    let manager = ProcessManager::builder().with_observer(events_tx).build();

    let init = manager.boot("init")?;

    let mut forked = Vec::new();
    for code in 0..WORKERS {
        let pid = init.fork(&format!("worker-{}", code), move |ctx| ctx.exit(code * 3))?;
        forked.push(pid);
    }

    let mut children = Vec::with_capacity(forked.len());
    for pid in forked {
        let (pid, status) = init.waitpid(pid, WaitOptions::NONE)?;
        children.push(ChildOutcome { pid, status });
    }

    // A parent that exits before its child leaves the child orphaned
    let (release_tx, release_rx) = flume::bounded::<()>(1);
    let (orphan_tx, orphan_rx) = flume::bounded::<Pid>(1);
    let parent = init.fork("parent", move |ctx| {
        let spawned = ctx.fork("orphan", move |orphan| {
            let _ = release_rx.recv();
            orphan.exit(0)
        });
        if let Ok(pid) = spawned {
            let _ = orphan_tx.send(pid);
        }
        ctx.exit(1)
    })?;
    init.waitpid(parent, WaitOptions::NONE)?;
    let orphan = orphan_rx.recv().ok();
    let _ = release_tx.send(());

    manager.join_all();
    manager.exit_process(init.pid(), ExitStatus::Exited(0))?;
    let remaining = manager.process_count();
    drop(manager);

    let events: Vec<LifecycleEvent> = events_rx.drain().collect();
    let orphan_disposition = orphan.and_then(|orphan| {
        events.iter().find_map(|event| match *event {
            LifecycleEvent::Exited {
                pid, disposition, ..
            } if pid == orphan => Some(disposition),
            _ => None,
        })
    });
    if orphan_disposition != Some(ProcessState::Reclaimed) {
        warn!(?orphan, ?orphan_disposition, "orphan was not reclaimed directly");
    }

    Ok(ProcessReport {
        children,
        orphan,
        orphan_disposition,
        events: events.len(),
        remaining,
    })
}

fn main() -> miette::Result<()> {
    // Initialize structured tracing
    init_tracing();

    info!("synchsim starting...");
    info!("================================================");

    let config = load_config()?;
    info!(
        threads = config.threads,
        vehicles_per_thread = config.vehicles_per_thread,
        strategy = ?config.strategy,
        seed = config.seed,
        "Running traffic simulation"
    );
    let report = run_simulation(&config)?;
    if !report.is_safe() {
        warn!(violations = report.violations, "Intersection admitted conflicting vehicles");
    }
    println!("{}", serde_json::to_string_pretty(&report).into_diagnostic()?);

    info!("Running process lifecycle workload");
    let processes = run_process_workload()?;
    println!("{}", serde_json::to_string_pretty(&processes).into_diagnostic()?);

    info!("================================================");
    info!("synchsim finished");
    Ok(())
}
