/*!
 * Process Lifecycle Tests
 * fork, exit and wait across real process threads
 */

use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use synch_kernel::process::{
    ContextBody, ContextSpawner, LifecycleEvent, ProcessManager, ProcessState,
    SimulatedAddressSpaces, SpawnError, WaitOptions,
};
use synch_kernel::{ExitStatus, Pid, ProcessError};

const PATIENCE: Duration = Duration::from_secs(5);

/// Spin until `pid` reaches `state`
fn wait_for_state(manager: &ProcessManager, pid: Pid, state: ProcessState) {
    let deadline = Instant::now() + PATIENCE;
    while manager.process(pid).map(|p| p.state) != Some(state) {
        assert!(Instant::now() < deadline, "process {} never became {:?}", pid, state);
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_exit_then_wait_then_second_wait_fails() {
    let manager = ProcessManager::new();
    let init = manager.boot("init").unwrap();

    let child = init.fork("child", |ctx| ctx.exit(42)).unwrap();
    assert_eq!(
        init.waitpid(child, WaitOptions::NONE),
        Ok((child, ExitStatus::Exited(42)))
    );

    // Reaped exactly once
    assert_eq!(
        init.waitpid(child, WaitOptions::NONE),
        Err(ProcessError::NotFound(child))
    );
    assert!(!manager.is_pid_in_use(child));
    assert!(manager.is_consistent());
}

#[test]
fn test_wait_blocks_until_child_exits() {
    let manager = ProcessManager::new();
    let init = manager.boot("init").unwrap();

    let (release_tx, release_rx) = flume::bounded::<()>(1);
    let child = init
        .fork("sleeper", move |ctx| {
            release_rx.recv().unwrap();
            ctx.exit(7)
        })
        .unwrap();

    let releaser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        release_tx.send(()).unwrap();
    });

    assert_eq!(
        init.waitpid(child, WaitOptions::NONE),
        Ok((child, ExitStatus::Exited(7)))
    );
    releaser.join().unwrap();
}

#[test]
fn test_orphan_is_reclaimed_on_exit_and_pid_reused() {
    let (events_tx, events_rx) = flume::unbounded();
    let manager = ProcessManager::builder()
        .with_pid_range(2, 4)
        .with_observer(events_tx)
        .build();
    let init = manager.boot("init").unwrap();
    assert_eq!(init.pid(), Pid(2));

    let (release_tx, release_rx) = flume::bounded::<()>(1);
    let (orphan_tx, orphan_rx) = flume::bounded::<Pid>(1);
    let parent = init
        .fork("parent", move |ctx| {
            let orphan = ctx
                .fork("orphan", move |orphan| {
                    release_rx.recv().unwrap();
                    orphan.exit(3)
                })
                .unwrap();
            orphan_tx.send(orphan).unwrap();
            ctx.exit(1)
        })
        .unwrap();

    let orphan = orphan_rx.recv_timeout(PATIENCE).unwrap();
    assert_eq!(
        init.waitpid(parent, WaitOptions::NONE),
        Ok((parent, ExitStatus::Exited(1)))
    );
    assert_eq!(manager.process(orphan).unwrap().parent, None);

    release_tx.send(()).unwrap();
    manager.join_all();

    // Nobody can wait for it, so its pid is free immediately
    assert!(manager.process(orphan).is_none());
    assert!(!manager.is_pid_in_use(orphan));
    assert_eq!(manager.process_count(), 1);

    let events: Vec<_> = events_rx.drain().collect();
    assert!(events.contains(&LifecycleEvent::Exited {
        pid: orphan,
        status: ExitStatus::Exited(3),
        disposition: ProcessState::Reclaimed,
    }));

    // Both freed pids come back, in release order
    let (hold_tx, hold_rx) = flume::unbounded::<()>();
    let first = {
        let hold_rx = hold_rx.clone();
        init.fork("again", move |_| {
            let _ = hold_rx.recv();
        })
        .unwrap()
    };
    let second = init
        .fork("again", move |_| {
            let _ = hold_rx.recv();
        })
        .unwrap();
    assert_eq!(first, parent);
    assert_eq!(second, orphan);

    drop(hold_tx);
    assert_eq!(
        init.waitpid(first, WaitOptions::NONE),
        Ok((first, ExitStatus::Exited(0)))
    );
    assert_eq!(
        init.waitpid(second, WaitOptions::NONE),
        Ok((second, ExitStatus::Exited(0)))
    );
}

#[test]
fn test_live_pids_are_unique() {
    let manager = ProcessManager::new();
    let init = manager.boot("init").unwrap();

    let (hold_tx, hold_rx) = flume::unbounded::<()>();
    let mut pids = Vec::new();
    for _ in 0..32 {
        let hold_rx = hold_rx.clone();
        let pid = init
            .fork("worker", move |_| {
                let _ = hold_rx.recv();
            })
            .unwrap();
        pids.push(pid);
    }

    let unique: HashSet<Pid> = pids.iter().copied().collect();
    assert_eq!(unique.len(), pids.len());
    assert!(!unique.contains(&init.pid()));
    assert_eq!(manager.children_of(init.pid()).len(), pids.len());
    assert!(manager.is_consistent());

    drop(hold_tx);
    for pid in pids {
        init.waitpid(pid, WaitOptions::NONE).unwrap();
    }
    assert_eq!(manager.process_count(), 1);
}

#[test]
fn test_returning_from_entry_exits_with_zero() {
    let manager = ProcessManager::new();
    let init = manager.boot("init").unwrap();

    let child = init.fork("quiet", |_| {}).unwrap();
    assert_eq!(
        init.waitpid(child, WaitOptions::NONE),
        Ok((child, ExitStatus::Exited(0)))
    );
}

#[test]
fn test_panicking_child_is_reported_as_signaled() {
    let manager = ProcessManager::new();
    let init = manager.boot("init").unwrap();

    let child = init.fork("crash", |_| panic!("boom")).unwrap();
    let (_, status) = init.waitpid(child, WaitOptions::NONE).unwrap();
    assert_eq!(status, ExitStatus::Signaled(6));
    assert!(!status.is_normal());
}

#[test]
fn test_exit_status_is_preserved() {
    let manager = ProcessManager::new();
    let init = manager.boot("init").unwrap();

    for code in [0, 1, -1, 255, 1 << 20, -(1 << 20)] {
        let child = init.fork("exiter", move |ctx| ctx.exit(code)).unwrap();
        assert_eq!(
            init.waitpid(child, WaitOptions::NONE),
            Ok((child, ExitStatus::Exited(code)))
        );
    }
}

#[test]
fn test_wait_on_non_child_is_rejected() {
    let manager = ProcessManager::new();
    let init = manager.boot("init").unwrap();

    let (release_tx, release_rx) = flume::bounded::<()>(1);
    let sibling = init
        .fork("sibling", move |_| {
            let _ = release_rx.recv();
        })
        .unwrap();

    let (result_tx, result_rx) = flume::bounded(1);
    let prober = init
        .fork("prober", move |ctx| {
            result_tx.send(ctx.waitpid(sibling, WaitOptions::NONE)).unwrap();
        })
        .unwrap();

    assert_eq!(
        result_rx.recv_timeout(PATIENCE).unwrap(),
        Err(ProcessError::NotChild {
            pid: sibling,
            caller: prober,
        })
    );

    release_tx.send(()).unwrap();
    init.waitpid(prober, WaitOptions::NONE).unwrap();
    init.waitpid(sibling, WaitOptions::NONE).unwrap();
}

#[test]
fn test_wait_on_unknown_pid_fails() {
    let manager = ProcessManager::new();
    let init = manager.boot("init").unwrap();

    assert_eq!(
        init.waitpid(Pid(999), WaitOptions::NONE),
        Err(ProcessError::NotFound(Pid(999)))
    );
    assert_eq!(
        init.waitpid(Pid(999), WaitOptions::WUNTRACED),
        Err(ProcessError::InvalidOptions(2))
    );
}

#[test]
fn test_zombie_children_are_reclaimed_when_parent_exits() {
    let (events_tx, events_rx) = flume::unbounded();
    let manager = ProcessManager::builder().with_observer(events_tx).build();
    let init = manager.boot("init").unwrap();

    let (child_tx, child_rx) = flume::bounded::<Pid>(1);
    let watcher = manager.clone();
    let parent = init
        .fork("parent", move |ctx| {
            let child = ctx.fork("child", |ctx| ctx.exit(5)).unwrap();
            wait_for_state(&watcher, child, ProcessState::Zombie);
            child_tx.send(child).unwrap();
            // Exits without waiting for the zombie
        })
        .unwrap();

    let child = child_rx.recv_timeout(PATIENCE).unwrap();
    init.waitpid(parent, WaitOptions::NONE).unwrap();

    assert!(manager.process(child).is_none());
    assert!(!manager.is_pid_in_use(child));

    let events: Vec<_> = events_rx.drain().collect();
    assert!(events.contains(&LifecycleEvent::Reaped {
        pid: child,
        by: parent,
        status: ExitStatus::Exited(5),
    }));
}

#[test]
fn test_fork_fails_when_pids_run_out() {
    let manager = ProcessManager::builder().with_pid_range(2, 3).build();
    let init = manager.boot("init").unwrap();

    let (release_tx, release_rx) = flume::bounded::<()>(1);
    let child = init
        .fork("holder", move |_| {
            let _ = release_rx.recv();
        })
        .unwrap();

    let result = init.fork("overflow", |_| {});
    assert_eq!(result, Err(ProcessError::PidExhausted(2)));
    assert!(result.unwrap_err().is_resource_exhaustion());
    assert_eq!(manager.process_count(), 2);

    release_tx.send(()).unwrap();
    init.waitpid(child, WaitOptions::NONE).unwrap();

    // The freed pid makes fork work again
    let again = init.fork("again", |_| {}).unwrap();
    assert_eq!(again, child);
    init.waitpid(again, WaitOptions::NONE).unwrap();
}

struct FailingSpawner;

impl ContextSpawner for FailingSpawner {
    fn spawn(&self, pid: Pid, _name: &str, _body: ContextBody) -> Result<(), SpawnError> {
        Err(SpawnError::ThreadCreation {
            pid,
            reason: "no threads left".to_string(),
        })
    }
}

#[test]
fn test_spawn_failure_rolls_back_fork() {
    let (events_tx, events_rx) = flume::unbounded();
    let spaces = Arc::new(SimulatedAddressSpaces::with_capacity(8));
    let manager = ProcessManager::builder()
        .with_address_spaces(spaces.clone())
        .with_spawner(Arc::new(FailingSpawner))
        .with_observer(events_tx)
        .build();
    let init = manager.boot("init").unwrap();

    let result = init.fork("doomed", |_| {});
    assert!(matches!(result, Err(ProcessError::SpawnFailed(_))));

    assert_eq!(manager.process_count(), 1);
    assert_eq!(spaces.live(), 1);
    assert!(manager.is_consistent());

    let events: Vec<_> = events_rx.drain().collect();
    let doomed = match events.as_slice() {
        [LifecycleEvent::Created { parent: None, .. }, LifecycleEvent::Created {
            pid,
            parent: Some(_),
        }, LifecycleEvent::Aborted { pid: aborted }] => {
            assert_eq!(pid, aborted);
            *pid
        }
        other => panic!("unexpected events: {:?}", other),
    };
    assert!(!manager.is_pid_in_use(doomed));
}

#[test]
fn test_address_space_exhaustion_fails_fork() {
    let spaces = Arc::new(SimulatedAddressSpaces::with_capacity(1));
    let manager = ProcessManager::builder()
        .with_address_spaces(spaces.clone())
        .build();
    let init = manager.boot("init").unwrap();

    let result = init.fork("child", |_| {});
    assert!(matches!(result, Err(ProcessError::OutOfMemory(_))));
    assert_eq!(manager.process_count(), 1);
    assert_eq!(spaces.live(), 1);
}

#[test]
fn test_child_address_space_is_a_copy_and_destroyed_on_exit() {
    let spaces = Arc::new(SimulatedAddressSpaces::new());
    let manager = ProcessManager::builder()
        .with_address_spaces(spaces.clone())
        .build();
    let init = manager.boot("init").unwrap();
    let root = manager.process(init.pid()).unwrap().address_space.unwrap();

    let (release_tx, release_rx) = flume::bounded::<()>(1);
    let child = init
        .fork("child", move |_| {
            let _ = release_rx.recv();
        })
        .unwrap();
    let copy = manager.process(child).unwrap().address_space.unwrap();
    assert_ne!(copy, root);
    assert_eq!(spaces.copied_from(copy), Some(root));

    release_tx.send(()).unwrap();
    init.waitpid(child, WaitOptions::NONE).unwrap();
    assert!(!spaces.contains(copy));
    assert_eq!(spaces.live(), 1);
}

#[test]
fn test_bounded_observer_does_not_stall_the_table() {
    let (events_tx, events_rx) = flume::bounded(1);
    let manager = ProcessManager::builder().with_observer(events_tx).build();
    let init = manager.boot("init").unwrap();

    // Nobody drains the observer; every child still runs to completion
    for code in 0..4 {
        let child = init.fork("child", move |ctx| ctx.exit(code)).unwrap();
        assert_eq!(
            init.waitpid(child, WaitOptions::NONE),
            Ok((child, ExitStatus::Exited(code)))
        );
    }
    assert_eq!(manager.process_count(), 1);
    assert_eq!(events_rx.len(), 1);
}
