/*!
 * Process Management
 *
 * Owns the process table and implements fork, exit and wait.
 *
 * # Protocol
 *
 * - Every state transition happens with the table lock held.
 * - Each process has its own condition variable, broadcast when it exits.
 *   Waiters loop on it until the child is no longer running.
 * - A forked child is fully registered before the lock is released.
 * - External work (address-space duplication and destruction, thread
 *   creation) runs with the lock released.
 */

use super::context::ProcessContext;
use super::runtime::ProcessExit;
use super::table::ProcessTable;
use super::traits::{AddressSpaceProvider, ContextBody, ContextSpawner};
use super::types::{
    ExitStatus, LifecycleEvent, ProcessInfo, ProcessResult, ProcessState, WaitOptions,
};
use crate::core::errors::ProcessError;
use crate::core::id::Pid;
use crate::core::limits::SIGABRT;
use parking_lot::{Mutex, MutexGuard};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub use super::manager_builder::ProcessManagerBuilder;

/// Code run by a forked child, handed the child's own context
pub type ProcessEntry = Box<dyn FnOnce(ProcessContext) + Send + 'static>;

pub(super) struct Shared {
    pub table: Mutex<ProcessTable>,
    pub address_spaces: Arc<dyn AddressSpaceProvider>,
    pub spawner: Arc<dyn ContextSpawner>,
    pub observer: Option<flume::Sender<LifecycleEvent>>,
}

/// Process lifecycle manager
///
/// Cheap to clone; clones share one table.
#[derive(Clone)]
pub struct ProcessManager {
    shared: Arc<Shared>,
}

impl ProcessManager {
    pub(super) fn from_shared(shared: Shared) -> Self {
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Manager with the default pid range, simulated address spaces and one
    /// thread per process
    pub fn new() -> Self {
        ProcessManagerBuilder::new().build()
    }

    pub fn builder() -> ProcessManagerBuilder {
        ProcessManagerBuilder::new()
    }

    #[inline]
    fn lock(&self) -> MutexGuard<'_, ProcessTable> {
        self.shared.table.lock()
    }

    /// Observer sends happen under the table lock, so events arrive in
    /// transition order. Never blocks: a full or disconnected observer
    /// loses the event.
    #[inline]
    fn emit(&self, event: LifecycleEvent) {
        if let Some(ref observer) = self.shared.observer {
            if let Err(flume::TrySendError::Full(event)) = observer.try_send(event) {
                warn!(?event, "lifecycle observer full, event dropped");
            }
        }
    }

    /// Register the first process, bound to the calling thread
    pub fn boot(&self, name: &str) -> ProcessResult<ProcessContext> {
        let address_space = self
            .shared
            .address_spaces
            .create()
            .map_err(|e| ProcessError::OutOfMemory(e.to_string()))?;

        let inserted = {
            let mut table = self.lock();
            let inserted = table.insert(name, None, address_space);
            if let Ok(pid) = inserted {
                self.emit(LifecycleEvent::Created { pid, parent: None });
            }
            inserted
        };

        match inserted {
            Ok(pid) => {
                info!(%pid, name, "Booted process");
                Ok(ProcessContext::new(pid, name.to_string(), self.clone()))
            }
            Err(e) => {
                self.shared.address_spaces.destroy(address_space);
                Err(e)
            }
        }
    }

    /// Create a child of `caller` running `entry` on a new execution context
    ///
    /// Resource exhaustion (`PidExhausted`, `OutOfMemory`, `SpawnFailed`)
    /// leaves nothing of the child behind: no record, no pid, no address
    /// space. A caller that is unknown or no longer running, including one
    /// that exits while the fork is in progress, gets `NotFound` or
    /// `AlreadyExited` with the same rollback.
    pub fn fork(&self, caller: Pid, name: &str, entry: ProcessEntry) -> ProcessResult<Pid> {
        let (source, identity) = {
            let table = self.lock();
            let record = table.get(caller).ok_or(ProcessError::NotFound(caller))?;
            if record.state != ProcessState::Running {
                return Err(ProcessError::AlreadyExited(caller));
            }
            (record.address_space, Arc::clone(&record.exited))
        };

        // The copy belongs to a process nobody can see yet, so no lock
        let address_space = match source {
            Some(source) => self.shared.address_spaces.duplicate(source),
            None => self.shared.address_spaces.create(),
        }
        .map_err(|e| {
            debug!(%caller, error = %e, "fork: address space duplication failed");
            ProcessError::OutOfMemory(e.to_string())
        })?;

        let inserted = {
            let mut table = self.lock();
            // The caller may have exited while its address space was copied,
            // and its pid may already belong to somebody else
            let current = table
                .get(caller)
                .filter(|record| Arc::ptr_eq(&record.exited, &identity))
                .map(|record| record.state);
            let inserted = match current {
                Some(ProcessState::Running) => table.insert(name, Some(caller), address_space),
                Some(_) => Err(ProcessError::AlreadyExited(caller)),
                None => Err(ProcessError::NotFound(caller)),
            };
            if let Ok(child) = inserted {
                self.emit(LifecycleEvent::Created {
                    pid: child,
                    parent: Some(caller),
                });
            }
            inserted
        };
        let child = match inserted {
            Ok(child) => child,
            Err(e) => {
                debug!(%caller, error = %e, "fork: child not registered");
                self.shared.address_spaces.destroy(address_space);
                return Err(e);
            }
        };

        let body = self.trampoline(child, name.to_string(), entry);
        if let Err(e) = self.shared.spawner.spawn(child, name, body) {
            warn!(%caller, %child, error = %e, "fork: spawn failed, rolling back");
            {
                let mut table = self.lock();
                table.reclaim(child);
                self.emit(LifecycleEvent::Aborted { pid: child });
            }
            self.shared.address_spaces.destroy(address_space);
            return Err(ProcessError::SpawnFailed(e.to_string()));
        }

        debug!(parent = %caller, %child, name, "forked");
        Ok(child)
    }

    /// Wrap a child's entry so that every way out of it ends in an exit
    fn trampoline(&self, pid: Pid, name: String, entry: ProcessEntry) -> ContextBody {
        let manager = self.clone();
        Box::new(move || {
            let context = ProcessContext::new(pid, name, manager.clone());
            let status = match panic::catch_unwind(AssertUnwindSafe(move || entry(context))) {
                Ok(()) => Some(ExitStatus::Exited(0)),
                Err(payload) if payload.is::<ProcessExit>() => None,
                Err(_) => {
                    warn!(%pid, "process body panicked");
                    Some(ExitStatus::Signaled(SIGABRT))
                }
            };

            if let Some(status) = status {
                if let Err(e) = manager.exit_process(pid, status) {
                    warn!(%pid, error = %e, "implicit exit failed");
                }
            }
        })
    }

    /// Record the termination of `pid`
    ///
    /// Becomes `Zombie` when a running parent can still wait for it, otherwise
    /// goes straight to `Reclaimed`. Running children are orphaned and zombie
    /// children reclaimed. The address space is destroyed after the table lock
    /// is released. Returns the disposition.
    ///
    /// This is the table half of exit; [`ProcessContext::exit`] also transfers
    /// control out of the calling process.
    pub fn exit_process(&self, pid: Pid, status: ExitStatus) -> ProcessResult<ProcessState> {
        let (disposition, address_space) = {
            let mut table = self.lock();

            let (parent, address_space) = {
                let record = table.get_mut(pid).ok_or(ProcessError::NotFound(pid))?;
                if record.state != ProcessState::Running {
                    return Err(ProcessError::AlreadyExited(pid));
                }
                debug_assert!(record.exit_status.is_none());
                record.exit_status = Some(status);
                (record.parent, record.address_space.take())
            };

            for child in table.children_of(pid) {
                let child_state = table.get(child).map(|r| r.state);
                match child_state {
                    Some(ProcessState::Zombie) => {
                        let reaped = table.reclaim(child);
                        if let Some(child_status) = reaped.exit_status {
                            self.emit(LifecycleEvent::Reaped {
                                pid: child,
                                by: pid,
                                status: child_status,
                            });
                        }
                    }
                    Some(_) => {
                        if let Some(record) = table.get_mut(child) {
                            record.parent = None;
                        }
                    }
                    None => {}
                }
            }

            let parent_can_wait = parent.map_or(false, |parent| table.is_running(parent));
            let disposition = if parent_can_wait {
                let record = table
                    .get_mut(pid)
                    .unwrap_or_else(|| panic!("process {} vanished during exit", pid));
                record.state = ProcessState::Zombie;
                record.exited.notify_all();
                ProcessState::Zombie
            } else {
                table.reclaim(pid);
                ProcessState::Reclaimed
            };

            self.emit(LifecycleEvent::Exited {
                pid,
                status,
                disposition,
            });
            (disposition, address_space)
        };

        if let Some(address_space) = address_space {
            self.shared.address_spaces.destroy(address_space);
        }

        debug!(%pid, ?status, ?disposition, "exited");
        Ok(disposition)
    }

    /// Block until child `target` of `caller` exits, then reap it
    pub fn wait(
        &self,
        caller: Pid,
        target: Pid,
        options: WaitOptions,
    ) -> ProcessResult<(Pid, ExitStatus)> {
        options.validate()?;

        let mut table = self.lock();
        loop {
            let record = table.get(target).ok_or(ProcessError::NotFound(target))?;
            if record.parent != Some(caller) {
                return Err(ProcessError::NotChild {
                    pid: target,
                    caller,
                });
            }

            let state = record.state;
            let exited = Arc::clone(&record.exited);

            match state {
                ProcessState::Running => {
                    exited.wait(&mut table);
                }
                ProcessState::Zombie => {
                    let reaped = table.reclaim(target);
                    let status = reaped
                        .exit_status
                        .unwrap_or_else(|| panic!("zombie {} has no exit status", target));
                    self.emit(LifecycleEvent::Reaped {
                        pid: target,
                        by: caller,
                        status,
                    });
                    debug!(%caller, %target, ?status, "reaped");
                    return Ok((target, status));
                }
                ProcessState::Reclaimed => {
                    unreachable!("reclaimed process {} still in the table", target)
                }
            }
        }
    }

    /// Snapshot of one process
    pub fn process(&self, pid: Pid) -> Option<ProcessInfo> {
        self.lock().info(pid)
    }

    /// Snapshot of the whole table, ordered by pid
    pub fn list_processes(&self) -> Vec<ProcessInfo> {
        self.lock().list()
    }

    pub fn children_of(&self, pid: Pid) -> Vec<Pid> {
        self.lock().children_of(pid)
    }

    /// Whether `pid` is held by a running or zombie process
    pub fn is_pid_in_use(&self, pid: Pid) -> bool {
        self.lock().is_pid_allocated(pid)
    }

    pub fn process_count(&self) -> usize {
        self.lock().len()
    }

    /// Check the one-record-per-allocated-pid invariant
    pub fn is_consistent(&self) -> bool {
        self.lock().is_consistent()
    }

    /// Wait for every execution context started so far to finish
    ///
    /// Must not be called from inside a process that is still running.
    pub fn join_all(&self) {
        self.shared.spawner.join_all();
    }
}

impl Default for ProcessManager {
    fn default() -> Self {
        Self::new()
    }
}
