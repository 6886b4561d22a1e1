/*!
 * Process Context
 * The "current process" handle a process body runs with
 */

use super::manager::{ProcessEntry, ProcessManager};
use super::runtime::ProcessExit;
use super::types::{ExitStatus, ProcessResult, WaitOptions};
use crate::core::id::Pid;
use std::fmt;
use std::panic;
use tracing::warn;

/// Identity of the running process plus access to its manager
///
/// Handed to every forked child's entry; the booted process gets one from
/// [`ProcessManager::boot`].
pub struct ProcessContext {
    pid: Pid,
    name: String,
    manager: ProcessManager,
}

impl ProcessContext {
    pub(super) fn new(pid: Pid, name: String, manager: ProcessManager) -> Self {
        Self { pid, name, manager }
    }

    #[inline]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn manager(&self) -> &ProcessManager {
        &self.manager
    }

    /// Fork a child that runs `entry` with its own context
    pub fn fork<F>(&self, name: &str, entry: F) -> ProcessResult<Pid>
    where
        F: FnOnce(ProcessContext) + Send + 'static,
    {
        self.fork_boxed(name, Box::new(entry))
    }

    pub fn fork_boxed(&self, name: &str, entry: ProcessEntry) -> ProcessResult<Pid> {
        self.manager.fork(self.pid, name, entry)
    }

    /// Block until child `pid` exits and collect its status
    pub fn waitpid(&self, pid: Pid, options: WaitOptions) -> ProcessResult<(Pid, ExitStatus)> {
        self.manager.wait(self.pid, pid, options)
    }

    /// Exit with `code`; never returns
    ///
    /// Inside a forked child this ends the child's body. Called on the booted
    /// process it unwinds the thread that booted it.
    pub fn exit(self, code: i32) -> ! {
        self.terminate(ExitStatus::Exited(code))
    }

    pub(crate) fn terminate(self, status: ExitStatus) -> ! {
        if let Err(e) = self.manager.exit_process(self.pid, status) {
            warn!(pid = %self.pid, error = %e, "exit on a process that already left");
        }
        panic::resume_unwind(Box::new(ProcessExit { pid: self.pid }))
    }
}

impl fmt::Debug for ProcessContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessContext")
            .field("pid", &self.pid)
            .field("name", &self.name)
            .finish()
    }
}
