/*!
 * Process Types
 * Common types for process lifecycle management
 */

use super::traits::AddressSpaceId;
use crate::core::errors::ProcessError;
use crate::core::id::Pid;
use serde::{Deserialize, Serialize};

/// Process operation result
///
/// # Must Use
/// Process operations can fail and must be handled to prevent pid leaks
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Process state
///
/// `Running` and `Zombie` hold the pid. `Reclaimed` is terminal: the record is
/// removed from the table and the pid returned to the allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    /// Process is executing
    Running,
    /// Process has exited and waits for its parent to collect the status
    Zombie,
    /// Process is gone and its pid is free
    Reclaimed,
}

impl ProcessState {
    #[inline(always)]
    #[must_use]
    pub const fn holds_pid(self) -> bool {
        matches!(self, ProcessState::Running | ProcessState::Zombie)
    }
}

// Low two bits of an encoded wait status select the termination kind,
// the remaining bits carry the code or signal number
const WAIT_KIND_MASK: i32 = 0x3;
const WAIT_KIND_EXITED: i32 = 0;
const WAIT_KIND_SIGNALED: i32 = 1;
const WAIT_KIND_DUMPED: i32 = 2;

/// How a process terminated
///
/// Exit codes and signal numbers in `[-2^29, 2^29)` survive
/// [`ExitStatus::encode`]/[`ExitStatus::decode`] unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ExitStatus {
    /// Called exit with this code
    Exited(i32),
    /// Terminated abnormally with this signal
    Signaled(i32),
    /// Terminated abnormally with this signal and dumped core
    Dumped(i32),
}

impl ExitStatus {
    /// Pack into a wait-status word
    #[must_use]
    pub const fn encode(self) -> i32 {
        match self {
            ExitStatus::Exited(code) => code.wrapping_shl(2) | WAIT_KIND_EXITED,
            ExitStatus::Signaled(sig) => sig.wrapping_shl(2) | WAIT_KIND_SIGNALED,
            ExitStatus::Dumped(sig) => sig.wrapping_shl(2) | WAIT_KIND_DUMPED,
        }
    }

    /// Unpack a wait-status word; `None` for the unused stopped kind
    #[must_use]
    pub const fn decode(word: i32) -> Option<ExitStatus> {
        let value = word >> 2;
        match word & WAIT_KIND_MASK {
            WAIT_KIND_EXITED => Some(ExitStatus::Exited(value)),
            WAIT_KIND_SIGNALED => Some(ExitStatus::Signaled(value)),
            WAIT_KIND_DUMPED => Some(ExitStatus::Dumped(value)),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_normal(self) -> bool {
        matches!(self, ExitStatus::Exited(_))
    }
}

/// Whether the process exited normally
#[inline]
pub const fn wifexited(word: i32) -> bool {
    word & WAIT_KIND_MASK == WAIT_KIND_EXITED
}

/// Exit code of a normally exited process
#[inline]
pub const fn wexitstatus(word: i32) -> i32 {
    word >> 2
}

/// Whether the process was terminated by a signal
#[inline]
pub const fn wifsignaled(word: i32) -> bool {
    let kind = word & WAIT_KIND_MASK;
    kind == WAIT_KIND_SIGNALED || kind == WAIT_KIND_DUMPED
}

/// Signal that terminated the process
#[inline]
pub const fn wtermsig(word: i32) -> i32 {
    word >> 2
}

/// Option flags accepted by wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WaitOptions(u32);

impl WaitOptions {
    pub const NONE: WaitOptions = WaitOptions(0);
    /// Return immediately if the child is still running (not supported)
    pub const WNOHANG: WaitOptions = WaitOptions(1);
    /// Also report stopped children (not supported)
    pub const WUNTRACED: WaitOptions = WaitOptions(2);

    const SUPPORTED: u32 = 0;

    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        WaitOptions(bits)
    }

    /// Reject any flag outside the supported set
    pub fn validate(self) -> ProcessResult<()> {
        if self.0 & !Self::SUPPORTED != 0 {
            return Err(ProcessError::InvalidOptions(self.0));
        }
        Ok(())
    }
}

/// Snapshot of one process table entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProcessInfo {
    pub pid: Pid,
    pub name: String,
    pub parent: Option<Pid>,
    pub state: ProcessState,
    pub exit_status: Option<ExitStatus>,
    pub address_space: Option<AddressSpaceId>,
}

/// Table transitions reported to an observer, in the order they happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// Process registered (by boot or fork)
    Created { pid: Pid, parent: Option<Pid> },
    /// Fork rolled back after the record was inserted
    Aborted { pid: Pid },
    /// Process exited; `disposition` is `Zombie` or `Reclaimed`
    Exited {
        pid: Pid,
        status: ExitStatus,
        disposition: ProcessState,
    },
    /// Zombie collected, by its parent's wait or its parent's exit
    Reaped { pid: Pid, by: Pid, status: ExitStatus },
}
