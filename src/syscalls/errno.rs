/*!
 * Kernel Error Numbers
 * Errno values returned across the syscall boundary
 */

use crate::core::errors::ProcessError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error number reported to user code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum Errno {
    /// Out of memory
    ENOMEM = 3,
    /// Invalid argument
    EINVAL = 8,
    /// Too many processes in system
    ENPROC = 12,
    /// No such process
    ESRCH = 15,
    /// No child processes
    ECHILD = 16,
}

impl Errno {
    #[inline]
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let description = match self {
            Errno::ENOMEM => "Out of memory",
            Errno::EINVAL => "Invalid argument",
            Errno::ENPROC => "Too many processes in system",
            Errno::ESRCH => "No such process",
            Errno::ECHILD => "No child processes",
        };
        write!(f, "{} ({})", description, self.code())
    }
}

impl ProcessError {
    /// Errno reported for this error at the syscall boundary
    #[must_use]
    pub fn errno(&self) -> Errno {
        match self {
            ProcessError::NotFound(_) => Errno::ESRCH,
            ProcessError::NotChild { .. } => Errno::ECHILD,
            ProcessError::InvalidOptions(_) | ProcessError::AlreadyExited(_) => Errno::EINVAL,
            ProcessError::PidExhausted(_) => Errno::ENPROC,
            ProcessError::OutOfMemory(_) | ProcessError::SpawnFailed(_) => Errno::ENOMEM,
        }
    }
}

impl From<ProcessError> for Errno {
    fn from(err: ProcessError) -> Self {
        err.errno()
    }
}
