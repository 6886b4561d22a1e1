/*!
 * Process Traits
 * Interfaces to the collaborators the lifecycle manager drives but does not own
 */

use crate::core::id::Pid;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Opaque handle to an address space owned by an [`AddressSpaceProvider`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressSpaceId(pub u64);

impl fmt::Display for AddressSpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "as#{}", self.0)
    }
}

/// Address space errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressSpaceError {
    #[error("address space capacity {capacity} exhausted")]
    OutOfMemory { capacity: usize },

    #[error("unknown address space {0}")]
    UnknownHandle(AddressSpaceId),
}

/// Execution context errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpawnError {
    #[error("could not start thread for process {pid}: {reason}")]
    ThreadCreation { pid: Pid, reason: String },
}

/// Body run by a freshly spawned execution context
pub type ContextBody = Box<dyn FnOnce() + Send + 'static>;

/// Address space management
#[cfg_attr(test, mockall::automock)]
pub trait AddressSpaceProvider: Send + Sync {
    /// Create an empty address space
    fn create(&self) -> Result<AddressSpaceId, AddressSpaceError>;

    /// Create an independent copy of `source`
    fn duplicate(&self, source: AddressSpaceId) -> Result<AddressSpaceId, AddressSpaceError>;

    /// Release an address space; the handle is dead afterwards
    fn destroy(&self, handle: AddressSpaceId);
}

/// Thread-of-control creation and teardown
pub trait ContextSpawner: Send + Sync {
    /// Begin running `body` concurrently on behalf of process `pid`
    fn spawn(&self, pid: Pid, name: &str, body: ContextBody) -> Result<(), SpawnError>;

    /// Wait for every context started so far to finish
    fn join_all(&self) {}
}
