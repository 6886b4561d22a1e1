/*!
 * Process Module
 * Process table, fork/exit/wait, and the collaborators they drive
 */

pub mod context;
pub mod manager;
pub mod manager_builder;
pub mod runtime;
mod table;
pub mod traits;
pub mod types;

// Re-export for convenience
pub use context::ProcessContext;
pub use manager::{ProcessEntry, ProcessManager, ProcessManagerBuilder};
pub use runtime::{ProcessExit, SimulatedAddressSpaces, ThreadSpawner};
pub use traits::{
    AddressSpaceError, AddressSpaceId, AddressSpaceProvider, ContextBody, ContextSpawner,
    SpawnError,
};
pub use types::{
    wexitstatus, wifexited, wifsignaled, wtermsig, ExitStatus, LifecycleEvent, ProcessInfo,
    ProcessResult, ProcessState, WaitOptions,
};
