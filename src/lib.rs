/*!
 * Synch Kernel Library
 * Intersection admission control and process lifecycle management
 */

pub mod core;
pub mod monitoring;
pub mod process;
pub mod syscalls;
pub mod traffic;

// Re-exports
pub use crate::core::errors::{ConfigError, KernelError, ProcessError, Result};
pub use crate::core::id::Pid;
pub use monitoring::init_tracing;
pub use process::{
    ExitStatus, LifecycleEvent, ProcessContext, ProcessInfo, ProcessManager,
    ProcessManagerBuilder, ProcessState, WaitOptions,
};
pub use syscalls::Errno;
pub use traffic::{
    Direction, Intersection, IntersectionConfig, SimulationConfig, SimulationReport, Vehicle,
    WakeupStrategy,
};
