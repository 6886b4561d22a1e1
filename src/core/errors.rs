/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use super::id::Pid;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Process lifecycle errors with serialization support
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ProcessError {
    #[error("Process {0} not found")]
    #[diagnostic(
        code(process::not_found),
        help("The process may have been reaped already or never existed. Check PID validity.")
    )]
    NotFound(Pid),

    #[error("Process {pid} is not a child of process {caller}")]
    #[diagnostic(
        code(process::not_child),
        help("Only the parent of a process may wait for it.")
    )]
    NotChild { pid: Pid, caller: Pid },

    #[error("Unsupported wait options: {0:#x}")]
    #[diagnostic(
        code(process::invalid_options),
        help("No wait option flags are supported. Pass 0.")
    )]
    InvalidOptions(u32),

    #[error("Process {0} has already exited")]
    #[diagnostic(
        code(process::already_exited),
        help("A process can exit only once.")
    )]
    AlreadyExited(Pid),

    #[error("Process table full: all {0} pids in use")]
    #[diagnostic(
        code(process::pid_exhausted),
        help("Reap finished children with wait to release their pids.")
    )]
    PidExhausted(usize),

    #[error("Out of memory: {0}")]
    #[diagnostic(
        code(process::out_of_memory),
        help("The address space for the new process could not be created.")
    )]
    OutOfMemory(String),

    #[error("Failed to start execution context: {0}")]
    #[diagnostic(
        code(process::spawn_failed),
        help("The thread backing the new process could not be started.")
    )]
    SpawnFailed(String),
}

impl ProcessError {
    /// Resource exhaustion errors are the only ones fork reports
    #[inline]
    #[must_use]
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(
            self,
            ProcessError::PidExhausted(_)
                | ProcessError::OutOfMemory(_)
                | ProcessError::SpawnFailed(_)
        )
    }
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    #[diagnostic(
        code(config::invalid_value),
        help("Check the environment variable or config file entry.")
    )]
    InvalidValue { key: String, value: String },

    #[error("Failed to read config file {path}: {reason}")]
    #[diagnostic(code(config::unreadable), help("Make sure the file exists and is readable."))]
    Unreadable { path: String, reason: String },

    #[error("Failed to parse config: {0}")]
    #[diagnostic(code(config::parse), help("The config file must be a JSON object."))]
    Parse(String),
}

/// Unified kernel error type with miette diagnostics
#[derive(Error, Debug, Diagnostic)]
pub enum KernelError {
    #[error("Process error: {0}")]
    #[diagnostic(transparent)]
    Process(#[from] ProcessError),

    #[error("Configuration error: {0}")]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    #[diagnostic(
        code(kernel::internal_error),
        help("An unexpected internal error occurred. Please report this issue.")
    )]
    Internal(String),
}

impl From<String> for KernelError {
    fn from(msg: String) -> Self {
        KernelError::Internal(msg)
    }
}

impl From<&str> for KernelError {
    fn from(msg: &str) -> Self {
        KernelError::Internal(msg.to_string())
    }
}

/// Result type for kernel operations
pub type Result<T> = std::result::Result<T, KernelError>;
