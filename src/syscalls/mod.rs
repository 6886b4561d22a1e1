/*!
 * Syscalls Module
 * System call entry points for the process lifecycle
 */

mod errno;
mod process;

// Re-export public API
pub use errno::Errno;
pub use process::{sys_exit, sys_fork, sys_getpid, sys_waitpid, SyscallResult};
