/*!
 * Process Syscalls
 * fork, getpid, waitpid and _exit on top of the process manager
 */

use super::errno::Errno;
use crate::core::id::Pid;
use crate::monitoring::span_syscall;
use crate::process::{ExitStatus, ProcessContext, WaitOptions};

/// Result of a process syscall
pub type SyscallResult<T> = Result<T, Errno>;

/// Pid of the calling process
pub fn sys_getpid(ctx: &ProcessContext) -> Pid {
    let _span = span_syscall("getpid", ctx.pid().as_u32());
    ctx.pid()
}

/// Fork the caller; the child runs `entry` and the parent gets the child's pid
pub fn sys_fork<F>(ctx: &ProcessContext, entry: F) -> SyscallResult<Pid>
where
    F: FnOnce(ProcessContext) + Send + 'static,
{
    let span = span_syscall("fork", ctx.pid().as_u32());
    match ctx.fork(ctx.name(), entry) {
        Ok(child) => {
            span.record_success();
            Ok(child)
        }
        Err(e) => {
            let errno = e.errno();
            span.record_errno(errno.code());
            Err(errno)
        }
    }
}

/// Wait for child `pid`; returns the pid and the encoded wait status
///
/// Options are validated before the pid is even looked at.
pub fn sys_waitpid(ctx: &ProcessContext, pid: i32, options: i32) -> SyscallResult<(Pid, i32)> {
    let span = span_syscall("waitpid", ctx.pid().as_u32());
    let result = waitpid(ctx, pid, options);
    match result {
        Ok(_) => span.record_success(),
        Err(errno) => span.record_errno(errno.code()),
    }
    result
}

fn waitpid(ctx: &ProcessContext, pid: i32, options: i32) -> SyscallResult<(Pid, i32)> {
    WaitOptions::from_bits(options as u32)
        .validate()
        .map_err(|e| e.errno())?;

    // Waiting on process groups or "any child" is not supported
    let target = u32::try_from(pid)
        .ok()
        .filter(|raw| *raw > 0)
        .map(Pid)
        .ok_or(Errno::ESRCH)?;

    let (reaped, status) = ctx
        .waitpid(target, WaitOptions::NONE)
        .map_err(|e| e.errno())?;
    Ok((reaped, status.encode()))
}

/// Terminate the caller with `code`; never returns
pub fn sys_exit(ctx: ProcessContext, code: i32) -> ! {
    let _span = span_syscall("_exit", ctx.pid().as_u32());
    ctx.terminate(ExitStatus::Exited(code))
}
