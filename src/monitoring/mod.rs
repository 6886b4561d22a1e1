/*!
 * Monitoring
 * Structured tracing setup and syscall spans
 */

mod tracer;

pub use tracer::{init_tracing, next_trace_id, span_syscall, SyscallSpan};
