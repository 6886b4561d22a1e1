/*!
 * System Limits and Constants
 *
 * Centralized location for system-wide limits and tunables.
 * Organized by domain (process table, address spaces, traffic simulation).
 */

use std::time::Duration;

// =============================================================================
// PROCESS TABLE
// =============================================================================

/// Lowest pid handed out by the allocator
/// Pids 0 and 1 are reserved for the kernel itself
pub const PID_MIN: u32 = 2;

/// Highest pid handed out by the allocator (inclusive)
pub const PID_MAX: u32 = 32767;

/// Signal number recorded when a process body panics
pub const SIGABRT: i32 = 6;

// =============================================================================
// ADDRESS SPACES
// =============================================================================

/// Live address spaces the simulated provider will hold before reporting
/// out-of-memory on create/duplicate
pub const DEFAULT_ADDRESS_SPACE_CAPACITY: usize = 1024;

// =============================================================================
// TRAFFIC SIMULATION
// =============================================================================

/// Concurrent vehicle-generating threads
pub const DEFAULT_SIM_THREADS: usize = 10;

/// Vehicles each simulation thread sends through the intersection
pub const DEFAULT_VEHICLES_PER_THREAD: usize = 20;

/// Upper bound on time spent inside the intersection
pub const DEFAULT_MAX_CROSSING_TIME: Duration = Duration::from_millis(2);

/// Upper bound on delay between consecutive arrivals of one thread
pub const DEFAULT_MAX_ARRIVAL_DELAY: Duration = Duration::from_millis(1);

/// Seed for the simulation's traffic generator
pub const DEFAULT_SIM_SEED: u64 = 0x5EED_CA75;

/// Hard cap on simulation threads accepted from configuration
pub const MAX_SIM_THREADS: usize = 256;
