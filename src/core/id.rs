/*!
 * ID Management
 * Type-safe process identifiers and the bounded pid allocator
 */

use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use super::limits::{PID_MAX, PID_MIN};

/// Process ID (32-bit)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pid(pub u32);

impl Pid {
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Pid {
    fn from(raw: u32) -> Self {
        Pid(raw)
    }
}

/// Bounded pid allocator with recycling
///
/// Mints fresh pids from `[min, max]` and reuses released ones in release
/// order. Not synchronized on its own: the process table owns it and only
/// touches it with the table lock held.
#[derive(Debug)]
pub struct PidAllocator {
    min: u32,
    max: u32,
    next: u32,
    free_list: VecDeque<u32>,
    in_use: AHashSet<u32>,
}

impl PidAllocator {
    /// Create an allocator over the inclusive range `[min, max]`
    pub fn new(min: u32, max: u32) -> Self {
        assert!(min <= max, "empty pid range {}..={}", min, max);
        Self {
            min,
            max,
            next: min,
            free_list: VecDeque::new(),
            in_use: AHashSet::new(),
        }
    }

    /// Allocate a pid, or `None` when every pid in the range is held
    pub fn allocate(&mut self) -> Option<Pid> {
        let raw = match self.free_list.pop_front() {
            Some(raw) => raw,
            None if self.next <= self.max => {
                let raw = self.next;
                self.next += 1;
                raw
            }
            None => return None,
        };

        // A collision here means a pid was released while still held
        assert!(self.in_use.insert(raw), "pid {} allocated twice", raw);
        Some(Pid(raw))
    }

    /// Return a pid to the pool
    ///
    /// # Panics
    /// Releasing a pid that is not currently allocated
    pub fn release(&mut self, pid: Pid) {
        assert!(
            self.in_use.remove(&pid.0),
            "released pid {} that was not allocated",
            pid
        );
        self.free_list.push_back(pid.0);
    }

    #[inline]
    #[must_use]
    pub fn is_allocated(&self, pid: Pid) -> bool {
        self.in_use.contains(&pid.0)
    }

    #[inline]
    #[must_use]
    pub fn allocated(&self) -> usize {
        self.in_use.len()
    }

    /// Total pids in the range
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        (self.max - self.min) as usize + 1
    }
}

impl Default for PidAllocator {
    fn default() -> Self {
        Self::new(PID_MIN, PID_MAX)
    }
}
