/*!
 * Process Runtime
 *
 * Hosted stand-ins for the collaborators a real kernel provides: a registry
 * of simulated address spaces and a spawner that backs each process with a
 * named OS thread.
 */

use super::traits::{
    AddressSpaceError, AddressSpaceId, AddressSpaceProvider, ContextBody, ContextSpawner,
    SpawnError,
};
use crate::core::id::Pid;
use crate::core::limits::DEFAULT_ADDRESS_SPACE_CAPACITY;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{trace, warn};

/// Unwind payload carrying a process out of its entry when it calls exit
///
/// Raised with `resume_unwind` (no panic hook runs) and caught by the
/// execution-context trampoline.
#[derive(Debug, Clone, Copy)]
pub struct ProcessExit {
    pub pid: Pid,
}

/// Bookkeeping for one simulated address space
#[derive(Debug, Clone, Copy)]
struct SpaceEntry {
    copied_from: Option<AddressSpaceId>,
}

/// Address spaces tracked in a concurrent registry with a fixed capacity
pub struct SimulatedAddressSpaces {
    spaces: DashMap<AddressSpaceId, SpaceEntry>,
    next_id: AtomicU64,
    live: AtomicUsize,
    capacity: usize,
}

impl SimulatedAddressSpaces {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_ADDRESS_SPACE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            spaces: DashMap::new(),
            next_id: AtomicU64::new(1),
            live: AtomicUsize::new(0),
            capacity,
        }
    }

    /// Address spaces currently alive
    #[inline]
    pub fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    #[inline]
    pub fn contains(&self, handle: AddressSpaceId) -> bool {
        self.spaces.contains_key(&handle)
    }

    /// Address space `handle` was duplicated from, if any
    pub fn copied_from(&self, handle: AddressSpaceId) -> Option<AddressSpaceId> {
        self.spaces.get(&handle).and_then(|entry| entry.copied_from)
    }

    fn reserve(&self) -> Result<(), AddressSpaceError> {
        self.live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                (live < self.capacity).then_some(live + 1)
            })
            .map(|_| ())
            .map_err(|_| AddressSpaceError::OutOfMemory {
                capacity: self.capacity,
            })
    }

    fn insert(&self, copied_from: Option<AddressSpaceId>) -> Result<AddressSpaceId, AddressSpaceError> {
        self.reserve()?;
        let handle = AddressSpaceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.spaces.insert(handle, SpaceEntry { copied_from });
        trace!(%handle, "address space created");
        Ok(handle)
    }
}

impl Default for SimulatedAddressSpaces {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressSpaceProvider for SimulatedAddressSpaces {
    fn create(&self) -> Result<AddressSpaceId, AddressSpaceError> {
        self.insert(None)
    }

    fn duplicate(&self, source: AddressSpaceId) -> Result<AddressSpaceId, AddressSpaceError> {
        if !self.spaces.contains_key(&source) {
            return Err(AddressSpaceError::UnknownHandle(source));
        }
        self.insert(Some(source))
    }

    fn destroy(&self, handle: AddressSpaceId) {
        if self.spaces.remove(&handle).is_some() {
            self.live.fetch_sub(1, Ordering::AcqRel);
            trace!(%handle, "address space destroyed");
        } else {
            warn!(%handle, "destroy of unknown address space");
        }
    }
}

/// Runs every process on its own named OS thread
#[derive(Default)]
pub struct ThreadSpawner {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Threads started and not yet joined
    pub fn pending(&self) -> usize {
        self.handles.lock().len()
    }
}

impl ContextSpawner for ThreadSpawner {
    fn spawn(&self, pid: Pid, name: &str, body: ContextBody) -> Result<(), SpawnError> {
        let handle = thread::Builder::new()
            .name(format!("{}[{}]", name, pid))
            .spawn(body)
            .map_err(|e| SpawnError::ThreadCreation {
                pid,
                reason: e.to_string(),
            })?;

        let mut handles = self.handles.lock();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
        Ok(())
    }

    fn join_all(&self) {
        loop {
            // Joined threads may spawn more contexts; keep draining until empty
            let batch = std::mem::take(&mut *self.handles.lock());
            if batch.is_empty() {
                break;
            }
            for handle in batch {
                if handle.join().is_err() {
                    warn!("process thread terminated by an uncaught panic");
                }
            }
        }
    }
}
