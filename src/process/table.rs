/*!
 * Process Table
 *
 * Records and pid allocation for every live process. The table is only ever
 * reached through the manager's mutex, so nothing here synchronizes on its
 * own; holding `&mut ProcessTable` is holding the table lock.
 */

use super::traits::AddressSpaceId;
use super::types::{ExitStatus, ProcessInfo, ProcessResult, ProcessState};
use crate::core::errors::ProcessError;
use crate::core::id::{Pid, PidAllocator};
use ahash::AHashMap;
use parking_lot::Condvar;
use std::sync::Arc;

/// One process table entry
pub(crate) struct ProcessRecord {
    pub pid: Pid,
    pub name: String,
    pub parent: Option<Pid>,
    pub state: ProcessState,
    pub exit_status: Option<ExitStatus>,
    /// Signalled (broadcast) when this process leaves `Running`
    pub exited: Arc<Condvar>,
    pub address_space: Option<AddressSpaceId>,
}

impl ProcessRecord {
    fn info(&self) -> ProcessInfo {
        ProcessInfo {
            pid: self.pid,
            name: self.name.clone(),
            parent: self.parent,
            state: self.state,
            exit_status: self.exit_status,
            address_space: self.address_space,
        }
    }
}

pub(crate) struct ProcessTable {
    records: AHashMap<Pid, ProcessRecord>,
    pids: PidAllocator,
}

impl ProcessTable {
    pub fn new(pids: PidAllocator) -> Self {
        Self {
            records: AHashMap::new(),
            pids,
        }
    }

    /// Allocate a pid and register a running process under it
    pub fn insert(
        &mut self,
        name: &str,
        parent: Option<Pid>,
        address_space: AddressSpaceId,
    ) -> ProcessResult<Pid> {
        let pid = self
            .pids
            .allocate()
            .ok_or_else(|| ProcessError::PidExhausted(self.pids.capacity()))?;

        let record = ProcessRecord {
            pid,
            name: name.to_string(),
            parent,
            state: ProcessState::Running,
            exit_status: None,
            exited: Arc::new(Condvar::new()),
            address_space: Some(address_space),
        };
        let previous = self.records.insert(pid, record);
        assert!(previous.is_none(), "pid {} already has a process record", pid);
        Ok(pid)
    }

    #[inline]
    pub fn get(&self, pid: Pid) -> Option<&ProcessRecord> {
        self.records.get(&pid)
    }

    #[inline]
    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut ProcessRecord> {
        self.records.get_mut(&pid)
    }

    /// Remove a record and free its pid (the transition to `Reclaimed`)
    ///
    /// # Panics
    /// If no record exists for `pid`
    pub fn reclaim(&mut self, pid: Pid) -> ProcessRecord {
        let mut record = self
            .records
            .remove(&pid)
            .unwrap_or_else(|| panic!("reclaiming pid {} with no process record", pid));
        self.pids.release(pid);
        record.state = ProcessState::Reclaimed;
        record
    }

    pub fn children_of(&self, parent: Pid) -> Vec<Pid> {
        let mut children: Vec<Pid> = self
            .records
            .values()
            .filter(|r| r.parent == Some(parent))
            .map(|r| r.pid)
            .collect();
        children.sort_unstable();
        children
    }

    /// Whether `pid` names a process that can still call wait
    #[inline]
    pub fn is_running(&self, pid: Pid) -> bool {
        self.get(pid)
            .map_or(false, |r| r.state == ProcessState::Running)
    }

    pub fn info(&self, pid: Pid) -> Option<ProcessInfo> {
        self.get(pid).map(ProcessRecord::info)
    }

    pub fn list(&self) -> Vec<ProcessInfo> {
        let mut all: Vec<ProcessInfo> = self.records.values().map(ProcessRecord::info).collect();
        all.sort_unstable_by_key(|info| info.pid);
        all
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_pid_allocated(&self, pid: Pid) -> bool {
        self.pids.is_allocated(pid)
    }

    /// Every allocated pid has exactly one record and vice versa
    pub fn is_consistent(&self) -> bool {
        self.records.len() == self.pids.allocated()
            && self
                .records
                .iter()
                .all(|(pid, record)| *pid == record.pid && self.pids.is_allocated(*pid))
    }
}
