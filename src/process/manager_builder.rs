/*!
 * Process Manager Builder
 * Builder pattern for ProcessManager construction
 */

use super::manager::{ProcessManager, Shared};
use super::runtime::{SimulatedAddressSpaces, ThreadSpawner};
use super::table::ProcessTable;
use super::traits::{AddressSpaceProvider, ContextSpawner};
use super::types::LifecycleEvent;
use crate::core::id::PidAllocator;
use crate::core::limits::{PID_MAX, PID_MIN};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

/// Builder for ProcessManager
pub struct ProcessManagerBuilder {
    pid_min: u32,
    pid_max: u32,
    address_spaces: Option<Arc<dyn AddressSpaceProvider>>,
    spawner: Option<Arc<dyn ContextSpawner>>,
    observer: Option<flume::Sender<LifecycleEvent>>,
}

impl ProcessManagerBuilder {
    /// Create a new ProcessManager builder
    pub fn new() -> Self {
        Self {
            pid_min: PID_MIN,
            pid_max: PID_MAX,
            address_spaces: None,
            spawner: None,
            observer: None,
        }
    }

    /// Restrict pids to the inclusive range `[min, max]`
    pub fn with_pid_range(mut self, min: u32, max: u32) -> Self {
        self.pid_min = min;
        self.pid_max = max;
        self
    }

    /// Use a custom address space provider
    pub fn with_address_spaces(mut self, provider: Arc<dyn AddressSpaceProvider>) -> Self {
        self.address_spaces = Some(provider);
        self
    }

    /// Use a custom execution context spawner
    pub fn with_spawner(mut self, spawner: Arc<dyn ContextSpawner>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    /// Report every table transition on `observer`
    pub fn with_observer(mut self, observer: flume::Sender<LifecycleEvent>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Build the ProcessManager
    ///
    /// # Panics
    /// If the pid range is empty
    pub fn build(self) -> ProcessManager {
        let mut features = Vec::new();
        if self.address_spaces.is_some() {
            features.push("custom-address-spaces");
        }
        if self.spawner.is_some() {
            features.push("custom-spawner");
        }
        if self.observer.is_some() {
            features.push("observer");
        }

        info!(
            pid_min = self.pid_min,
            pid_max = self.pid_max,
            features = %features.join(", "),
            "Process manager initialized"
        );

        ProcessManager::from_shared(Shared {
            table: Mutex::new(ProcessTable::new(PidAllocator::new(
                self.pid_min,
                self.pid_max,
            ))),
            address_spaces: self.address_spaces.unwrap_or_else(|| {
                Arc::new(SimulatedAddressSpaces::new()) as Arc<dyn AddressSpaceProvider>
            }),
            spawner: self
                .spawner
                .unwrap_or_else(|| Arc::new(ThreadSpawner::new()) as Arc<dyn ContextSpawner>),
            observer: self.observer,
        })
    }
}

impl Default for ProcessManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
