use core::sync::atomic::{AtomicU64, Ordering};

use hashbrown::HashMap;

use crate::error::AllocationError;
use crate::id::BufferId;
use crate::memory_management::{DeviceAllocator, DeviceBuffer, MemoryUsage};

use super::FaultInjector;

/// The pattern fresh allocations are filled with, mimicking uninitialized device memory.
pub const POISON: u64 = 0xA5A5_A5A5_A5A5_A5A5;

/// Allocator of the CPU device.
///
/// Every live allocation is tracked so leaks can be detected, and an optional budget bounds
/// the number of bytes in use.
#[derive(Debug)]
pub struct CpuAllocator {
    live: spin::Mutex<HashMap<BufferId, u64>>,
    peak: AtomicU64,
    budget: Option<u64>,
    faults: FaultInjector,
}

impl Default for CpuAllocator {
    fn default() -> Self {
        Self::new(None)
    }
}

impl CpuAllocator {
    /// Create an allocator with an optional budget in bytes.
    pub fn new(budget: Option<u64>) -> Self {
        Self {
            live: spin::Mutex::new(HashMap::new()),
            peak: AtomicU64::new(0),
            budget,
            faults: FaultInjector::default(),
        }
    }

    /// The fault injector of the allocations.
    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }

    /// The ids of the live allocations.
    pub fn live_buffers(&self) -> Vec<BufferId> {
        let mut ids: Vec<_> = self.live.lock().keys().copied().collect();
        ids.sort();
        ids
    }
}

impl DeviceAllocator for CpuAllocator {
    fn allocate(&self, size: u64) -> Result<DeviceBuffer, AllocationError> {
        if self.faults.tick() {
            return Err(AllocationError::Rejected {
                reason: format!("Injected failure while allocating {size} bytes"),
            });
        }

        let mut live = self.live.lock();
        let in_use: u64 = live.values().sum();

        if let Some(budget) = self.budget {
            let available = budget.saturating_sub(in_use);
            if size > available {
                return Err(AllocationError::OutOfMemory {
                    requested: size,
                    available,
                });
            }
        }

        let buffer = DeviceBuffer::new(size, POISON);
        live.insert(buffer.id(), size);
        self.peak.fetch_max(in_use + size, Ordering::Relaxed);

        log::trace!("Allocated {} of {size} bytes", buffer.id());

        Ok(buffer)
    }

    fn free(&self, buffer: &DeviceBuffer) -> Result<(), AllocationError> {
        match self.live.lock().remove(&buffer.id()) {
            Some(_) => {
                log::trace!("Freed {}", buffer.id());
                Ok(())
            }
            None => Err(AllocationError::UnknownBuffer { id: buffer.id() }),
        }
    }

    fn memory_usage(&self) -> MemoryUsage {
        let live = self.live.lock();

        MemoryUsage {
            number_allocs: live.len() as u64,
            bytes_in_use: live.values().sum(),
            peak_bytes_in_use: self.peak.load(Ordering::Relaxed),
        }
    }
}
