use std::sync::Arc;

use crate::arch::{ArchVersion, ArchitectureQuery, HardwareProperties};
use crate::config::GlobalConfig;
use crate::error::DeviceQueryError;

use super::{CpuAllocator, CpuStream, FaultInjector, Scheduler};

/// Options to create a [CpuDevice].
#[derive(Debug, Clone)]
pub struct CpuDeviceOptions {
    /// The generation reported by the version probe.
    pub generation: ArchVersion,
    /// The hardware the device pretends to be.
    pub hardware: HardwareProperties,
    /// The maximum number of host threads per launch.
    pub parallelism: usize,
    /// Optional bound on the bytes allocated at once.
    pub memory_budget: Option<u64>,
}

impl Default for CpuDeviceOptions {
    fn default() -> Self {
        let config = GlobalConfig::get();
        let scheduler = match config.device.max_parallelism {
            Some(parallelism) => Scheduler::new(parallelism),
            None => Scheduler::default(),
        };
        let parallelism = scheduler.parallelism();

        Self {
            generation: ArchVersion::new(3, 5),
            hardware: HardwareProperties {
                plane_size: 32,
                num_compute_units: parallelism as u32,
                max_groups_per_unit: 4,
                max_resident_units_per_unit: 2048,
                max_units_per_group: 1024,
                max_group_count: u16::MAX as u32,
            },
            parallelism,
            memory_budget: config.device.memory_budget,
        }
    }
}

/// A device executing worker groups on host threads.
///
/// It is the reference implementation of the device collaborators: an
/// [allocator](CpuAllocator), an [architecture query](ArchitectureQuery) and
/// [streams](CpuStream). Faults can be injected in allocations, launches and the version
/// probe.
#[derive(Debug)]
pub struct CpuDevice {
    generation: ArchVersion,
    hardware: HardwareProperties,
    allocator: CpuAllocator,
    scheduler: Scheduler,
    launch_faults: Arc<FaultInjector>,
    query_faults: FaultInjector,
}

impl Default for CpuDevice {
    fn default() -> Self {
        Self::new(CpuDeviceOptions::default())
    }
}

impl CpuDevice {
    /// Create a new device.
    pub fn new(options: CpuDeviceOptions) -> Self {
        Self {
            generation: options.generation,
            hardware: options.hardware,
            allocator: CpuAllocator::new(options.memory_budget),
            scheduler: Scheduler::new(options.parallelism),
            launch_faults: Arc::new(FaultInjector::default()),
            query_faults: FaultInjector::default(),
        }
    }

    /// The allocator of the device.
    pub fn allocator(&self) -> &CpuAllocator {
        &self.allocator
    }

    /// Create a new execution stream.
    pub fn stream(&self) -> CpuStream {
        CpuStream::new(
            self.scheduler.clone(),
            self.hardware.clone(),
            self.launch_faults.clone(),
        )
    }

    /// Fault injector shared by the launches of every stream of the device.
    pub fn launch_faults(&self) -> &FaultInjector {
        &self.launch_faults
    }

    /// Fault injector of the generation probe.
    pub fn query_faults(&self) -> &FaultInjector {
        &self.query_faults
    }
}

impl ArchitectureQuery for CpuDevice {
    fn generation(&self) -> Result<ArchVersion, DeviceQueryError> {
        if self.query_faults.tick() {
            return Err(DeviceQueryError::Generation {
                reason: "Injected failure in the version probe".into(),
            });
        }

        Ok(self.generation)
    }

    fn hardware(&self) -> &HardwareProperties {
        &self.hardware
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LaunchError, ResourceLimitError};
    use crate::stream::{ComputeStream, LaunchGrid};

    fn device() -> CpuDevice {
        CpuDevice::new(CpuDeviceOptions {
            generation: ArchVersion::new(3, 0),
            hardware: HardwareProperties {
                plane_size: 32,
                num_compute_units: 2,
                max_groups_per_unit: 4,
                max_resident_units_per_unit: 1024,
                max_units_per_group: 512,
                max_group_count: 100,
            },
            parallelism: 2,
            memory_budget: None,
        })
    }

    #[test]
    fn probe_reports_generation() {
        let device = device();

        assert_eq!(device.generation().unwrap(), ArchVersion(300));
        assert_eq!(device.concurrency_capacity(256).unwrap(), 8);

        device.query_faults().arm(0);
        assert!(device.generation().is_err());
        assert!(device.generation().is_ok());
    }

    #[test]
    fn oversized_launches_are_rejected() {
        let device = device();
        let mut stream = device.stream();

        assert_eq!(
            stream.launch("big", LaunchGrid::new(1, 1024), &[], &|_| Ok(())),
            Err(LaunchError::TooManyResources(ResourceLimitError::Units {
                requested: 1024,
                max: 512
            }))
        );
        assert_eq!(
            stream.launch("many", LaunchGrid::new(101, 32), &[], &|_| Ok(())),
            Err(LaunchError::TooManyResources(ResourceLimitError::Groups {
                requested: 101,
                max: 100
            }))
        );
        assert_eq!(
            stream.launch("empty", LaunchGrid::new(0, 32), &[], &|_| Ok(())),
            Err(LaunchError::EmptyGrid)
        );
        assert_eq!(stream.num_launches(), 0);
    }

    #[test]
    fn injected_launch_failure_is_shared_by_streams() {
        let device = device();
        let mut first = device.stream();
        let mut second = device.stream();
        device.launch_faults().arm(1);

        assert!(first.launch("a", LaunchGrid::new(1, 1), &[], &|_| Ok(())).is_ok());
        assert!(matches!(
            second.launch("b", LaunchGrid::new(1, 1), &[], &|_| Ok(())),
            Err(LaunchError::Rejected { .. })
        ));
    }
}
