use std::sync::Arc;

use crate::arch::HardwareProperties;
use crate::error::{ExecutionError, LaunchError, ResourceLimitError};
use crate::id::{StreamId, TaskId};
use crate::stream::{ComputeStream, Kernel, LaunchGrid, TaskGraph, TaskState};

use super::{FaultInjector, Scheduler};

/// Execution stream of the CPU device.
///
/// Launches execute before [launch](ComputeStream::launch) returns, but failures of worker
/// groups are only reported at the next [sync](ComputeStream::sync), like an asynchronous
/// device would.
#[derive(Debug)]
pub struct CpuStream {
    id: StreamId,
    scheduler: Scheduler,
    hardware: HardwareProperties,
    graph: TaskGraph,
    pending: Vec<ExecutionError>,
    faults: Arc<FaultInjector>,
    num_launches: u64,
}

impl CpuStream {
    pub(crate) fn new(
        scheduler: Scheduler,
        hardware: HardwareProperties,
        faults: Arc<FaultInjector>,
    ) -> Self {
        Self {
            id: StreamId::new(),
            scheduler,
            hardware,
            graph: TaskGraph::default(),
            pending: Vec::new(),
            faults,
            num_launches: 0,
        }
    }

    /// The happens-after edges of the tasks launched since the last synchronization.
    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// The number of tasks started on this stream.
    pub fn num_launches(&self) -> u64 {
        self.num_launches
    }

    fn validate(&self, grid: &LaunchGrid) -> Result<(), LaunchError> {
        if grid.num_groups == 0 || grid.group_size == 0 {
            return Err(LaunchError::EmptyGrid);
        }
        if grid.group_size > self.hardware.max_units_per_group {
            return Err(ResourceLimitError::Units {
                requested: grid.group_size,
                max: self.hardware.max_units_per_group,
            }
            .into());
        }
        if grid.num_groups > self.hardware.max_group_count {
            return Err(ResourceLimitError::Groups {
                requested: grid.num_groups,
                max: self.hardware.max_group_count,
            }
            .into());
        }

        Ok(())
    }
}

impl ComputeStream for CpuStream {
    fn id(&self) -> StreamId {
        self.id
    }

    fn launch(
        &mut self,
        name: &str,
        grid: LaunchGrid,
        after: &[TaskId],
        kernel: Kernel<'_>,
    ) -> Result<TaskId, LaunchError> {
        self.validate(&grid)?;
        self.graph.check_ready(after)?;

        if self.faults.tick() {
            return Err(LaunchError::Rejected {
                reason: format!("Injected failure while launching {name}"),
            });
        }

        let task = TaskId::new();
        self.num_launches += 1;
        log::trace!(
            "Launching {name} ({task}) on {} with {} groups of {} units",
            self.id,
            grid.num_groups,
            grid.group_size
        );

        let state = match self.scheduler.execute(grid, kernel) {
            Ok(()) => TaskState::Completed,
            Err(source) => {
                log::debug!("{name} ({task}) failed on the device: {source}");
                self.pending.push(ExecutionError {
                    task,
                    name: name.to_string(),
                    source,
                });
                TaskState::Failed
            }
        };
        self.graph.register(task, name, after, state);

        Ok(task)
    }

    fn sync(&mut self) -> Result<(), ExecutionError> {
        let mut pending = Vec::new();
        core::mem::swap(&mut pending, &mut self.pending);
        self.graph.mark_synced();

        match pending.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
