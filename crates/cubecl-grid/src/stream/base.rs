use core::sync::atomic::{AtomicBool, Ordering};

use crate::error::{ExecutionError, KernelError, LaunchError};
use crate::id::{StreamId, TaskId};

/// The shape of a launch: how many worker groups, and how many units in each group.
#[derive(new, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LaunchGrid {
    /// The number of worker groups.
    pub num_groups: u32,
    /// The number of units in each worker group.
    pub group_size: u32,
}

impl LaunchGrid {
    /// The total number of units of the launch.
    pub fn num_units(&self) -> u64 {
        self.num_groups as u64 * self.group_size as u64
    }
}

/// What a worker group knows about itself while it executes.
#[derive(Debug, Clone, Copy)]
pub struct GroupContext<'a> {
    /// The position of the group in the launch.
    pub group_id: u32,
    /// The number of groups in the launch.
    pub num_groups: u32,
    /// The number of units in the group.
    pub group_size: u32,
    abort: &'a AtomicBool,
}

impl<'a> GroupContext<'a> {
    /// Create the context of one group of a launch sharing the `abort` signal.
    pub fn new(group_id: u32, grid: LaunchGrid, abort: &'a AtomicBool) -> Self {
        Self {
            group_id,
            num_groups: grid.num_groups,
            group_size: grid.group_size,
            abort,
        }
    }

    /// Whether another group of the same launch failed.
    ///
    /// Groups waiting on other groups must poll this to terminate.
    pub fn should_abort(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }

    /// Poll [should_abort](Self::should_abort) as a result.
    pub fn check_abort(&self) -> Result<(), KernelError> {
        match self.should_abort() {
            true => Err(KernelError::Aborted),
            false => Ok(()),
        }
    }
}

/// The code executed by every worker group of a launch.
pub type Kernel<'k> = &'k (dyn Fn(GroupContext<'_>) -> Result<(), KernelError> + Sync);

/// An ordered execution queue on a device.
///
/// Ordering between launches is never implicit: a launch only happens after the tasks listed
/// in its `after` edges, and the stream refuses to start a task whose dependency failed.
pub trait ComputeStream: Send {
    /// The id of the stream.
    fn id(&self) -> StreamId;

    /// Launch `kernel` on every group of `grid` once every task of `after` completed.
    ///
    /// A returned error means nothing was started. A failure happening on the device is
    /// only reported by the next call to [sync](ComputeStream::sync).
    fn launch(
        &mut self,
        name: &str,
        grid: LaunchGrid,
        after: &[TaskId],
        kernel: Kernel<'_>,
    ) -> Result<TaskId, LaunchError>;

    /// Wait for every launched task and surface the first device-side failure since the
    /// previous synchronization.
    fn sync(&mut self) -> Result<(), ExecutionError>;
}
