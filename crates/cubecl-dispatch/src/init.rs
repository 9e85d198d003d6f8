use core::sync::atomic::Ordering;

use cubecl_grid::KernelError;
use cubecl_grid::memory_management::DeviceBuffer;
use cubecl_grid::stream::GroupContext;

use crate::grid::{GridQueue, grid_stride};
use crate::status::StatusTable;

/// An output reset to a value before tiles accumulate into it.
#[derive(new, Debug, Clone)]
pub struct OutputReset {
    /// The output.
    pub buffer: DeviceBuffer,
    /// The number of words to reset.
    pub len: usize,
    /// The value written, the identity of the operator.
    pub value: u64,
}

/// The preparatory launch of a dispatch.
///
/// It resets the drain counter, marks the padding of the status table out of bounds and its
/// tiles invalid, and resets the single pass outputs. Every tile launch happens after it.
#[derive(Debug, Clone, Default)]
pub struct InitializationStage {
    queue: Option<GridQueue>,
    status: Option<StatusTable>,
    resets: Vec<OutputReset>,
    num_tiles: u64,
}

impl InitializationStage {
    /// A stage preparing a dispatch of `num_tiles` tiles.
    pub fn new(num_tiles: u64) -> Self {
        Self {
            num_tiles,
            ..Default::default()
        }
    }

    /// Reset `queue` to the number of tiles.
    pub fn with_queue(mut self, queue: Option<GridQueue>) -> Self {
        self.queue = queue;
        self
    }

    /// Reset the entries of `status`.
    pub fn with_status(mut self, status: Option<StatusTable>) -> Self {
        self.status = status;
        self
    }

    /// Reset an output.
    pub fn with_reset(mut self, reset: OutputReset) -> Self {
        self.resets.push(reset);
        self
    }

    /// Whether the stage has nothing to do.
    pub fn is_empty(&self) -> bool {
        self.queue.is_none()
            && self.status.is_none()
            && self.resets.iter().all(|reset| reset.len == 0)
    }

    /// The number of words of the largest region reset, used to size the launch.
    pub fn num_words(&self) -> usize {
        let status = self.status.as_ref().map(StatusTable::len).unwrap_or(0);
        let resets = self.resets.iter().map(|reset| reset.len);

        resets.fold(status, usize::max).max(1)
    }

    /// The code of a worker group.
    pub fn execute(&self, context: &GroupContext<'_>) -> Result<(), KernelError> {
        // Only the first unit resets the counter.
        if context.group_id == 0 {
            if let Some(queue) = &self.queue {
                queue.reset(self.num_tiles)?;
            }
        }

        if let Some(status) = &self.status {
            for index in grid_stride(context, status.len()) {
                status.reset_entry(index)?;
            }
        }

        for reset in self.resets.iter() {
            for index in grid_stride(context, reset.len) {
                reset.buffer.word(index)?.store(reset.value, Ordering::Release);
            }
        }

        Ok(())
    }
}
