use core::sync::atomic::Ordering;

use cubecl_grid::KernelError;
use cubecl_grid::memory_management::DeviceBuffer;

/// Shared work queue of a dispatch: a drain counter in device memory.
///
/// The counter starts at the number of tiles and every claim decrements it. A claim
/// returning the number of tiles or more means the queue is exhausted.
#[derive(new, Debug, Clone)]
pub struct GridQueue {
    buffer: DeviceBuffer,
    offset: usize,
}

impl GridQueue {
    /// Reset the drain counter for `num_tiles` tiles.
    pub fn reset(&self, num_tiles: u64) -> Result<(), KernelError> {
        self.buffer.word(self.offset)?.store(num_tiles, Ordering::Release);
        Ok(())
    }

    /// Claim the next tile.
    pub fn drain(&self, num_tiles: u64) -> Result<u64, KernelError> {
        let previous = self.buffer.word(self.offset)?.fetch_sub(1, Ordering::AcqRel);

        // Once drained the counter wraps around, every later claim is past the end.
        if previous == 0 || previous > num_tiles {
            return Ok(num_tiles);
        }

        Ok(num_tiles - previous)
    }

    /// The raw value of the drain counter.
    pub fn remaining(&self) -> Result<u64, KernelError> {
        Ok(self.buffer.word(self.offset)?.load(Ordering::Acquire))
    }
}
