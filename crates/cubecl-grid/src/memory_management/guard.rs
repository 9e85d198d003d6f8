use super::{DeviceAllocator, DeviceBuffer};
use crate::error::AllocationError;

/// Scoped acquisition of a device buffer with guaranteed release.
///
/// The buffer is freed by [release](ScopedBuffer::release), which reports the error of the
/// allocator, or when the guard is dropped, in which case a failure can only be logged.
#[derive(Debug)]
pub struct ScopedBuffer<'a> {
    allocator: &'a dyn DeviceAllocator,
    buffer: Option<DeviceBuffer>,
}

impl<'a> ScopedBuffer<'a> {
    /// Allocate `size` bytes from `allocator`.
    pub fn allocate(allocator: &'a dyn DeviceAllocator, size: u64) -> Result<Self, AllocationError> {
        let buffer = allocator.allocate(size)?;

        Ok(Self {
            allocator,
            buffer: Some(buffer),
        })
    }

    /// The guarded buffer.
    pub fn buffer(&self) -> &DeviceBuffer {
        match &self.buffer {
            Some(buffer) => buffer,
            // Only `release` and `drop` take the buffer, and both consume the guard.
            None => unreachable!("A scoped buffer is always held until released"),
        }
    }

    /// Free the buffer now.
    pub fn release(mut self) -> Result<(), AllocationError> {
        match self.buffer.take() {
            Some(buffer) => self.allocator.free(&buffer),
            None => Ok(()),
        }
    }
}

impl Drop for ScopedBuffer<'_> {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            if let Err(err) = self.allocator.free(&buffer) {
                log::warn!("Failed to free {} while dropping its guard: {err}", buffer.id());
            }
        }
    }
}

/// A set of scoped buffers released together, in reverse acquisition order.
#[derive(Debug, Default)]
pub struct ScopedBuffers<'a> {
    buffers: Vec<ScopedBuffer<'a>>,
}

impl<'a> ScopedBuffers<'a> {
    /// Allocate a buffer that lives as long as the set, returning a handle to it.
    pub fn allocate(
        &mut self,
        allocator: &'a dyn DeviceAllocator,
        size: u64,
    ) -> Result<DeviceBuffer, AllocationError> {
        let scoped = ScopedBuffer::allocate(allocator, size)?;
        let buffer = scoped.buffer().clone();
        self.buffers.push(scoped);

        Ok(buffer)
    }

    /// The number of buffers held.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Whether no buffer is held.
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Release every buffer, even when some of them fail to be freed.
    ///
    /// Returns the first error encountered.
    pub fn release_all(mut self) -> Result<(), AllocationError> {
        let mut result = Ok(());

        while let Some(scoped) = self.buffers.pop() {
            let released = scoped.release();
            if result.is_ok() {
                result = released;
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::CpuAllocator;

    #[test]
    fn drop_releases_the_buffer() {
        let allocator = CpuAllocator::default();
        {
            let _scoped = ScopedBuffer::allocate(&allocator, 64).unwrap();
            assert_eq!(allocator.memory_usage().number_allocs, 1);
        }

        assert_eq!(allocator.memory_usage().number_allocs, 0);
    }

    #[test]
    fn release_all_frees_everything() {
        let allocator = CpuAllocator::default();
        let mut buffers = ScopedBuffers::default();
        buffers.allocate(&allocator, 8).unwrap();
        buffers.allocate(&allocator, 16).unwrap();

        assert_eq!(buffers.len(), 2);
        assert_eq!(allocator.memory_usage().bytes_in_use, 24);

        buffers.release_all().unwrap();

        assert_eq!(allocator.memory_usage().number_allocs, 0);
    }

    #[test]
    fn release_all_reports_the_first_failure() {
        let allocator = CpuAllocator::default();
        let mut buffers = ScopedBuffers::default();
        let first = buffers.allocate(&allocator, 8).unwrap();
        buffers.allocate(&allocator, 8).unwrap();

        // Freed behind the guard's back, the guard can't free it again.
        allocator.free(&first).unwrap();

        let err = buffers.release_all().unwrap_err();
        assert_eq!(err, AllocationError::UnknownBuffer { id: first.id() });
        assert_eq!(allocator.memory_usage().number_allocs, 0);
    }
}
