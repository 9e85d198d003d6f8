use core::fmt::Debug;
use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{AllocationError, KernelError};
use crate::id::BufferId;

/// Number of bytes in one device word.
pub const WORD_SIZE: u64 = core::mem::size_of::<u64>() as u64;

/// A handle to a device memory allocation.
///
/// Device memory is word addressed: every word is a 64 bits atomic so that worker groups
/// running concurrently can read and write it without further synchronization. Cloning a
/// handle doesn't copy the memory, and the handle doesn't own the allocation: only the
/// [allocator](DeviceAllocator) that created it can release it.
#[derive(Clone)]
pub struct DeviceBuffer {
    id: BufferId,
    size: u64,
    words: Arc<[AtomicU64]>,
}

impl DeviceBuffer {
    /// Create the backing memory for an allocation of `size` bytes, every word set to `fill`.
    ///
    /// This is meant to be called by allocators.
    pub fn new(size: u64, fill: u64) -> Self {
        let num_words = size.div_ceil(WORD_SIZE) as usize;
        let words = (0..num_words).map(|_| AtomicU64::new(fill)).collect();

        Self {
            id: BufferId::new(),
            size,
            words,
        }
    }

    /// The unique id of the allocation.
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// The size of the allocation in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The number of words in the allocation.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Whether the allocation holds no word.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// All the words of the allocation.
    pub fn words(&self) -> &[AtomicU64] {
        &self.words
    }

    /// Bounds checked access to a single word.
    pub fn word(&self, index: usize) -> Result<&AtomicU64, KernelError> {
        self.words.get(index).ok_or(KernelError::OutOfBounds {
            index,
            len: self.words.len(),
        })
    }

    /// Copy the content of the allocation to the host.
    pub fn read(&self) -> Vec<u64> {
        self.words
            .iter()
            .map(|word| word.load(Ordering::Acquire))
            .collect()
    }

    /// Copy `values` from the host at the start of the allocation.
    pub fn write(&self, values: &[u64]) -> Result<(), KernelError> {
        if values.len() > self.words.len() {
            return Err(KernelError::OutOfBounds {
                index: values.len() - 1,
                len: self.words.len(),
            });
        }

        for (word, value) in self.words.iter().zip(values) {
            word.store(*value, Ordering::Release);
        }

        Ok(())
    }

    /// Set every word of the allocation to `value`.
    pub fn fill(&self, value: u64) {
        for word in self.words.iter() {
            word.store(value, Ordering::Release);
        }
    }
}

impl Debug for DeviceBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("id", &self.id)
            .field("size", &self.size)
            .finish()
    }
}

impl PartialEq for DeviceBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DeviceBuffer {}

/// Memory usage of an allocator.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MemoryUsage {
    /// The number of live allocations.
    pub number_allocs: u64,
    /// The number of bytes held by live allocations.
    pub bytes_in_use: u64,
    /// The highest value `bytes_in_use` ever reached.
    pub peak_bytes_in_use: u64,
}

impl core::fmt::Display for MemoryUsage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        writeln!(f, "Memory Usage")?;
        writeln!(f, "  Number of allocations: {}", self.number_allocs)?;
        writeln!(f, "  Bytes in use: {}", self.bytes_in_use)?;
        write!(f, "  Peak bytes in use: {}", self.peak_bytes_in_use)
    }
}

/// The allocator collaborator: acquires and releases raw device buffers.
///
/// Call sites must free every buffer they allocate, including when an intermediate step
/// fails. [ScopedBuffer](super::ScopedBuffer) makes that easy.
pub trait DeviceAllocator: Send + Sync + Debug {
    /// Allocate a buffer of `size` bytes. Its content is unspecified.
    fn allocate(&self, size: u64) -> Result<DeviceBuffer, AllocationError>;

    /// Release a buffer previously returned by [allocate](DeviceAllocator::allocate).
    fn free(&self, buffer: &DeviceBuffer) -> Result<(), AllocationError>;

    /// The current memory usage.
    fn memory_usage(&self) -> MemoryUsage;

    /// Allocate a buffer and upload `values` to it.
    fn create(&self, values: &[u64]) -> Result<DeviceBuffer, AllocationError> {
        let buffer = self.allocate(values.len() as u64 * WORD_SIZE)?;
        for (word, value) in buffer.words().iter().zip(values) {
            word.store(*value, Ordering::Release);
        }
        Ok(buffer)
    }

    /// Allocate a buffer of `len` words, every word set to `value`.
    fn filled(&self, len: usize, value: u64) -> Result<DeviceBuffer, AllocationError> {
        let buffer = self.allocate(len as u64 * WORD_SIZE)?;
        buffer.fill(value);
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_rounds_size_up_to_words() {
        let buffer = DeviceBuffer::new(17, 0);

        assert_eq!(buffer.size(), 17);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn word_access_is_bounds_checked() {
        let buffer = DeviceBuffer::new(16, 0);

        assert!(buffer.word(1).is_ok());
        assert_eq!(
            buffer.word(2).unwrap_err(),
            KernelError::OutOfBounds { index: 2, len: 2 }
        );
    }

    #[test]
    fn write_then_read() {
        let buffer = DeviceBuffer::new(32, u64::MAX);
        buffer.write(&[1, 2]).unwrap();

        assert_eq!(buffer.read(), vec![1, 2, u64::MAX, u64::MAX]);
        assert!(buffer.write(&[0; 5]).is_err());
    }

    #[test]
    fn clones_share_memory() {
        let buffer = DeviceBuffer::new(8, 0);
        let other = buffer.clone();
        other.fill(7);

        assert_eq!(buffer.read(), vec![7]);
        assert_eq!(buffer, other);
    }
}
