use core::sync::atomic::Ordering;

use cubecl_grid::KernelError;
use cubecl_grid::memory_management::{DeviceBuffer, WORD_SIZE};
use cubecl_grid::stream::GroupContext;

const KIND_SHIFT: u32 = 62;
const KIND_INVALID: u64 = 0b00;
const KIND_OUT_OF_BOUNDS: u64 = 0b01;
const KIND_AVAILABLE: u64 = 0b10;

/// The largest payload a status word can hold.
///
/// The two upper bits of a status word hold its kind, values published by tile processors
/// must fit in the remaining 62 bits.
pub const MAX_PAYLOAD: u64 = (1 << KIND_SHIFT) - 1;

/// The status of a tile, packed in a single device word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusWord {
    /// The tile isn't done yet.
    Invalid,
    /// There is no tile here, used by the padding before the first tile.
    OutOfBounds,
    /// The tile is done and published a value.
    Available(u64),
}

impl StatusWord {
    /// Create an available status, checking that the value fits the payload.
    pub fn available(value: u64) -> Result<Self, KernelError> {
        match value > MAX_PAYLOAD {
            true => Err(KernelError::PayloadOverflow { value }),
            false => Ok(StatusWord::Available(value)),
        }
    }

    /// Encode the status in a device word.
    pub fn pack(&self) -> u64 {
        match self {
            StatusWord::Invalid => KIND_INVALID << KIND_SHIFT,
            StatusWord::OutOfBounds => KIND_OUT_OF_BOUNDS << KIND_SHIFT,
            StatusWord::Available(value) => (KIND_AVAILABLE << KIND_SHIFT) | (value & MAX_PAYLOAD),
        }
    }

    /// Decode a device word. The reserved kind reads as [StatusWord::Invalid].
    pub fn unpack(word: u64) -> Self {
        match word >> KIND_SHIFT {
            KIND_OUT_OF_BOUNDS => StatusWord::OutOfBounds,
            KIND_AVAILABLE => StatusWord::Available(word & MAX_PAYLOAD),
            _ => StatusWord::Invalid,
        }
    }
}

/// Per-tile status words in device memory, preceded by out-of-bounds padding.
///
/// The padding lets tile `0` look back at a predecessor without bounds checks. Tiles move
/// from [Invalid](StatusWord::Invalid) to [Available](StatusWord::Available) exactly once.
#[derive(Debug, Clone)]
pub struct StatusTable {
    buffer: DeviceBuffer,
    offset: usize,
    padding: usize,
    num_tiles: u64,
}

impl StatusTable {
    /// The number of bytes needed by a table of `num_tiles` tiles and `padding` entries.
    pub fn size(num_tiles: u64, padding: usize) -> u64 {
        (padding as u64 + num_tiles) * WORD_SIZE
    }

    /// A table stored in `buffer` starting at word `offset`.
    ///
    /// The content is unspecified until the table is [reset](Self::reset_entry).
    pub fn new(buffer: DeviceBuffer, offset: usize, padding: usize, num_tiles: u64) -> Self {
        Self {
            buffer,
            offset,
            padding: usize::max(padding, 1),
            num_tiles,
        }
    }

    /// The number of padding entries.
    pub fn padding(&self) -> usize {
        self.padding
    }

    /// The number of tile entries.
    pub fn num_tiles(&self) -> u64 {
        self.num_tiles
    }

    /// The number of entries, padding included.
    pub fn len(&self) -> usize {
        self.padding + self.num_tiles as usize
    }

    /// Whether the table has no entry.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reset raw entry `index`: padding entries become out of bounds, tile entries invalid.
    pub fn reset_entry(&self, index: usize) -> Result<(), KernelError> {
        let status = match index < self.padding {
            true => StatusWord::OutOfBounds,
            false => StatusWord::Invalid,
        };

        self.raw(index)?.store(status.pack(), Ordering::Release);
        Ok(())
    }

    /// The status of `tile`.
    pub fn load(&self, tile: u64) -> Result<StatusWord, KernelError> {
        self.load_entry(self.padding + tile as usize)
    }

    /// Publish the status of `tile`, only once.
    pub fn publish(&self, tile: u64, status: StatusWord) -> Result<(), KernelError> {
        let word = self.raw(self.padding + tile as usize)?;

        word.compare_exchange(
            StatusWord::Invalid.pack(),
            status.pack(),
            Ordering::AcqRel,
            Ordering::Acquire,
        )
        .map(|_| ())
        .map_err(|_| KernelError::AlreadyPublished { tile })
    }

    /// Wait for the predecessor of `tile` to be published.
    ///
    /// Returns `None` when there is no predecessor. Stops with [KernelError::Aborted] when
    /// another group of the launch failed.
    pub fn wait_predecessor(
        &self,
        tile: u64,
        context: &GroupContext<'_>,
    ) -> Result<Option<u64>, KernelError> {
        let index = self.padding + tile as usize - 1;

        loop {
            match self.load_entry(index)? {
                StatusWord::Available(value) => return Ok(Some(value)),
                StatusWord::OutOfBounds => return Ok(None),
                StatusWord::Invalid => {
                    context.check_abort()?;
                    std::thread::yield_now();
                }
            }
        }
    }

    /// Copy the padding and tile entries to the host.
    pub fn snapshot(&self) -> Vec<StatusWord> {
        (0..self.len())
            .map(|index| self.load_entry(index).unwrap_or(StatusWord::Invalid))
            .collect()
    }

    fn load_entry(&self, index: usize) -> Result<StatusWord, KernelError> {
        Ok(StatusWord::unpack(self.raw(index)?.load(Ordering::Acquire)))
    }

    fn raw(&self, index: usize) -> Result<&core::sync::atomic::AtomicU64, KernelError> {
        self.buffer.word(self.offset + index)
    }
}
