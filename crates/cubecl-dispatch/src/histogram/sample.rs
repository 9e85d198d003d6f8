use core::fmt::Debug;
use core::sync::atomic::Ordering;

use cubecl_grid::KernelError;
use cubecl_grid::memory_management::DeviceBuffer;

/// Unsigned integer samples, packed in device words.
///
/// A word holds `64 / BITS` samples, the first sample in the lowest bits.
pub trait Sample: Copy + Debug + Send + Sync + Into<u64> + 'static {
    /// The number of bits of a sample.
    const BITS: u32;

    /// Pack `samples` in words, to upload them to the device.
    fn pack(samples: &[Self]) -> Vec<u64> {
        let layout = SampleLayout::of::<Self>();

        samples
            .chunks(layout.per_word())
            .map(|chunk| {
                chunk.iter().enumerate().fold(0u64, |word, (lane, sample)| {
                    let value: u64 = (*sample).into();
                    word | (value << (lane as u32 * Self::BITS))
                })
            })
            .collect()
    }
}

macro_rules! sample_type {
    ($($ty:ty),*) => {
        $(
            impl Sample for $ty {
                const BITS: u32 = <$ty>::BITS;
            }
        )*
    };
}

sample_type!(u8, u16, u32, u64);

/// Where samples of a given width are in a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SampleLayout {
    bits: u32,
}

impl SampleLayout {
    pub(crate) fn of<S: Sample>() -> Self {
        Self { bits: S::BITS }
    }

    pub(crate) fn per_word(&self) -> usize {
        (u64::BITS / self.bits) as usize
    }

    /// The number of samples `buffer` can hold.
    pub(crate) fn capacity(&self, buffer: &DeviceBuffer) -> u64 {
        buffer.len() as u64 * self.per_word() as u64
    }

    /// Read sample `index` of `buffer`.
    pub(crate) fn read(&self, buffer: &DeviceBuffer, index: u64) -> Result<u64, KernelError> {
        let per_word = self.per_word() as u64;
        let word = buffer.word((index / per_word) as usize)?.load(Ordering::Relaxed);
        let shift = (index % per_word) as u32 * self.bits;
        let mask = match self.bits {
            64 => u64::MAX,
            bits => (1 << bits) - 1,
        };

        Ok((word >> shift) & mask)
    }
}
