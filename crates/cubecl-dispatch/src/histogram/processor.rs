use core::sync::atomic::{AtomicU64, Ordering};

use cubecl_grid::KernelError;
use cubecl_grid::memory_management::DeviceBuffer;
use cubecl_grid::stream::GroupContext;

use crate::instructions::{CombineOp, Sum};
use crate::policy::HistogramAlgorithm;
use crate::status::StatusWord;
use crate::tile::{Destination, TileDescriptor, TileProcessor};

use super::mapping::BinMapping;
use super::sample::SampleLayout;

/// Counts the samples of interleaved channels into one histogram per active channel.
#[derive(Debug)]
pub(crate) struct HistogramProcessor {
    pub(crate) samples: DeviceBuffer,
    pub(crate) layout: SampleLayout,
    pub(crate) channels: usize,
    pub(crate) mappings: Vec<BinMapping>,
    pub(crate) outputs: Vec<DeviceBuffer>,
    pub(crate) shape: Vec<usize>,
    pub(crate) algorithm: HistogramAlgorithm,
}

/// Bin counters private to a worker group.
#[derive(Debug)]
pub(crate) struct GroupHistogram {
    counts: Vec<Vec<AtomicU64>>,
}

impl HistogramProcessor {
    /// Call `func` with the channel and bin of every sample of the tile falling in a bin.
    fn for_each_bin<F>(&self, tile: &TileDescriptor<'_>, mut func: F) -> Result<(), KernelError>
    where
        F: FnMut(usize, usize) -> Result<(), KernelError>,
    {
        for pixel in tile.items.clone() {
            let first = pixel * self.channels as u64;

            for (channel, mapping) in self.mappings.iter().enumerate() {
                let sample = self.layout.read(&self.samples, first + channel as u64)?;
                if let Some(bin) = mapping.bin(sample) {
                    func(channel, bin)?;
                }
            }
        }

        Ok(())
    }

    fn sort_tile(&self, tile: &TileDescriptor<'_>, local: &GroupHistogram) -> Result<(), KernelError> {
        let mut bins: Vec<Vec<usize>> = vec![Vec::new(); self.mappings.len()];

        self.for_each_bin(tile, |channel, bin| {
            bins[channel].push(bin);
            Ok(())
        })?;

        for (channel, mut bins) in bins.into_iter().enumerate() {
            bins.sort_unstable();

            for run in bins.chunk_by(|a, b| a == b) {
                local.counts[channel][run[0]].fetch_add(run.len() as u64, Ordering::Relaxed);
            }
        }

        Ok(())
    }
}

impl TileProcessor for HistogramProcessor {
    type Op = Sum;
    type Local = GroupHistogram;

    fn op(&self) -> &Sum {
        &Sum
    }

    fn outputs(&self) -> &[DeviceBuffer] {
        &self.outputs
    }

    fn privatized_shape(&self) -> &[usize] {
        &self.shape
    }

    fn init_local(&self, _context: &GroupContext<'_>) -> GroupHistogram {
        let counts = self
            .shape
            .iter()
            .map(|bins| (0..*bins).map(|_| AtomicU64::new(0)).collect())
            .collect();

        GroupHistogram { counts }
    }

    fn consume_tile(
        &self,
        tile: &TileDescriptor<'_>,
        local: &mut GroupHistogram,
        destination: &Destination<'_>,
    ) -> Result<(), KernelError> {
        match self.algorithm {
            HistogramAlgorithm::Sort => self.sort_tile(tile, local)?,
            HistogramAlgorithm::GlobalAtomic if !destination.is_private() => {
                self.for_each_bin(tile, |channel, bin| {
                    Sum.atomic_combine(destination.word(channel, bin)?, 1);
                    Ok(())
                })?
            }
            _ => self.for_each_bin(tile, |channel, bin| {
                local.counts[channel][bin].fetch_add(1, Ordering::Relaxed);
                Ok(())
            })?,
        }

        if let Some(status) = tile.status {
            let num_samples = (tile.items.end - tile.items.start) * self.mappings.len() as u64;
            status.publish(tile.index, StatusWord::available(num_samples)?)?;
        }

        Ok(())
    }

    fn flush(&self, local: GroupHistogram, destination: &Destination<'_>) -> Result<(), KernelError> {
        for (channel, counts) in local.counts.into_iter().enumerate() {
            for (bin, count) in counts.into_iter().enumerate() {
                let count = count.into_inner();
                let word = destination.word(channel, bin)?;

                match destination.is_private() {
                    true => word.store(count, Ordering::Release),
                    false if count != 0 => Sum.atomic_combine(word, count),
                    false => {}
                }
            }
        }

        Ok(())
    }
}
