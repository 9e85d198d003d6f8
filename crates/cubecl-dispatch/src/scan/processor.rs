use core::sync::atomic::Ordering;

use cubecl_grid::KernelError;
use cubecl_grid::memory_management::DeviceBuffer;
use cubecl_grid::stream::GroupContext;

use crate::instructions::CombineOp;
use crate::status::StatusWord;
use crate::tile::{Destination, TileDescriptor, TileProcessor};

/// Whether an output includes its own input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScanMode {
    Inclusive,
    /// Outputs combine the initial value with every previous input.
    Exclusive(u64),
}

/// Prefix scan with a chained lookback: every tile waits for the inclusive prefix of its
/// predecessor, publishes its own, then writes its outputs.
#[derive(new, Debug)]
pub(crate) struct ScanProcessor<Op: CombineOp> {
    input: DeviceBuffer,
    output: DeviceBuffer,
    op: Op,
    mode: ScanMode,
}

impl<Op: CombineOp> ScanProcessor<Op> {
    fn load(&self, index: u64) -> Result<u64, KernelError> {
        Ok(self.input.word(index as usize)?.load(Ordering::Relaxed))
    }

    fn prefix(&self, tile: &TileDescriptor<'_>) -> Result<u64, KernelError> {
        let predecessor = match tile.status {
            Some(status) => status.wait_predecessor(tile.index, &tile.context)?,
            None if tile.index == 0 => None,
            None => {
                return Err(KernelError::Custom {
                    reason: format!("Tile {} can't look back without a status table", tile.index),
                });
            }
        };

        Ok(predecessor.unwrap_or_else(|| self.op.identity()))
    }
}

impl<Op: CombineOp> TileProcessor for ScanProcessor<Op> {
    type Op = Op;
    type Local = ();

    fn op(&self) -> &Op {
        &self.op
    }

    fn outputs(&self) -> &[DeviceBuffer] {
        &[]
    }

    fn privatized_shape(&self) -> &[usize] {
        &[]
    }

    fn requires_lookback(&self) -> bool {
        true
    }

    fn init_local(&self, _context: &GroupContext<'_>) {}

    fn consume_tile(
        &self,
        tile: &TileDescriptor<'_>,
        _local: &mut (),
        _destination: &Destination<'_>,
    ) -> Result<(), KernelError> {
        let mut aggregate = self.op.identity();
        for index in tile.items.clone() {
            aggregate = self.op.combine(aggregate, self.load(index)?);
        }

        let prefix = self.prefix(tile)?;
        // Every inclusive prefix must be publishable, even when no successor reads it.
        let inclusive = StatusWord::available(self.op.combine(prefix, aggregate))?;

        if let Some(status) = tile.status {
            status.publish(tile.index, inclusive)?;
        }

        let mut running = prefix;
        for index in tile.items.clone() {
            let value = self.load(index)?;
            let output = match self.mode {
                ScanMode::Inclusive => {
                    running = self.op.combine(running, value);
                    running
                }
                ScanMode::Exclusive(init) => {
                    let output = self.op.combine(init, running);
                    running = self.op.combine(running, value);
                    output
                }
            };

            self.output.word(index as usize)?.store(output, Ordering::Relaxed);
        }

        Ok(())
    }

    fn flush(&self, _local: (), _destination: &Destination<'_>) -> Result<(), KernelError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instructions::{Max, Sum};
    use crate::status::{MAX_PAYLOAD, StatusTable};
    use core::sync::atomic::AtomicBool;
    use cubecl_grid::stream::LaunchGrid;

    fn run_tiles<Op: CombineOp>(processor: &ScanProcessor<Op>, num_items: u64, tile_size: u64) {
        let num_tiles = num_items.div_ceil(tile_size);
        let status = StatusTable::new(DeviceBuffer::new(StatusTable::size(num_tiles, 2), 0), 0, 2, num_tiles);
        for index in 0..status.len() {
            status.reset_entry(index).unwrap();
        }

        let abort = AtomicBool::new(false);
        let context = GroupContext::new(0, LaunchGrid::new(1, 1), &abort);
        let outputs: [DeviceBuffer; 0] = [];
        let destination = Destination::Direct { outputs: &outputs };

        for index in 0..num_tiles {
            let start = index * tile_size;
            let tile = TileDescriptor {
                index,
                items: start..u64::min(start + tile_size, num_items),
                status: Some(&status),
                context,
            };
            processor.consume_tile(&tile, &mut (), &destination).unwrap();
        }

        assert!(
            status
                .snapshot()
                .iter()
                .skip(2)
                .all(|word| matches!(word, StatusWord::Available(_)))
        );
    }

    #[test]
    fn inclusive_sum_across_tiles() {
        let input = DeviceBuffer::new(8 * 7, 0);
        input.write(&[1, 2, 3, 4, 5, 6, 7]).unwrap();
        let output = DeviceBuffer::new(8 * 7, 0);
        let processor = ScanProcessor::new(input, output.clone(), Sum, ScanMode::Inclusive);

        run_tiles(&processor, 7, 3);

        assert_eq!(output.read(), vec![1, 3, 6, 10, 15, 21, 28]);
    }

    #[test]
    fn exclusive_max_with_init() {
        let input = DeviceBuffer::new(8 * 5, 0);
        input.write(&[3, 1, 4, 1, 5]).unwrap();
        let output = DeviceBuffer::new(8 * 5, 0);
        let processor = ScanProcessor::new(input, output.clone(), Max, ScanMode::Exclusive(2));

        run_tiles(&processor, 5, 2);

        assert_eq!(output.read(), vec![2, 3, 3, 4, 4]);
    }

    #[test]
    fn single_tile_needs_no_status() {
        let input = DeviceBuffer::new(8 * 3, 0);
        input.write(&[1, 1, 1]).unwrap();
        let output = DeviceBuffer::new(8 * 3, 0);
        let processor = ScanProcessor::new(input, output.clone(), Sum, ScanMode::Exclusive(10));
        let abort = AtomicBool::new(false);
        let tile = TileDescriptor {
            index: 0,
            items: 0..3,
            status: None,
            context: GroupContext::new(0, LaunchGrid::new(1, 1), &abort),
        };

        let outputs: [DeviceBuffer; 0] = [];
        processor
            .consume_tile(&tile, &mut (), &Destination::Direct { outputs: &outputs })
            .unwrap();

        assert_eq!(output.read(), vec![10, 11, 12]);
    }

    #[test]
    fn single_tile_prefix_must_fit_a_status_word() {
        let input = DeviceBuffer::new(8 * 2, 0);
        input.write(&[MAX_PAYLOAD, 1]).unwrap();
        let output = DeviceBuffer::new(8 * 2, 0);
        let processor = ScanProcessor::new(input, output, Sum, ScanMode::Inclusive);
        let abort = AtomicBool::new(false);
        let tile = TileDescriptor {
            index: 0,
            items: 0..2,
            status: None,
            context: GroupContext::new(0, LaunchGrid::new(1, 1), &abort),
        };

        let outputs: [DeviceBuffer; 0] = [];
        let result =
            processor.consume_tile(&tile, &mut (), &Destination::Direct { outputs: &outputs });

        assert_eq!(
            result,
            Err(KernelError::PayloadOverflow {
                value: MAX_PAYLOAD + 1
            })
        );
    }
}
