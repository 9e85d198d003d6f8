use core::sync::atomic::Ordering;

use cubecl_grid::KernelError;
use cubecl_grid::memory_management::DeviceBuffer;
use cubecl_grid::stream::GroupContext;

use crate::grid::grid_stride;
use crate::instructions::CombineOp;
use crate::tile::ScratchLayout;

/// The final launch of a two pass dispatch.
///
/// Every output word is the combination of the matching word of every group slot. Channels
/// are independent and the order of the combination within a channel is unspecified.
#[derive(new, Debug)]
pub struct AggregationStage<'a, Op: CombineOp> {
    op: &'a Op,
    scratch: &'a DeviceBuffer,
    layout: &'a ScratchLayout,
    outputs: &'a [DeviceBuffer],
}

impl<Op: CombineOp> AggregationStage<'_, Op> {
    /// The number of output words, over every channel.
    pub fn num_words(&self) -> usize {
        self.layout.total_bins()
    }

    /// The code of a worker group.
    pub fn execute(&self, context: &GroupContext<'_>) -> Result<(), KernelError> {
        for flat in grid_stride(context, self.num_words()) {
            context.check_abort()?;

            let (channel, bin) = self.layout.locate(flat);
            let mut value = self.op.identity();

            for group in 0..self.layout.num_groups() {
                let word = self.scratch.word(self.layout.slot(channel, group)? + bin)?;
                value = self.op.combine(value, word.load(Ordering::Acquire));
            }

            let output = self.outputs.get(channel).ok_or(KernelError::OutOfBounds {
                index: channel,
                len: self.outputs.len(),
            })?;
            output.word(bin)?.store(value, Ordering::Release);
        }

        Ok(())
    }
}

/// Reduce the slots of `layout` on the host, as the aggregation stage would.
pub fn aggregate_host<Op: CombineOp>(op: &Op, slots: &[u64], layout: &ScratchLayout) -> Vec<Vec<u64>> {
    (0..layout.num_channels())
        .map(|channel| {
            (0..layout.bins(channel))
                .map(|bin| {
                    op.fold((0..layout.num_groups()).filter_map(|group| {
                        let slot = layout.slot(channel, group).ok()?;
                        slots.get(slot + bin).copied()
                    }))
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instructions::{Max, Sum};
    use core::sync::atomic::AtomicBool;
    use cubecl_grid::stream::LaunchGrid;

    fn slots(layout: &ScratchLayout) -> DeviceBuffer {
        let scratch = DeviceBuffer::new(layout.size(), 0);
        let values: Vec<u64> = (0..layout.len() as u64).collect();
        scratch.write(&values).unwrap();
        scratch
    }

    fn run<Op: CombineOp>(stage: &AggregationStage<'_, Op>, grid: LaunchGrid) {
        let abort = AtomicBool::new(false);
        for group_id in 0..grid.num_groups {
            stage
                .execute(&GroupContext::new(group_id, grid, &abort))
                .unwrap();
        }
    }

    #[test]
    fn slots_are_combined_per_channel() {
        // Channel 0: groups hold [0, 1, 2] and [3, 4, 5]. Channel 1: [6, 7] and [8, 9].
        let layout = ScratchLayout::new(2, &[3, 2]);
        let scratch = slots(&layout);
        let outputs = [DeviceBuffer::new(24, 0), DeviceBuffer::new(16, 0)];

        run(
            &AggregationStage::new(&Sum, &scratch, &layout, &outputs),
            LaunchGrid::new(2, 2),
        );

        assert_eq!(outputs[0].read(), vec![3, 5, 7]);
        assert_eq!(outputs[1].read(), vec![14, 16]);
    }

    #[test]
    fn host_and_device_aggregation_agree() {
        let layout = ScratchLayout::new(3, &[4, 1]);
        let scratch = slots(&layout);
        let outputs = [DeviceBuffer::new(32, 0), DeviceBuffer::new(8, 0)];

        run(
            &AggregationStage::new(&Max, &scratch, &layout, &outputs),
            LaunchGrid::new(1, 3),
        );

        let expected = aggregate_host(&Max, &scratch.read(), &layout);
        assert_eq!(vec![outputs[0].read(), outputs[1].read()], expected);
    }
}
