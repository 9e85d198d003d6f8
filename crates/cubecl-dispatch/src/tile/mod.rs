mod layout;

pub use layout::*;

use core::ops::Range;
use core::sync::atomic::AtomicU64;

use cubecl_grid::KernelError;
use cubecl_grid::memory_management::DeviceBuffer;
use cubecl_grid::stream::GroupContext;

use crate::instructions::CombineOp;
use crate::status::StatusTable;

/// One tile handed to a [TileProcessor].
#[derive(Debug, Clone)]
pub struct TileDescriptor<'a> {
    /// The index of the tile.
    pub index: u64,
    /// The items of the tile.
    pub items: Range<u64>,
    /// The status table, present when tiles coordinate.
    pub status: Option<&'a StatusTable>,
    /// The group processing the tile.
    pub context: GroupContext<'a>,
}

/// Where a worker group accumulates its results.
#[derive(Debug, Clone, Copy)]
pub enum Destination<'a> {
    /// Combine atomically into the outputs, shared with every other group.
    Direct {
        /// One output per channel.
        outputs: &'a [DeviceBuffer],
    },
    /// Write into the private slot of the group in the scratch buffer.
    Private {
        /// The scratch buffer of the dispatch.
        scratch: &'a DeviceBuffer,
        /// The placement of the slots in the scratch buffer.
        layout: &'a ScratchLayout,
        /// The group owning the slot.
        group_id: u32,
    },
}

impl Destination<'_> {
    /// The word of `bin` in `channel`.
    pub fn word(&self, channel: usize, bin: usize) -> Result<&AtomicU64, KernelError> {
        match self {
            Destination::Direct { outputs } => {
                let output = outputs.get(channel).ok_or(KernelError::OutOfBounds {
                    index: channel,
                    len: outputs.len(),
                })?;
                output.word(bin)
            }
            Destination::Private {
                scratch,
                layout,
                group_id,
            } => {
                let len = layout.bins(channel);
                if bin >= len {
                    return Err(KernelError::OutOfBounds { index: bin, len });
                }
                scratch.word(layout.slot(channel, *group_id)? + bin)
            }
        }
    }

    /// Whether the destination is a private slot.
    pub fn is_private(&self) -> bool {
        matches!(self, Destination::Private { .. })
    }
}

/// The per-tile worker logic of a dispatch.
///
/// A processor is invoked by every worker group: [init_local](TileProcessor::init_local)
/// once, [consume_tile](TileProcessor::consume_tile) for every tile the group gets, then
/// [flush](TileProcessor::flush) once, even when the group got no tile.
///
/// When a status table is present, the processor must publish the status of each of its
/// tiles exactly once.
pub trait TileProcessor: Sync {
    /// The operator combining partial results.
    type Op: CombineOp;
    /// Group-local state.
    type Local;

    /// The operator combining partial results.
    fn op(&self) -> &Self::Op;

    /// The outputs accumulated with [op](TileProcessor::op), one per channel.
    ///
    /// Processors writing their outputs themselves return no output, they are always
    /// dispatched in a single pass.
    fn outputs(&self) -> &[DeviceBuffer];

    /// The number of words of each output that is accumulated.
    fn privatized_shape(&self) -> &[usize];

    /// Whether tiles need the published result of their predecessor.
    fn requires_lookback(&self) -> bool {
        false
    }

    /// Create the local state of a group.
    fn init_local(&self, context: &GroupContext<'_>) -> Self::Local;

    /// Process one tile.
    fn consume_tile(
        &self,
        tile: &TileDescriptor<'_>,
        local: &mut Self::Local,
        destination: &Destination<'_>,
    ) -> Result<(), KernelError>;

    /// Write the local state of a group to its destination.
    ///
    /// A private slot must be fully written, with the identity where nothing was
    /// accumulated.
    fn flush(&self, local: Self::Local, destination: &Destination<'_>) -> Result<(), KernelError>;
}
