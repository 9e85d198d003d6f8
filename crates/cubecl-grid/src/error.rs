use crate::id::{BufferId, TaskId};
use thiserror::Error;

/// Memory allocation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocationError {
    /// The device doesn't have enough memory left for the request.
    #[error(
        "An out-of-memory error happened during allocation\nCaused by:\n  requested {requested} bytes, {available} bytes available"
    )]
    OutOfMemory {
        /// Number of bytes requested.
        requested: u64,
        /// Number of bytes still available on the device.
        available: u64,
    },

    /// The allocator refused the request.
    #[error("An allocation was rejected by the device\nCaused by:\n  {reason}")]
    Rejected {
        /// The cause of the rejection.
        reason: String,
    },

    /// The buffer to free isn't a live allocation of this allocator.
    #[error("Can't free an unknown buffer\nCaused by:\n  {id} is not a live allocation")]
    UnknownBuffer {
        /// The buffer that was freed.
        id: BufferId,
    },
}

/// Resource limit errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceLimitError {
    /// Too many units requested in a single worker group.
    #[error("Too many units per group requested.\nRequested {requested} units, maximum {max} units available.")]
    Units {
        /// Value requested.
        requested: u32,
        /// Maximum value.
        max: u32,
    },

    /// Too many worker groups requested in a single launch.
    #[error("Too many worker groups requested.\nRequested {requested} groups, maximum {max} groups available.")]
    Groups {
        /// Value requested.
        requested: u32,
        /// Maximum value.
        max: u32,
    },
}

/// Kernel launch errors.
///
/// A launch error means the task never started: nothing it would have written is touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LaunchError {
    /// A launch must contain at least one worker group with at least one unit.
    #[error("Can't launch an empty grid")]
    EmptyGrid,

    /// Too many resources were requested.
    #[error("Too many resources were requested during launch\n{0}")]
    TooManyResources(#[from] ResourceLimitError),

    /// A task this launch happens after failed on the device.
    #[error("A dependency failed before launch\nCaused by:\n  {dependency} didn't complete")]
    DependencyFailed {
        /// The failed dependency.
        dependency: TaskId,
    },

    /// A task this launch happens after was never launched on this stream.
    #[error("Unknown dependency\nCaused by:\n  {dependency} isn't registered on this stream")]
    UnknownDependency {
        /// The unknown dependency.
        dependency: TaskId,
    },

    /// The device rejected the launch.
    #[error("The launch was rejected\nCaused by:\n  {reason}")]
    Rejected {
        /// The cause of the rejection.
        reason: String,
    },
}

/// Errors returned by a worker group while executing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// Another group of the same launch failed and the launch is being torn down.
    #[error("The worker group was aborted")]
    Aborted,

    /// A status word was published twice.
    #[error("Status of tile {tile} was already published")]
    AlreadyPublished {
        /// The tile index.
        tile: u64,
    },

    /// A value doesn't fit in the payload range of a status word.
    #[error("Value {value} doesn't fit in a status word payload")]
    PayloadOverflow {
        /// The value that was published.
        value: u64,
    },

    /// An access outside of a buffer.
    #[error("Index {index} is out of bounds for a buffer of {len} words")]
    OutOfBounds {
        /// The index accessed.
        index: usize,
        /// The length of the buffer.
        len: usize,
    },

    /// Any other failure raised by a tile processor.
    #[error("{reason}")]
    Custom {
        /// The cause of the failure.
        reason: String,
    },
}

/// A device-side failure surfaced at a synchronization point.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Task {name} ({task}) failed on the device\nCaused by:\n  {source}")]
pub struct ExecutionError {
    /// The task that failed.
    pub task: TaskId,
    /// The name the task was launched with.
    pub name: String,
    /// The first error returned by one of its worker groups.
    pub source: KernelError,
}

/// Architecture query errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceQueryError {
    /// The architecture generation couldn't be probed.
    #[error("Can't query the architecture generation\nCaused by:\n  {reason}")]
    Generation {
        /// The cause of the failure.
        reason: String,
    },

    /// The occupancy of a launch configuration couldn't be computed.
    #[error("Can't query the occupancy for groups of {group_size} units\nCaused by:\n  {reason}")]
    Occupancy {
        /// The group size probed.
        group_size: u32,
        /// The cause of the failure.
        reason: String,
    },
}
