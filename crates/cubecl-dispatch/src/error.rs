use core::fmt::Display;

use cubecl_grid::{AllocationError, DeviceQueryError, ExecutionError, LaunchError};

/// The launches issued by a dispatch, in stream order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum DispatchStage {
    /// Resets the drain counter, the status table and the single pass outputs.
    Initialization,
    /// Runs the tile processors.
    Tiles,
    /// Reduces the privatized results into the outputs.
    Aggregation,
}

impl Display for DispatchStage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DispatchStage::Initialization => f.write_str("initialization"),
            DispatchStage::Tiles => f.write_str("tiles"),
            DispatchStage::Aggregation => f.write_str("aggregation"),
        }
    }
}

/// Errors that can be returned by a dispatch.
///
/// The output destinations are only meaningful when the dispatch succeeds.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The dispatch can't be executed with the given arguments on the current device.
    #[error("The dispatch isn't supported\nCaused by:\n  {reason}")]
    ConfigurationUnsupported {
        /// Why the configuration is unsupported.
        reason: String,
    },

    /// Scratch, status table or queue memory couldn't be allocated or released.
    #[error("Can't manage the dispatch memory\nCaused by:\n  {0}")]
    AllocationFailure(#[from] AllocationError),

    /// The device refused to start a launch.
    #[error("The {stage} launch was rejected\nCaused by:\n  {source}")]
    LaunchFailure {
        /// The stage that couldn't be launched.
        stage: DispatchStage,
        /// The error of the stream.
        source: LaunchError,
    },

    /// A launch failed on the device, surfaced at a synchronization point.
    #[error("The {stage} stage failed on the device\nCaused by:\n  {source}")]
    SynchronizationFailure {
        /// The stage the failing task belongs to.
        stage: DispatchStage,
        /// The error of the device.
        source: ExecutionError,
    },

    /// The architecture or occupancy probe failed.
    #[error("Can't query the device\nCaused by:\n  {0}")]
    DeviceQueryFailure(#[from] DeviceQueryError),
}

impl DispatchError {
    pub(crate) fn unsupported<S: Into<String>>(reason: S) -> Self {
        DispatchError::ConfigurationUnsupported {
            reason: reason.into(),
        }
    }
}
