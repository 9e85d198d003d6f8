use core::ops::Range;

use crate::error::DispatchError;
use crate::policy::{ExecutionPolicy, GridMapping};

use super::EvenShare;

/// How many tiles and worker groups a dispatch uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkPlan {
    /// The number of items of the dispatch.
    pub num_items: u64,
    /// The number of items per tile.
    pub tile_size: u64,
    /// `ceil(num_items / tile_size)`.
    pub num_tiles: u64,
    /// The number of worker groups to launch, never more than `num_tiles`.
    pub num_groups: u32,
    /// The number of groups concurrently resident on the device.
    pub occupancy: u32,
    /// How tiles are assigned to groups.
    pub mapping: GridMapping,
}

impl WorkPlan {
    /// Size the launch of `num_items` items with `policy`.
    ///
    /// `occupancy` is the number of groups of `policy.group_size` units the device can hold
    /// at once, and `max_group_count` the largest launch it accepts.
    pub fn new(
        num_items: u64,
        policy: &ExecutionPolicy,
        occupancy: u32,
        max_group_count: u32,
    ) -> Result<Self, DispatchError> {
        if policy.tile_size == 0 {
            return Err(DispatchError::unsupported(
                "A tile must contain at least one item",
            ));
        }
        if occupancy == 0 || max_group_count == 0 {
            return Err(DispatchError::unsupported(format!(
                "No group of {} units can be resident on the device",
                policy.group_size
            )));
        }

        let num_tiles = num_items.div_ceil(policy.tile_size);
        let capacity = match policy.mapping {
            GridMapping::EvenShare => occupancy as u64 * policy.subscription_factor as u64,
            GridMapping::Dynamic => occupancy as u64,
        };
        let num_groups = [num_tiles, capacity, max_group_count as u64]
            .into_iter()
            .min()
            .unwrap_or(0) as u32;

        Ok(Self {
            num_items,
            tile_size: policy.tile_size,
            num_tiles,
            num_groups,
            occupancy,
            mapping: policy.mapping,
        })
    }

    /// The items of `tile`.
    pub fn tile_items(&self, tile: u64) -> Range<u64> {
        let start = u64::min(tile * self.tile_size, self.num_items);
        let end = u64::min(start + self.tile_size, self.num_items);

        start..end
    }

    /// The static partition of the tiles between the groups.
    pub fn even_share(&self) -> EvenShare {
        EvenShare::new(self.num_tiles, self.num_groups)
    }

    /// Whether groups claim their tiles from a drain counter.
    ///
    /// A single group processes every tile in order and needs no queue.
    pub fn uses_queue(&self) -> bool {
        self.mapping == GridMapping::Dynamic && self.num_groups > 1
    }
}

impl core::fmt::Display for WorkPlan {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} items in {} tiles of {}, {} groups ({:?}, occupancy {})",
            self.num_items,
            self.num_tiles,
            self.tile_size,
            self.num_groups,
            self.mapping,
            self.occupancy
        )
    }
}
