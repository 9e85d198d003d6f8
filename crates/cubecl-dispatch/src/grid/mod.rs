mod even_share;
mod plan;
mod queue;

pub use even_share::*;
pub use plan::*;
pub use queue::*;

use cubecl_grid::KernelError;
use cubecl_grid::stream::GroupContext;

/// How the groups of a tile launch find their tiles.
#[derive(Debug, Clone)]
pub enum TileSchedule {
    /// Each group processes its precomputed range.
    Static(EvenShare),
    /// Groups claim tiles from a drain counter until it is exhausted.
    Dynamic {
        /// The drain counter, reset by the initialization stage.
        queue: GridQueue,
        /// The number of tiles of the dispatch.
        num_tiles: u64,
    },
}

impl TileSchedule {
    /// Call `func` on every tile assigned to the group of `context`, in claim order.
    pub fn for_each_tile<F>(&self, context: &GroupContext<'_>, mut func: F) -> Result<(), KernelError>
    where
        F: FnMut(u64) -> Result<(), KernelError>,
    {
        match self {
            TileSchedule::Static(share) => {
                for tile in share.tiles(context.group_id) {
                    context.check_abort()?;
                    func(tile)?;
                }
            }
            TileSchedule::Dynamic { queue, num_tiles } => loop {
                context.check_abort()?;

                let tile = queue.drain(*num_tiles)?;
                if tile >= *num_tiles {
                    break;
                }

                func(tile)?;
            },
        }

        Ok(())
    }
}

/// The flat indices handled by the units of the group of `context`, striding over the whole
/// launch until `len`.
pub fn grid_stride(context: &GroupContext<'_>, len: usize) -> impl Iterator<Item = usize> {
    let group_size = context.group_size as usize;
    let stride = context.num_groups as usize * group_size;
    let start = context.group_id as usize * group_size;

    (start..len)
        .step_by(stride.max(1))
        .flat_map(move |base| base..usize::min(base + group_size, len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::AtomicBool;
    use cubecl_grid::stream::LaunchGrid;

    #[test]
    fn grid_stride_covers_every_index_once() {
        let abort = AtomicBool::new(false);
        let grid = LaunchGrid::new(3, 4);
        let mut seen = vec![0; 50];

        for group_id in 0..3 {
            let context = GroupContext::new(group_id, grid, &abort);
            for index in grid_stride(&context, 50) {
                seen[index] += 1;
            }
        }

        assert!(seen.iter().all(|count| *count == 1));
    }

    #[test]
    fn grid_stride_of_first_group() {
        let abort = AtomicBool::new(false);
        let context = GroupContext::new(0, LaunchGrid::new(2, 2), &abort);

        let indices: Vec<_> = grid_stride(&context, 7).collect();

        assert_eq!(indices, vec![0, 1, 4, 5]);
    }

    #[test]
    fn static_schedule_follows_share() {
        let abort = AtomicBool::new(false);
        let grid = LaunchGrid::new(3, 1);
        let schedule = TileSchedule::Static(EvenShare::new(10, 3));
        let context = GroupContext::new(1, grid, &abort);
        let mut tiles = Vec::new();

        schedule
            .for_each_tile(&context, |tile| {
                tiles.push(tile);
                Ok(())
            })
            .unwrap();

        assert_eq!(tiles, vec![4, 5, 6]);
    }

    #[test]
    fn aborted_group_stops_claiming() {
        let abort = AtomicBool::new(true);
        let schedule = TileSchedule::Static(EvenShare::new(10, 1));
        let context = GroupContext::new(0, LaunchGrid::new(1, 1), &abort);

        let result = schedule.for_each_tile(&context, |_| Ok(()));

        assert_eq!(result, Err(KernelError::Aborted));
    }
}
