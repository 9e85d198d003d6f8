use core::ops::Range;

/// Static partition of tiles into contiguous ranges, one per worker group.
///
/// The first `extra_tiles` groups get one more tile than the others, so range sizes
/// differ by at most one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvenShare {
    num_tiles: u64,
    num_groups: u32,
    tiles_per_group: u64,
    extra_tiles: u64,
}

impl EvenShare {
    /// Split `num_tiles` between `num_groups` groups.
    pub fn new(num_tiles: u64, num_groups: u32) -> Self {
        let groups = u64::max(num_groups as u64, 1);

        Self {
            num_tiles,
            num_groups,
            tiles_per_group: num_tiles / groups,
            extra_tiles: num_tiles % groups,
        }
    }

    /// The number of tiles split.
    pub fn num_tiles(&self) -> u64 {
        self.num_tiles
    }

    /// The number of groups sharing the tiles.
    pub fn num_groups(&self) -> u32 {
        self.num_groups
    }

    /// The tiles of `group_id`. Empty for groups outside of the share.
    pub fn tiles(&self, group_id: u32) -> Range<u64> {
        if group_id >= self.num_groups {
            return self.num_tiles..self.num_tiles;
        }

        let group = group_id as u64;
        let start = group * self.tiles_per_group + u64::min(group, self.extra_tiles);
        let len = self.tiles_per_group + (group < self.extra_tiles) as u64;

        start..start + len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_are_contiguous_and_cover_all_tiles() {
        for (num_tiles, num_groups) in [(10, 3), (7, 7), (100, 8), (1, 1), (33, 32)] {
            let share = EvenShare::new(num_tiles, num_groups);
            let mut next = 0;

            for group in 0..num_groups {
                let range = share.tiles(group);
                assert_eq!(range.start, next);
                assert!(!range.is_empty());
                next = range.end;
            }

            assert_eq!(next, num_tiles);
        }
    }

    #[test]
    fn range_sizes_differ_by_at_most_one() {
        let share = EvenShare::new(10, 4);
        let sizes: Vec<_> = (0..4).map(|group| share.tiles(group).count()).collect();

        assert_eq!(sizes, vec![3, 3, 2, 2]);
    }

    #[test]
    fn groups_outside_of_the_share_have_no_tile() {
        let share = EvenShare::new(10, 4);

        assert!(share.tiles(4).is_empty());
    }
}
