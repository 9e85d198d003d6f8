use cubecl_grid::KernelError;
use cubecl_grid::memory_management::WORD_SIZE;

/// Placement of the privatized results in the scratch buffer.
///
/// Channels are stored one after the other, and each channel holds one slot of
/// `bins[channel]` words per group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchLayout {
    num_groups: u32,
    bins: Vec<usize>,
    channel_offsets: Vec<usize>,
    bin_offsets: Vec<usize>,
}

impl ScratchLayout {
    /// The layout of `num_groups` slots for outputs of `bins` words.
    pub fn new(num_groups: u32, bins: &[usize]) -> Self {
        let mut channel_offsets = Vec::with_capacity(bins.len());
        let mut bin_offsets = Vec::with_capacity(bins.len());
        let (mut channel_offset, mut bin_offset) = (0, 0);

        for num_bins in bins {
            channel_offsets.push(channel_offset);
            bin_offsets.push(bin_offset);
            channel_offset += num_bins * num_groups as usize;
            bin_offset += num_bins;
        }

        Self {
            num_groups,
            bins: bins.to_vec(),
            channel_offsets,
            bin_offsets,
        }
    }

    /// The number of groups with a slot.
    pub fn num_groups(&self) -> u32 {
        self.num_groups
    }

    /// The number of channels.
    pub fn num_channels(&self) -> usize {
        self.bins.len()
    }

    /// The number of words of one slot of `channel`.
    pub fn bins(&self, channel: usize) -> usize {
        self.bins.get(channel).copied().unwrap_or(0)
    }

    /// The number of output words, over every channel.
    pub fn total_bins(&self) -> usize {
        self.bins.iter().sum()
    }

    /// The number of words of the scratch buffer.
    pub fn len(&self) -> usize {
        self.total_bins() * self.num_groups as usize
    }

    /// Whether the scratch buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of bytes of the scratch buffer.
    pub fn size(&self) -> u64 {
        self.len() as u64 * WORD_SIZE
    }

    /// The first word of the slot of `group_id` for `channel`.
    pub fn slot(&self, channel: usize, group_id: u32) -> Result<usize, KernelError> {
        let offset = self
            .channel_offsets
            .get(channel)
            .ok_or(KernelError::OutOfBounds {
                index: channel,
                len: self.channel_offsets.len(),
            })?;

        Ok(offset + group_id as usize * self.bins[channel])
    }

    /// The channel and bin of a flat output index in `0..total_bins()`.
    pub fn locate(&self, flat: usize) -> (usize, usize) {
        let channel = self
            .bin_offsets
            .partition_point(|offset| *offset <= flat)
            .saturating_sub(1);

        (channel, flat - self.bin_offsets[channel])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_disjoint() {
        let layout = ScratchLayout::new(3, &[4, 2]);
        let mut owners = vec![None; layout.len()];

        for channel in 0..2 {
            for group in 0..3 {
                let start = layout.slot(channel, group).unwrap();
                for word in start..start + layout.bins(channel) {
                    assert_eq!(owners[word], None);
                    owners[word] = Some((channel, group));
                }
            }
        }

        assert_eq!(layout.len(), 18);
        assert!(owners.iter().all(Option::is_some));
    }

    #[test]
    fn flat_bins_are_located() {
        let layout = ScratchLayout::new(2, &[3, 2]);

        assert_eq!(layout.locate(0), (0, 0));
        assert_eq!(layout.locate(2), (0, 2));
        assert_eq!(layout.locate(3), (1, 0));
        assert_eq!(layout.locate(4), (1, 1));
    }

    #[test]
    fn unknown_channel_is_out_of_bounds() {
        let layout = ScratchLayout::new(2, &[3]);

        assert!(layout.slot(1, 0).is_err());
    }
}
