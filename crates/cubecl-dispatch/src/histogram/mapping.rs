use crate::error::DispatchError;

use super::Sample;

/// `num_levels - 1` bins of equal width between `lower` (inclusive) and `upper` (exclusive).
#[derive(new, Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvenBinning<S: Sample> {
    /// The number of bin boundaries.
    pub num_levels: u32,
    /// The lower bound of the first bin.
    pub lower: S,
    /// The upper bound of the last bin.
    pub upper: S,
}

/// Bins delimited by consecutive `levels`, sorted in increasing order.
#[derive(new, Debug, Clone, PartialEq, Eq)]
pub struct RangeBinning<S: Sample> {
    /// The bin boundaries.
    pub levels: Vec<S>,
}

/// Maps samples to bins, samples outside of every bin are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BinMapping {
    Even { bins: u64, lower: u64, upper: u64 },
    Range { levels: Vec<u64> },
}

impl BinMapping {
    pub(crate) fn even<S: Sample>(binning: &EvenBinning<S>) -> Result<Self, DispatchError> {
        let (lower, upper) = (binning.lower.into(), binning.upper.into());

        if binning.num_levels < 2 {
            return Err(DispatchError::unsupported(format!(
                "At least 2 levels are needed to delimit a bin, got {}",
                binning.num_levels
            )));
        }
        if lower >= upper {
            return Err(DispatchError::unsupported(format!(
                "The lower level {lower} must be below the upper level {upper}"
            )));
        }

        Ok(BinMapping::Even {
            bins: binning.num_levels as u64 - 1,
            lower,
            upper,
        })
    }

    pub(crate) fn range<S: Sample>(binning: &RangeBinning<S>) -> Result<Self, DispatchError> {
        let levels: Vec<u64> = binning.levels.iter().map(|level| (*level).into()).collect();

        if levels.len() < 2 {
            return Err(DispatchError::unsupported(format!(
                "At least 2 levels are needed to delimit a bin, got {}",
                levels.len()
            )));
        }
        if levels.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(DispatchError::unsupported(
                "Levels must be sorted in strictly increasing order",
            ));
        }

        Ok(BinMapping::Range { levels })
    }

    /// The number of bins.
    pub(crate) fn num_bins(&self) -> usize {
        match self {
            BinMapping::Even { bins, .. } => *bins as usize,
            BinMapping::Range { levels } => levels.len() - 1,
        }
    }

    /// The bin of `sample`.
    pub(crate) fn bin(&self, sample: u64) -> Option<usize> {
        match self {
            BinMapping::Even { bins, lower, upper } => {
                if sample < *lower || sample >= *upper {
                    return None;
                }

                let offset = (sample - lower) as u128 * *bins as u128;
                Some((offset / (upper - lower) as u128) as usize)
            }
            BinMapping::Range { levels } => {
                if sample < levels[0] || sample >= levels[levels.len() - 1] {
                    return None;
                }

                Some(levels.partition_point(|level| *level <= sample) - 1)
            }
        }
    }
}
