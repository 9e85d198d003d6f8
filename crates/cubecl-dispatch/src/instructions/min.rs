use core::sync::atomic::{AtomicU64, Ordering};

use super::CombineOp;

/// Minimum of unsigned values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Min;

impl CombineOp for Min {
    fn identity(&self) -> u64 {
        u64::MAX
    }

    fn combine(&self, lhs: u64, rhs: u64) -> u64 {
        u64::min(lhs, rhs)
    }

    fn atomic_combine(&self, word: &AtomicU64, value: u64) {
        word.fetch_min(value, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_of_values() {
        assert_eq!(Min.fold([3, 9, 1]), 1);
        assert_eq!(Min.fold([]), u64::MAX);

        let word = AtomicU64::new(4);
        Min.atomic_combine(&word, 2);
        assert_eq!(word.load(Ordering::Relaxed), 2);
    }
}
