use core::sync::atomic::{AtomicU64, Ordering};

use super::CombineOp;

/// Maximum of unsigned values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Max;

impl CombineOp for Max {
    fn identity(&self) -> u64 {
        u64::MIN
    }

    fn combine(&self, lhs: u64, rhs: u64) -> u64 {
        u64::max(lhs, rhs)
    }

    fn atomic_combine(&self, word: &AtomicU64, value: u64) {
        word.fetch_max(value, Ordering::AcqRel);
    }
}
