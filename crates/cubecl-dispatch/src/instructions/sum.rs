use core::sync::atomic::{AtomicU64, Ordering};

use super::CombineOp;

/// Wrapping sum, the operator of histograms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sum;

impl CombineOp for Sum {
    fn identity(&self) -> u64 {
        0
    }

    fn combine(&self, lhs: u64, rhs: u64) -> u64 {
        lhs.wrapping_add(rhs)
    }

    fn atomic_combine(&self, word: &AtomicU64, value: u64) {
        word.fetch_add(value, Ordering::AcqRel);
    }
}
