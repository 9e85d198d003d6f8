mod max;
mod min;
mod sum;

pub use max::*;
pub use min::*;
pub use sum::*;

use core::fmt::Debug;
use core::sync::atomic::{AtomicU64, Ordering};

/// An associative binary operator with an identity element, used to combine partial results.
///
/// Dispatches combine partial results in an unspecified order. Results are only
/// reproducible when the operator is also commutative over the values used.
pub trait CombineOp: Debug + Clone + Send + Sync + 'static {
    /// The element `e` such that `combine(e, x) == x` for every `x`.
    fn identity(&self) -> u64;

    /// Combine two values.
    fn combine(&self, lhs: u64, rhs: u64) -> u64;

    /// Combine `value` into `word` atomically.
    fn atomic_combine(&self, word: &AtomicU64, value: u64) {
        let mut current = word.load(Ordering::Relaxed);

        loop {
            let next = self.combine(current, value);
            match word.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    /// Fold `values` starting from the identity.
    fn fold<I: IntoIterator<Item = u64>>(&self, values: I) -> u64 {
        values
            .into_iter()
            .fold(self.identity(), |acc, value| self.combine(acc, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Bitwise or, only implementing the required methods.
    #[derive(Debug, Clone)]
    struct Or;

    impl CombineOp for Or {
        fn identity(&self) -> u64 {
            0
        }

        fn combine(&self, lhs: u64, rhs: u64) -> u64 {
            lhs | rhs
        }
    }

    #[test]
    fn default_atomic_combine_uses_combine() {
        let word = AtomicU64::new(0b0101);

        Or.atomic_combine(&word, 0b1000);

        assert_eq!(word.load(Ordering::Relaxed), 0b1101);
    }

    #[test]
    fn concurrent_combines_are_not_lost() {
        let word = AtomicU64::new(0);

        std::thread::scope(|scope| {
            for bit in 0..8 {
                let word = &word;
                scope.spawn(move || {
                    for _ in 0..100 {
                        Or.atomic_combine(word, 1 << bit);
                    }
                });
            }
        });

        assert_eq!(word.load(Ordering::Relaxed), 0xFF);
    }

    #[test]
    fn fold_starts_from_identity() {
        assert_eq!(Or.fold([]), 0);
        assert_eq!(Or.fold([1, 4, 16]), 21);
    }
}
