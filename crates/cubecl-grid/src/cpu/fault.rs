use core::sync::atomic::{AtomicI64, Ordering};

const DISARMED: i64 = -1;

/// Fails a single future operation, counted from the moment it is armed.
///
/// Used to check that every failure point of a dispatch releases what it acquired.
#[derive(Debug)]
pub struct FaultInjector {
    remaining: AtomicI64,
}

impl Default for FaultInjector {
    fn default() -> Self {
        Self {
            remaining: AtomicI64::new(DISARMED),
        }
    }
}

impl FaultInjector {
    /// Fail the operation coming after `skip` successful ones.
    pub fn arm(&self, skip: usize) {
        self.remaining.store(skip as i64, Ordering::SeqCst);
    }

    /// Stop failing.
    pub fn disarm(&self) {
        self.remaining.store(DISARMED, Ordering::SeqCst);
    }

    /// Whether the injector still waits to fail an operation.
    pub fn is_armed(&self) -> bool {
        self.remaining.load(Ordering::SeqCst) >= 0
    }

    /// Count one operation, returning true when it must fail.
    pub fn tick(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                (remaining >= 0).then_some(remaining - 1)
            })
            .map(|previous| previous == 0)
            .unwrap_or(false)
    }
}
