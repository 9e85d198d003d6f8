use core::sync::atomic::{AtomicBool, Ordering};

use crate::error::KernelError;
use crate::stream::{GroupContext, Kernel, LaunchGrid};

/// Executes the worker groups of a launch on host threads.
///
/// Groups are split in contiguous chunks, one chunk per thread, and every thread runs its
/// chunk in ascending order. The lowest unfinished group is therefore always running, which
/// guarantees progress to groups waiting on lower groups.
#[derive(Debug, Clone)]
pub struct Scheduler {
    parallelism: usize,
}

impl Default for Scheduler {
    fn default() -> Self {
        let available_parallelism = std::thread::available_parallelism()
            .map(|parallelism| parallelism.get())
            .unwrap_or(1);

        Self::new(available_parallelism)
    }
}

impl Scheduler {
    /// Create a scheduler running at most `parallelism` threads per launch.
    pub fn new(parallelism: usize) -> Self {
        Self {
            parallelism: usize::max(parallelism, 1),
        }
    }

    /// The maximum number of threads used per launch.
    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Run every group of `grid` to completion, returning the first error of a group.
    ///
    /// When a group fails, the remaining groups are aborted: groups not started yet are
    /// skipped and running groups observe [GroupContext::should_abort].
    pub fn execute(&self, grid: LaunchGrid, kernel: Kernel<'_>) -> Result<(), KernelError> {
        let num_groups = grid.num_groups as usize;
        let num_workers = usize::min(self.parallelism, num_groups);
        let abort = AtomicBool::new(false);
        let first_error = spin::Mutex::new(None);

        if num_workers <= 1 {
            run_chunk(0..num_groups, grid, kernel, &abort, &first_error);
        } else {
            let chunk_size = num_groups.div_ceil(num_workers);
            let abort = &abort;
            let first_error = &first_error;

            std::thread::scope(|scope| {
                for worker in 0..num_workers {
                    let start = worker * chunk_size;
                    let end = usize::min(start + chunk_size, num_groups);
                    if start >= end {
                        continue;
                    }

                    scope.spawn(move || run_chunk(start..end, grid, kernel, abort, first_error));
                }
            });
        }

        match first_error.into_inner() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn run_chunk(
    groups: core::ops::Range<usize>,
    grid: LaunchGrid,
    kernel: Kernel<'_>,
    abort: &AtomicBool,
    first_error: &spin::Mutex<Option<KernelError>>,
) {
    for group_id in groups {
        if abort.load(Ordering::Relaxed) {
            break;
        }

        let context = GroupContext::new(group_id as u32, grid, abort);

        if let Err(err) = kernel(context) {
            abort.store(true, Ordering::Relaxed);
            log::trace!("Group {group_id} failed: {err}");

            let mut slot = first_error.lock();
            // Aborted groups only echo the failure of another group.
            let replace = match slot.as_ref() {
                None => true,
                Some(KernelError::Aborted) => err != KernelError::Aborted,
                Some(_) => false,
            };
            if replace {
                *slot = Some(err);
            }
        }
    }
}
