#![allow(dead_code)]

use std::sync::Arc;

use cubecl_dispatch::Dispatcher;
use cubecl_grid::config::GlobalConfig;
use cubecl_grid::cpu::{CpuDevice, CpuDeviceOptions, CpuStream};
use cubecl_grid::{ArchVersion, HardwareProperties};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 4 compute units holding 4 groups each: 16 resident groups of up to 512 units.
pub fn device(generation: ArchVersion) -> CpuDevice {
    CpuDevice::new(CpuDeviceOptions {
        generation,
        hardware: HardwareProperties {
            plane_size: 32,
            num_compute_units: 4,
            max_groups_per_unit: 4,
            max_resident_units_per_unit: 2048,
            max_units_per_group: 1024,
            max_group_count: 1024,
        },
        parallelism: 4,
        memory_budget: None,
    })
}

pub fn dispatcher<'a>(device: &'a CpuDevice, stream: &'a mut CpuStream) -> Dispatcher<'a> {
    Dispatcher::from_config(
        device,
        device.allocator(),
        stream,
        Arc::new(GlobalConfig::default()),
    )
}

pub fn random_values(len: usize, max: u64, seed: u64) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.random_range(0..max)).collect()
}

/// Histogram of `bins` bins of equal width over `[lower, upper)`.
pub fn host_histogram(samples: &[u64], bins: u64, lower: u64, upper: u64) -> Vec<u64> {
    let mut counts = vec![0; bins as usize];

    for sample in samples.iter().filter(|s| **s >= lower && **s < upper) {
        counts[((sample - lower) * bins / (upper - lower)) as usize] += 1;
    }

    counts
}
