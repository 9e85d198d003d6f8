mod common;

use common::*;

use cubecl_dispatch::{
    DispatchError, DispatchStage, ExecutionPath, MAX_PAYLOAD, Max, Min, Sum, exclusive_scan,
    inclusive_scan,
};
use cubecl_grid::memory_management::DeviceAllocator;
use cubecl_grid::{ArchVersion, KernelError};

#[test_log::test]
fn inclusive_sum_matches_host() {
    let device = device(ArchVersion::new(3, 5));
    let mut stream = device.stream();
    let values = random_values(100_000, 1_000, 10);
    let input = device.allocator().create(&values).unwrap();
    let output = device.allocator().filled(values.len(), 0).unwrap();

    let mut dispatcher = dispatcher(&device, &mut stream);
    let report = inclusive_scan(&mut dispatcher, &input, &output, 100_000, Sum).unwrap();

    let expected: Vec<u64> = values
        .iter()
        .scan(0u64, |acc, value| {
            *acc += value;
            Some(*acc)
        })
        .collect();

    assert_eq!(report.path, ExecutionPath::SinglePass);
    assert_eq!(report.num_groups, 16);
    assert!(report.num_tiles > report.num_groups as u64);
    assert_eq!(
        report.stages(),
        vec![DispatchStage::Initialization, DispatchStage::Tiles]
    );
    assert_eq!(output.read(), expected);
}

#[test_log::test]
fn exclusive_max_starts_from_init() {
    let device = device(ArchVersion::new(3, 0));
    let mut stream = device.stream();
    let values = random_values(20_000, 1_000_000, 11);
    let input = device.allocator().create(&values).unwrap();
    let output = device.allocator().filled(values.len(), 0).unwrap();

    let mut dispatcher = dispatcher(&device, &mut stream);
    exclusive_scan(&mut dispatcher, &input, &output, 20_000, Max, 500).unwrap();

    let mut running = 500u64;
    let expected: Vec<u64> = values
        .iter()
        .map(|value| {
            let output = running;
            running = running.max(*value);
            output
        })
        .collect();

    assert_eq!(output.read(), expected);
}

#[test_log::test]
fn every_tier_scans_the_same() {
    let values = random_values(30_000, u32::MAX as u64, 12);
    let mut expected = Vec::with_capacity(values.len());
    let mut running = u64::MAX;
    for value in values.iter() {
        running = running.min(*value);
        expected.push(running);
    }

    for generation in [100, 200, 300, 350, 860] {
        let device = device(ArchVersion(generation));
        let mut stream = device.stream();
        let input = device.allocator().create(&values).unwrap();
        let output = device.allocator().filled(values.len(), 0).unwrap();

        let mut dispatcher = dispatcher(&device, &mut stream);
        inclusive_scan(&mut dispatcher, &input, &output, values.len() as u64, Min).unwrap();

        assert_eq!(output.read(), expected, "Generation {generation}");
    }
}

#[test_log::test]
fn single_tile_scan_needs_no_coordination() {
    let device = device(ArchVersion::new(3, 5));
    let mut stream = device.stream();
    let input = device.allocator().create(&[3; 100]).unwrap();
    let output = device.allocator().filled(100, 0).unwrap();
    let baseline = device.allocator().memory_usage();

    let mut dispatcher = dispatcher(&device, &mut stream);
    let report = exclusive_scan(&mut dispatcher, &input, &output, 100, Sum, 1).unwrap();

    assert_eq!(report.num_tiles, 1);
    assert_eq!(report.stages(), vec![DispatchStage::Tiles]);
    assert_eq!(output.read(), (0..100).map(|i| 1 + 3 * i).collect::<Vec<u64>>());
    assert_eq!(
        device.allocator().memory_usage().peak_bytes_in_use,
        baseline.peak_bytes_in_use
    );
}

#[test_log::test]
fn oversized_prefix_fails_the_tiles() {
    let device = device(ArchVersion::new(3, 5));
    let mut stream = device.stream();
    let mut values = vec![1; 10_000];
    values[0] = MAX_PAYLOAD;
    let input = device.allocator().create(&values).unwrap();
    let output = device.allocator().filled(values.len(), 0).unwrap();
    let baseline = device.allocator().memory_usage().number_allocs;

    let mut dispatcher = dispatcher(&device, &mut stream);
    let err = inclusive_scan(&mut dispatcher, &input, &output, 10_000, Sum).unwrap_err();

    match err {
        DispatchError::SynchronizationFailure { stage, source } => {
            assert_eq!(stage, DispatchStage::Tiles);
            assert!(matches!(source.source, KernelError::PayloadOverflow { .. }));
        }
        err => panic!("Unexpected error {err}"),
    }
    assert_eq!(device.allocator().memory_usage().number_allocs, baseline);
}

#[test_log::test]
fn oversized_prefix_fails_a_single_tile() {
    let device = device(ArchVersion::new(3, 5));
    let mut stream = device.stream();
    let input = device.allocator().create(&[MAX_PAYLOAD, 1]).unwrap();
    let output = device.allocator().filled(2, 0).unwrap();

    let mut dispatcher = dispatcher(&device, &mut stream);
    let err = inclusive_scan(&mut dispatcher, &input, &output, 2, Sum).unwrap_err();

    match err {
        DispatchError::SynchronizationFailure { stage, source } => {
            assert_eq!(stage, DispatchStage::Tiles);
            assert_eq!(
                source.source,
                KernelError::PayloadOverflow {
                    value: MAX_PAYLOAD + 1
                }
            );
        }
        err => panic!("Unexpected error {err}"),
    }
}

#[test_log::test]
fn short_buffers_are_rejected() {
    let device = device(ArchVersion::new(3, 5));
    let mut stream = device.stream();
    let input = device.allocator().filled(10, 1).unwrap();
    let output = device.allocator().filled(5, 0).unwrap();

    let mut dispatcher = dispatcher(&device, &mut stream);

    assert!(matches!(
        inclusive_scan(&mut dispatcher, &input, &output, 10, Sum),
        Err(DispatchError::ConfigurationUnsupported { .. })
    ));
    assert!(matches!(
        exclusive_scan(&mut dispatcher, &output, &input, 10, Sum, 0),
        Err(DispatchError::ConfigurationUnsupported { .. })
    ));
    assert!(inclusive_scan(&mut dispatcher, &input, &output, 5, Sum).is_ok());
    assert_eq!(output.read(), vec![1, 2, 3, 4, 5]);
}
