//! Device-wide histograms of unsigned integer samples.
//!
//! Samples are packed in device words (see [Sample]). Multi-channel entry points read
//! `CHANNELS` interleaved samples per pixel and compute one histogram for each of the first
//! `ACTIVE` channels. Output bins only hold the histogram when the dispatch succeeds.

mod mapping;
mod processor;
mod sample;

pub use mapping::{EvenBinning, RangeBinning};
pub use sample::Sample;

use cubecl_grid::memory_management::DeviceBuffer;

use crate::dispatch::{DispatchReport, Dispatcher};
use crate::error::DispatchError;
use crate::policy::{AlgorithmVariant, HistogramAlgorithm, PolicyRequest};

use mapping::BinMapping;
use processor::HistogramProcessor;
use sample::SampleLayout;

/// Histogram of `num_samples` samples with bins of equal width.
pub fn histogram_even<S: Sample>(
    dispatcher: &mut Dispatcher<'_>,
    samples: &DeviceBuffer,
    num_samples: u64,
    histogram: &DeviceBuffer,
    binning: EvenBinning<S>,
    algorithm: HistogramAlgorithm,
) -> Result<DispatchReport, DispatchError> {
    multi_histogram_even::<S, 1, 1>(
        dispatcher,
        samples,
        num_samples,
        core::array::from_ref(histogram),
        core::array::from_ref(&binning),
        algorithm,
    )
}

/// Histogram of `num_samples` samples with bins delimited by sorted levels.
pub fn histogram_range<S: Sample>(
    dispatcher: &mut Dispatcher<'_>,
    samples: &DeviceBuffer,
    num_samples: u64,
    histogram: &DeviceBuffer,
    binning: RangeBinning<S>,
    algorithm: HistogramAlgorithm,
) -> Result<DispatchReport, DispatchError> {
    multi_histogram_range::<S, 1, 1>(
        dispatcher,
        samples,
        num_samples,
        core::array::from_ref(histogram),
        core::array::from_ref(&binning),
        algorithm,
    )
}

/// Histograms of the first `ACTIVE` of `CHANNELS` interleaved channels, with bins of equal
/// width.
///
/// `num_samples` counts the samples of every channel and must be a multiple of `CHANNELS`.
pub fn multi_histogram_even<S: Sample, const CHANNELS: usize, const ACTIVE: usize>(
    dispatcher: &mut Dispatcher<'_>,
    samples: &DeviceBuffer,
    num_samples: u64,
    histograms: &[DeviceBuffer; ACTIVE],
    binnings: &[EvenBinning<S>; ACTIVE],
    algorithm: HistogramAlgorithm,
) -> Result<DispatchReport, DispatchError> {
    let mappings = binnings
        .iter()
        .map(BinMapping::even)
        .collect::<Result<Vec<_>, _>>()?;

    dispatch_histogram(
        dispatcher,
        HistogramArgs {
            samples,
            layout: SampleLayout::of::<S>(),
            num_samples,
            channels: CHANNELS,
            histograms,
            mappings,
            algorithm,
        },
    )
}

/// Histograms of the first `ACTIVE` of `CHANNELS` interleaved channels, with bins delimited
/// by sorted levels.
///
/// `num_samples` counts the samples of every channel and must be a multiple of `CHANNELS`.
pub fn multi_histogram_range<S: Sample, const CHANNELS: usize, const ACTIVE: usize>(
    dispatcher: &mut Dispatcher<'_>,
    samples: &DeviceBuffer,
    num_samples: u64,
    histograms: &[DeviceBuffer; ACTIVE],
    binnings: &[RangeBinning<S>; ACTIVE],
    algorithm: HistogramAlgorithm,
) -> Result<DispatchReport, DispatchError> {
    let mappings = binnings
        .iter()
        .map(BinMapping::range)
        .collect::<Result<Vec<_>, _>>()?;

    dispatch_histogram(
        dispatcher,
        HistogramArgs {
            samples,
            layout: SampleLayout::of::<S>(),
            num_samples,
            channels: CHANNELS,
            histograms,
            mappings,
            algorithm,
        },
    )
}

struct HistogramArgs<'a> {
    samples: &'a DeviceBuffer,
    layout: SampleLayout,
    num_samples: u64,
    channels: usize,
    histograms: &'a [DeviceBuffer],
    mappings: Vec<BinMapping>,
    algorithm: HistogramAlgorithm,
}

fn dispatch_histogram(
    dispatcher: &mut Dispatcher<'_>,
    args: HistogramArgs<'_>,
) -> Result<DispatchReport, DispatchError> {
    let active = args.mappings.len();

    if active == 0 || active > args.channels {
        return Err(DispatchError::unsupported(format!(
            "Can't histogram {active} of {} channels",
            args.channels
        )));
    }
    if args.num_samples % args.channels as u64 != 0 {
        return Err(DispatchError::unsupported(format!(
            "{} samples can't be split in pixels of {} channels",
            args.num_samples, args.channels
        )));
    }

    let capacity = args.layout.capacity(args.samples);
    if args.num_samples > capacity {
        return Err(DispatchError::unsupported(format!(
            "The samples buffer holds {capacity} samples, {} requested",
            args.num_samples
        )));
    }

    let shape: Vec<usize> = args.mappings.iter().map(BinMapping::num_bins).collect();
    for (channel, (histogram, bins)) in args.histograms.iter().zip(shape.iter()).enumerate() {
        if histogram.len() < *bins {
            return Err(DispatchError::unsupported(format!(
                "The histogram of channel {channel} holds {} bins, {bins} needed",
                histogram.len()
            )));
        }
    }

    let num_pixels = args.num_samples / args.channels as u64;
    let request = PolicyRequest::new(
        args.channels as u32,
        active as u32,
        AlgorithmVariant::Histogram(args.algorithm),
    );

    log::trace!(
        "Histogram of {num_pixels} pixels, {active}/{} channels, {:?}",
        args.channels,
        args.algorithm
    );

    dispatcher.dispatch(&request, num_pixels, |policy| {
        // The catalog may replace the requested algorithm.
        let algorithm = match policy.variant {
            AlgorithmVariant::Histogram(algorithm) => algorithm,
            AlgorithmVariant::Scan => args.algorithm,
        };

        HistogramProcessor {
            samples: args.samples.clone(),
            layout: args.layout,
            channels: args.channels,
            mappings: args.mappings,
            outputs: args.histograms.to_vec(),
            shape,
            algorithm,
        }
    })
}
