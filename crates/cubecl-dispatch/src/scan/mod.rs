mod processor;

use cubecl_grid::memory_management::DeviceBuffer;

use crate::dispatch::{DispatchReport, Dispatcher};
use crate::error::DispatchError;
use crate::instructions::CombineOp;
use crate::policy::{AlgorithmVariant, PolicyRequest};

use processor::{ScanMode, ScanProcessor};

/// Inclusive prefix scan: `output[i] = input[0] op ... op input[i]`.
///
/// The inclusive prefix of every tile must fit in a [status word](crate::MAX_PAYLOAD),
/// larger values make the dispatch fail whether or not the scan spans several tiles.
pub fn inclusive_scan<Op: CombineOp>(
    dispatcher: &mut Dispatcher<'_>,
    input: &DeviceBuffer,
    output: &DeviceBuffer,
    num_items: u64,
    op: Op,
) -> Result<DispatchReport, DispatchError> {
    dispatch_scan(dispatcher, input, output, num_items, op, ScanMode::Inclusive)
}

/// Exclusive prefix scan: `output[i] = init op input[0] op ... op input[i - 1]`.
pub fn exclusive_scan<Op: CombineOp>(
    dispatcher: &mut Dispatcher<'_>,
    input: &DeviceBuffer,
    output: &DeviceBuffer,
    num_items: u64,
    op: Op,
    init: u64,
) -> Result<DispatchReport, DispatchError> {
    dispatch_scan(dispatcher, input, output, num_items, op, ScanMode::Exclusive(init))
}

fn dispatch_scan<Op: CombineOp>(
    dispatcher: &mut Dispatcher<'_>,
    input: &DeviceBuffer,
    output: &DeviceBuffer,
    num_items: u64,
    op: Op,
    mode: ScanMode,
) -> Result<DispatchReport, DispatchError> {
    for (name, buffer) in [("input", input), ("output", output)] {
        if (buffer.len() as u64) < num_items {
            return Err(DispatchError::unsupported(format!(
                "The {name} buffer holds {} items, {num_items} requested",
                buffer.len()
            )));
        }
    }

    let request = PolicyRequest::new(1, 1, AlgorithmVariant::Scan);

    dispatcher.dispatch(&request, num_items, |_| {
        ScanProcessor::new(input.clone(), output.clone(), op, mode)
    })
}
