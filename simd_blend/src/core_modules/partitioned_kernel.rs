// THEORY:
// The partitioned kernel spreads the scalar rule over a fixed number of OS threads
// without looking at rows at all. The base image is treated as one flat index space
// `0 .. rows * cols`, cut into `T` contiguous ranges:
//
//     chunk = total / T
//     worker i: [chunk * i, chunk * (i + 1))     worker 0 starts at 0,
//                                                the last worker ends at `total`.
//
// The last worker absorbs the remainder of the division, so the ranges cover every
// index exactly once. Each worker gets a `&mut` slice for its range only (carved
// off the output with `split_at_mut`), recovers `(row, col)` from the flat index,
// and writes its pixels. The calling thread joins every worker before it returns,
// and a worker that could not be spawned or that panicked fails the whole call.

use std::num::NonZeroUsize;
use std::ops::Range;
use std::thread;

use log::{debug, trace};

use crate::core_modules::error::{BlendError, BlendResult};
use crate::core_modules::gray_image::{ImageView, ResultBuffer};
use crate::core_modules::kernel::{check_inputs, BlendKernel};
use crate::core_modules::pixel_blend::pixel_blend::{blend_pixel, BlendParameter};

/// Splits `0 .. total` into `workers` contiguous ranges, in worker order.
///
/// Every range but the last has `total / workers` elements; the last one also
/// takes the remainder. When `total < workers` the leading ranges are empty.
pub fn partition_ranges(total: usize, workers: NonZeroUsize) -> Vec<Range<usize>> {
    let workers = workers.get();
    let chunk = total / workers;
    (0..workers)
        .map(|i| {
            let start = if i == 0 { 0 } else { chunk * i };
            let end = if i + 1 == workers { total } else { chunk * (i + 1) };
            start..end
        })
        .collect()
}

/// Scalar blend distributed over a fixed pool of explicitly spawned threads.
#[derive(Debug, Clone, Copy)]
pub struct PartitionedKernel {
    thread_count: NonZeroUsize,
}

impl PartitionedKernel {
    pub fn new(thread_count: usize) -> BlendResult<Self> {
        let thread_count =
            NonZeroUsize::new(thread_count).ok_or(BlendError::InvalidThreadCount(thread_count))?;
        debug!("partitioned kernel: {thread_count} workers");
        Ok(Self { thread_count })
    }

    pub fn thread_count(&self) -> usize {
        self.thread_count.get()
    }
}

/// Blends the flat indices `range` of `base` into `out`, which holds exactly that range.
fn blend_range(
    range: Range<usize>,
    base: &ImageView<'_>,
    overlay: &ImageView<'_>,
    parameter: BlendParameter,
    out: &mut [u8],
) {
    let cols = base.cols();
    for (slot, idx) in out.iter_mut().zip(range) {
        *slot = blend_pixel(base, overlay, idx / cols, idx % cols, parameter);
    }
}

impl BlendKernel for PartitionedKernel {
    fn name(&self) -> &'static str {
        "partitioned"
    }

    fn blend_into(
        &self,
        base: &ImageView<'_>,
        overlay: &ImageView<'_>,
        parameter: BlendParameter,
        output: &mut ResultBuffer,
    ) -> BlendResult<()> {
        check_inputs(base, output)?;
        let ranges = partition_ranges(base.len(), self.thread_count);
        trace!(
            "partitioned blend of {} pixels over {} workers",
            base.len(),
            ranges.len()
        );

        thread::scope(|scope| {
            let mut remaining = output.as_mut_slice();
            let mut handles = Vec::with_capacity(ranges.len());
            let mut outcome = Ok(());

            for (worker, range) in ranges.into_iter().enumerate() {
                let (slice, rest) = std::mem::take(&mut remaining).split_at_mut(range.len());
                remaining = rest;

                let spawned = thread::Builder::new()
                    .name(format!("blend-part-{worker}"))
                    .spawn_scoped(scope, move || {
                        blend_range(range, base, overlay, parameter, slice)
                    });
                match spawned {
                    Ok(handle) => handles.push((worker, handle)),
                    Err(source) => {
                        outcome = Err(BlendError::WorkerSpawnFailed { worker, source });
                        break;
                    }
                }
            }

            // Join everything that did start, even after a failure, so no worker
            // outlives the call.
            for (worker, handle) in handles {
                if handle.join().is_err() && outcome.is_ok() {
                    outcome = Err(BlendError::WorkerPanicked { worker });
                }
            }
            outcome
        })
    }
}
