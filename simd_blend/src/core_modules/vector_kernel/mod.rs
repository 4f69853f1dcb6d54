// THEORY:
// The vector kernel trades edge precision for throughput. It walks each row in
// 16-byte lanes and treats a lane as a unit:
//
// 1.  **Whole-lane overlay test**: a lane is blended only when its row is inside the
//     overlay and the lane ends at or before the overlay's last column
//     (`col + 16 <= overlay.cols`). A lane that straddles the overlay's right edge is
//     copied through unchanged, even though the scalar kernel would blend its left
//     part. Callers must not expect identical edge pixels from the two kernels.
// 2.  **Division by shifting**: lanes cannot divide, so `alpha_inversed` must be a
//     power of two and the overlay is shifted right by its log2. Other divisors are
//     rejected up front rather than silently replaced.
// 3.  **Tail columns**: when the width is not a multiple of 16, the trailing columns
//     never form a lane. `TailPolicy` decides whether they are blended per pixel or
//     whether the call is refused. Nothing is ever read or written past a row.
// 4.  **Row scheduling**: rows are independent, so they can be handed to a fixed-size
//     rayon pool. Each worker receives whole output rows through `par_chunks_mut`,
//     which keeps writes disjoint without locks.

use std::sync::Arc;

use log::{debug, trace};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::core_modules::error::{BlendError, BlendResult};
use crate::core_modules::gray_image::{ImageView, ResultBuffer};
use crate::core_modules::kernel::{check_inputs, BlendKernel};
use crate::core_modules::pixel_blend::pixel_blend::BlendParameter;
use crate::core_modules::scalar_kernel::blend_row_scalar;

#[cfg(target_arch = "aarch64")]
mod neon;
mod portable;
#[cfg(target_arch = "x86_64")]
mod sse2;


/// Bytes (pixels) processed per vector step.
pub const LANE_WIDTH: usize = 16;

/// Per-byte mask that clears bits shifted in from the neighbouring byte.
#[cfg_attr(not(target_arch = "x86_64"), allow(dead_code))]
#[inline]
pub(crate) fn byte_mask(shift: u32) -> u8 {
    (0xFFu32 >> shift.min(u8::BITS)) as u8
}

/// Instruction set used for the 16-byte lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneBackend {
    Sse2,
    Neon,
    /// Plain Rust arithmetic over 16-byte chunks; available everywhere.
    Portable,
}

impl LaneBackend {
    /// Best backend for the target this crate was compiled for.
    pub fn native() -> Self {
        if cfg!(target_arch = "x86_64") {
            Self::Sse2
        } else if cfg!(target_arch = "aarch64") {
            Self::Neon
        } else {
            Self::Portable
        }
    }

    pub fn is_available(self) -> bool {
        match self {
            Self::Sse2 => cfg!(target_arch = "x86_64"),
            Self::Neon => cfg!(target_arch = "aarch64"),
            Self::Portable => true,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Sse2 => "sse2",
            Self::Neon => "neon",
            Self::Portable => "portable",
        }
    }

    #[inline]
    fn blend_lanes(self, base: &[u8], overlay: &[u8], shift: u32, out: &mut [u8]) {
        match self {
            // SAFETY: SSE2 is part of the x86_64 baseline; slice lengths are
            // checked by `RowJob::run`.
            #[cfg(target_arch = "x86_64")]
            Self::Sse2 => unsafe { sse2::blend_lanes(base, overlay, shift, out) },
            // SAFETY: NEON is part of the aarch64 baseline.
            #[cfg(target_arch = "aarch64")]
            Self::Neon => unsafe { neon::blend_lanes(base, overlay, shift, out) },
            _ => portable::blend_lanes(base, overlay, shift, out),
        }
    }
}

/// What to do with the `cols % 16` columns that do not fill a lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TailPolicy {
    /// Blend the tail pixel by pixel with the scalar rule.
    #[default]
    ScalarFallback,
    /// Refuse widths that are not a multiple of [`LANE_WIDTH`].
    Reject,
}

#[derive(Debug, Clone)]
enum Schedule {
    Sequential,
    RowParallel(Arc<ThreadPool>),
}

/// Blend kernel that processes 16 pixels per instruction.
#[derive(Debug, Clone)]
pub struct VectorKernel {
    backend: LaneBackend,
    tail_policy: TailPolicy,
    schedule: Schedule,
}

impl Default for VectorKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl VectorKernel {
    /// Single-threaded kernel using the native lane backend.
    pub fn new() -> Self {
        let backend = LaneBackend::native();
        debug!("vector kernel: {} lanes, sequential rows", backend.name());
        Self {
            backend,
            tail_policy: TailPolicy::default(),
            schedule: Schedule::Sequential,
        }
    }

    /// Kernel whose rows are shared out over a dedicated pool of `thread_count` workers.
    pub fn row_parallel(thread_count: usize) -> BlendResult<Self> {
        if thread_count == 0 {
            return Err(BlendError::InvalidThreadCount(thread_count));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(thread_count)
            .thread_name(|i| format!("blend-rows-{i}"))
            .build()?;
        let backend = LaneBackend::native();
        debug!(
            "vector kernel: {} lanes, rows shared over {} workers",
            backend.name(),
            pool.current_num_threads()
        );
        Ok(Self {
            backend,
            tail_policy: TailPolicy::default(),
            schedule: Schedule::RowParallel(Arc::new(pool)),
        })
    }

    pub fn with_tail_policy(mut self, tail_policy: TailPolicy) -> Self {
        self.tail_policy = tail_policy;
        self
    }

    pub fn with_backend(mut self, backend: LaneBackend) -> BlendResult<Self> {
        if !backend.is_available() {
            return Err(BlendError::BackendUnavailable(backend.name()));
        }
        self.backend = backend;
        Ok(self)
    }

    pub fn backend(&self) -> LaneBackend {
        self.backend
    }

    pub fn tail_policy(&self) -> TailPolicy {
        self.tail_policy
    }

    /// Number of threads rows are distributed over (1 when sequential).
    pub fn thread_count(&self) -> usize {
        match &self.schedule {
            Schedule::Sequential => 1,
            Schedule::RowParallel(pool) => pool.current_num_threads(),
        }
    }
}

/// Everything a worker needs to produce one output row.
struct RowJob<'a> {
    base: ImageView<'a>,
    overlay: ImageView<'a>,
    parameter: BlendParameter,
    shift: u32,
    /// Columns covered by whole lanes: `cols - cols % LANE_WIDTH`.
    lane_cols: usize,
    backend: LaneBackend,
}

impl RowJob<'_> {
    fn run(&self, row: usize, out_row: &mut [u8]) {
        let base_row = self.base.row(row);
        let cols = base_row.len();

        // Lanes ending at or before the overlay's last column get blended.
        let blended = if row < self.overlay.rows() {
            self.overlay.cols().min(self.lane_cols) / LANE_WIDTH * LANE_WIDTH
        } else {
            0
        };

        if blended > 0 {
            let overlay_row = &self.overlay.row(row)[..blended];
            self.backend.blend_lanes(
                &base_row[..blended],
                overlay_row,
                self.shift,
                &mut out_row[..blended],
            );
        }
        out_row[blended..self.lane_cols].copy_from_slice(&base_row[blended..self.lane_cols]);

        if self.lane_cols < cols {
            blend_row_scalar(
                row,
                self.lane_cols..cols,
                base_row,
                &self.overlay,
                self.parameter,
                out_row,
            );
        }
    }
}

impl BlendKernel for VectorKernel {
    fn name(&self) -> &'static str {
        match self.schedule {
            Schedule::Sequential => "vector",
            Schedule::RowParallel(_) => "vector_rows",
        }
    }

    fn blend_into(
        &self,
        base: &ImageView<'_>,
        overlay: &ImageView<'_>,
        parameter: BlendParameter,
        output: &mut ResultBuffer,
    ) -> BlendResult<()> {
        check_inputs(base, output)?;
        let shift = parameter.require_shift()?.min(u8::BITS);

        let cols = base.cols();
        let tail = cols % LANE_WIDTH;
        if tail != 0 && self.tail_policy == TailPolicy::Reject {
            return Err(BlendError::UnsupportedDimensions {
                cols,
                lane: LANE_WIDTH,
            });
        }
        trace!(
            "{} blend {}x{} (tail {tail}) with shift {shift}",
            self.name(),
            base.rows(),
            cols
        );

        let job = RowJob {
            base: *base,
            overlay: *overlay,
            parameter,
            shift,
            lane_cols: cols - tail,
            backend: self.backend,
        };
        let out = output.as_mut_slice();

        match &self.schedule {
            Schedule::Sequential => {
                for (row, out_row) in out.chunks_exact_mut(cols).enumerate() {
                    job.run(row, out_row);
                }
            }
            Schedule::RowParallel(pool) => {
                pool.install(|| {
                    out.par_chunks_exact_mut(cols)
                        .enumerate()
                        .for_each(|(row, out_row)| job.run(row, out_row));
                });
            }
        }
        Ok(())
    }
}
