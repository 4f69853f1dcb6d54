// THEORY:
// The `pipeline` module is the top-level API of the crate. It owns one instance of
// every blend strategy, built once from a `BlendConfig`, and runs whichever strategy
// the caller names. It is also where timing lives: `timed_blend` allocates the
// output first and only then starts a monotonic clock around the kernel call, so
// the measured duration is the blend itself.

use std::fmt;
use std::time::{Duration, Instant};

use log::debug;

use crate::core_modules::kernel::BlendKernel;
use crate::core_modules::partitioned_kernel::PartitionedKernel;
use crate::core_modules::scalar_kernel::ScalarKernel;
use crate::core_modules::vector_kernel::VectorKernel;

// Re-export key data structures for the public API.
pub use crate::core_modules::error::{BlendError, BlendResult};
pub use crate::core_modules::gray_image::{ImageView, ResultBuffer};
pub use crate::core_modules::pixel_blend::pixel_blend::BlendParameter;
pub use crate::core_modules::vector_kernel::{LaneBackend, TailPolicy, LANE_WIDTH};

/// Tunables consumed by the blend kernels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlendConfig {
    /// Divisor applied to overlay samples. Keep it a power of two so every
    /// strategy can run; the vector strategies reject anything else.
    pub alpha_inversed: u32,
    /// Worker count for the row-parallel vector strategy and the partitioned strategy.
    pub thread_count: usize,
    /// How the vector strategies treat widths that are not a multiple of 16.
    pub tail_policy: TailPolicy,
}

impl Default for BlendConfig {
    fn default() -> Self {
        Self {
            alpha_inversed: BlendParameter::DEFAULT_ALPHA_INVERSED,
            thread_count: num_cpus::get(),
            tail_policy: TailPolicy::default(),
        }
    }
}

/// The execution strategies the pipeline can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Per-pixel loop on the calling thread. The reference.
    Scalar,
    /// 16-byte lanes on the calling thread.
    Vector,
    /// 16-byte lanes with rows shared over the worker pool.
    VectorRows,
    /// Per-pixel loop over flat index ranges, one OS thread per range.
    Partitioned,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::Scalar,
        Strategy::Vector,
        Strategy::VectorRows,
        Strategy::Partitioned,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Strategy::Scalar => "scalar",
            Strategy::Vector => "vector",
            Strategy::VectorRows => "vector_rows",
            Strategy::Partitioned => "partitioned",
        }
    }

    /// Whether this strategy must produce exactly the scalar output for every input.
    pub fn is_exact(self) -> bool {
        matches!(self, Strategy::Scalar | Strategy::Partitioned)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The result of one timed kernel invocation.
#[derive(Debug, Clone)]
pub struct TimedBlend {
    pub strategy: Strategy,
    pub result: ResultBuffer,
    /// Wall-clock time spent inside the kernel call only.
    pub elapsed: Duration,
}

/// Owns every blend strategy, configured once.
pub struct BlendPipeline {
    config: BlendConfig,
    parameter: BlendParameter,
    scalar: ScalarKernel,
    vector: VectorKernel,
    vector_rows: VectorKernel,
    partitioned: PartitionedKernel,
}

impl BlendPipeline {
    pub fn new(config: BlendConfig) -> BlendResult<Self> {
        let parameter = BlendParameter::new(config.alpha_inversed)?;
        let vector = VectorKernel::new().with_tail_policy(config.tail_policy);
        let vector_rows =
            VectorKernel::row_parallel(config.thread_count)?.with_tail_policy(config.tail_policy);
        let partitioned = PartitionedKernel::new(config.thread_count)?;
        debug!(
            "blend pipeline ready: alpha_inversed={}, {} threads, {} lanes",
            config.alpha_inversed,
            config.thread_count,
            vector.backend().name()
        );

        Ok(Self {
            config,
            parameter,
            scalar: ScalarKernel::new(),
            vector,
            vector_rows,
            partitioned,
        })
    }

    pub fn config(&self) -> &BlendConfig {
        &self.config
    }

    pub fn parameter(&self) -> BlendParameter {
        self.parameter
    }

    pub fn lane_backend(&self) -> LaneBackend {
        self.vector.backend()
    }

    pub fn kernel(&self, strategy: Strategy) -> &dyn BlendKernel {
        match strategy {
            Strategy::Scalar => &self.scalar,
            Strategy::Vector => &self.vector,
            Strategy::VectorRows => &self.vector_rows,
            Strategy::Partitioned => &self.partitioned,
        }
    }

    pub fn blend(
        &self,
        strategy: Strategy,
        base: &ImageView<'_>,
        overlay: &ImageView<'_>,
    ) -> BlendResult<ResultBuffer> {
        self.kernel(strategy).blend(base, overlay, self.parameter)
    }

    /// Runs `strategy` once and measures the kernel call with a monotonic clock.
    pub fn timed_blend(
        &self,
        strategy: Strategy,
        base: &ImageView<'_>,
        overlay: &ImageView<'_>,
    ) -> BlendResult<TimedBlend> {
        let kernel = self.kernel(strategy);
        let mut result = ResultBuffer::for_base(base);

        let start = Instant::now();
        kernel.blend_into(base, overlay, self.parameter, &mut result)?;
        let elapsed = start.elapsed();

        Ok(TimedBlend {
            strategy,
            result,
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(alpha_inversed: u32, thread_count: usize) -> BlendConfig {
        BlendConfig {
            alpha_inversed,
            thread_count,
            ..BlendConfig::default()
        }
    }

    #[test]
    fn default_config_uses_divisor_four() {
        let config = BlendConfig::default();
        assert_eq!(config.alpha_inversed, 4);
        assert!(config.thread_count >= 1);
        assert_eq!(config.tail_policy, TailPolicy::ScalarFallback);
    }

    #[test]
    fn invalid_config_is_rejected() {
        assert!(matches!(
            BlendPipeline::new(config(0, 2)),
            Err(BlendError::UnsupportedParameter { .. })
        ));
        assert!(matches!(
            BlendPipeline::new(config(4, 0)),
            Err(BlendError::InvalidThreadCount(0))
        ));
    }

    #[test]
    fn every_strategy_agrees_on_uniform_images() {
        let base_data = vec![200u8; 4 * 16];
        let overlay_data = vec![40u8; 4 * 16];
        let base = ImageView::new(4, 16, &base_data).unwrap();
        let overlay = ImageView::new(4, 16, &overlay_data).unwrap();
        let pipeline = BlendPipeline::new(config(4, 3)).unwrap();

        for strategy in Strategy::ALL {
            let timed = pipeline.timed_blend(strategy, &base, &overlay).unwrap();
            assert_eq!(timed.strategy, strategy);
            assert!(
                timed.result.as_slice().iter().all(|&v| v == 210),
                "{strategy} disagrees"
            );
        }
    }

    #[test]
    fn vector_strategies_refuse_non_power_of_two() {
        let data = vec![1u8; 16];
        let image = ImageView::new(1, 16, &data).unwrap();
        let pipeline = BlendPipeline::new(config(3, 2)).unwrap();

        assert!(pipeline.blend(Strategy::Scalar, &image, &image).is_ok());
        assert!(pipeline.blend(Strategy::Partitioned, &image, &image).is_ok());
        assert!(pipeline.blend(Strategy::Vector, &image, &image).is_err());
        assert!(pipeline.blend(Strategy::VectorRows, &image, &image).is_err());
    }

    #[test]
    fn kernel_names_match_strategy_names() {
        let pipeline = BlendPipeline::new(config(4, 2)).unwrap();
        for strategy in Strategy::ALL {
            assert_eq!(pipeline.kernel(strategy).name(), strategy.name());
        }
    }
}
