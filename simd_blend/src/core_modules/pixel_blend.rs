// THEORY (single-coordinate blend rule):
// `pixel_blend` is the one rule every kernel must agree on. For a coordinate of the
// base image it answers: what byte ends up in the output?
//
//   value = base[r, c]
//   if (r, c) is inside the overlay:   value += overlay[r, c] / alpha_inversed
//   value = min(value, 255)
//
// The overlay test is strict (`r < rows && c < cols`). An inclusive test would read
// one row and one column past the overlay's last sample.
//
// `BlendParameter` carries the divisor. The scalar and partitioned kernels divide
// by it directly; the vector kernel can only shift, so it asks for `shift()` and
// refuses divisors that are not powers of two.

pub mod pixel_blend {
    use crate::core_modules::error::{BlendError, BlendResult};
    use crate::core_modules::gray_image::ImageView;

    pub type Sample = u8;
    pub type Divisor = u32;

    /// Divisor applied to overlay samples before they are added to the base.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BlendParameter {
        alpha_inversed: Divisor,
    }

    impl BlendParameter {
        /// Divisor used when none is configured.
        pub const DEFAULT_ALPHA_INVERSED: Divisor = 4;

        pub fn new(alpha_inversed: Divisor) -> BlendResult<Self> {
            if alpha_inversed == 0 {
                return Err(BlendError::UnsupportedParameter {
                    alpha_inversed,
                    reason: "divisor must be positive",
                });
            }
            Ok(Self { alpha_inversed })
        }

        #[inline]
        pub fn alpha_inversed(&self) -> Divisor {
            self.alpha_inversed
        }

        /// `log2(alpha_inversed)` when the divisor is a power of two.
        #[inline]
        pub fn shift(&self) -> Option<u32> {
            self.alpha_inversed
                .is_power_of_two()
                .then(|| self.alpha_inversed.trailing_zeros())
        }

        /// Like [`shift`](Self::shift) but fails for divisors a shift cannot express.
        pub fn require_shift(&self) -> BlendResult<u32> {
            self.shift().ok_or(BlendError::UnsupportedParameter {
                alpha_inversed: self.alpha_inversed,
                reason: "vector lanes divide by shifting, so the divisor must be a power of two",
            })
        }

        /// Attenuated overlay contribution, `floor(sample / alpha_inversed)`.
        #[inline]
        pub fn attenuate(&self, sample: Sample) -> u32 {
            sample as u32 / self.alpha_inversed
        }
    }

    impl Default for BlendParameter {
        fn default() -> Self {
            Self {
                alpha_inversed: Self::DEFAULT_ALPHA_INVERSED,
            }
        }
    }

    /// Saturating combination of one base sample with an optional overlay sample.
    #[inline]
    pub fn combine(base: Sample, overlay: Option<Sample>, parameter: BlendParameter) -> Sample {
        match overlay {
            Some(sample) => {
                let sum = base as u32 + parameter.attenuate(sample);
                sum.min(Sample::MAX as u32) as Sample
            }
            None => base,
        }
    }

    /// Output value for coordinate `(row, col)` of `base`.
    #[inline]
    pub fn blend_pixel(
        base: &ImageView<'_>,
        overlay: &ImageView<'_>,
        row: usize,
        col: usize,
        parameter: BlendParameter,
    ) -> Sample {
        let overlay_sample = overlay
            .contains(row, col)
            .then(|| overlay.at(row, col));
        combine(base.at(row, col), overlay_sample, parameter)
    }
}
