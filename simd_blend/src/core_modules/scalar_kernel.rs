// THEORY:
// The scalar kernel is the reference. It visits every base coordinate once, in
// row-major order, on the calling thread, and applies the blend rule exactly as
// written. The other kernels are judged against its output.

use log::trace;

use crate::core_modules::error::BlendResult;
use crate::core_modules::gray_image::{ImageView, ResultBuffer};
use crate::core_modules::kernel::{check_inputs, BlendKernel};
use crate::core_modules::pixel_blend::pixel_blend::{combine, BlendParameter};

/// Single-threaded, per-pixel reference implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarKernel;

impl ScalarKernel {
    pub fn new() -> Self {
        Self
    }
}

/// Blends columns `cols` of one row. Shared with the vector kernel's tail handling.
#[inline]
pub(crate) fn blend_row_scalar(
    row: usize,
    cols: std::ops::Range<usize>,
    base_row: &[u8],
    overlay: &ImageView<'_>,
    parameter: BlendParameter,
    out_row: &mut [u8],
) {
    let overlay_row = (row < overlay.rows()).then(|| overlay.row(row));
    for col in cols {
        let overlay_sample = overlay_row.and_then(|samples| samples.get(col).copied());
        out_row[col] = combine(base_row[col], overlay_sample, parameter);
    }
}

impl BlendKernel for ScalarKernel {
    fn name(&self) -> &'static str {
        "scalar"
    }

    fn blend_into(
        &self,
        base: &ImageView<'_>,
        overlay: &ImageView<'_>,
        parameter: BlendParameter,
        output: &mut ResultBuffer,
    ) -> BlendResult<()> {
        check_inputs(base, output)?;
        trace!(
            "scalar blend {}x{} over {}x{}",
            overlay.rows(),
            overlay.cols(),
            base.rows(),
            base.cols()
        );

        let cols = base.cols();
        for (row, out_row) in output.as_mut_slice().chunks_exact_mut(cols).enumerate() {
            blend_row_scalar(row, 0..cols, base.row(row), overlay, parameter, out_row);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::error::BlendError;

    fn parameter(alpha_inversed: u32) -> BlendParameter {
        BlendParameter::new(alpha_inversed).unwrap()
    }

    #[test]
    fn uniform_images_blend_to_210() {
        let base_data = vec![200u8; 4 * 16];
        let overlay_data = vec![40u8; 4 * 16];
        let base = ImageView::new(4, 16, &base_data).unwrap();
        let overlay = ImageView::new(4, 16, &overlay_data).unwrap();

        let out = ScalarKernel::new().blend(&base, &overlay, parameter(4)).unwrap();
        assert!(out.as_slice().iter().all(|&v| v == 210));
    }

    #[test]
    fn narrower_overlay_leaves_right_half_untouched() {
        let base_data: Vec<u8> = (0..64).map(|i| i as u8).collect();
        let overlay_data = vec![80u8; 2 * 16];
        let base = ImageView::new(2, 32, &base_data).unwrap();
        let overlay = ImageView::new(2, 16, &overlay_data).unwrap();

        let out = ScalarKernel::new().blend(&base, &overlay, parameter(4)).unwrap();
        for row in 0..2 {
            for col in 0..32 {
                let expected = if col < 16 {
                    base.at(row, col) + 20
                } else {
                    base.at(row, col)
                };
                assert_eq!(out.at(row, col), expected, "row {row} col {col}");
            }
        }
    }

    #[test]
    fn overlay_larger_than_base_is_cropped() {
        let base_data = vec![1u8; 2 * 3];
        let overlay_data: Vec<u8> = (0..5 * 7).map(|i| (i * 4) as u8).collect();
        let base = ImageView::new(2, 3, &base_data).unwrap();
        let overlay = ImageView::new(5, 7, &overlay_data).unwrap();

        let out = ScalarKernel::new().blend(&base, &overlay, parameter(4)).unwrap();
        // overlay[1, 2] = (1 * 7 + 2) * 4 = 36 -> 9
        assert_eq!(out.at(1, 2), 10);
        assert_eq!(out.at(0, 0), 1);
    }

    #[test]
    fn saturates_instead_of_wrapping() {
        let base_data = vec![250u8; 4];
        let overlay_data = vec![255u8; 4];
        let base = ImageView::new(2, 2, &base_data).unwrap();
        let overlay = ImageView::new(2, 2, &overlay_data).unwrap();

        let out = ScalarKernel::new().blend(&base, &overlay, parameter(1)).unwrap();
        assert_eq!(out.as_slice(), &[255; 4]);
    }

    #[test]
    fn empty_overlay_is_identity() {
        let base_data: Vec<u8> = (0..20).collect();
        let base = ImageView::new(4, 5, &base_data).unwrap();

        let out = ScalarKernel::new()
            .blend(&base, &ImageView::empty(), parameter(4))
            .unwrap();
        assert_eq!(out.as_slice(), base.as_slice());
    }

    #[test]
    fn empty_base_is_rejected() {
        let err = ScalarKernel::new()
            .blend(&ImageView::empty(), &ImageView::empty(), parameter(4))
            .unwrap_err();
        assert!(matches!(err, BlendError::InvalidImage { .. }));
    }

    #[test]
    fn mismatched_output_is_rejected() {
        let base_data = vec![0u8; 8];
        let base = ImageView::new(2, 4, &base_data).unwrap();
        let other_data = vec![0u8; 8];
        let other = ImageView::new(4, 2, &other_data).unwrap();
        let mut output = ResultBuffer::for_base(&other);

        let err = ScalarKernel::new()
            .blend_into(&base, &ImageView::empty(), parameter(4), &mut output)
            .unwrap_err();
        assert!(matches!(err, BlendError::InvalidImage { .. }));
    }
}
