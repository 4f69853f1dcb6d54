// THEORY:
// All three strategies expose the same operation, so they share one trait. A kernel
// writes into a caller-provided `ResultBuffer` (`blend_into`) so that timing code
// can allocate the output before the clock starts; `blend` is the convenience form
// that allocates for you.

use crate::core_modules::error::BlendResult;
use crate::core_modules::gray_image::{ImageView, ResultBuffer};
use crate::core_modules::pixel_blend::pixel_blend::BlendParameter;

/// A strategy for computing the saturating blend of `overlay` onto `base`.
pub trait BlendKernel: Send + Sync {
    /// Short, stable name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Blends into `output`, which must have the dimensions of `base`.
    ///
    /// On error the contents of `output` are unspecified and must not be used.
    fn blend_into(
        &self,
        base: &ImageView<'_>,
        overlay: &ImageView<'_>,
        parameter: BlendParameter,
        output: &mut ResultBuffer,
    ) -> BlendResult<()>;

    fn blend(
        &self,
        base: &ImageView<'_>,
        overlay: &ImageView<'_>,
        parameter: BlendParameter,
    ) -> BlendResult<ResultBuffer> {
        let mut output = ResultBuffer::for_base(base);
        self.blend_into(base, overlay, parameter, &mut output)?;
        Ok(output)
    }
}

/// Shared precondition check run at the top of every `blend_into`.
pub(crate) fn check_inputs(base: &ImageView<'_>, output: &ResultBuffer) -> BlendResult<()> {
    base.require_non_empty("base")?;
    output.check_matches(base)
}
