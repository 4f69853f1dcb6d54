//! NEON lane implementation (aarch64).

use std::arch::aarch64::*;

use super::LANE_WIDTH;

/// Blends whole 16-byte lanes with `vqaddq_u8(base, overlay >> shift)`.
///
/// NEON shifts each byte on its own, so no mask is needed. A shift of 8
/// clears the byte.
///
/// # Safety
/// Caller must ensure NEON is available (always true on aarch64) and that all
/// three slices have the same length, a multiple of [`LANE_WIDTH`].
#[target_feature(enable = "neon")]
pub unsafe fn blend_lanes(base: &[u8], overlay: &[u8], shift: u32, out: &mut [u8]) {
    debug_assert_eq!(base.len(), overlay.len());
    debug_assert_eq!(base.len(), out.len());
    debug_assert_eq!(base.len() % LANE_WIDTH, 0);

    unsafe {
        // vshlq with a negative count shifts right.
        let shift_right = vdupq_n_s8(-(shift.min(8) as i8));

        for ((base_lane, overlay_lane), out_lane) in base
            .chunks_exact(LANE_WIDTH)
            .zip(overlay.chunks_exact(LANE_WIDTH))
            .zip(out.chunks_exact_mut(LANE_WIDTH))
        {
            let b = vld1q_u8(base_lane.as_ptr());
            let o = vshlq_u8(vld1q_u8(overlay_lane.as_ptr()), shift_right);
            vst1q_u8(out_lane.as_mut_ptr(), vqaddq_u8(b, o));
        }
    }
}
