//! SSE2 lane implementation (x86_64).

use std::arch::x86_64::*;

use super::{byte_mask, LANE_WIDTH};

/// Blends whole 16-byte lanes: `out = adds_epu8(base, (overlay >> shift) & mask)`.
///
/// SSE2 only shifts 16-bit words, so bits from the high byte of each word leak
/// into the low byte. Masking every byte with `0xFF >> shift` removes them.
///
/// # Safety
/// Caller must ensure SSE2 is available (always true on x86_64) and that all
/// three slices have the same length, a multiple of [`LANE_WIDTH`].
#[target_feature(enable = "sse2")]
pub unsafe fn blend_lanes(base: &[u8], overlay: &[u8], shift: u32, out: &mut [u8]) {
    debug_assert_eq!(base.len(), overlay.len());
    debug_assert_eq!(base.len(), out.len());
    debug_assert_eq!(base.len() % LANE_WIDTH, 0);

    unsafe {
        let count = _mm_cvtsi32_si128(shift as i32);
        let mask = _mm_set1_epi8(byte_mask(shift) as i8);

        for ((base_lane, overlay_lane), out_lane) in base
            .chunks_exact(LANE_WIDTH)
            .zip(overlay.chunks_exact(LANE_WIDTH))
            .zip(out.chunks_exact_mut(LANE_WIDTH))
        {
            let b = _mm_loadu_si128(base_lane.as_ptr() as *const __m128i);
            let o = _mm_loadu_si128(overlay_lane.as_ptr() as *const __m128i);
            let o = _mm_and_si128(_mm_srl_epi16(o, count), mask);
            _mm_storeu_si128(out_lane.as_mut_ptr() as *mut __m128i, _mm_adds_epu8(b, o));
        }
    }
}
