//! Portable lane implementation. Same lane semantics, plain byte arithmetic.

use super::LANE_WIDTH;

pub fn blend_lanes(base: &[u8], overlay: &[u8], shift: u32, out: &mut [u8]) {
    debug_assert_eq!(base.len(), overlay.len());
    debug_assert_eq!(base.len(), out.len());
    debug_assert_eq!(base.len() % LANE_WIDTH, 0);

    for ((base_lane, overlay_lane), out_lane) in base
        .chunks_exact(LANE_WIDTH)
        .zip(overlay.chunks_exact(LANE_WIDTH))
        .zip(out.chunks_exact_mut(LANE_WIDTH))
    {
        for i in 0..LANE_WIDTH {
            let attenuated = (overlay_lane[i] as u16 >> shift) as u8;
            out_lane[i] = base_lane[i].saturating_add(attenuated);
        }
    }
}
