use crate::error::{LayerError, Result};
use fc_tensor::AlignedBuf;

/// Round `x` up to the next multiple of `to`.
///
/// # Panics
/// Panics if `to` is zero; blocking parameters are validated before any
/// packing runs.
pub fn round_up(x: usize, to: usize) -> usize {
    x.div_ceil(to) * to
}

/// Pack a row-major `[M, K]` weight matrix into the lane-interleaved
/// layout consumed by the vector-matrix kernel.
///
/// Output channels are interleaved in groups of `lanes`: group `g` holds
/// channels `g*lanes .. g*lanes+lanes`, stored as K consecutive
/// lane-vectors, so one broadcast of `input[k]` feeds a fused
/// multiply-accumulate across `lanes` channels at once. M is rounded up
/// to a multiple of `lanes`; the padding channels stay zero and are never
/// copied out by the kernel.
pub fn pack_lane_interleaved(
    weight: &[f32],
    m: usize,
    k: usize,
    lanes: usize,
) -> Result<AlignedBuf> {
    if weight.len() != m * k {
        return Err(LayerError::SizeMismatch {
            context: "weight",
            expected: m * k,
            got: weight.len(),
        });
    }

    let m_padded = round_up(m, lanes);
    let mut buf = AlignedBuf::zeroed(m_padded * k)?;
    for g in 0..m_padded / lanes {
        let base = g * k * lanes;
        for l in 0..lanes {
            let oc = g * lanes + l;
            if oc >= m {
                break;
            }
            let row = &weight[oc * k..(oc + 1) * k];
            for (kk, &w) in row.iter().enumerate() {
                buf[base + kk * lanes + l] = w;
            }
        }
    }
    Ok(buf)
}
