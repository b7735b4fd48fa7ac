use crate::error::{LayerError, Result};
use crate::pack::round_up;

/// Widest lane count any supported arch exposes (AVX2, 8 x f32).
pub const MAX_LANES: usize = 8;

/// Batched matrix-vector multiply over lane-interleaved weights.
///
/// For each of the `n` batch rows independently:
/// `out[row, oc] = bias[oc] + sum_k input[row, k] * weight[oc, k]`.
/// `packed` must hold the layout produced by
/// [`pack_lane_interleaved`](crate::pack::pack_lane_interleaved) for the
/// same `m`, `k`, `lanes`. Rows carry no cross-row state, so results are
/// independent of batch order. Padding channels in the packed buffer are
/// accumulated in their lanes but never copied to the output.
#[allow(clippy::too_many_arguments)]
pub fn sgemv(
    out: &mut [f32],
    input: &[f32],
    packed: &[f32],
    bias: &[f32],
    n: usize,
    k: usize,
    m: usize,
    lanes: usize,
) -> Result<()> {
    if lanes == 0 || lanes > MAX_LANES {
        return Err(LayerError::SizeMismatch {
            context: "lane width",
            expected: MAX_LANES,
            got: lanes,
        });
    }
    let m_padded = round_up(m, lanes);
    if packed.len() != m_padded * k {
        return Err(LayerError::SizeMismatch {
            context: "packed weight",
            expected: m_padded * k,
            got: packed.len(),
        });
    }
    if input.len() != n * k {
        return Err(LayerError::SizeMismatch {
            context: "input",
            expected: n * k,
            got: input.len(),
        });
    }
    if out.len() != n * m {
        return Err(LayerError::SizeMismatch {
            context: "output",
            expected: n * m,
            got: out.len(),
        });
    }
    if bias.len() != m {
        return Err(LayerError::SizeMismatch {
            context: "bias",
            expected: m,
            got: bias.len(),
        });
    }

    for row in 0..n {
        let x = &input[row * k..(row + 1) * k];
        let dst = &mut out[row * m..(row + 1) * m];
        for g in 0..m_padded / lanes {
            let base = g * k * lanes;
            let mut acc = [0.0f32; MAX_LANES];
            for (kk, &xv) in x.iter().enumerate() {
                let w = &packed[base + kk * lanes..base + (kk + 1) * lanes];
                for l in 0..lanes {
                    acc[l] += xv * w[l];
                }
            }
            let oc0 = g * lanes;
            let valid = lanes.min(m - oc0);
            for l in 0..valid {
                dst[oc0 + l] = bias[oc0 + l] + acc[l];
            }
        }
    }
    Ok(())
}

/// Element-wise in-place add over the common prefix of `dst` and `src`.
///
/// Used by the blocked-matrix path to broadcast the bias vector across
/// each batch row after the multiply.
pub fn vector_add(dst: &mut [f32], src: &[f32]) {
    for (d, s) in dst.iter_mut().zip(src.iter()) {
        *d += s;
    }
}
