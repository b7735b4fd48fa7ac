//! Blocked single-precision matrix multiply with a pre-packed A operand.
//!
//! The packing contract: operand A (`[M, K]`, row-major source) is
//! rearranged into K panels of width `k_panel`, each panel holding M
//! blocks of `m_block` interleaved channels, padded with zeros to
//! `round_up(K, k_panel) x round_up(M, m_block)` elements in a 32-byte
//! aligned buffer. Operand B is column-major `[K, N]` and is staged one
//! panel at a time into a caller-provided workspace of
//! `k_panel * round_up(N, n_block)` elements.

use crate::config::GemmBlocking;
use crate::error::{LayerError, Result};
use crate::pack::round_up;
use fc_tensor::AlignedBuf;

/// Element count of the packed A buffer for the given operand size.
pub fn packed_a_len(m: usize, k: usize, blocking: &GemmBlocking) -> usize {
    round_up(k, blocking.k_panel) * round_up(m, blocking.m_block)
}

/// Element count of the workspace one multiply needs for B panels.
pub fn workspace_len(n: usize, blocking: &GemmBlocking) -> usize {
    blocking.k_panel * round_up(n, blocking.n_block)
}

/// Pack a row-major `[M, K]` matrix as the pre-transposed A operand.
///
/// Layout, outermost to innermost: K panel, M block, K row within the
/// panel, `m_block` interleaved channels. The buffer is 32-byte aligned
/// for the kernel's aligned loads and zero-padded in both directions.
pub fn pack_a_panels(a: &[f32], m: usize, k: usize, blocking: &GemmBlocking) -> Result<AlignedBuf> {
    if a.len() != m * k {
        return Err(LayerError::SizeMismatch {
            context: "weight",
            expected: m * k,
            got: a.len(),
        });
    }

    let kc = blocking.k_panel;
    let mr = blocking.m_block;
    let m_padded = round_up(m, mr);
    let mut buf = AlignedBuf::zeroed(packed_a_len(m, k, blocking))?;

    for (p, k0) in (0..k).step_by(kc).enumerate() {
        let kp = kc.min(k - k0);
        let panel_base = p * kc * m_padded;
        for (jb, m0) in (0..m).step_by(mr).enumerate() {
            let block_base = panel_base + jb * kc * mr;
            let mb = mr.min(m - m0);
            for kk in 0..kp {
                for i in 0..mb {
                    buf[block_base + kk * mr + i] = a[(m0 + i) * k + k0 + kk];
                }
            }
        }
    }
    Ok(buf)
}

/// C = A * B + col_bias, with A pre-packed by [`pack_a_panels`].
///
/// - `b`: column-major `[K, N]` with leading dimension `ldb >= k`
/// - `c`: column-major `[M, N]` with leading dimension `ldc >= m`,
///   fully overwritten
/// - `col_bias`: one scalar per column of C, broadcast down the column
///   (this is the primitive's native bias; it cannot express a
///   per-output-channel broadcast over batch)
/// - `workspace`: at least [`workspace_len`] elements, clobbered
///
/// Accumulation runs panel by panel in f32; low bits may differ from a
/// naive loop order.
#[allow(clippy::too_many_arguments)]
pub fn sgemm_prepacked(
    m: usize,
    n: usize,
    k: usize,
    packed_a: &[f32],
    b: &[f32],
    ldb: usize,
    c: &mut [f32],
    ldc: usize,
    col_bias: &[f32],
    workspace: &mut [f32],
    blocking: &GemmBlocking,
) -> Result<()> {
    let kc = blocking.k_panel;
    let mr = blocking.m_block;
    let nr = blocking.n_block;
    if kc == 0 || mr == 0 || nr == 0 {
        return Err(LayerError::InvalidBlocking {
            k_panel: kc,
            m_block: mr,
            n_block: nr,
        });
    }
    if packed_a.len() < packed_a_len(m, k, blocking) {
        return Err(LayerError::SizeMismatch {
            context: "packed A operand",
            expected: packed_a_len(m, k, blocking),
            got: packed_a.len(),
        });
    }
    if n > 0 && b.len() < (n - 1) * ldb + k {
        return Err(LayerError::SizeMismatch {
            context: "B operand",
            expected: (n - 1) * ldb + k,
            got: b.len(),
        });
    }
    if n > 0 && c.len() < (n - 1) * ldc + m {
        return Err(LayerError::SizeMismatch {
            context: "C operand",
            expected: (n - 1) * ldc + m,
            got: c.len(),
        });
    }
    if col_bias.len() != n {
        return Err(LayerError::SizeMismatch {
            context: "column bias",
            expected: n,
            got: col_bias.len(),
        });
    }
    if workspace.len() < workspace_len(n, blocking) {
        return Err(LayerError::SizeMismatch {
            context: "workspace",
            expected: workspace_len(n, blocking),
            got: workspace.len(),
        });
    }

    let m_padded = round_up(m, mr);

    // Seed every column with its bias scalar; panels then accumulate on top.
    for (j, &bv) in col_bias.iter().enumerate() {
        for v in c[j * ldc..j * ldc + m].iter_mut() {
            *v = bv;
        }
    }

    for (p, k0) in (0..k).step_by(kc).enumerate() {
        let kp = kc.min(k - k0);

        // Stage this K panel of B into the workspace, n-block-major with
        // n_block interleaved columns per row.
        for (jb, n0) in (0..n).step_by(nr).enumerate() {
            let base = jb * kc * nr;
            let nb = nr.min(n - n0);
            for kk in 0..kp {
                for j in 0..nb {
                    workspace[base + kk * nr + j] = b[(n0 + j) * ldb + k0 + kk];
                }
                for j in nb..nr {
                    workspace[base + kk * nr + j] = 0.0;
                }
            }
        }

        let panel_base = p * kc * m_padded;
        for (ib, m0) in (0..m).step_by(mr).enumerate() {
            let a_block = &packed_a[panel_base + ib * kc * mr..];
            let mb = mr.min(m - m0);
            for (jb, n0) in (0..n).step_by(nr).enumerate() {
                let b_block = &workspace[jb * kc * nr..];
                let nb = nr.min(n - n0);
                for kk in 0..kp {
                    let a_row = &a_block[kk * mr..kk * mr + mb];
                    let b_row = &b_block[kk * nr..kk * nr + nb];
                    for (j, &bv) in b_row.iter().enumerate() {
                        let col = &mut c[(n0 + j) * ldc + m0..(n0 + j) * ldc + m0 + mb];
                        for (ci, &av) in col.iter_mut().zip(a_row.iter()) {
                            *ci += av * bv;
                        }
                    }
                }
            }
        }
    }
    Ok(())
}
