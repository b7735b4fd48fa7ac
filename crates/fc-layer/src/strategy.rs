use crate::error::{LayerError, Result};
use fc_tensor::Shape;

/// Threshold on arithmetic intensity above which the blocked-matrix path
/// amortizes its packing overhead.
const BLOCKED_AI_THRESHOLD: f64 = 2.0;

/// Compute strategy for the forward pass, fixed once at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Batched matrix-vector multiply over lane-interleaved weights.
    VectorMatrix,
    /// Blocked matrix-matrix multiply over panel-packed weights.
    BlockedMatrix,
}

/// Arithmetic intensity of the layer: flops per byte moved.
///
/// `flops = 2*N*K*M`, `bytes = 4*(N*K + N*M + M*K)` for f32 operands,
/// with N the batch size in both terms.
pub fn arithmetic_intensity(n: usize, k: usize, m: usize) -> f64 {
    let flops = 2.0 * n as f64 * k as f64 * m as f64;
    let bytes = 4.0 * (n * k + n * m + m * k) as f64;
    flops / bytes
}

impl Strategy {
    /// Select the strategy for the given input `[N, K...]` and output
    /// `[N, M...]` blob shapes. Trailing dimensions flatten into the
    /// feature counts. Small batches give low weight reuse, so the
    /// vector-matrix path wins below the intensity threshold.
    ///
    /// # Errors
    /// Returns `RankTooSmall` before any computation if either shape has
    /// rank < 2.
    pub fn select(input: &Shape, output: &Shape) -> Result<Strategy> {
        if input.ndim() < 2 {
            return Err(LayerError::RankTooSmall {
                context: "input",
                ndim: input.ndim(),
            });
        }
        if output.ndim() < 2 {
            return Err(LayerError::RankTooSmall {
                context: "output",
                ndim: output.ndim(),
            });
        }

        let n = input.dim(0);
        let k = input.count_from(1);
        let m = output.count_from(1);

        if arithmetic_intensity(n, k, m) >= BLOCKED_AI_THRESHOLD {
            Ok(Strategy::BlockedMatrix)
        } else {
            Ok(Strategy::VectorMatrix)
        }
    }
}
