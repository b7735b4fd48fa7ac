/// Blocking parameters for the blocked-GEMM path.
///
/// Externally supplied tuning knobs: the K-panel width, the M register
/// block width (also the packing granularity of operand A) and the N
/// register block width. The defaults are the values the original
/// conv-gemm configuration ships with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GemmBlocking {
    /// Width of one K panel staged through the workspace.
    pub k_panel: usize,
    /// M register-block width; packed A rows are padded to this.
    pub m_block: usize,
    /// N register-block width; workspace columns are padded to this.
    pub n_block: usize,
}

impl Default for GemmBlocking {
    fn default() -> Self {
        GemmBlocking {
            k_panel: 256,
            m_block: 16,
            n_block: 6,
        }
    }
}

/// Configuration for one inner-product (fully-connected) layer.
#[derive(Debug, Clone)]
pub struct InnerProductConfig {
    /// Number of output features (M).
    pub num_output: usize,
    /// Whether the layer adds a per-output-channel bias.
    pub has_bias: bool,
    /// Tuning parameters consumed only by the blocked-matrix path.
    pub blocking: GemmBlocking,
}

impl InnerProductConfig {
    /// Convenience constructor using the default blocking parameters.
    pub fn new(num_output: usize, has_bias: bool) -> Self {
        InnerProductConfig {
            num_output,
            has_bias,
            blocking: GemmBlocking::default(),
        }
    }
}
