use fc_tensor::TensorError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LayerError {
    #[error("{context} rank must be >= 2, got {ndim}")]
    RankTooSmall { context: &'static str, ndim: usize },
    #[error("unsupported {context} dtype: {dtype} (only f32 is supported)")]
    UnsupportedDType {
        context: &'static str,
        dtype: String,
    },
    #[error("has_bias is set but the resource holds no bias tensor")]
    MissingBias,
    #[error("num_output {num_output} does not match output feature count {features}")]
    OutputMismatch { num_output: usize, features: usize },
    #[error("{context} has {got} elements, expected {expected}")]
    SizeMismatch {
        context: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("blocking parameters must be non-zero: k_panel={k_panel}, m_block={m_block}, n_block={n_block}")]
    InvalidBlocking {
        k_panel: usize,
        m_block: usize,
        n_block: usize,
    },
    #[error("tensor error: {0}")]
    Tensor(#[from] TensorError),
}

pub type Result<T> = std::result::Result<T, LayerError>;
