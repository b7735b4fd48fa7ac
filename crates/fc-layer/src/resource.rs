use fc_tensor::Tensor;

/// Trained parameters for one inner-product layer.
///
/// The weight tensor is row-major `[M, K]` (one row per output channel);
/// the bias tensor, when present, has length M. Element types are checked
/// at the point of use, not here.
#[derive(Debug, Clone)]
pub struct InnerProductResource {
    pub weight: Tensor,
    pub bias: Option<Tensor>,
}

impl InnerProductResource {
    pub fn new(weight: Tensor, bias: Option<Tensor>) -> Self {
        InnerProductResource { weight, bias }
    }
}
