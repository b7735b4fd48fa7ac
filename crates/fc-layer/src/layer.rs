use crate::config::{GemmBlocking, InnerProductConfig};
use crate::context::ExecutionContext;
use crate::error::{LayerError, Result};
use crate::gemm;
use crate::gemv;
use crate::pack;
use crate::resource::InnerProductResource;
use crate::strategy::Strategy;
use fc_tensor::{AlignedBuf, DType, Shape, Tensor};

/// Execution plan fixed at build time: one packing routine and one
/// compute routine per strategy, so the forward path never inspects the
/// target arch again.
#[derive(Debug, Clone)]
enum ForwardPlan {
    VectorMatrix { lanes: usize },
    BlockedMatrix { blocking: GemmBlocking },
}

impl ForwardPlan {
    fn pack(&self, weight: &[f32], m: usize, k: usize) -> Result<AlignedBuf> {
        match self {
            ForwardPlan::VectorMatrix { lanes } => {
                pack::pack_lane_interleaved(weight, m, k, *lanes)
            }
            ForwardPlan::BlockedMatrix { blocking } => gemm::pack_a_panels(weight, m, k, blocking),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn compute(
        &self,
        ctx: &ExecutionContext,
        packed: &[f32],
        bias: &[f32],
        input: &[f32],
        output: &mut [f32],
        n: usize,
        k: usize,
        m: usize,
    ) -> Result<()> {
        match self {
            ForwardPlan::VectorMatrix { lanes } => {
                gemv::sgemv(output, input, packed, bias, n, k, m, *lanes)
            }
            ForwardPlan::BlockedMatrix { blocking } => {
                let byte_size =
                    blocking.k_panel * pack::round_up(n, blocking.n_block) * DType::F32.size_in_bytes();
                let mut workspace = ctx.acquire(byte_size);

                // The primitive's per-column bias cannot broadcast one value
                // per output channel across the batch, so it gets zeros and
                // the real bias is added in a separate pass below.
                let zero_bias = vec![0.0f32; n];
                gemm::sgemm_prepacked(
                    m,
                    n,
                    k,
                    packed,
                    input,
                    k,
                    output,
                    m,
                    &zero_bias,
                    &mut workspace,
                    blocking,
                )?;
                for row in 0..n {
                    gemv::vector_add(&mut output[row * m..(row + 1) * m], bias);
                }
                Ok(())
            }
        }
    }
}

/// CPU accelerator for one inner-product (fully-connected) layer.
///
/// Construction is explicit and two-phase: [`build`](Self::build) selects
/// the strategy, packs the weights and stages the bias exactly once,
/// producing an immutable value; [`forward`](Self::forward) may then be
/// called any number of times, including concurrently from multiple
/// threads as long as each call brings its own context and output tensor.
#[derive(Debug)]
pub struct InnerProductLayer {
    plan: ForwardPlan,
    strategy: Strategy,
    packed_weight: AlignedBuf,
    bias: Vec<f32>,
    k: usize,
    m: usize,
}

impl InnerProductLayer {
    /// Build the accelerator for the given configuration, resource, and
    /// blob shapes (`input` `[N, K...]`, `output` `[N, M...]`).
    ///
    /// Validates ranks, the declared `num_output`, operand element types
    /// and element counts before allocating anything; on error no packed
    /// buffer exists.
    pub fn build(
        config: &InnerProductConfig,
        resource: &InnerProductResource,
        input_shape: &Shape,
        output_shape: &Shape,
        ctx: &ExecutionContext,
    ) -> Result<Self> {
        let strategy = Strategy::select(input_shape, output_shape)?;
        let k = input_shape.count_from(1);
        let m = output_shape.count_from(1);

        if config.num_output != m {
            return Err(LayerError::OutputMismatch {
                num_output: config.num_output,
                features: m,
            });
        }

        let plan = match strategy {
            Strategy::VectorMatrix => ForwardPlan::VectorMatrix {
                lanes: ctx.arch().lanes(),
            },
            Strategy::BlockedMatrix => {
                let b = config.blocking;
                if b.k_panel == 0 || b.m_block == 0 || b.n_block == 0 {
                    return Err(LayerError::InvalidBlocking {
                        k_panel: b.k_panel,
                        m_block: b.m_block,
                        n_block: b.n_block,
                    });
                }
                ForwardPlan::BlockedMatrix { blocking: b }
            }
        };

        if resource.weight.dtype() != DType::F32 {
            return Err(LayerError::UnsupportedDType {
                context: "weight",
                dtype: resource.weight.dtype().to_string(),
            });
        }
        let weight = resource.weight.as_f32_slice()?;
        let packed_weight = plan.pack(weight, m, k)?;
        let bias = Self::stage_bias(config, resource, m)?;

        Ok(InnerProductLayer {
            plan,
            strategy,
            packed_weight,
            bias,
            k,
            m,
        })
    }

    /// Stage the bias into a buffer of exactly M floats: zero-filled by
    /// default, overwritten with the true bias when the layer declares one.
    fn stage_bias(
        config: &InnerProductConfig,
        resource: &InnerProductResource,
        m: usize,
    ) -> Result<Vec<f32>> {
        let mut staged = vec![0.0f32; m];
        if config.has_bias {
            let src = resource.bias.as_ref().ok_or(LayerError::MissingBias)?;
            if src.dtype() != DType::F32 {
                return Err(LayerError::UnsupportedDType {
                    context: "bias",
                    dtype: src.dtype().to_string(),
                });
            }
            let data = src.as_f32_slice()?;
            if data.len() != m {
                return Err(LayerError::SizeMismatch {
                    context: "bias",
                    expected: m,
                    got: data.len(),
                });
            }
            staged.copy_from_slice(data);
        }
        Ok(staged)
    }

    /// The strategy fixed at build time.
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// The packed weight buffer (layout depends on the strategy).
    pub fn packed_weight(&self) -> &[f32] {
        &self.packed_weight
    }

    /// The staged bias buffer, always exactly M elements.
    pub fn bias(&self) -> &[f32] {
        &self.bias
    }

    /// Run one forward pass: `output[n, oc] = bias[oc] + sum_k
    /// input[n, k] * weight[oc, k]`, overwriting all of `output`.
    ///
    /// The batch size is taken from the input tensor; feature counts must
    /// match the shapes the layer was built with. On error the output
    /// tensor's contents are unspecified.
    pub fn forward(
        &self,
        ctx: &ExecutionContext,
        input: &Tensor,
        output: &mut Tensor,
    ) -> Result<()> {
        if input.dtype() != DType::F32 {
            return Err(LayerError::UnsupportedDType {
                context: "input",
                dtype: input.dtype().to_string(),
            });
        }
        if output.dtype() != DType::F32 {
            return Err(LayerError::UnsupportedDType {
                context: "output",
                dtype: output.dtype().to_string(),
            });
        }
        if input.shape().ndim() < 2 {
            return Err(LayerError::RankTooSmall {
                context: "input",
                ndim: input.shape().ndim(),
            });
        }

        let n = input.shape().dim(0);
        let k = input.shape().count_from(1);
        if k != self.k {
            return Err(LayerError::SizeMismatch {
                context: "input features",
                expected: self.k,
                got: k,
            });
        }
        if output.numel() != n * self.m {
            return Err(LayerError::SizeMismatch {
                context: "output",
                expected: n * self.m,
                got: output.numel(),
            });
        }

        let x = input.as_f32_slice()?;
        let out = output.as_f32_slice_mut()?;
        self.plan
            .compute(ctx, &self.packed_weight, &self.bias, x, out, n, k, self.m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SimdArch;
    use approx::assert_relative_eq;
    use fc_tensor::Shape;
    use half::f16;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn naive_forward(
        input: &[f32],
        weight: &[f32],
        bias: &[f32],
        n: usize,
        k: usize,
        m: usize,
    ) -> Vec<f32> {
        let mut out = vec![0.0f32; n * m];
        for row in 0..n {
            for oc in 0..m {
                let mut sum = bias[oc];
                for kk in 0..k {
                    sum += input[row * k + kk] * weight[oc * k + kk];
                }
                out[row * m + oc] = sum;
            }
        }
        out
    }

    fn random_vec(rng: &mut StdRng, len: usize) -> Vec<f32> {
        (0..len).map(|_| rng.gen_range(-1.0..1.0)).collect()
    }

    fn build_layer(
        n: usize,
        k: usize,
        m: usize,
        weight: Vec<f32>,
        bias: Option<Vec<f32>>,
        ctx: &ExecutionContext,
    ) -> InnerProductLayer {
        let config = InnerProductConfig::new(m, bias.is_some());
        let resource = InnerProductResource::new(
            Tensor::from_f32(weight, Shape::new(vec![m, k])),
            bias.map(|b| Tensor::from_f32(b, Shape::new(vec![m]))),
        );
        InnerProductLayer::build(
            &config,
            &resource,
            &Shape::new(vec![n, k]),
            &Shape::new(vec![n, m]),
            ctx,
        )
        .unwrap()
    }

    #[test]
    fn test_concrete_example() {
        // weight [[1,2,3],[4,5,6]], bias [10,20], input [1,1,1] -> [16,35].
        let ctx = ExecutionContext::new();
        let layer = build_layer(
            1,
            3,
            2,
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            Some(vec![10.0, 20.0]),
            &ctx,
        );
        assert_eq!(layer.strategy(), Strategy::VectorMatrix);

        let input = Tensor::from_f32(vec![1.0, 1.0, 1.0], Shape::new(vec![1, 3]));
        let mut output = Tensor::zeros(DType::F32, Shape::new(vec![1, 2]));
        layer.forward(&ctx, &input, &mut output).unwrap();
        assert_eq!(output.as_f32_slice().unwrap(), &[16.0, 35.0]);
    }

    #[test]
    fn test_gemv_path_matches_naive() {
        // N=1 forces the vector-matrix path; M=13 exercises lane padding.
        let (n, k, m) = (1, 37, 13);
        let mut rng = StdRng::seed_from_u64(7);
        let weight = random_vec(&mut rng, m * k);
        let bias = random_vec(&mut rng, m);
        let x = random_vec(&mut rng, n * k);

        for arch in [SimdArch::Sse42, SimdArch::Avx2] {
            let ctx = ExecutionContext::with_arch(arch);
            let layer = build_layer(n, k, m, weight.clone(), Some(bias.clone()), &ctx);
            assert_eq!(layer.strategy(), Strategy::VectorMatrix);

            let input = Tensor::from_f32(x.clone(), Shape::new(vec![n, k]));
            let mut output = Tensor::zeros(DType::F32, Shape::new(vec![n, m]));
            layer.forward(&ctx, &input, &mut output).unwrap();

            let expected = naive_forward(&x, &weight, &bias, n, k, m);
            for (&got, &want) in output.as_f32_slice().unwrap().iter().zip(expected.iter()) {
                assert_relative_eq!(got, want, max_relative = 1e-4, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_gemm_path_matches_naive() {
        // Large batch forces the blocked path; off-block sizes everywhere.
        let (n, k, m) = (33, 70, 45);
        let mut rng = StdRng::seed_from_u64(11);
        let weight = random_vec(&mut rng, m * k);
        let bias = random_vec(&mut rng, m);
        let x = random_vec(&mut rng, n * k);

        let ctx = ExecutionContext::new();
        let layer = build_layer(n, k, m, weight.clone(), Some(bias.clone()), &ctx);
        assert_eq!(layer.strategy(), Strategy::BlockedMatrix);

        let input = Tensor::from_f32(x.clone(), Shape::new(vec![n, k]));
        let mut output = Tensor::zeros(DType::F32, Shape::new(vec![n, m]));
        layer.forward(&ctx, &input, &mut output).unwrap();

        let expected = naive_forward(&x, &weight, &bias, n, k, m);
        for (&got, &want) in output.as_f32_slice().unwrap().iter().zip(expected.iter()) {
            assert_relative_eq!(got, want, max_relative = 1e-4, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_gemm_path_square_128() {
        let (n, k, m) = (128, 128, 128);
        let mut rng = StdRng::seed_from_u64(13);
        let weight = random_vec(&mut rng, m * k);
        let bias = random_vec(&mut rng, m);
        let x = random_vec(&mut rng, n * k);

        let ctx = ExecutionContext::new();
        let layer = build_layer(n, k, m, weight.clone(), Some(bias.clone()), &ctx);
        assert_eq!(layer.strategy(), Strategy::BlockedMatrix);

        let input = Tensor::from_f32(x.clone(), Shape::new(vec![n, k]));
        let mut output = Tensor::zeros(DType::F32, Shape::new(vec![n, m]));
        layer.forward(&ctx, &input, &mut output).unwrap();

        let expected = naive_forward(&x, &weight, &bias, n, k, m);
        for (&got, &want) in output.as_f32_slice().unwrap().iter().zip(expected.iter()) {
            assert_relative_eq!(got, want, max_relative = 1e-4, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_no_bias_equals_zero_bias() {
        let (n, k, m) = (4, 9, 6);
        let mut rng = StdRng::seed_from_u64(23);
        let weight = random_vec(&mut rng, m * k);
        let x = random_vec(&mut rng, n * k);
        let ctx = ExecutionContext::new();

        let without = build_layer(n, k, m, weight.clone(), None, &ctx);
        let with_zero = build_layer(n, k, m, weight, Some(vec![0.0; m]), &ctx);
        assert_eq!(without.bias(), with_zero.bias());

        let input = Tensor::from_f32(x, Shape::new(vec![n, k]));
        let mut out_a = Tensor::zeros(DType::F32, Shape::new(vec![n, m]));
        let mut out_b = Tensor::zeros(DType::F32, Shape::new(vec![n, m]));
        without.forward(&ctx, &input, &mut out_a).unwrap();
        with_zero.forward(&ctx, &input, &mut out_b).unwrap();
        assert_eq!(out_a.as_f32_slice().unwrap(), out_b.as_f32_slice().unwrap());
    }

    #[test]
    fn test_build_twice_is_byte_identical() {
        let (n, k, m) = (1, 12, 10);
        let mut rng = StdRng::seed_from_u64(31);
        let weight = random_vec(&mut rng, m * k);
        let bias = random_vec(&mut rng, m);
        let ctx = ExecutionContext::new();

        let a = build_layer(n, k, m, weight.clone(), Some(bias.clone()), &ctx);
        let b = build_layer(n, k, m, weight, Some(bias), &ctx);
        assert_eq!(a.packed_weight(), b.packed_weight());
        assert_eq!(a.bias(), b.bias());
    }

    #[test]
    fn test_f16_weight_rejected_at_build() {
        let ctx = ExecutionContext::new();
        let config = InnerProductConfig::new(2, false);
        let resource = InnerProductResource::new(
            Tensor::from_f16(vec![f16::ONE; 6], Shape::new(vec![2, 3])),
            None,
        );
        let err = InnerProductLayer::build(
            &config,
            &resource,
            &Shape::new(vec![1, 3]),
            &Shape::new(vec![1, 2]),
            &ctx,
        );
        assert!(matches!(
            err,
            Err(LayerError::UnsupportedDType { context: "weight", .. })
        ));
    }

    #[test]
    fn test_f16_bias_rejected_at_build() {
        let ctx = ExecutionContext::new();
        let config = InnerProductConfig::new(2, true);
        let resource = InnerProductResource::new(
            Tensor::from_f32(vec![0.0; 6], Shape::new(vec![2, 3])),
            Some(Tensor::from_f16(vec![f16::ONE; 2], Shape::new(vec![2]))),
        );
        let err = InnerProductLayer::build(
            &config,
            &resource,
            &Shape::new(vec![1, 3]),
            &Shape::new(vec![1, 2]),
            &ctx,
        );
        assert!(matches!(
            err,
            Err(LayerError::UnsupportedDType { context: "bias", .. })
        ));
    }

    #[test]
    fn test_f16_input_rejected_at_forward() {
        let ctx = ExecutionContext::new();
        let layer = build_layer(1, 3, 2, vec![0.0; 6], None, &ctx);
        let input = Tensor::from_f16(vec![f16::ONE; 3], Shape::new(vec![1, 3]));
        let mut output = Tensor::zeros(DType::F32, Shape::new(vec![1, 2]));
        assert!(matches!(
            layer.forward(&ctx, &input, &mut output),
            Err(LayerError::UnsupportedDType { context: "input", .. })
        ));
    }

    #[test]
    fn test_missing_bias_is_invalid_config() {
        let ctx = ExecutionContext::new();
        let config = InnerProductConfig::new(2, true);
        let resource = InnerProductResource::new(
            Tensor::from_f32(vec![0.0; 6], Shape::new(vec![2, 3])),
            None,
        );
        let err = InnerProductLayer::build(
            &config,
            &resource,
            &Shape::new(vec![1, 3]),
            &Shape::new(vec![1, 2]),
            &ctx,
        );
        assert!(matches!(err, Err(LayerError::MissingBias)));
    }

    #[test]
    fn test_num_output_must_match_output_shape() {
        let ctx = ExecutionContext::new();
        let config = InnerProductConfig::new(4, false);
        let resource = InnerProductResource::new(
            Tensor::from_f32(vec![0.0; 6], Shape::new(vec![2, 3])),
            None,
        );
        let err = InnerProductLayer::build(
            &config,
            &resource,
            &Shape::new(vec![1, 3]),
            &Shape::new(vec![1, 2]),
            &ctx,
        );
        assert!(matches!(err, Err(LayerError::OutputMismatch { .. })));
    }

    #[test]
    fn test_forward_batch_can_differ_from_build_batch() {
        // Strategy is fixed at build; later calls may carry another N.
        let (k, m) = (8, 5);
        let mut rng = StdRng::seed_from_u64(41);
        let weight = random_vec(&mut rng, m * k);
        let bias = random_vec(&mut rng, m);
        let ctx = ExecutionContext::new();
        let layer = build_layer(1, k, m, weight.clone(), Some(bias.clone()), &ctx);

        let n = 3;
        let x = random_vec(&mut rng, n * k);
        let input = Tensor::from_f32(x.clone(), Shape::new(vec![n, k]));
        let mut output = Tensor::zeros(DType::F32, Shape::new(vec![n, m]));
        layer.forward(&ctx, &input, &mut output).unwrap();

        let expected = naive_forward(&x, &weight, &bias, n, k, m);
        for (&got, &want) in output.as_f32_slice().unwrap().iter().zip(expected.iter()) {
            assert_relative_eq!(got, want, max_relative = 1e-4, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_wrong_input_width_rejected() {
        let ctx = ExecutionContext::new();
        let layer = build_layer(1, 3, 2, vec![0.0; 6], None, &ctx);
        let input = Tensor::from_f32(vec![0.0; 4], Shape::new(vec![1, 4]));
        let mut output = Tensor::zeros(DType::F32, Shape::new(vec![1, 2]));
        assert!(layer.forward(&ctx, &input, &mut output).is_err());
    }
}
