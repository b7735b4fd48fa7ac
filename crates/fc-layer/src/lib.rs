//! `fc-layer` - CPU accelerator for inner-product (fully-connected) layers.
//!
//! The accelerator picks one of two compute strategies at build time from
//! an arithmetic-intensity heuristic over the blob shapes: a vectorized
//! matrix-vector path for low-reuse (small batch) workloads, or a blocked
//! matrix-matrix path for workloads that amortize packing cost. Weights
//! are repacked once into the layout the chosen path wants; the bias is
//! staged once into a fixed M-element buffer. Forward calls then run
//! against immutable packed state.

pub mod config;
pub mod context;
pub mod error;
pub mod gemm;
pub mod gemv;
pub mod layer;
pub mod pack;
pub mod resource;
pub mod strategy;

// Re-export primary types at the crate root for convenience.
pub use config::{GemmBlocking, InnerProductConfig};
pub use context::{ExecutionContext, SimdArch};
pub use error::{LayerError, Result};
pub use layer::InnerProductLayer;
pub use resource::InnerProductResource;
pub use strategy::Strategy;
