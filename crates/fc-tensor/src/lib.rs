//! `fc-tensor` - Tensor and buffer plumbing for the fc-accel layer accelerator.
//!
//! This crate provides:
//! - A `Tensor` type backed by CPU storage (f32 and f16 variants)
//! - Shape utilities with batch/feature flattening
//! - A 32-byte-aligned owned f32 buffer for packed operands
//! - Data type definitions and the shared error type

pub mod aligned;
pub mod dtype;
pub mod error;
pub mod shape;
pub mod storage;
pub mod tensor;

// Re-export primary types at the crate root for convenience.
pub use aligned::AlignedBuf;
pub use dtype::DType;
pub use error::{Result, TensorError};
pub use shape::Shape;
pub use storage::CpuStorage;
pub use tensor::Tensor;
