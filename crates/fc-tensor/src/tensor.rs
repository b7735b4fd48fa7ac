use crate::dtype::DType;
use crate::error::Result;
use crate::shape::Shape;
use crate::storage::CpuStorage;
use half::f16;

/// A tensor backed by CPU storage.
///
/// Holds contiguous, row-major data with an associated shape. The dtype is
/// derived from the storage variant.
#[derive(Debug, Clone)]
pub struct Tensor {
    storage: CpuStorage,
    shape: Shape,
}

impl Tensor {
    /// Create a new f32 tensor from data and a shape.
    ///
    /// # Panics
    /// Panics if `data.len() != shape.numel()`.
    pub fn from_f32(data: Vec<f32>, shape: Shape) -> Self {
        assert_eq!(
            data.len(),
            shape.numel(),
            "data length {} does not match shape {} (numel={})",
            data.len(),
            shape,
            shape.numel()
        );
        Tensor {
            storage: CpuStorage::from_f32_vec(data),
            shape,
        }
    }

    /// Create a new f16 tensor from data and a shape.
    ///
    /// # Panics
    /// Panics if `data.len() != shape.numel()`.
    pub fn from_f16(data: Vec<f16>, shape: Shape) -> Self {
        assert_eq!(
            data.len(),
            shape.numel(),
            "data length {} does not match shape {} (numel={})",
            data.len(),
            shape,
            shape.numel()
        );
        Tensor {
            storage: CpuStorage::from_f16_vec(data),
            shape,
        }
    }

    /// Create a zero-filled tensor with the given dtype and shape.
    pub fn zeros(dtype: DType, shape: Shape) -> Self {
        let n = shape.numel();
        Tensor {
            storage: CpuStorage::zeros(dtype, n),
            shape,
        }
    }

    /// Returns a reference to the tensor's shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Returns the tensor's data type.
    pub fn dtype(&self) -> DType {
        self.storage.dtype()
    }

    /// Total number of elements.
    pub fn numel(&self) -> usize {
        self.shape.numel()
    }

    /// Size of the underlying data in bytes.
    pub fn byte_size(&self) -> usize {
        self.storage.len() * self.dtype().size_in_bytes()
    }

    /// Returns the underlying data as an f32 slice.
    ///
    /// # Errors
    /// Returns `UnsupportedDType` if the storage is not F32.
    pub fn as_f32_slice(&self) -> Result<&[f32]> {
        self.storage.as_f32_slice()
    }

    /// Returns the underlying data as a mutable f32 slice.
    ///
    /// # Errors
    /// Returns `UnsupportedDType` if the storage is not F32.
    pub fn as_f32_slice_mut(&mut self) -> Result<&mut [f32]> {
        self.storage.as_f32_slice_mut()
    }

    /// Returns the underlying storage reference.
    pub fn storage(&self) -> &CpuStorage {
        &self.storage
    }
}
