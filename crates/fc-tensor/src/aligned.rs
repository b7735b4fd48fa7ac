use crate::error::{Result, TensorError};
use std::alloc::{alloc_zeroed, dealloc, handle_alloc_error, Layout};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

/// Owned f32 buffer with 32-byte aligned backing storage.
///
/// Packed GEMM operands are consumed with aligned vector loads, so the
/// plain `Vec<f32>` alignment guarantee (4 bytes) is not enough. The
/// buffer is zero-initialized on allocation; padding elements introduced
/// by packing therefore start out as the additive identity.
pub struct AlignedBuf {
    ptr: NonNull<f32>,
    len: usize,
}

impl AlignedBuf {
    /// Alignment of the backing allocation, in bytes.
    pub const ALIGN: usize = 32;

    /// Allocate a zero-filled buffer of `len` f32 elements.
    pub fn zeroed(len: usize) -> Result<Self> {
        if len == 0 {
            return Ok(AlignedBuf {
                ptr: NonNull::dangling(),
                len: 0,
            });
        }
        let layout = Self::layout(len)?;
        // Safety: layout has non-zero size.
        let raw = unsafe { alloc_zeroed(layout) };
        let Some(ptr) = NonNull::new(raw as *mut f32) else {
            handle_alloc_error(layout);
        };
        Ok(AlignedBuf { ptr, len })
    }

    /// Number of f32 elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the buffer holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Raw pointer to the first element.
    pub fn as_ptr(&self) -> *const f32 {
        self.ptr.as_ptr()
    }

    fn layout(len: usize) -> Result<Layout> {
        Layout::from_size_align(len * std::mem::size_of::<f32>(), Self::ALIGN)
            .map_err(|e| TensorError::Allocation(e.to_string()))
    }
}

impl Deref for AlignedBuf {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        // Safety: ptr is valid for len elements (or dangling with len 0).
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl DerefMut for AlignedBuf {
    fn deref_mut(&mut self) -> &mut [f32] {
        // Safety: ptr is valid for len elements and uniquely owned.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for AlignedBuf {
    fn drop(&mut self) {
        if self.len == 0 {
            return;
        }
        // Safety: allocated in `zeroed` with this exact layout.
        let layout = Layout::from_size_align(
            self.len * std::mem::size_of::<f32>(),
            Self::ALIGN,
        )
        .expect("layout was valid at allocation time");
        unsafe { dealloc(self.ptr.as_ptr() as *mut u8, layout) };
    }
}

impl Clone for AlignedBuf {
    fn clone(&self) -> Self {
        let mut copy = AlignedBuf::zeroed(self.len)
            .expect("layout was valid for the original buffer");
        copy.copy_from_slice(self);
        copy
    }
}

impl fmt::Debug for AlignedBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlignedBuf")
            .field("len", &self.len)
            .field("align", &Self::ALIGN)
            .finish()
    }
}

// Safety: the buffer uniquely owns plain f32 data.
unsafe impl Send for AlignedBuf {}
unsafe impl Sync for AlignedBuf {}
