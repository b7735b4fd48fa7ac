use std::cell::{RefCell, RefMut};

/// Target capability tag selecting the native SIMD lane width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimdArch {
    /// 128-bit vectors, 4 f32 lanes.
    Sse42,
    /// 256-bit vectors, 8 f32 lanes.
    Avx2,
}

impl SimdArch {
    /// Detect the widest supported arch on the running CPU.
    pub fn detect() -> SimdArch {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        {
            if is_x86_feature_detected!("avx2") {
                return SimdArch::Avx2;
            }
            SimdArch::Sse42
        }
        #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
        {
            SimdArch::Sse42
        }
    }

    /// Number of f32 elements per vector register.
    pub fn lanes(self) -> usize {
        match self {
            SimdArch::Sse42 => 4,
            SimdArch::Avx2 => 8,
        }
    }
}

/// Per-call execution context for the accelerator.
///
/// Carries the detected SIMD capability and owns a reusable scratch
/// buffer. The workspace handed out by [`acquire`](Self::acquire) is valid
/// for the duration of one forward call only; the `RefCell` makes the
/// context `!Sync`, so concurrent forward calls must each bring their own
/// context.
#[derive(Debug)]
pub struct ExecutionContext {
    arch: SimdArch,
    scratch: RefCell<Vec<f32>>,
}

impl ExecutionContext {
    /// Create a context for the detected CPU.
    pub fn new() -> Self {
        Self::with_arch(SimdArch::detect())
    }

    /// Create a context pinned to a specific arch (mainly for tests).
    pub fn with_arch(arch: SimdArch) -> Self {
        ExecutionContext {
            arch,
            scratch: RefCell::new(Vec::new()),
        }
    }

    /// The capability tag this context was built with.
    pub fn arch(&self) -> SimdArch {
        self.arch
    }

    /// Acquire a scratch workspace of at least `byte_size` bytes, viewed
    /// as f32 elements. Contents are unspecified; callers must write
    /// before reading. The borrow must be released before the next
    /// acquisition.
    pub fn acquire(&self, byte_size: usize) -> RefMut<'_, [f32]> {
        let len = byte_size.div_ceil(std::mem::size_of::<f32>());
        let mut buf = self.scratch.borrow_mut();
        if buf.len() < len {
            buf.resize(len, 0.0);
        }
        RefMut::map(buf, move |v| &mut v[..len])
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lanes() {
        assert_eq!(SimdArch::Sse42.lanes(), 4);
        assert_eq!(SimdArch::Avx2.lanes(), 8);
    }

    #[test]
    fn test_acquire_rounds_up_to_elements() {
        let ctx = ExecutionContext::with_arch(SimdArch::Sse42);
        let ws = ctx.acquire(10);
        assert_eq!(ws.len(), 3);
    }

    #[test]
    fn test_acquire_reuses_and_grows() {
        let ctx = ExecutionContext::with_arch(SimdArch::Sse42);
        {
            let mut ws = ctx.acquire(64);
            assert_eq!(ws.len(), 16);
            ws[0] = 7.0;
        }
        let ws = ctx.acquire(256);
        assert_eq!(ws.len(), 64);
    }
}
