//! Caller-owned working memory for one inference.
//!
//! MCUs have no heap, so the caller lends two buffers: one for i32
//! accumulators and one for int8 activations. Both are reused layer after
//! layer: once a layer's accumulators exist its input activations are dead,
//! so the requantized output can overwrite them in place. Each buffer must
//! hold the model's widest layer (`Model::max_width`).

use crate::error::{EngineError, EngineResult};

/// Borrowed accumulator and activation buffers.
///
/// Lifetime `'a` ties the scratch to the caller's storage; nothing the
/// engine writes here survives past the borrow.
pub struct Scratch<'a> {
    acc: &'a mut [i32],
    act: &'a mut [i8],
}

impl<'a> Scratch<'a> {
    pub fn new(acc: &'a mut [i32], act: &'a mut [i8]) -> Self {
        Self { acc, act }
    }

    /// Widest layer this scratch can serve.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.acc.len().min(self.act.len())
    }

    pub(crate) fn check(&self, required: usize) -> EngineResult<()> {
        if self.capacity() < required {
            return Err(EngineError::ScratchTooSmall { required, available: self.capacity() });
        }
        Ok(())
    }

    pub(crate) fn split(&mut self) -> (&mut [i32], &mut [i8]) {
        (&mut *self.acc, &mut *self.act)
    }

    /// Accumulators left by the last layer run, first `n` entries.
    pub fn accumulators(&self, n: usize) -> &[i32] {
        &self.acc[..n.min(self.acc.len())]
    }

    /// Activations left by the last requantization, first `n` entries.
    pub fn activations(&self, n: usize) -> &[i8] {
        &self.act[..n.min(self.act.len())]
    }
}

/// Fixed-capacity owned scratch, suitable for a `static` or a stack frame.
///
/// `N` is the widest layer the buffers can serve.
#[derive(Debug, Clone)]
pub struct ScratchBuffers<const N: usize> {
    acc: [i32; N],
    act: [i8; N],
}

impl<const N: usize> ScratchBuffers<N> {
    pub const fn new() -> Self {
        Self { acc: [0; N], act: [0; N] }
    }

    pub fn scratch(&mut self) -> Scratch<'_> {
        Scratch::new(&mut self.acc, &mut self.act)
    }

    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> Default for ScratchBuffers<N> {
    fn default() -> Self {
        Self::new()
    }
}
