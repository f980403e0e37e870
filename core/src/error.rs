//! Error types for the bitmcu-core engine.
//!
//! Every fallible function returns `EngineResult<T>`. Shape and encoding
//! problems are caught when a `LayerSpec` or `Model` is bound, so the
//! inference path itself only fails on caller-supplied buffers.
//!
//! Why `Copy` errors with static context: there is no allocator to format a
//! message into, and a panic on an MCU halts the whole device.

use thiserror::Error;

/// All error conditions surfaced by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A raw bit-width tag from model data names no known encoding.
    #[error("unsupported weight bit width code {code}")]
    UnsupportedBitWidth { code: u32 },

    /// A declared shape disagrees with the data bound to it.
    #[error("{what} size mismatch: expected {expected}, got {actual}")]
    SizeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The layer is wider than the width the accumulator bound is proven for.
    #[error("layer has {actual} inputs, maximum supported is {max}")]
    LayerTooWide { max: usize, actual: usize },

    /// Bias plus worst-case dot product could leave the i32 range.
    #[error("layer may overflow i32 accumulators (worst case {bound})")]
    AccumulatorOverflow { bound: i64 },

    #[error("invalid quantization parameters")]
    InvalidQuantization,

    /// Caller scratch cannot hold the model's widest layer.
    #[error("scratch too small: need {required} elements, have {available}")]
    ScratchTooSmall { required: usize, available: usize },

    #[error("model has no layers")]
    EmptyModel,
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub(crate) const fn size(what: &'static str, expected: usize, actual: usize) -> Self {
        EngineError::SizeMismatch { what, expected, actual }
    }
}
