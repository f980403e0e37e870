//! # bitmcu-core: bit-packed fully-connected inference for microcontrollers
//!
//! A `no_std`, allocation-free engine that runs small feed-forward digit
//! classifiers whose weights are stored in non-standard bit widths.
//!
//! ## Architecture
//!
//! - **WeightCodec** (`codec`): 1/2/4/8-bit and shift-coded packed weights,
//!   each with its own multiply or shift-add arithmetic
//! - **LayerKernel** (`layers`): int8 activations × packed weights → i32
//! - **Requantizer** (`math`): dynamic-shift ReLU normalization or affine
//!   float rescale back to int8
//! - **Classifier** (`model`): validated layer chain, argmax over the final
//!   accumulators
//! - **Scratch** (`scratch`): caller-owned buffers sized to the widest layer
//!
//! ## Usage
//!
//! ```ignore
//! use bitmcu_core::*;
//!
//! static L1_W: [u32; 144 * 64 / 4] = [/* generated offline */];
//! static L1_B: [i32; 64] = [/* ... */];
//!
//! let l1 = LayerSpec::new(WeightBlob::new(BitWidthVariant::EightBit, &L1_W), 144, 64)?
//!     .with_biases(&L1_B)?;
//! let layers = [l1, l2, l3];
//! let model = Model::new(&layers)?;
//!
//! let mut buffers = ScratchBuffers::<64>::new();
//! let class = model.infer(&pixels, &mut buffers.scratch())?;
//! ```

// Why #![no_std]: the target is a bare-metal RISC-V/Cortex-M core with no heap.
#![no_std]

#[cfg(feature = "std")]
extern crate std;

pub mod codec;
pub mod error;
pub mod instrument;
pub mod layers;
pub mod math;
pub mod model;
pub mod sample;
pub mod scratch;

// Re-export primary types
pub use codec::{BitWidthVariant, EngineConfig, FourBitDecode, WeightBlob, WeightCodec};
pub use error::{EngineError, EngineResult};
pub use instrument::{
    evaluate, run_sample, Clock, Evaluation, InferenceReport, NoClock, NoSink, ReportSink,
};
pub use layers::{process, AffineQuant, LayerSpec, QuantParams, Quantization, MAX_INPUT_WIDTH};
pub use math::{
    affine_relu_requantize, argmax_i32, normalize_relu, requant_shift, Normalized,
    NO_SIGNAL_INDEX,
};
pub use model::{Classifier, Model};
pub use sample::{quantize_image, quantize_pixel, FrameReceiver, Sample, FRAME_START};
pub use scratch::{Scratch, ScratchBuffers};
