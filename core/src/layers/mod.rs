//! Fully-connected layer descriptions.
//!
//! A `LayerSpec` is an immutable view over externally generated model data:
//! a packed weight blob, optional biases and optional affine quantization
//! constants. All shape checks happen in the constructors so the kernel can
//! run without any.

pub mod dense;

pub use dense::{process, MAX_INPUT_WIDTH};

use crate::codec::{BitWidthVariant, EngineConfig, FourBitDecode, WeightBlob, MAX_ACTIVATION_MAGNITUDE};
use crate::error::{EngineError, EngineResult};

/// Scale and zero point of one asymmetric int8 tensor boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantParams {
    pub scale: f32,
    pub zero_point: i32,
}

impl QuantParams {
    /// Scale must be finite and positive, zero point must be an int8 value.
    pub fn new(scale: f32, zero_point: i32) -> EngineResult<Self> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(EngineError::InvalidQuantization);
        }
        check_zero_point(zero_point)?;
        Ok(Self { scale, zero_point })
    }
}

/// Zero points of an asymmetric layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineQuant {
    pub input: QuantParams,
    pub output: QuantParams,
    pub weight_zero_point: i32,
}

/// Arithmetic mode of a layer, which also selects its requantizer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Quantization {
    /// Packed symmetric weights, no zero points. Requantized by dynamic shift.
    #[default]
    Symmetric,
    /// Literal int8 weights with zero points. Requantized by float rescale.
    Affine(AffineQuant),
}

impl Quantization {
    pub fn is_affine(&self) -> bool {
        matches!(self, Quantization::Affine(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerSpec<'w> {
    weights: WeightBlob<'w>,
    n_input: usize,
    n_output: usize,
    biases: Option<&'w [i32]>,
    quant: Quantization,
}

impl<'w> LayerSpec<'w> {
    /// Bind a weight blob to an `n_input → n_output` shape.
    pub fn new(weights: WeightBlob<'w>, n_input: usize, n_output: usize) -> EngineResult<Self> {
        if n_input == 0 {
            return Err(EngineError::size("layer inputs", 1, 0));
        }
        if n_output == 0 {
            return Err(EngineError::size("layer outputs", 1, 0));
        }
        if n_input > MAX_INPUT_WIDTH {
            return Err(EngineError::LayerTooWide { max: MAX_INPUT_WIDTH, actual: n_input });
        }
        let n_weights = n_input
            .checked_mul(n_output)
            .ok_or(EngineError::size("layer outputs", usize::MAX / n_input, n_output))?;
        weights.check_len(n_weights)?;
        Ok(Self { weights, n_input, n_output, biases: None, quant: Quantization::Symmetric })
    }

    /// Attach one bias per output neuron.
    ///
    /// Why here: `process` accumulates in plain `i32`, so a bias is only
    /// accepted if it leaves room for the worst-case dot product under
    /// either 4-bit decode.
    pub fn with_biases(mut self, biases: &'w [i32]) -> EngineResult<Self> {
        if biases.len() != self.n_output {
            return Err(EngineError::size("biases", self.n_output, biases.len()));
        }
        self.biases = Some(biases);
        self.check_headroom()?;
        Ok(self)
    }

    /// Switch the layer to zero-point arithmetic. Weights must be literal int8.
    /// Zero points widen the dot bound, so bias headroom is checked again.
    pub fn with_affine(
        mut self,
        input: QuantParams,
        output: QuantParams,
        weight_zero_point: i32,
    ) -> EngineResult<Self> {
        if !self.weights.variant().is_literal_int8() {
            return Err(EngineError::InvalidQuantization);
        }
        check_zero_point(weight_zero_point)?;
        self.quant = Quantization::Affine(AffineQuant { input, output, weight_zero_point });
        self.check_headroom()?;
        Ok(self)
    }

    #[inline(always)]
    pub fn n_input(&self) -> usize {
        self.n_input
    }

    #[inline(always)]
    pub fn n_output(&self) -> usize {
        self.n_output
    }

    pub fn variant(&self) -> BitWidthVariant {
        self.weights.variant()
    }

    pub fn weights(&self) -> &WeightBlob<'w> {
        &self.weights
    }

    pub fn biases(&self) -> Option<&'w [i32]> {
        self.biases
    }

    #[inline(always)]
    pub fn bias(&self, o: usize) -> i32 {
        self.biases.and_then(|b| b.get(o).copied()).unwrap_or(0)
    }

    pub fn quantization(&self) -> Quantization {
        self.quant
    }

    /// Worst-case |Σ f(a, w)| over all int8 activations and all weight fields,
    /// bias excluded.
    pub fn dot_bound(&self, config: &EngineConfig) -> i64 {
        self.dot_bound_for(config.four_bit)
    }

    /// `dot_bound` under whichever 4-bit decode is larger.
    pub fn worst_dot_bound(&self) -> i64 {
        self.dot_bound_for(FourBitDecode::Multiply)
            .max(self.dot_bound_for(FourBitDecode::ShiftAdd))
    }

    fn dot_bound_for(&self, four_bit: FourBitDecode) -> i64 {
        let term = match self.quant {
            Quantization::Symmetric => {
                MAX_ACTIVATION_MAGNITUDE * self.variant().max_weight_magnitude(four_bit)
            }
            Quantization::Affine(q) => {
                offset_magnitude(q.input.zero_point) * offset_magnitude(q.weight_zero_point)
            }
        };
        self.n_input as i64 * term
    }

    /// Worst-case |accumulator| including the largest bias, over any
    /// engine configuration.
    pub fn accumulator_bound(&self) -> i64 {
        let bias = self
            .biases
            .map(|b| b.iter().map(|&v| (v as i64).abs()).max().unwrap_or(0))
            .unwrap_or(0);
        self.worst_dot_bound() + bias
    }

    fn check_headroom(&self) -> EngineResult<()> {
        let bound = self.accumulator_bound();
        if bound > i32::MAX as i64 {
            return Err(EngineError::AccumulatorOverflow { bound });
        }
        Ok(())
    }
}

fn check_zero_point(zero_point: i32) -> EngineResult<()> {
    if !(i8::MIN as i32..=i8::MAX as i32).contains(&zero_point) {
        return Err(EngineError::InvalidQuantization);
    }
    Ok(())
}

/// Largest |x - zero_point| over int8 x.
fn offset_magnitude(zero_point: i32) -> i64 {
    let zp = zero_point as i64;
    (127 - zp).abs().max((-128 - zp).abs())
}
