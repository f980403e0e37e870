//! Requantization between layers and final-class selection.
//!
//! Two requantizers bring i32 accumulators back to int8 activations:
//!
//! - `normalize_relu`: dynamic right shift chosen from the largest positive
//!   accumulator, so the peak lands in [64, 127]. Integer only.
//! - `affine_relu_requantize`: float rescale into an asymmetric int8 tensor
//!   described by scale and zero point.
//!
//! Both apply ReLU first and make a single pass after deriving their shared
//! shift or ratio.

use crate::error::{EngineError, EngineResult};

/// Largest int8 value a shifted activation may take.
pub const ACTIVATION_MAX: i32 = 127;

/// Index reported by [`Normalized::index`] when no accumulator is positive.
pub const NO_SIGNAL_INDEX: usize = 0;

/// Outcome of [`normalize_relu`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalized {
    /// Position of the largest positive accumulator (first one on ties) and
    /// the right shift applied to every element.
    Peak { index: usize, shift: u32 },
    /// No accumulator was positive; every output is zero.
    NoSignal,
}

impl Normalized {
    /// Peak position, or [`NO_SIGNAL_INDEX`] when there was no signal.
    pub fn index(&self) -> usize {
        match *self {
            Normalized::Peak { index, .. } => index,
            Normalized::NoSignal => NO_SIGNAL_INDEX,
        }
    }

    pub fn shift(&self) -> u32 {
        match *self {
            Normalized::Peak { shift, .. } => shift,
            Normalized::NoSignal => 0,
        }
    }

    pub fn is_signal(&self) -> bool {
        matches!(self, Normalized::Peak { .. })
    }
}

// =============================================================================
// Dynamic-shift normalization
// =============================================================================

/// Smallest `s` such that `max_value >> s <= 127`.
///
/// Why bit length: halving in a loop until the value fits costs up to 24
/// iterations per layer; `leading_zeros` is one instruction on most cores.
#[inline]
pub fn requant_shift(max_value: i32) -> u32 {
    if max_value <= ACTIVATION_MAX {
        return 0;
    }
    let bit_len = 32 - (max_value as u32).leading_zeros();
    bit_len - 7
}

/// ReLU, then scale every element by the same rounding right shift so the
/// largest positive accumulator fits the int8 activation range.
///
/// Returns the position of the pre-shift maximum, which doubles as a class
/// index when applied to a final layer.
pub fn normalize_relu(input: &[i32], output: &mut [i8]) -> EngineResult<Normalized> {
    if input.len() != output.len() {
        return Err(EngineError::size("normalized output", input.len(), output.len()));
    }

    let mut max_val = 0i32;
    let mut max_pos = None;
    for (i, &v) in input.iter().enumerate() {
        if v > max_val {
            max_val = v;
            max_pos = Some(i);
        }
    }

    let Some(index) = max_pos else {
        output.fill(0);
        return Ok(Normalized::NoSignal);
    };

    let shift = requant_shift(max_val);
    let rounding: i64 = if shift > 0 { 1 << (shift - 1) } else { 0 };
    for (out, &v) in output.iter_mut().zip(input) {
        *out = if v < 0 {
            0
        } else {
            ((v as i64 + rounding) >> shift).min(ACTIVATION_MAX as i64) as i8
        };
    }
    log::trace!("normalize_relu: peak {} at {} shift {}", max_val, index, shift);
    Ok(Normalized::Peak { index, shift })
}

// =============================================================================
// Affine float requantization
// =============================================================================

/// ReLU, rescale by `input_scale / output_scale`, round half away from zero,
/// add `output_zero_point` and clamp to [-128, 127].
pub fn affine_relu_requantize(
    input: &[i32],
    output: &mut [i8],
    input_scale: f32,
    output_scale: f32,
    output_zero_point: i32,
) -> EngineResult<()> {
    if input.len() != output.len() {
        return Err(EngineError::size("requantized output", input.len(), output.len()));
    }

    let ratio = input_scale / output_scale;
    for (out, &v) in output.iter_mut().zip(input) {
        let relu_val = v.max(0);
        let scaled = relu_val as f32 * ratio;
        let q = libm::roundf(scaled) as i64 + output_zero_point as i64;
        *out = q.clamp(i8::MIN as i64, i8::MAX as i64) as i8;
    }
    Ok(())
}

// =============================================================================
// Class selection
// =============================================================================

/// Index of the largest accumulator. Strict `>`, so the first of equal
/// maxima wins.
pub fn argmax_i32(data: &[i32]) -> EngineResult<usize> {
    let Some((&first, rest)) = data.split_first() else {
        return Err(EngineError::size("argmax input", 1, 0));
    };

    let mut max_idx = 0;
    let mut max_val = first;
    for (i, &val) in rest.iter().enumerate() {
        if val > max_val {
            max_val = val;
            max_idx = i + 1;
        }
    }
    Ok(max_idx)
}
