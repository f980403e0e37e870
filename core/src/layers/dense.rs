//! Fully-connected kernel: int8 activations in, int32 accumulators out.
//!
//! Accumulation is plain `i32`. The bound below proves that no layer the
//! constructors accept can overflow it: the widest term any encoding or zero
//! point produces is 255 × 255, and `LayerSpec::new` rejects anything wider
//! than `MAX_INPUT_WIDTH` inputs. `LayerSpec::with_biases` and
//! `LayerSpec::with_affine` refuse biases that eat into the remaining headroom,
//! so `bias + Σ` cannot overflow under any `EngineConfig`.

use crate::codec::{EngineConfig, WeightCodec};
use crate::error::{EngineError, EngineResult};
use super::{LayerSpec, Quantization};

/// Widest layer input (a flattened 28×28 image).
pub const MAX_INPUT_WIDTH: usize = 784;

/// Largest |term| over every encoding and every int8 zero point.
pub const MAX_TERM_MAGNITUDE: i64 = 255 * 255;

const _: () = assert!(MAX_INPUT_WIDTH as i64 * MAX_TERM_MAGNITUDE <= i32::MAX as i64);

/// Compute `output[o] = bias[o] + Σ_i f(activations[i], w[o][i])` for every
/// output neuron of `layer`.
pub fn process(
    activations: &[i8],
    layer: &LayerSpec<'_>,
    config: &EngineConfig,
    output: &mut [i32],
) -> EngineResult<()> {
    let n_in = layer.n_input();
    let n_out = layer.n_output();
    if activations.len() != n_in {
        return Err(EngineError::size("activations", n_in, activations.len()));
    }
    if output.len() != n_out {
        return Err(EngineError::size("accumulators", n_out, output.len()));
    }

    let weights = layer.weights();
    match layer.quantization() {
        Quantization::Symmetric => {
            let codec = WeightCodec::new(layer.variant(), *config);
            for (o, slot) in output.iter_mut().enumerate() {
                *slot = layer.bias(o) + codec.dot(activations, weights.fields(o * n_in, n_in));
            }
        }
        Quantization::Affine(q) => {
            let in_zp = q.input.zero_point;
            let w_zp = q.weight_zero_point;
            for (o, slot) in output.iter_mut().enumerate() {
                let mut sum = layer.bias(o);
                for (&a, field) in activations.iter().zip(weights.fields(o * n_in, n_in)) {
                    let w = field as u8 as i8 as i32;
                    sum += (a as i32 - in_zp) * (w - w_zp);
                }
                *slot = sum;
            }
        }
    }
    Ok(())
}
