//! Model: an immutable chain of fully-connected layers, and the `Classifier`
//! contract it fulfils.
//!
//! ```text
//! sample → process(L1) → requant → process(L2) → … → process(Ln) → argmax
//! ```
//!
//! Per-layer shape and overflow checks run when each `LayerSpec` is built,
//! chain checks in `Model::new`, all before any data flows. Inference is then a fixed straight-line pass that can only
//! fail on a wrongly sized sample or scratch.

use crate::codec::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::layers::{process, LayerSpec, Quantization};
use crate::math::{self, Normalized};
use crate::scratch::Scratch;

/// The `infer` contract shared by every inference backend.
///
/// `Model` is the bit-packed engine; other backends (for example a wrapper
/// around an external NN runtime) can implement this trait and be driven by
/// the same instrumentation.
pub trait Classifier {
    fn input_width(&self) -> usize;
    fn n_classes(&self) -> usize;
    /// Predicted class for one int8 sample.
    fn infer(&self, sample: &[i8], scratch: &mut Scratch<'_>) -> EngineResult<usize>;
}

/// A validated sequence of layers.
///
/// # Lifetime `'m`
/// The model borrows layer descriptions and their weight data, which on an
/// MCU are usually `static` tables in flash. The model never mutates them.
#[derive(Debug, Clone, Copy)]
pub struct Model<'m> {
    layers: &'m [LayerSpec<'m>],
    config: EngineConfig,
    max_width: usize,
}

impl<'m> Model<'m> {
    /// Validate a layer chain with the default engine configuration.
    pub fn new(layers: &'m [LayerSpec<'m>]) -> EngineResult<Self> {
        Self::with_config(layers, EngineConfig::default())
    }

    /// Validate a layer chain for a given engine configuration.
    ///
    /// Rejects empty models, width mismatches between consecutive layers and
    /// chains mixing symmetric and affine layers. Bias headroom was already
    /// checked when each `LayerSpec` was built.
    pub fn with_config(layers: &'m [LayerSpec<'m>], config: EngineConfig) -> EngineResult<Self> {
        let first = layers.first().ok_or(EngineError::EmptyModel)?;
        let affine = first.quantization().is_affine();

        let mut max_width = 0;
        let mut prev_width = first.n_input();
        for layer in layers {
            if layer.n_input() != prev_width {
                return Err(EngineError::size("chained layer width", prev_width, layer.n_input()));
            }
            if layer.quantization().is_affine() != affine {
                return Err(EngineError::InvalidQuantization);
            }
            prev_width = layer.n_output();
            max_width = max_width.max(layer.n_output());
        }

        Ok(Self { layers, config, max_width })
    }

    pub fn layers(&self) -> &'m [LayerSpec<'m>] {
        self.layers
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn input_width(&self) -> usize {
        self.layers[0].n_input()
    }

    pub fn n_classes(&self) -> usize {
        self.layers[self.layers.len() - 1].n_output()
    }

    /// Scratch capacity needed: the widest layer output.
    pub fn max_width(&self) -> usize {
        self.max_width
    }

    /// Run every layer and return the final layer's raw accumulators.
    ///
    /// Interior layers are requantized into the scratch activation buffer;
    /// the final layer is left as i32.
    pub fn forward<'s>(
        &self,
        sample: &[i8],
        scratch: &'s mut Scratch<'_>,
    ) -> EngineResult<&'s [i32]> {
        if sample.len() != self.input_width() {
            return Err(EngineError::size("sample", self.input_width(), sample.len()));
        }
        scratch.check(self.max_width)?;

        let (acc, act) = scratch.split();
        let last = self.layers.len() - 1;
        for (k, layer) in self.layers.iter().enumerate() {
            let n_out = layer.n_output();
            let input: &[i8] = if k == 0 { sample } else { &act[..layer.n_input()] };
            process(input, layer, &self.config, &mut acc[..n_out])?;
            log::trace!(
                "layer {}: {} -> {} ({:?})",
                k + 1,
                layer.n_input(),
                n_out,
                layer.variant()
            );
            if k < last {
                self.requantize(k, &acc[..n_out], &mut act[..n_out])?;
            }
        }
        Ok(&acc[..self.n_classes()])
    }

    /// Predicted class: argmax of the final layer's raw accumulators.
    pub fn infer(&self, sample: &[i8], scratch: &mut Scratch<'_>) -> EngineResult<usize> {
        let logits = self.forward(sample, scratch)?;
        let class = math::argmax_i32(logits)?;
        log::debug!(
            "inference over {} layers: class {} (logit {})",
            self.layers.len(),
            class,
            logits[class]
        );
        Ok(class)
    }

    /// Predicted class taken from dynamic-shift normalization of the final
    /// layer instead of a raw argmax. Reports `Normalized::NoSignal` when no
    /// final accumulator is positive.
    pub fn infer_normalized(
        &self,
        sample: &[i8],
        scratch: &mut Scratch<'_>,
    ) -> EngineResult<Normalized> {
        let n = self.n_classes();
        self.forward(sample, scratch)?;
        let (acc, act) = scratch.split();
        let normalized = math::normalize_relu(&acc[..n], &mut act[..n])?;
        log::debug!("normalized inference: {:?}", normalized);
        Ok(normalized)
    }

    fn requantize(&self, k: usize, acc: &[i32], act: &mut [i8]) -> EngineResult<()> {
        match (self.layers[k].quantization(), self.layers[k + 1].quantization()) {
            (Quantization::Affine(cur), Quantization::Affine(next)) => math::affine_relu_requantize(
                acc,
                act,
                cur.output.scale,
                next.input.scale,
                next.input.zero_point,
            ),
            _ => math::normalize_relu(acc, act).map(|_| ()),
        }
    }
}

impl Classifier for Model<'_> {
    fn input_width(&self) -> usize {
        Model::input_width(self)
    }

    fn n_classes(&self) -> usize {
        Model::n_classes(self)
    }

    fn infer(&self, sample: &[i8], scratch: &mut Scratch<'_>) -> EngineResult<usize> {
        Model::infer(self, sample, scratch)
    }
}
