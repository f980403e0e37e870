//! Packed low-bit weight streams and their per-element arithmetic.
//!
//! Weights are stored as `u32` words. Each word holds `32 / bits` fields,
//! most significant field first, and the stream runs in output-major order:
//! logical weight `o * n_input + i` sits at bit offset `(o * n_input + i) * bits`.
//! Fields never straddle a word because every supported width divides 32.
//!
//! Each variant keeps its own arithmetic. The sign/magnitude encodings are
//! evaluated with shifts and adds only, so they run on cores without a
//! hardware multiplier; the two's complement encodings multiply.

use crate::error::{EngineError, EngineResult};

/// Bits per storage word.
///
/// Why 32: the fields are pulled with one shift and mask per weight from a
/// native register-width load.
pub const WORD_BITS: usize = 32;

/// Largest activation magnitude an int8 activation can carry.
pub const MAX_ACTIVATION_MAGNITUDE: i64 = 128;

/// Closed set of packed weight encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitWidthVariant {
    /// One bit per weight. Set adds the activation, clear subtracts it.
    Binary,
    /// Sign bit (set = negative) and a doubling bit: weights in {-3, -1, 1, 3}.
    TwoBit,
    /// Sign bit plus three magnitude bits. How the nibble is interpreted is a
    /// target choice, see [`FourBitDecode`].
    FourBit,
    /// Nibble in two's complement, weights in [-8, 7].
    FourBitTwosComplement,
    /// Byte in two's complement, weights in [-128, 127].
    EightBit,
    /// Sign bit plus a 3-bit left shift: weights are ±2^k, k in [0, 7].
    FourBitShift,
    /// Four literal int8 weights per word, first weight in the high byte.
    /// This is the only encoding the affine (zero-point) path accepts
    /// besides [`BitWidthVariant::EightBit`].
    PackedInt8,
}

impl BitWidthVariant {
    /// Every variant, in code order.
    pub const ALL: [BitWidthVariant; 7] = [
        BitWidthVariant::Binary,
        BitWidthVariant::TwoBit,
        BitWidthVariant::FourBit,
        BitWidthVariant::PackedInt8,
        BitWidthVariant::FourBitTwosComplement,
        BitWidthVariant::EightBit,
        BitWidthVariant::FourBitShift,
    ];

    /// Map a bit-width tag as stored in generated model data.
    pub const fn from_code(code: u32) -> EngineResult<Self> {
        match code {
            1 => Ok(BitWidthVariant::Binary),
            2 => Ok(BitWidthVariant::TwoBit),
            4 => Ok(BitWidthVariant::FourBit),
            8 => Ok(BitWidthVariant::PackedInt8),
            12 => Ok(BitWidthVariant::FourBitTwosComplement),
            16 => Ok(BitWidthVariant::EightBit),
            20 => Ok(BitWidthVariant::FourBitShift),
            _ => Err(EngineError::UnsupportedBitWidth { code }),
        }
    }

    pub const fn code(self) -> u32 {
        match self {
            BitWidthVariant::Binary => 1,
            BitWidthVariant::TwoBit => 2,
            BitWidthVariant::FourBit => 4,
            BitWidthVariant::PackedInt8 => 8,
            BitWidthVariant::FourBitTwosComplement => 12,
            BitWidthVariant::EightBit => 16,
            BitWidthVariant::FourBitShift => 20,
        }
    }

    /// Storage bits per weight.
    pub const fn bits(self) -> usize {
        match self {
            BitWidthVariant::Binary => 1,
            BitWidthVariant::TwoBit => 2,
            BitWidthVariant::FourBit
            | BitWidthVariant::FourBitTwosComplement
            | BitWidthVariant::FourBitShift => 4,
            BitWidthVariant::EightBit | BitWidthVariant::PackedInt8 => 8,
        }
    }

    pub const fn weights_per_word(self) -> usize {
        WORD_BITS / self.bits()
    }

    /// Words needed to store `n_weights` weights: `ceil(n * bits / 32)`.
    /// `None` when the bit count does not fit in `usize`.
    pub const fn words_for(self, n_weights: usize) -> Option<usize> {
        match n_weights.checked_mul(self.bits()) {
            Some(total) => Some(total / WORD_BITS + (total % WORD_BITS != 0) as usize),
            None => None,
        }
    }

    /// Whether a field decodes to a literal signed byte (usable with zero points).
    pub const fn is_literal_int8(self) -> bool {
        matches!(self, BitWidthVariant::EightBit | BitWidthVariant::PackedInt8)
    }

    /// Whether some field value decodes to a weight of zero.
    ///
    /// The sign/magnitude encodings have no zero code point: an all-zero
    /// field still contributes ±activation.
    pub const fn has_zero_weight(self, four_bit: FourBitDecode) -> bool {
        match self {
            BitWidthVariant::Binary | BitWidthVariant::TwoBit | BitWidthVariant::FourBitShift => false,
            BitWidthVariant::FourBit => matches!(four_bit, FourBitDecode::Multiply),
            _ => true,
        }
    }

    /// Effective weight of one raw field.
    pub const fn weight_value(self, field: u32, four_bit: FourBitDecode) -> i32 {
        match self {
            BitWidthVariant::Binary => {
                if field & 1 != 0 { 1 } else { -1 }
            }
            BitWidthVariant::TwoBit => {
                let magnitude = if field & 0b01 != 0 { 3 } else { 1 };
                if field & 0b10 != 0 { -magnitude } else { magnitude }
            }
            BitWidthVariant::FourBit => match four_bit {
                FourBitDecode::Multiply => nibble_twos_complement(field),
                FourBitDecode::ShiftAdd => {
                    let magnitude = 1 + 2 * (field & 1) as i32
                        + 4 * ((field >> 1) & 1) as i32
                        + 8 * ((field >> 2) & 1) as i32;
                    if field & 0x8 != 0 { -magnitude } else { magnitude }
                }
            },
            BitWidthVariant::FourBitTwosComplement => nibble_twos_complement(field),
            BitWidthVariant::EightBit | BitWidthVariant::PackedInt8 => byte_twos_complement(field),
            BitWidthVariant::FourBitShift => {
                let magnitude = 1 << (field & 7);
                if field & 0x8 != 0 { -magnitude } else { magnitude }
            }
        }
    }

    /// Largest |weight| any field can decode to.
    pub const fn max_weight_magnitude(self, four_bit: FourBitDecode) -> i64 {
        match self {
            BitWidthVariant::Binary => 1,
            BitWidthVariant::TwoBit => 3,
            BitWidthVariant::FourBit => match four_bit {
                FourBitDecode::Multiply => 8,
                FourBitDecode::ShiftAdd => 15,
            },
            BitWidthVariant::FourBitTwosComplement => 8,
            BitWidthVariant::EightBit | BitWidthVariant::PackedInt8 => 128,
            BitWidthVariant::FourBitShift => 128,
        }
    }
}

/// How [`BitWidthVariant::FourBit`] nibbles are evaluated.
///
/// This is a property of the target core, not of the data. The engine uses
/// exactly the decode it is configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FourBitDecode {
    /// Sign-extend the nibble to [-8, 7] and multiply.
    #[default]
    Multiply,
    /// Sign bit plus doubling bits, shift-and-add only.
    ShiftAdd,
}

/// Runtime engine options chosen by the integrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub four_bit: FourBitDecode,
    /// Skip zero activations on the shift-add 4-bit path. Never changes results.
    pub skip_zero_activations: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { four_bit: FourBitDecode::Multiply, skip_zero_activations: true }
    }
}

impl EngineConfig {
    /// Configuration for cores without an integer multiplier.
    pub const fn multiplier_free() -> Self {
        Self { four_bit: FourBitDecode::ShiftAdd, skip_zero_activations: true }
    }
}

/// Read-only packed weight buffer tagged with its encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightBlob<'w> {
    variant: BitWidthVariant,
    words: &'w [u32],
}

impl<'w> WeightBlob<'w> {
    pub const fn new(variant: BitWidthVariant, words: &'w [u32]) -> Self {
        Self { variant, words }
    }

    /// Build from a raw bit-width tag, rejecting unknown tags.
    pub const fn from_code(code: u32, words: &'w [u32]) -> EngineResult<Self> {
        match BitWidthVariant::from_code(code) {
            Ok(variant) => Ok(Self::new(variant, words)),
            Err(e) => Err(e),
        }
    }

    #[inline(always)]
    pub fn variant(&self) -> BitWidthVariant {
        self.variant
    }

    #[inline(always)]
    pub fn words(&self) -> &'w [u32] {
        self.words
    }

    /// Check the word count against `n_weights` logical weights.
    pub fn check_len(&self, n_weights: usize) -> EngineResult<()> {
        let expected = self
            .variant
            .words_for(n_weights)
            .ok_or(EngineError::size("weight blob words", usize::MAX, self.words.len()))?;
        if self.words.len() != expected {
            return Err(EngineError::size("weight blob words", expected, self.words.len()));
        }
        Ok(())
    }

    /// Raw field of logical weight `index`.
    pub fn field(&self, index: usize) -> Option<u32> {
        let bits = self.variant.bits();
        let pos = index * bits;
        let word = *self.words.get(pos / WORD_BITS)?;
        let shift = WORD_BITS - bits - pos % WORD_BITS;
        Some((word >> shift) & field_mask(bits))
    }

    /// Stream `len` raw fields starting at logical weight `start`.
    pub fn fields(&self, start: usize, len: usize) -> Fields<'w> {
        let bits = self.variant.bits() as u32;
        let pos = start * bits as usize;
        let first = pos / WORD_BITS;
        let within = (pos % WORD_BITS) as u32;
        let (chunk, left, next_word) = if within == 0 {
            (0, 0, first)
        } else {
            let word = self.words.get(first).copied().unwrap_or(0);
            (word << within, (WORD_BITS as u32 - within) / bits, first + 1)
        };
        Fields { words: self.words, next_word, chunk, left, bits, remaining: len }
    }
}

/// Iterator over raw fields, shifting each word left as fields are consumed.
#[derive(Debug, Clone)]
pub struct Fields<'w> {
    words: &'w [u32],
    next_word: usize,
    chunk: u32,
    left: u32,
    bits: u32,
    remaining: usize,
}

impl Iterator for Fields<'_> {
    type Item = u32;

    #[inline(always)]
    fn next(&mut self) -> Option<u32> {
        if self.remaining == 0 {
            return None;
        }
        if self.left == 0 {
            self.chunk = *self.words.get(self.next_word)?;
            self.next_word += 1;
            self.left = WORD_BITS as u32 / self.bits;
        }
        let field = self.chunk >> (WORD_BITS as u32 - self.bits);
        self.chunk = self.chunk.wrapping_shl(self.bits);
        self.left -= 1;
        self.remaining -= 1;
        Some(field)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

/// Per-element arithmetic for one encoding under one engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightCodec {
    variant: BitWidthVariant,
    config: EngineConfig,
}

impl WeightCodec {
    pub const fn new(variant: BitWidthVariant, config: EngineConfig) -> Self {
        Self { variant, config }
    }

    pub fn variant(&self) -> BitWidthVariant {
        self.variant
    }

    /// Signed contribution of one activation against one raw field.
    #[inline(always)]
    pub fn contribution(&self, activation: i32, field: u32) -> i32 {
        match self.variant {
            BitWidthVariant::Binary => binary(activation, field),
            BitWidthVariant::TwoBit => two_bit(activation, field),
            BitWidthVariant::FourBit => match self.config.four_bit {
                FourBitDecode::ShiftAdd => four_bit_shift_add(activation, field),
                FourBitDecode::Multiply => activation * nibble_twos_complement(field),
            },
            BitWidthVariant::FourBitTwosComplement => activation * nibble_twos_complement(field),
            BitWidthVariant::EightBit | BitWidthVariant::PackedInt8 => {
                activation * byte_twos_complement(field)
            }
            BitWidthVariant::FourBitShift => shift_coded(activation, field),
        }
    }

    /// Σ contribution(activation_i, field_i) over the zipped streams.
    ///
    /// The variant is matched once so each inner loop stays branch-light.
    pub fn dot(&self, activations: &[i8], fields: Fields<'_>) -> i32 {
        let pairs = activations.iter().map(|&a| a as i32).zip(fields);
        match self.variant {
            BitWidthVariant::Binary => pairs.map(|(a, f)| binary(a, f)).sum(),
            BitWidthVariant::TwoBit => pairs.map(|(a, f)| two_bit(a, f)).sum(),
            BitWidthVariant::FourBit => match self.config.four_bit {
                FourBitDecode::ShiftAdd if self.config.skip_zero_activations => pairs
                    .filter(|&(a, _)| a != 0)
                    .map(|(a, f)| four_bit_shift_add(a, f))
                    .sum(),
                FourBitDecode::ShiftAdd => pairs.map(|(a, f)| four_bit_shift_add(a, f)).sum(),
                FourBitDecode::Multiply => pairs.map(|(a, f)| a * nibble_twos_complement(f)).sum(),
            },
            BitWidthVariant::FourBitTwosComplement => {
                pairs.map(|(a, f)| a * nibble_twos_complement(f)).sum()
            }
            BitWidthVariant::EightBit | BitWidthVariant::PackedInt8 => {
                pairs.map(|(a, f)| a * byte_twos_complement(f)).sum()
            }
            BitWidthVariant::FourBitShift => pairs.map(|(a, f)| shift_coded(a, f)).sum(),
        }
    }
}

#[inline(always)]
const fn field_mask(bits: usize) -> u32 {
    (1u32 << bits) - 1
}

#[inline(always)]
fn signed(activation: i32, negative: bool) -> i32 {
    if negative { -activation } else { activation }
}

#[inline(always)]
fn binary(activation: i32, field: u32) -> i32 {
    signed(activation, field & 1 == 0)
}

#[inline(always)]
fn two_bit(activation: i32, field: u32) -> i32 {
    let term = signed(activation, field & 0b10 != 0);
    if field & 0b01 != 0 { term + (term << 1) } else { term }
}

#[inline(always)]
fn four_bit_shift_add(activation: i32, field: u32) -> i32 {
    let term = signed(activation, field & 0x8 != 0);
    let mut sum = term;
    if field & 0x1 != 0 { sum += term << 1; }
    if field & 0x2 != 0 { sum += term << 2; }
    if field & 0x4 != 0 { sum += term << 3; }
    sum
}

#[inline(always)]
fn shift_coded(activation: i32, field: u32) -> i32 {
    signed(activation, field & 0x8 != 0) << (field & 7)
}

#[inline(always)]
const fn nibble_twos_complement(field: u32) -> i32 {
    ((field << 28) as i32) >> 28
}

#[inline(always)]
const fn byte_twos_complement(field: u32) -> i32 {
    field as u8 as i8 as i32
}
