//! Host-side helpers for building packed weight blobs in tests.

#![allow(dead_code)]

use bitmcu_core::{BitWidthVariant, FourBitDecode};

/// Pack raw fields MSB-first into 32-bit words.
pub fn pack_fields(variant: BitWidthVariant, fields: &[u32]) -> Vec<u32> {
    let bits = variant.bits();
    let mask = (1u32 << bits) - 1;
    let mut words = vec![0u32; variant.words_for(fields.len()).unwrap()];
    for (i, &f) in fields.iter().enumerate() {
        let pos = i * bits;
        let shift = 32 - bits - pos % 32;
        words[pos / 32] |= (f & mask) << shift;
    }
    words
}

/// Raw field whose decoded weight is `weight`.
pub fn encode_weight(variant: BitWidthVariant, decode: FourBitDecode, weight: i32) -> u32 {
    (0..1u32 << variant.bits())
        .find(|&f| variant.weight_value(f, decode) == weight)
        .unwrap_or_else(|| panic!("{variant:?} cannot encode {weight}"))
}

/// Pack logical weights (output-major) for `variant`.
pub fn pack_weights(variant: BitWidthVariant, decode: FourBitDecode, weights: &[i32]) -> Vec<u32> {
    let fields: Vec<u32> = weights.iter().map(|&w| encode_weight(variant, decode, w)).collect();
    pack_fields(variant, &fields)
}

/// Deterministic int8 stream (64-bit LCG, high byte).
pub fn lcg_i8(seed: u64, n: usize) -> Vec<i8> {
    let mut state = seed;
    (0..n)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (state >> 56) as u8 as i8
        })
        .collect()
}

/// Reference dot product: Σ a · weight_value(field), no shortcuts.
pub fn reference_dot(
    variant: BitWidthVariant,
    decode: FourBitDecode,
    activations: &[i8],
    fields: &[u32],
) -> i32 {
    activations
        .iter()
        .zip(fields)
        .map(|(&a, &f)| a as i32 * variant.weight_value(f, decode))
        .sum()
}
