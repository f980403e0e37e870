//! Accumulator headroom at the widest supported layer.

mod common;

use bitmcu_core::*;
use pretty_assertions::assert_eq;

use common::pack_fields;

const N_OUT: usize = 2;

/// Field with the most negative decoded weight; its magnitude is the
/// encoding's maximum.
fn most_negative_field(variant: BitWidthVariant, decode: FourBitDecode) -> u32 {
    (0..1u32 << variant.bits())
        .min_by_key(|&f| variant.weight_value(f, decode))
        .unwrap()
}

fn configs() -> [EngineConfig; 3] {
    [
        EngineConfig::default(),
        EngineConfig::multiplier_free(),
        EngineConfig { four_bit: FourBitDecode::ShiftAdd, skip_zero_activations: false },
    ]
}

#[test]
fn widest_layer_saturates_exactly_at_headroom() {
    let _ = env_logger::builder().is_test(true).try_init();
    let acts = [-128i8; MAX_INPUT_WIDTH];

    for cfg in configs() {
        for variant in BitWidthVariant::ALL {
            let field = most_negative_field(variant, cfg.four_bit);
            let magnitude = -variant.weight_value(field, cfg.four_bit) as i64;
            assert_eq!(magnitude, variant.max_weight_magnitude(cfg.four_bit), "{variant:?}");

            let words = pack_fields(variant, &vec![field; MAX_INPUT_WIDTH * N_OUT]);
            let blob = WeightBlob::new(variant, &words);
            let bare = LayerSpec::new(blob, MAX_INPUT_WIDTH, N_OUT).unwrap();
            let bound = bare.dot_bound(&cfg);
            assert_eq!(bound, MAX_INPUT_WIDTH as i64 * 128 * magnitude);
            assert!(bare.worst_dot_bound() >= bound);

            let headroom = (i32::MAX as i64 - bare.worst_dot_bound()) as i32;
            let biases = [headroom, -headroom];
            let layer = bare.with_biases(&biases).unwrap();
            assert_eq!(layer.accumulator_bound(), i32::MAX as i64);
            let layers = [layer];
            let model = Model::with_config(&layers, cfg).unwrap();

            let mut out = [0i32; N_OUT];
            process(&acts, &layer, model.config(), &mut out).unwrap();
            assert_eq!(out[0] as i64, headroom as i64 + bound, "{variant:?} {cfg:?}");
            assert_eq!(out[1] as i64, bound - headroom as i64);
            if bound == bare.worst_dot_bound() {
                assert_eq!(out[0], i32::MAX);
            }

            let over = [headroom + 1, 0];
            assert_eq!(
                bare.with_biases(&over),
                Err(EngineError::AccumulatorOverflow { bound: i32::MAX as i64 + 1 })
            );
        }
    }
}

#[test]
fn saturating_bias_is_refused_before_inference() {
    // 32 binary weights of +1: the dot product alone reaches ±4096.
    let words = [u32::MAX];
    let layer = LayerSpec::new(WeightBlob::new(BitWidthVariant::Binary, &words), 32, 1).unwrap();
    assert_eq!(
        layer.with_biases(&[i32::MAX]),
        Err(EngineError::AccumulatorOverflow { bound: i32::MAX as i64 + 32 * 128 })
    );
    assert_eq!(
        layer.with_biases(&[i32::MIN + 1]),
        Err(EngineError::AccumulatorOverflow { bound: i32::MAX as i64 + 32 * 128 })
    );

    let fits = [i32::MAX - 32 * 128];
    let layer = layer.with_biases(&fits).unwrap();
    for cfg in configs() {
        let mut out = [0i32; 1];
        process(&[127; 32], &layer, &cfg, &mut out).unwrap();
        assert_eq!(out[0], i32::MAX - 32 * 128 + 32 * 127);
    }
}

#[test]
fn affine_switch_rechecks_headroom() {
    let words = vec![0u32; MAX_INPUT_WIDTH / 4];
    let blob = WeightBlob::new(BitWidthVariant::PackedInt8, &words);
    let symmetric_room = [i32::MAX - 784 * 128 * 128];
    let layer = LayerSpec::new(blob, MAX_INPUT_WIDTH, 1)
        .unwrap()
        .with_biases(&symmetric_room)
        .unwrap();

    let q = QuantParams::new(1.0, -128).unwrap();
    assert_eq!(
        layer.with_affine(q, q, -128).err(),
        Some(EngineError::AccumulatorOverflow {
            bound: i32::MAX as i64 - 784 * 128 * 128 + 784 * 255 * 255
        })
    );
}

#[test]
fn unbiased_extremes_fit_for_both_activation_signs() {
    for variant in BitWidthVariant::ALL {
        let cfg = EngineConfig::default();
        let mask = (1u32 << variant.bits()) - 1;
        for field in [0, mask, mask >> 1, 1 << (variant.bits() - 1)] {
            let w = variant.weight_value(field, cfg.four_bit) as i64;
            let words = pack_fields(variant, &vec![field; MAX_INPUT_WIDTH]);
            let layer = LayerSpec::new(WeightBlob::new(variant, &words), MAX_INPUT_WIDTH, 1).unwrap();
            for a in [i8::MIN, i8::MAX] {
                let mut out = [0i32; 1];
                process(&[a; MAX_INPUT_WIDTH], &layer, &cfg, &mut out).unwrap();
                assert_eq!(out[0] as i64, MAX_INPUT_WIDTH as i64 * a as i64 * w, "{variant:?} {field:#x}");
            }
        }
    }
}

#[test]
fn affine_extremes_fit_with_extreme_zero_points() {
    // (activation - zp_in) and (weight - zp_w) both reach ±255.
    let cases = [(127, 0x80u32, -128i8), (-128, 0x7F, 127)];
    for (zp, field, a) in cases {
        for variant in [BitWidthVariant::PackedInt8, BitWidthVariant::EightBit] {
            let words = pack_fields(variant, &vec![field; MAX_INPUT_WIDTH]);
            let q = QuantParams::new(1.0, zp).unwrap();
            let layer = LayerSpec::new(WeightBlob::new(variant, &words), MAX_INPUT_WIDTH, 1)
                .unwrap()
                .with_affine(q, q, zp)
                .unwrap();
            assert_eq!(layer.dot_bound(&EngineConfig::default()), 784 * 255 * 255);

            let layers = [layer];
            let model = Model::new(&layers).unwrap();
            let mut buffers = ScratchBuffers::<1>::new();
            let logits = model.forward(&[a; MAX_INPUT_WIDTH], &mut buffers.scratch()).unwrap().to_vec();
            assert_eq!(logits, vec![784 * 255 * 255]);
        }
    }
}

#[test]
fn wider_layers_are_refused() {
    let words = [0u32; 25];
    let blob = WeightBlob::new(BitWidthVariant::Binary, &words);
    assert_eq!(
        LayerSpec::new(blob, MAX_INPUT_WIDTH + 1, 1).err(),
        Some(EngineError::LayerTooWide { max: 784, actual: 785 })
    );
}
