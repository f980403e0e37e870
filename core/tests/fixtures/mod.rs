//! 12×12 digit fixtures for end-to-end tests.
//!
//! Trained weights are produced offline and are not part of the repository,
//! so the symmetric 8-bit fixture model is a template matcher built from the
//! bitmaps below: layer 1 correlates the image with each digit prototype,
//! layers 2 and 3 pass those ten scores through. The captured image is a
//! hand-drawn "8" with three pixels off the prototype.

#![allow(dead_code)]

use bitmcu_core::{BitWidthVariant, EngineResult, FourBitDecode, LayerSpec, WeightBlob};

use crate::common::pack_weights;

pub const SIDE: usize = 12;
pub const PIXELS: usize = SIDE * SIDE;
pub const HIDDEN: usize = 64;
pub const CLASSES: usize = 10;

/// Label documented for the captured image.
pub const CAPTURED_LABEL: u8 = 8;

pub const CAPTURED_IMAGE: &str = "
    ............
    ...######...
    ..##....##..
    ..##....##..
    ..#.....##..
    ...######...
    ..##....##..
    ..##....##..
    ..##.....#..
    ..##....##..
    ...#####....
    ............
";

pub const PROTOTYPES: [&str; CLASSES] = [
    // 0
    "
    ............
    ....####....
    ...##..##...
    ..##....##..
    ..##....##..
    ..##....##..
    ..##....##..
    ..##....##..
    ..##....##..
    ...##..##...
    ....####....
    ............
    ",
    // 1
    "
    ............
    .....##.....
    ....###.....
    ...####.....
    .....##.....
    .....##.....
    .....##.....
    .....##.....
    .....##.....
    .....##.....
    ...######...
    ............
    ",
    // 2
    "
    ............
    ...#####....
    ..##...##...
    .......##...
    .......##...
    ......##....
    .....##.....
    ....##......
    ...##.......
    ..##........
    ..#######...
    ............
    ",
    // 3
    "
    ............
    ..######....
    .......##...
    .......##...
    .......##...
    ...#####....
    .......##...
    .......##...
    .......##...
    .......##...
    ..######....
    ............
    ",
    // 4
    "
    ............
    ..##...##...
    ..##...##...
    ..##...##...
    ..##...##...
    ..#######...
    .......##...
    .......##...
    .......##...
    .......##...
    .......##...
    ............
    ",
    // 5
    "
    ............
    ..#######...
    ..##........
    ..##........
    ..##........
    ..######....
    .......##...
    .......##...
    .......##...
    ..##...##...
    ...#####....
    ............
    ",
    // 6
    "
    ............
    ....####....
    ...##.......
    ..##........
    ..##........
    ..######....
    ..##...##...
    ..##...##...
    ..##...##...
    ..##...##...
    ...#####....
    ............
    ",
    // 7
    "
    ............
    ..########..
    .......##...
    ......##....
    ......##....
    .....##.....
    .....##.....
    ....##......
    ....##......
    ...##.......
    ...##.......
    ............
    ",
    // 8
    "
    ............
    ...######...
    ..##....##..
    ..##....##..
    ..##....##..
    ...######...
    ..##....##..
    ..##....##..
    ..##....##..
    ..##....##..
    ...######...
    ............
    ",
    // 9
    "
    ............
    ...######...
    ..##....##..
    ..##....##..
    ..##....##..
    ...#######..
    ........##..
    ........##..
    ........##..
    .......##...
    ...####.....
    ............
    ",
];

/// Parse `#`/`.` art into lit flags, row-major.
pub fn bitmap(art: &str) -> Vec<bool> {
    let lit: Vec<bool> = art
        .lines()
        .map(str::trim)
        .filter(|row| !row.is_empty())
        .flat_map(|row| row.chars().map(|c| c == '#'))
        .collect();
    assert_eq!(lit.len(), PIXELS, "fixture art must be {SIDE}x{SIDE}");
    lit
}

/// Binary image quantized the way the capture pipeline does: lit 127, dark -128.
pub fn pixels(art: &str) -> Vec<i8> {
    bitmap(art).into_iter().map(|lit| if lit { 127 } else { -128 }).collect()
}

/// Packed weights of the 144 → 64 → 64 → 10 template model.
pub struct TemplateModel {
    pub l1: Vec<u32>,
    pub l2: Vec<u32>,
    pub l3: Vec<u32>,
}

impl TemplateModel {
    pub fn build() -> Self {
        let variant = BitWidthVariant::EightBit;
        let decode = FourBitDecode::Multiply;

        let mut w1 = vec![0i32; HIDDEN * PIXELS];
        for (class, art) in PROTOTYPES.iter().enumerate() {
            for (i, lit) in bitmap(art).into_iter().enumerate() {
                w1[class * PIXELS + i] = if lit { 1 } else { -1 };
            }
        }

        let mut w2 = vec![0i32; HIDDEN * HIDDEN];
        for class in 0..CLASSES {
            w2[class * HIDDEN + class] = 1;
        }

        let mut w3 = vec![0i32; CLASSES * HIDDEN];
        for class in 0..CLASSES {
            w3[class * HIDDEN + class] = 1;
        }

        Self {
            l1: pack_weights(variant, decode, &w1),
            l2: pack_weights(variant, decode, &w2),
            l3: pack_weights(variant, decode, &w3),
        }
    }

    pub fn layers(&self) -> EngineResult<[LayerSpec<'_>; 3]> {
        let variant = BitWidthVariant::EightBit;
        Ok([
            LayerSpec::new(WeightBlob::new(variant, &self.l1), PIXELS, HIDDEN)?,
            LayerSpec::new(WeightBlob::new(variant, &self.l2), HIDDEN, HIDDEN)?,
            LayerSpec::new(WeightBlob::new(variant, &self.l3), HIDDEN, CLASSES)?,
        ])
    }
}
