//! Input samples: labelled fixtures, pixel quantization and the capture
//! transport framing.
//!
//! The capture side sends a start byte `0xAA` followed by exactly N raw int8
//! pixels in row-major order. `FrameReceiver` reassembles that stream one
//! byte at a time without touching any peripheral; the caller owns the UART.

use crate::error::{EngineError, EngineResult};

/// A labelled pixel buffer, used for validation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample<'s> {
    pub pixels: &'s [i8],
    pub label: u8,
}

impl<'s> Sample<'s> {
    pub const fn new(pixels: &'s [i8], label: u8) -> Self {
        Self { pixels, label }
    }
}

/// Quantize one normalized pixel: `round(value / scale + zero_point)`,
/// clamped to int8.
pub fn quantize_pixel(value: f32, scale: f32, zero_point: i32) -> i8 {
    let q = libm::roundf(value / scale + zero_point as f32) as i64;
    q.clamp(i8::MIN as i64, i8::MAX as i64) as i8
}

/// Quantize a whole row-major image into `out`, which must be the same length.
pub fn quantize_image(
    values: &[f32],
    scale: f32,
    zero_point: i32,
    out: &mut [i8],
) -> EngineResult<()> {
    if values.len() != out.len() {
        return Err(EngineError::size("quantized image", values.len(), out.len()));
    }
    for (q, &v) in out.iter_mut().zip(values) {
        *q = quantize_pixel(v, scale, zero_point);
    }
    Ok(())
}

/// Start-of-frame marker on the capture link.
pub const FRAME_START: u8 = 0xAA;

/// Byte-at-a-time receiver for `0xAA` + N pixel frames.
///
/// Bytes are discarded until a start byte is seen; after that the next N
/// bytes are pixels regardless of value (a pixel may equal `0xAA`).
#[derive(Debug, Clone)]
pub struct FrameReceiver<const N: usize> {
    buf: [i8; N],
    filled: usize,
    synced: bool,
}

impl<const N: usize> FrameReceiver<N> {
    pub const fn new() -> Self {
        Self { buf: [0; N], filled: 0, synced: false }
    }

    /// Feed one byte. Returns the completed frame when its last pixel arrives.
    pub fn push(&mut self, byte: u8) -> Option<&[i8; N]> {
        if !self.synced {
            if byte == FRAME_START {
                self.synced = true;
                self.filled = 0;
                if N == 0 {
                    self.synced = false;
                    return Some(&self.buf);
                }
            }
            return None;
        }

        self.buf[self.filled] = byte as i8;
        self.filled += 1;
        if self.filled == N {
            self.synced = false;
            self.filled = 0;
            log::debug!("frame of {} pixels received", N);
            return Some(&self.buf);
        }
        None
    }

    /// Drop any partial frame and wait for the next start byte.
    pub fn reset(&mut self) {
        self.synced = false;
        self.filled = 0;
    }

    pub fn is_synced(&self) -> bool {
        self.synced
    }

    /// Pixels received for the frame in progress.
    pub fn pending(&self) -> usize {
        self.filled
    }
}

impl<const N: usize> Default for FrameReceiver<N> {
    fn default() -> Self {
        Self::new()
    }
}
