//! Conversion of the analyzer's native RGB565 frame into RGB888.

use crate::error::{Error, Result};

/// A pixel in the device's native 5-6-5 format, sent big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pixel565(pub u16);

/// One byte per channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pixel888 {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Pixel565 {
    pub fn from_be_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_be_bytes(bytes))
    }
}

impl From<Pixel565> for Pixel888 {
    // Channels are widened by shifting into the high bits; the low bits stay zero.
    fn from(pixel: Pixel565) -> Self {
        let [msb, lsb] = pixel.0.to_be_bytes();
        Self {
            red: msb & 0xF8,
            green: ((msb & 0x07) << 5) | ((lsb & 0xE0) >> 3),
            blue: (lsb & 0x1F) << 3,
        }
    }
}

impl Pixel888 {
    pub fn to_bytes(self) -> [u8; 3] {
        [self.red, self.green, self.blue]
    }
}

/// Inverts every channel of an RGB888 buffer, e.g. for printing on white.
pub fn invert_colors(rgb: &mut [u8]) {
    for byte in rgb {
        *byte ^= 0xFF;
    }
}

/// Zeroes the last pixel of every native raster line. The hardware leaves
/// random garbage there on some lines.
pub fn fix_known_artifact(buffer: &mut [u8], width: usize, height: usize) {
    if width == 0 {
        return;
    }
    for line in buffer.chunks_exact_mut(width * 2).take(height) {
        let end = line.len();
        line[end - 2..].fill(0);
    }
}

/// Rewrites `pixel_count` native pixels at the start of `buffer` into RGB888,
/// in place.
///
/// Pixels are processed from last to first. Pixel `i` is read from
/// `[2i, 2i+2)` and written to `[3i, 3i+3)`; since every later pixel has
/// already been read, the larger output never overwrites unread input.
/// `buffer` must hold at least `pixel_count * 3` bytes.
pub fn convert_565_to_888(buffer: &mut [u8], pixel_count: usize) -> Result<()> {
    let needed = pixel_count * 3;
    if buffer.len() < needed {
        return Err(Error::BufferTooSmall {
            needed,
            actual: buffer.len(),
        });
    }
    for i in (0..pixel_count).rev() {
        let native = Pixel565::from_be_bytes([buffer[2 * i], buffer[2 * i + 1]]);
        let rgb = Pixel888::from(native).to_bytes();
        buffer[3 * i..3 * i + 3].copy_from_slice(&rgb);
    }
    Ok(())
}
