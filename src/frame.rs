//! Owned pixel frames.
//!
//! A `Frame` is produced once by a frame source and never mutated afterwards.
//! The overlay renderer derives new frames from copies; the display slot holds
//! at most one current frame behind `Arc`. Pixel data is wiped on drop so
//! released screen captures do not linger in freed memory.

use std::time::Instant;

use zeroize::Zeroize;

/// Bytes per pixel. Frames are tightly packed BGRA, no row padding.
pub const BYTES_PER_PIXEL: usize = 4;

/// An immutable-once-produced BGRA pixel buffer tagged with its capture time.
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    captured_at: Instant,
}

impl Frame {
    /// Wrap a tightly packed BGRA buffer. Panics in debug builds when the
    /// buffer length does not match the dimensions; callers construct frames
    /// from buffers they sized themselves.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        debug_assert_eq!(
            data.len(),
            width as usize * height as usize * BYTES_PER_PIXEL
        );
        Self {
            data,
            width,
            height,
            captured_at: Instant::now(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Monotonic capture instant, used for pacing and age checks.
    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    /// Read-only pixel bytes (BGRA, row-major).
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// BGRA bytes of one pixel. `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let mut px = [0u8; 4];
        px.copy_from_slice(&self.data[idx..idx + BYTES_PER_PIXEL]);
        Some(px)
    }

    /// Copy of the pixel bytes, for deriving a decorated frame.
    pub fn pixels_cloned(&self) -> Vec<u8> {
        self.data.clone()
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        self.data.zeroize();
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, bgra: [u8; 4]) -> Frame {
        let mut data = Vec::with_capacity(width as usize * height as usize * 4);
        for _ in 0..width * height {
            data.extend_from_slice(&bgra);
        }
        Frame::new(data, width, height)
    }

    #[test]
    fn pixel_access_respects_bounds() {
        let frame = solid(4, 3, [1, 2, 3, 255]);
        assert_eq!(frame.pixel(0, 0), Some([1, 2, 3, 255]));
        assert_eq!(frame.pixel(3, 2), Some([1, 2, 3, 255]));
        assert_eq!(frame.pixel(4, 0), None);
        assert_eq!(frame.pixel(0, 3), None);
    }

    #[test]
    fn cloned_pixels_are_independent() {
        let frame = solid(2, 2, [9, 9, 9, 255]);
        let mut copy = frame.pixels_cloned();
        copy[0] = 0;
        assert_eq!(frame.data()[0], 9);
    }
}
