//! Ephemeral frame container.
//!
//! A `Frame` lives for exactly one loop cycle:
//! - Captured by a `FrameSource`
//! - Handed by reference to one `DetectionBackend`
//! - Dropped (and zeroized) before the next cycle starts
//!
//! Frames are deliberately not `Clone`; nothing downstream of a backend call
//! may keep pixels around.

use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use std::time::Instant;
use zeroize::Zeroize;

/// Packed RGB8 frame.
pub struct Frame {
    /// Row-major RGB bytes, `width * height * 3` long.
    data: Vec<u8>,

    pub width: u32,
    pub height: u32,

    /// Monotonic capture instant (for latency logging only).
    captured_at: Instant,
}

// Explicitly NOT implementing Clone: a frame is consumed within one cycle.

impl Frame {
    /// Wrap packed RGB8 pixels. Fails when the buffer does not match the dimensions.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = rgb_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{} frame, received {}",
                expected,
                width,
                height,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            captured_at: Instant::now(),
        })
    }

    /// A frame filled with one colour. Handy for synthetic sources and tests.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Result<Self> {
        let len = rgb_len(width, height)?;
        let mut data = Vec::with_capacity(len);
        for _ in 0..(len / 3) {
            data.extend_from_slice(&rgb);
        }
        Self::new(data, width, height)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Read-only pixel access for detection backends.
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Milliseconds since the frame was captured.
    pub fn age_ms(&self) -> u128 {
        self.captured_at.elapsed().as_millis()
    }

    /// Encode the frame as a baseline JPEG for transport.
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.data.len() / 8);
        JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
            .encode(&self.data, self.width, self.height, ExtendedColorType::Rgb8)
            .context("encode frame as jpeg")?;
        Ok(out)
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
            .finish_non_exhaustive()
    }
}

fn rgb_len(width: u32, height: u32) -> Result<usize> {
    if width == 0 || height == 0 {
        return Err(anyhow!("frame dimensions must be non-zero"));
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(3))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}
