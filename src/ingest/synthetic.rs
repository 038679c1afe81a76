//! Synthetic frame source (`stub://`).
//!
//! Produces a moving gradient so consecutive frames differ. Always opens.

use anyhow::Result;

use super::FrameSource;
use crate::frame::Frame;

pub struct SyntheticSource {
    name: String,
    width: u32,
    height: u32,
    frame_count: u64,
    /// Simulated scene state; shifts every 50 frames.
    scene_state: u8,
    opened: bool,
}

impl SyntheticSource {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            frame_count: 0,
            scene_state: 0,
            opened: false,
        }
    }

    pub fn frames_captured(&self) -> u64 {
        self.frame_count
    }

    fn generate_pixels(&mut self) -> Vec<u8> {
        let pixel_count = (self.width as usize) * (self.height as usize) * 3;

        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }

        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count + self.scene_state as u64) % 256) as u8;
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> Result<()> {
        log::info!("frame source {} opened (synthetic)", self.name);
        self.opened = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        if !self.opened {
            anyhow::bail!("synthetic source {} not opened", self.name);
        }
        self.frame_count += 1;
        let pixels = self.generate_pixels();
        Frame::new(pixels, self.width, self.height)
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        Some((self.width, self.height))
    }

    fn close(&mut self) {
        self.opened = false;
    }
}
