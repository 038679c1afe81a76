//! HTTP snapshot frame source.
//!
//! Fetches one JPEG per cycle from a camera's snapshot endpoint (ESP32-CAM
//! `/capture`, IP camera `snapshot.jpg`, ...) and decodes it in memory.

use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::time::Duration;
use url::Url;

use super::FrameSource;
use crate::frame::Frame;

const MAX_JPEG_BYTES: u64 = 5 * 1024 * 1024;

pub struct SnapshotSource {
    url: Url,
    name: String,
    agent: ureq::Agent,
    opened: bool,
    frame_count: u64,
    dimensions: Option<(u32, u32)>,
}

impl SnapshotSource {
    pub fn new(url: Url) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(5))
            .build();
        Self {
            name: url.to_string(),
            url,
            agent,
            opened: false,
            frame_count: 0,
            dimensions: None,
        }
    }

    pub fn frames_captured(&self) -> u64 {
        self.frame_count
    }

    fn fetch_jpeg(&self) -> Result<Vec<u8>> {
        let response = self
            .agent
            .get(self.url.as_str())
            .call()
            .with_context(|| format!("fetch jpeg snapshot from {}", self.url))?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_JPEG_BYTES)
            .read_to_end(&mut bytes)
            .context("read jpeg snapshot")?;
        if bytes.is_empty() {
            return Err(anyhow!("empty jpeg snapshot"));
        }
        Ok(bytes)
    }
}

impl FrameSource for SnapshotSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> Result<()> {
        // A first fetch proves the camera answers before the loop starts.
        let frame = decode_jpeg(&self.fetch_jpeg()?)?;
        self.dimensions = Some(frame.dimensions());
        self.opened = true;
        log::info!(
            "frame source {} opened ({}x{})",
            self.name,
            frame.width,
            frame.height
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        if !self.opened {
            return Err(anyhow!("snapshot source {} not opened", self.name));
        }
        let frame = decode_jpeg(&self.fetch_jpeg()?)?;
        self.frame_count += 1;
        self.dimensions = Some(frame.dimensions());
        Ok(frame)
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    fn close(&mut self) {
        self.opened = false;
    }
}

fn decode_jpeg(bytes: &[u8]) -> Result<Frame> {
    let image = image::load_from_memory(bytes).context("decode jpeg")?;
    let rgb = image.into_rgb8();
    let (width, height) = rgb.dimensions();
    Frame::new(rgb.into_raw(), width, height)
}
