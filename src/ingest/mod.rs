//! Frame sources.
//!
//! This module provides different sources for frames:
//! - Synthetic scenes (`stub://name`), for tests and demos
//! - Still images or a directory of images, looped (`file:///path` or a bare path)
//! - HTTP JPEG snapshot endpoints (`http://camera/snapshot.jpg`)
//!
//! Every source produces `Frame` instances that live for one detection cycle.
//! Sources MUST NOT retain frames after handing them out.

use anyhow::{anyhow, Result};
use url::Url;

use crate::frame::Frame;

pub mod file;
pub mod snapshot;
pub mod synthetic;

pub use file::FileSource;
pub use snapshot::SnapshotSource;
pub use synthetic::SyntheticSource;

/// Supplies the current frame for inference.
///
/// The detection loop calls `open` once per session, then `next_frame` once per
/// cycle from the loop worker thread.
pub trait FrameSource: Send {
    /// Source identifier used in logs.
    fn name(&self) -> &str;

    /// Acquire the underlying device or stream. Failing here keeps the loop idle.
    fn open(&mut self) -> Result<()>;

    /// Capture the next frame.
    fn next_frame(&mut self) -> Result<Frame>;

    /// Frame dimensions, once known.
    fn dimensions(&self) -> Option<(u32, u32)>;

    /// Release the underlying device. Called when the loop stops.
    fn close(&mut self) {}
}

/// Configuration for choosing and sizing a frame source.
#[derive(Clone, Debug)]
pub struct SourceConfig {
    /// `stub://name`, `file:///path`, a bare filesystem path, or `http(s)://...`.
    pub url: String,
    /// Frame width for synthetic sources.
    pub width: u32,
    /// Frame height for synthetic sources.
    pub height: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: "stub://front_camera".to_string(),
            width: 640,
            height: 480,
        }
    }
}

/// Build a frame source from its URL scheme.
pub fn open_source(config: &SourceConfig) -> Result<Box<dyn FrameSource>> {
    let raw = config.url.trim();
    if raw.is_empty() {
        return Err(anyhow!("frame source url is empty"));
    }
    if !raw.contains("://") {
        return Ok(Box::new(FileSource::new(raw)));
    }

    let url = Url::parse(raw).map_err(|e| anyhow!("invalid frame source url '{}': {}", raw, e))?;
    match url.scheme() {
        "stub" => Ok(Box::new(SyntheticSource::new(
            raw,
            config.width,
            config.height,
        ))),
        "file" => {
            let path = url
                .to_file_path()
                .map_err(|_| anyhow!("file url '{}' has no local path", raw))?;
            Ok(Box::new(FileSource::new(path)))
        }
        "http" | "https" => Ok(Box::new(SnapshotSource::new(url))),
        other => Err(anyhow!(
            "unsupported frame source scheme '{}'; expected stub, file or http(s)",
            other
        )),
    }
}
