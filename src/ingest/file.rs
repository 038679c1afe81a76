//! Local image frame source.
//!
//! `FileSource` replays a still image, or every image in a directory in name
//! order, as an endless camera feed. Decoding happens per frame; nothing is
//! cached between cycles.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

use super::FrameSource;
use crate::frame::Frame;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

pub struct FileSource {
    root: PathBuf,
    name: String,
    images: Vec<PathBuf>,
    cursor: usize,
    dimensions: Option<(u32, u32)>,
}

impl FileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let name = format!("file://{}", root.display());
        Self {
            root,
            name,
            images: Vec::new(),
            cursor: 0,
            dimensions: None,
        }
    }

    /// Number of images in the loop.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

impl FrameSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> Result<()> {
        let images = collect_images(&self.root)?;
        if images.is_empty() {
            return Err(anyhow!("no images found under {}", self.root.display()));
        }
        log::info!(
            "frame source {} opened ({} image(s))",
            self.name,
            images.len()
        );
        self.images = images;
        self.cursor = 0;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        if self.images.is_empty() {
            return Err(anyhow!("file source {} not opened", self.name));
        }
        let path = &self.images[self.cursor % self.images.len()];
        self.cursor = self.cursor.wrapping_add(1);

        let image = image::open(path).with_context(|| format!("decode {}", path.display()))?;
        let rgb = image.into_rgb8();
        let (width, height) = rgb.dimensions();
        self.dimensions = Some((width, height));
        Frame::new(rgb.into_raw(), width, height)
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    fn close(&mut self) {
        self.images.clear();
        self.cursor = 0;
    }
}

fn collect_images(root: &Path) -> Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    let entries =
        std::fs::read_dir(root).with_context(|| format!("read directory {}", root.display()))?;
    let mut images = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && has_image_extension(&path) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
