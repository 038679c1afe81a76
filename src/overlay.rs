//! In-memory drawing surface.
//!
//! `Overlay` keeps a transparent RGBA canvas the size of the current frame and
//! strokes detection boxes onto it, alongside the debug/banner/loading widget
//! state. It has no window; callers read it back (terminal UI, tests).

use image::{Rgba, RgbaImage};

use crate::alert::Surface;
use crate::detect::BoundingBox;

const STROKE: Rgba<u8> = Rgba([255, 0, 0, 255]);
const STROKE_WIDTH: u32 = 4;

#[derive(Clone, Debug, PartialEq)]
pub struct DrawnLabel {
    pub text: String,
    pub x: f32,
    pub y: f32,
}

pub struct Overlay {
    canvas: RgbaImage,
    labels: Vec<DrawnLabel>,
    debug_text: String,
    banner_visible: bool,
    loading: Option<String>,
}

impl Overlay {
    pub fn new() -> Self {
        Self {
            canvas: RgbaImage::new(1, 1),
            labels: Vec::new(),
            debug_text: String::new(),
            banner_visible: false,
            loading: None,
        }
    }

    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn labels(&self) -> &[DrawnLabel] {
        &self.labels
    }

    pub fn debug_text(&self) -> &str {
        &self.debug_text
    }

    pub fn banner_visible(&self) -> bool {
        self.banner_visible
    }

    pub fn loading(&self) -> Option<&str> {
        self.loading.as_deref()
    }

    /// Count of stroked pixels; zero after `clear`.
    pub fn painted_pixels(&self) -> usize {
        self.canvas.pixels().filter(|p| p[3] != 0).count()
    }

    fn stroke_rect(&mut self, bbox: &BoundingBox) {
        let (cw, ch) = self.canvas.dimensions();
        if cw == 0 || ch == 0 {
            return;
        }
        let x0 = bbox.x.max(0.0) as u32;
        let y0 = bbox.y.max(0.0) as u32;
        let x1 = ((bbox.x + bbox.width).max(0.0) as u32).min(cw - 1);
        let y1 = ((bbox.y + bbox.height).max(0.0) as u32).min(ch - 1);
        if x0 > x1 || y0 > y1 {
            return;
        }

        for x in x0..=x1 {
            for t in 0..STROKE_WIDTH {
                self.put(x, y0 + t);
                self.put(x, y1.saturating_sub(t));
            }
        }
        for y in y0..=y1 {
            for t in 0..STROKE_WIDTH {
                self.put(x0 + t, y);
                self.put(x1.saturating_sub(t), y);
            }
        }
    }

    fn put(&mut self, x: u32, y: u32) {
        if x < self.canvas.width() && y < self.canvas.height() {
            self.canvas.put_pixel(x, y, STROKE);
        }
    }
}

impl Default for Overlay {
    fn default() -> Self {
        Self::new()
    }
}

impl Surface for Overlay {
    fn clear(&mut self, width: u32, height: u32) {
        let (width, height) = (width.max(1), height.max(1));
        if self.canvas.dimensions() == (width, height) {
            self.canvas.pixels_mut().for_each(|p| *p = Rgba([0, 0, 0, 0]));
        } else {
            self.canvas = RgbaImage::new(width, height);
        }
        self.labels.clear();
    }

    fn draw_box(&mut self, bbox: &BoundingBox, label: &str, label_origin: (f32, f32)) {
        self.stroke_rect(bbox);
        self.labels.push(DrawnLabel {
            text: label.to_string(),
            x: label_origin.0,
            y: label_origin.1,
        });
    }

    fn set_debug_text(&mut self, text: &str) {
        self.debug_text = text.to_string();
    }

    fn set_banner_visible(&mut self, visible: bool) {
        self.banner_visible = visible;
    }

    fn set_loading(&mut self, message: Option<&str>) {
        self.loading = message.map(str::to_string);
    }
}
