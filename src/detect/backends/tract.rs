#![cfg(feature = "backend-tract")]

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use image::RgbImage;
use tract_onnx::prelude::*;

use crate::detect::backends::local::{Model, ModelLoader};
use crate::detect::result::{BoundingBox, Detection};
use crate::frame::Frame;

type Plan = TypedRunnableModel<TypedModel>;

/// COCO class names, indexed by class id.
pub const COCO_LABELS: &[&str] = &[
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich",
    "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote",
    "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator", "book",
    "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

/// Loads an ONNX detector with tract.
///
/// The model takes a `1x3xHxW` f32 RGB tensor in `0..1` and produces
/// `1xNx6` rows of `[x1, y1, x2, y2, score, class_id]` in input pixels.
pub struct TractLoader {
    model_path: PathBuf,
    input_width: u32,
    input_height: u32,
    labels: Vec<String>,
}

impl TractLoader {
    pub fn new<P: AsRef<Path>>(model_path: P, input_width: u32, input_height: u32) -> Self {
        Self {
            model_path: model_path.as_ref().to_path_buf(),
            input_width,
            input_height,
            labels: COCO_LABELS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replace the COCO labels with one label per line from `path`.
    pub fn with_labels_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read labels from {}", path.display()))?;
        self.labels = raw
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();
        if self.labels.is_empty() {
            return Err(anyhow!("labels file {} is empty", path.display()));
        }
        Ok(self)
    }
}

impl ModelLoader for TractLoader {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn load(&self) -> Result<Box<dyn Model>> {
        let plan = tract_onnx::onnx()
            .model_for_path(&self.model_path)
            .with_context(|| {
                format!(
                    "failed to load ONNX model from {}",
                    self.model_path.display()
                )
            })?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, self.input_height as usize, self.input_width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Box::new(TractModel {
            plan,
            input_width: self.input_width,
            input_height: self.input_height,
            labels: self.labels.clone(),
        }))
    }
}

pub struct TractModel {
    plan: Plan,
    input_width: u32,
    input_height: u32,
    labels: Vec<String>,
}

impl TractModel {
    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        let rgb = RgbImage::from_raw(frame.width, frame.height, frame.pixels().to_vec())
            .ok_or_else(|| anyhow!("frame buffer does not match its dimensions"))?;
        let resized = if rgb.dimensions() == (self.input_width, self.input_height) {
            rgb
        } else {
            imageops::resize(
                &rgb,
                self.input_width,
                self.input_height,
                FilterType::Triangle,
            )
        };

        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.input_height as usize, self.input_width as usize),
            |(_, channel, y, x)| resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
        );
        Ok(input.into_tensor())
    }

    fn extract_detections(&self, outputs: TVec<TValue>, frame: &Frame) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let rows = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = rows.shape().to_vec();
        let row_len = *shape.last().unwrap_or(&0);
        if row_len < 6 {
            return Err(anyhow!("unexpected model output shape {:?}", shape));
        }

        let scale_x = frame.width as f32 / self.input_width as f32;
        let scale_y = frame.height as f32 / self.input_height as f32;
        let flat: Vec<f32> = rows.iter().copied().collect();

        let mut detections = Vec::new();
        for row in flat.chunks_exact(row_len) {
            let score = row[4];
            if !score.is_finite() || score <= 0.0 {
                continue;
            }
            let class_id = row[5].max(0.0) as usize;
            let class = self
                .labels
                .get(class_id)
                .cloned()
                .unwrap_or_else(|| format!("class_{class_id}"));
            let bbox = BoundingBox::from_corners(
                row[0] * scale_x,
                row[1] * scale_y,
                row[2] * scale_x,
                row[3] * scale_y,
            );
            detections.push(Detection::new(class, score.min(1.0), bbox));
        }
        Ok(detections)
    }
}

impl Model for TractModel {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let input = self.build_input(frame)?;
        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.extract_detections(outputs, frame)
    }
}
