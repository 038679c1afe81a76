use serde::Deserialize;

/// Axis-aligned box in frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(from = "[f32; 4]")]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build from corner coordinates `(x1, y1)`-`(x2, y2)`.
    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from([x, y, width, height]: [f32; 4]) -> Self {
        Self::new(x, y, width, height)
    }
}

/// One detected object. Produced by a backend, never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Detection {
    pub class: String,
    pub score: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(class: impl Into<String>, score: f32, bbox: BoundingBox) -> Self {
        Self {
            class: class.into(),
            score,
            bbox,
        }
    }

    /// Score rounded to whole percent.
    pub fn score_percent(&self) -> u32 {
        (self.score.clamp(0.0, 1.0) * 100.0).round() as u32
    }

    /// `"class (NN%)"`, as shown in the debug view.
    pub fn label(&self) -> String {
        format!("{} ({}%)", self.class, self.score_percent())
    }
}

/// Detections for one frame, in backend order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionResult {
    detections: Vec<Detection>,
}

impl DetectionResult {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Detection> {
        self.detections.iter()
    }

    /// Detections of one class, in order.
    pub fn of_class<'a>(&'a self, class: &'a str) -> impl Iterator<Item = &'a Detection> + 'a {
        self.detections.iter().filter(move |d| d.class == class)
    }

    pub fn contains_class(&self, class: &str) -> bool {
        self.of_class(class).next().is_some()
    }

    /// Drop detections below `threshold`.
    pub fn with_min_score(self, threshold: f32) -> Self {
        Self {
            detections: self
                .detections
                .into_iter()
                .filter(|d| d.score >= threshold)
                .collect(),
        }
    }
}

impl From<Vec<Detection>> for DetectionResult {
    fn from(detections: Vec<Detection>) -> Self {
        Self::new(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_detection() {
        let d: Detection =
            serde_json::from_str(r#"{"class":"bear","score":0.874,"bbox":[10,20,30.5,40]}"#)
                .unwrap();
        assert_eq!(d.class, "bear");
        assert_eq!(d.bbox, BoundingBox::new(10.0, 20.0, 30.5, 40.0));
        assert_eq!(d.label(), "bear (87%)");
    }

    #[test]
    fn short_bbox_is_rejected() {
        let parsed = serde_json::from_str::<Detection>(r#"{"class":"car","score":0.5,"bbox":[1,2]}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn score_percent_rounds_and_clamps() {
        let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        assert_eq!(Detection::new("car", 0.505, bbox).score_percent(), 51);
        assert_eq!(Detection::new("car", 1.7, bbox).score_percent(), 100);
    }

    #[test]
    fn filters_and_queries_classes() {
        let bbox = BoundingBox::from_corners(0.0, 0.0, 5.0, 5.0);
        let result = DetectionResult::new(vec![
            Detection::new("person", 0.9, bbox),
            Detection::new("bear", 0.3, bbox),
            Detection::new("bear", 0.7, bbox),
        ]);
        assert!(result.contains_class("bear"));
        assert_eq!(result.of_class("bear").count(), 2);

        let strong = result.with_min_score(0.5);
        assert_eq!(strong.len(), 2);
        assert_eq!(strong.of_class("bear").count(), 1);
        assert!(!strong.contains_class("car"));
    }
}
