//! Alert rendering.
//!
//! `AlertRenderer` turns one cycle's detections into a drawing pass and a binary
//! alert state. It owns the only piece of cross-cycle presentation state: whether
//! the alert is currently Active. The sound fires on the Clear→Active edge only.

use anyhow::Result;

use crate::detect::{BoundingBox, DetectionResult};
use crate::{AlertState, TARGET_CLASS};

/// Shown in the debug view when a cycle produced no detections.
pub const EMPTY_PLACEHOLDER: &str = "nothing detected...";

const BOX_LABEL_MIN_Y: f32 = 20.0;
const BOX_LABEL_OFFSET: f32 = 5.0;

/// Presentation collaborator: drawing surface plus the text/banner widgets.
pub trait Surface: Send {
    /// Wipe all drawn boxes. `width`/`height` are the current frame dimensions.
    fn clear(&mut self, width: u32, height: u32);

    /// Outline `bbox` and draw `label` with its baseline at `label_origin`.
    fn draw_box(&mut self, bbox: &BoundingBox, label: &str, label_origin: (f32, f32));

    fn set_debug_text(&mut self, text: &str);

    fn set_banner_visible(&mut self, visible: bool);

    /// Loading indicator while a model initializes; `None` hides it.
    fn set_loading(&mut self, _message: Option<&str>) {}
}

/// One-shot alert cue.
pub trait AlertSound: Send {
    fn play(&mut self) -> Result<()>;
}

/// Sound that does nothing; for headless runs.
#[derive(Clone, Copy, Debug, Default)]
pub struct Silent;

impl AlertSound for Silent {
    fn play(&mut self) -> Result<()> {
        Ok(())
    }
}

pub struct AlertRenderer {
    surface: Box<dyn Surface>,
    sound: Box<dyn AlertSound>,
    state: AlertState,
    banner_visible: bool,
    alerts_raised: u64,
}

impl AlertRenderer {
    pub fn new(surface: Box<dyn Surface>, sound: Box<dyn AlertSound>) -> Self {
        Self {
            surface,
            sound,
            state: AlertState::Clear,
            banner_visible: false,
            alerts_raised: 0,
        }
    }

    pub fn state(&self) -> AlertState {
        self.state
    }

    /// Number of Clear→Active edges seen so far.
    pub fn alerts_raised(&self) -> u64 {
        self.alerts_raised
    }

    /// Draw one cycle's result and update the alert.
    pub fn render(&mut self, dimensions: (u32, u32), result: &DetectionResult) -> AlertState {
        self.surface.set_debug_text(&debug_text(result));

        let (width, height) = dimensions;
        self.surface.clear(width, height);

        let mut next = AlertState::Clear;
        for detection in result.of_class(TARGET_CLASS) {
            next = AlertState::Active;
            let bbox = detection.bbox;
            let origin = (bbox.x, label_baseline(bbox.y));
            self.surface.draw_box(&bbox, &detection.label(), origin);
        }

        self.set_banner(next == AlertState::Active);
        if next == AlertState::Active && self.state == AlertState::Clear {
            self.alerts_raised += 1;
            log::warn!("{} detected", TARGET_CLASS);
            if let Err(err) = self.sound.play() {
                log::warn!("alert sound could not be played: {:#}", err);
            }
        }
        self.state = next;
        next
    }

    /// Overwrite the debug text (failure and status messages).
    pub fn show_message(&mut self, message: &str) {
        self.surface.set_debug_text(message);
    }

    pub fn set_loading(&mut self, message: Option<&str>) {
        self.surface.set_loading(message);
    }

    /// Wipe the drawing, the debug text and the banner; the next alert is a new edge.
    pub fn reset(&mut self, dimensions: (u32, u32)) {
        self.surface.clear(dimensions.0, dimensions.1);
        self.surface.set_debug_text("");
        self.set_banner(false);
        self.state = AlertState::Clear;
    }

    fn set_banner(&mut self, visible: bool) {
        if self.banner_visible != visible {
            self.banner_visible = visible;
            self.surface.set_banner_visible(visible);
        }
    }
}

/// One `"class (NN%)"` line per detection, or the empty placeholder.
pub fn debug_text(result: &DetectionResult) -> String {
    if result.is_empty() {
        return EMPTY_PLACEHOLDER.to_string();
    }
    result
        .iter()
        .map(|d| d.label())
        .collect::<Vec<_>>()
        .join("\n")
}

fn label_baseline(y: f32) -> f32 {
    if y > BOX_LABEL_MIN_Y {
        y - BOX_LABEL_OFFSET
    } else {
        BOX_LABEL_MIN_Y
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Detection;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    struct Calls {
        clears: usize,
        boxes: Vec<(BoundingBox, String, (f32, f32))>,
        debug: Vec<String>,
        banner: Vec<bool>,
        sounds: usize,
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Calls>>);

    impl Surface for Recorder {
        fn clear(&mut self, _width: u32, _height: u32) {
            let mut calls = self.0.lock().unwrap();
            calls.clears += 1;
            calls.boxes.clear();
        }

        fn draw_box(&mut self, bbox: &BoundingBox, label: &str, label_origin: (f32, f32)) {
            self.0
                .lock()
                .unwrap()
                .boxes
                .push((*bbox, label.to_string(), label_origin));
        }

        fn set_debug_text(&mut self, text: &str) {
            self.0.lock().unwrap().debug.push(text.to_string());
        }

        fn set_banner_visible(&mut self, visible: bool) {
            self.0.lock().unwrap().banner.push(visible);
        }
    }

    impl AlertSound for Recorder {
        fn play(&mut self) -> Result<()> {
            self.0.lock().unwrap().sounds += 1;
            Ok(())
        }
    }

    struct Blocked;

    impl AlertSound for Blocked {
        fn play(&mut self) -> Result<()> {
            anyhow::bail!("autoplay blocked")
        }
    }

    fn renderer() -> (AlertRenderer, Recorder) {
        let recorder = Recorder::default();
        let renderer = AlertRenderer::new(Box::new(recorder.clone()), Box::new(recorder.clone()));
        (renderer, recorder)
    }

    fn bear(y: f32) -> Detection {
        Detection::new("bear", 0.876, BoundingBox::new(10.0, y, 50.0, 60.0))
    }

    fn person() -> Detection {
        Detection::new("person", 0.5, BoundingBox::new(0.0, 0.0, 5.0, 5.0))
    }

    #[test]
    fn target_class_activates_alert() {
        let (mut renderer, recorder) = renderer();
        let result = DetectionResult::new(vec![person(), bear(100.0)]);

        assert_eq!(renderer.render((640, 480), &result), AlertState::Active);

        let calls = recorder.0.lock().unwrap();
        assert_eq!(calls.boxes.len(), 1);
        assert_eq!(calls.boxes[0].1, "bear (88%)");
        assert_eq!(calls.boxes[0].2, (10.0, 95.0));
        assert_eq!(calls.debug.last().unwrap(), "person (50%)\nbear (88%)");
        assert_eq!(calls.banner, vec![true]);
        assert_eq!(calls.sounds, 1);
    }

    #[test]
    fn other_classes_stay_clear() {
        let (mut renderer, recorder) = renderer();
        let result = DetectionResult::new(vec![person()]);
        assert_eq!(renderer.render((640, 480), &result), AlertState::Clear);
        let calls = recorder.0.lock().unwrap();
        assert!(calls.boxes.is_empty());
        assert!(calls.banner.is_empty());
        assert_eq!(calls.sounds, 0);
    }

    #[test]
    fn sound_plays_once_per_edge() {
        let (mut renderer, recorder) = renderer();
        let bears = DetectionResult::new(vec![bear(100.0)]);
        for _ in 0..3 {
            renderer.render((640, 480), &bears);
        }
        assert_eq!(recorder.0.lock().unwrap().sounds, 1);

        renderer.render((640, 480), &DetectionResult::empty());
        renderer.render((640, 480), &bears);
        let calls = recorder.0.lock().unwrap();
        assert_eq!(calls.sounds, 2);
        assert_eq!(calls.banner, vec![true, false, true]);
        assert_eq!(renderer.alerts_raised(), 2);
    }

    #[test]
    fn repeated_empty_renders_are_idempotent() {
        let (mut renderer, recorder) = renderer();
        for _ in 0..4 {
            assert_eq!(
                renderer.render((640, 480), &DetectionResult::empty()),
                AlertState::Clear
            );
        }
        let calls = recorder.0.lock().unwrap();
        assert!(calls.banner.is_empty());
        assert_eq!(calls.sounds, 0);
        assert_eq!(calls.clears, 4);
        assert!(calls.debug.iter().all(|t| t == EMPTY_PLACEHOLDER));
    }

    #[test]
    fn label_clamps_near_top_edge() {
        let (mut renderer, recorder) = renderer();
        renderer.render((640, 480), &DetectionResult::new(vec![bear(12.0)]));
        assert_eq!(recorder.0.lock().unwrap().boxes[0].2, (10.0, 20.0));
    }

    #[test]
    fn blocked_sound_does_not_propagate() {
        let recorder = Recorder::default();
        let mut renderer = AlertRenderer::new(Box::new(recorder.clone()), Box::new(Blocked));
        let state = renderer.render((640, 480), &DetectionResult::new(vec![bear(50.0)]));
        assert_eq!(state, AlertState::Active);
        assert_eq!(recorder.0.lock().unwrap().banner, vec![true]);
    }

    #[test]
    fn reset_hides_banner_and_rearms_sound() {
        let (mut renderer, recorder) = renderer();
        let bears = DetectionResult::new(vec![bear(100.0)]);
        renderer.render((640, 480), &bears);
        renderer.reset((640, 480));
        assert_eq!(renderer.state(), AlertState::Clear);

        renderer.render((640, 480), &bears);
        let calls = recorder.0.lock().unwrap();
        assert_eq!(calls.sounds, 2);
        assert_eq!(calls.banner, vec![true, false, true]);
    }
}
