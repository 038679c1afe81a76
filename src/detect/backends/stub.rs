use anyhow::Result;

use crate::detect::backends::local::{Model, ModelLoader};
use crate::detect::result::Detection;
use crate::frame::Frame;

/// Stub loader for builds without an inference runtime. Its model never
/// detects anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct StubLoader;

impl ModelLoader for StubLoader {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn load(&self) -> Result<Box<dyn Model>> {
        Ok(Box::new(StubModel::default()))
    }
}

#[derive(Debug, Default)]
pub struct StubModel {
    frames_seen: u64,
}

impl Model for StubModel {
    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
        self.frames_seen += 1;
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_model_sees_nothing() {
        let mut model = StubLoader.load().unwrap();
        let frame = Frame::solid(2, 2, [255, 255, 255]).unwrap();
        assert!(model.detect(&frame).unwrap().is_empty());
    }
}
