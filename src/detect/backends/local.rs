use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;

use anyhow::Result;

use crate::detect::backend::{BackendError, DetectionBackend};
use crate::detect::result::{Detection, DetectionResult};
use crate::frame::Frame;

/// A loaded in-process detector.
pub trait Model: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>>;
}

/// One-time model factory (reads weights, builds the inference plan).
pub trait ModelLoader: Send + Sync {
    fn name(&self) -> &'static str;

    fn load(&self) -> Result<Box<dyn Model>>;
}

/// Backend wrapping an in-process model.
///
/// The model is loaded once, either synchronously through `warm_up` or on a side
/// thread through `warm_up_in_background`. Until then `poll_ready` is false and
/// `detect` fails. A failed background load is remembered and not retried until
/// `clear_load_error` or a blocking `warm_up`.
pub struct LocalModelBackend {
    loader: Arc<dyn ModelLoader>,
    model: Option<Box<dyn Model>>,
    pending: Option<Receiver<Result<Box<dyn Model>>>>,
    load_error: Option<String>,
    confidence_threshold: f32,
}

impl LocalModelBackend {
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            loader,
            model: None,
            pending: None,
            load_error: None,
            confidence_threshold: 0.5,
        }
    }

    /// Override the default confidence threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn loader_name(&self) -> &'static str {
        self.loader.name()
    }

    fn install(&mut self, model: Box<dyn Model>) {
        log::info!("local model '{}' ready", self.loader.name());
        self.model = Some(model);
    }
}

impl DetectionBackend for LocalModelBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult, BackendError> {
        let model = self
            .model
            .as_mut()
            .ok_or_else(|| BackendError::new("local model not initialized"))?;
        let detections = model
            .detect(frame)
            .map_err(|e| BackendError::new(format!("local model inference failed: {e:#}")))?;
        Ok(DetectionResult::new(detections).with_min_score(self.confidence_threshold))
    }

    fn poll_ready(&mut self) -> bool {
        if self.model.is_some() {
            return true;
        }
        let Some(rx) = self.pending.as_ref() else {
            return false;
        };
        match rx.try_recv() {
            Ok(Ok(model)) => {
                self.pending = None;
                self.install(model);
                true
            }
            Ok(Err(err)) => {
                self.pending = None;
                log::error!("background load of '{}' failed: {:#}", self.loader.name(), err);
                self.load_error = Some(format!("{err:#}"));
                false
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => {
                self.pending = None;
                log::error!("background load of '{}' died", self.loader.name());
                self.load_error = Some("background model load died".to_string());
                false
            }
        }
    }

    fn warm_up(&mut self) -> Result<(), BackendError> {
        if self.model.is_some() {
            return Ok(());
        }
        self.load_error = None;
        // Join an in-flight background load rather than loading twice.
        let outcome = match self.pending.take() {
            Some(rx) => rx
                .recv()
                .map_err(|_| BackendError::new("background model load died"))?,
            None => self.loader.load(),
        };
        let model = outcome.map_err(|e| BackendError::new(format!("{e:#}")))?;
        self.install(model);
        Ok(())
    }

    fn warm_up_in_background(&mut self) {
        if self.model.is_some() || self.pending.is_some() || self.load_error.is_some() {
            return;
        }
        let (tx, rx) = mpsc::channel();
        let loader = self.loader.clone();
        log::info!("loading local model '{}' in background", loader.name());
        std::thread::spawn(move || {
            let _ = tx.send(loader.load());
        });
        self.pending = Some(rx);
    }

    fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    fn clear_load_error(&mut self) {
        self.load_error = None;
    }
}
