use crate::detect::result::DetectionResult;
use crate::frame::Frame;

/// A single failed detection attempt (transport, encoding, processing or a
/// malformed response). Absorbed by the loop; never fatal to it.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("backend error: {reason}")]
pub struct BackendError {
    pub reason: String,
}

impl BackendError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Detection backend trait.
///
/// Both the in-process model and the remote service implement this. The loop
/// calls `detect` from its worker thread, so a slow backend only delays its own
/// cycle.
pub trait DetectionBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    ///
    /// Implementations must treat the frame as read-only and must not keep
    /// pixels past the call.
    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult, BackendError>;

    /// True once the backend can serve `detect`. May collect the outcome of a
    /// background warm-up.
    fn poll_ready(&mut self) -> bool {
        true
    }

    /// Blocking one-time initialization (loading weights, opening sessions).
    fn warm_up(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    /// Start initialization without blocking the caller. Idempotent while a
    /// warm-up is already in flight.
    fn warm_up_in_background(&mut self) {}

    /// Why the last background warm-up failed, if it did. While set,
    /// `warm_up_in_background` does nothing.
    fn load_error(&self) -> Option<&str> {
        None
    }

    /// Allow the next `warm_up_in_background` to try again.
    fn clear_load_error(&mut self) {}
}
