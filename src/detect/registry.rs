use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::detect::backend::DetectionBackend;
use crate::BackendSelection;

pub type SharedBackend = Arc<Mutex<dyn DetectionBackend>>;

/// Backends keyed by the selection that dispatches to them.
///
/// Backends are wrapped in `Mutex` because `DetectionBackend::detect` takes
/// `&mut self` and warm-up may run on the controlling thread.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: HashMap<BackendSelection, SharedBackend>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the backend for a selection, replacing any previous one.
    pub fn register<B: DetectionBackend + 'static>(&mut self, selection: BackendSelection, backend: B) {
        log::debug!("registered backend '{}' for {}", backend.name(), selection);
        self.backends
            .insert(selection, Arc::new(Mutex::new(backend)));
    }

    pub fn with<B: DetectionBackend + 'static>(mut self, selection: BackendSelection, backend: B) -> Self {
        self.register(selection, backend);
        self
    }

    pub fn get(&self, selection: BackendSelection) -> Option<SharedBackend> {
        self.backends.get(&selection).cloned()
    }

    pub fn contains(&self, selection: BackendSelection) -> bool {
        self.backends.contains_key(&selection)
    }

    /// Registered selections.
    pub fn list(&self) -> Vec<BackendSelection> {
        let mut selections: Vec<_> = self.backends.keys().copied().collect();
        selections.sort_by_key(|s| s.to_u8());
        selections
    }
}
