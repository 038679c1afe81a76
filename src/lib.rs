//! Bear Watch
//!
//! A live object-detection watcher. Frames from a camera are pushed through one of
//! two interchangeable detection backends and the results drive an alert whenever
//! the target class ("bear") shows up.
//!
//! # Architecture
//!
//! The crate is built around one state machine, [`DetectionLoop`], which:
//!
//! 1. Reads the current [`BackendSelection`] at the top of every cycle.
//! 2. Paces the local model at the display redraw cadence and the remote service
//!    with a fixed delay between strictly sequential requests.
//! 3. Absorbs per-cycle backend failures without stopping.
//! 4. Feeds every result into an [`AlertRenderer`], which owns the alert edge.
//!
//! # Module Structure
//!
//! - `frame`: ephemeral frame container
//! - `ingest`: frame sources (synthetic, image files, HTTP snapshots)
//! - `detect`: detection results, backend trait, local and remote backends
//! - `probe`: remote service availability probe
//! - `alert`: drawing pass, alert state and sound edge
//! - `overlay`: in-memory drawing surface
//! - `watch`: the detection loop and its scheduling rules
//! - `config`: file + environment configuration
//! - `ui`: terminal presentation used by the binaries

use std::fmt;
use std::str::FromStr;

pub mod alert;
pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod overlay;
pub mod probe;
pub mod ui;
pub mod watch;

pub use alert::{AlertRenderer, AlertSound, Surface};
pub use detect::{
    BackendError, BackendRegistry, BoundingBox, Detection, DetectionBackend, DetectionResult,
    LocalModelBackend, Model, ModelLoader, RemoteServiceBackend, RemoteServiceConfig, StubLoader,
};
pub use frame::Frame;
pub use ingest::{open_source, FrameSource};
pub use overlay::Overlay;
pub use probe::{AvailabilityFlag, AvailabilityProbe};
pub use watch::{next_schedule, CycleOutcome, DetectionLoop, LoopSettings, LoopStats, Schedule};

/// The single object class that raises the alert.
pub const TARGET_CLASS: &str = "bear";

// -------------------- Selection / state enums --------------------

/// Which detection strategy a cycle uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BackendSelection {
    #[default]
    LocalModel,
    RemoteService,
}

impl BackendSelection {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendSelection::LocalModel => "local",
            BackendSelection::RemoteService => "remote",
        }
    }

    pub(crate) fn to_u8(self) -> u8 {
        match self {
            BackendSelection::LocalModel => 0,
            BackendSelection::RemoteService => 1,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        if value == 1 {
            BackendSelection::RemoteService
        } else {
            BackendSelection::LocalModel
        }
    }
}

impl fmt::Display for BackendSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendSelection {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "coco-ssd" => Ok(BackendSelection::LocalModel),
            "remote" | "yolov8" => Ok(BackendSelection::RemoteService),
            other => Err(WatchError::UnknownBackend(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoopState {
    #[default]
    Idle,
    Running,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ServiceAvailability {
    #[default]
    Unknown,
    Online,
    Offline,
}

impl ServiceAvailability {
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            ServiceAvailability::Unknown => 0,
            ServiceAvailability::Online => 1,
            ServiceAvailability::Offline => 2,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => ServiceAvailability::Online,
            2 => ServiceAvailability::Offline,
            _ => ServiceAvailability::Unknown,
        }
    }
}

impl fmt::Display for ServiceAvailability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ServiceAvailability::Unknown => "unknown",
            ServiceAvailability::Online => "online",
            ServiceAvailability::Offline => "offline",
        };
        f.write_str(text)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AlertState {
    #[default]
    Clear,
    Active,
}

// -------------------- Errors --------------------

/// Errors surfaced by the detection loop's public contract.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),

    #[error("model failed to load: {0}")]
    ModelLoad(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("detection loop is already running")]
    AlreadyRunning,

    #[error("detection loop is not running")]
    NotRunning,

    #[error("unknown backend '{0}'; expected local or remote")]
    UnknownBackend(String),
}
