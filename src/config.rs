use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::detect::RemoteServiceConfig;
use crate::ingest::SourceConfig;
use crate::watch::{frame_interval, LoopSettings};
use crate::BackendSelection;

const DEFAULT_SERVICE_URL: &str = "http://localhost:8001/";
const DEFAULT_SOURCE_URL: &str = "stub://front_camera";
const DEFAULT_SOURCE_WIDTH: u32 = 640;
const DEFAULT_SOURCE_HEIGHT: u32 = 480;
const DEFAULT_MODEL_INPUT: u32 = 300;
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
const DEFAULT_REDRAW_FPS: u32 = 30;
const DEFAULT_REMOTE_PACING_MS: u64 = 250;
const DEFAULT_MODEL_RETRY_MS: u64 = 500;
const DEFAULT_REPROBE_SECS: u64 = 2;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_JPEG_QUALITY: u8 = 80;

#[derive(Debug, Deserialize, Default)]
struct WatchConfigFile {
    service_url: Option<String>,
    backend: Option<String>,
    jpeg_quality: Option<u8>,
    source: Option<SourceConfigFile>,
    model: Option<ModelConfigFile>,
    timing: Option<TimingConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    path: Option<PathBuf>,
    labels_path: Option<PathBuf>,
    input_width: Option<u32>,
    input_height: Option<u32>,
    confidence_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct TimingConfigFile {
    redraw_fps: Option<u32>,
    remote_pacing_ms: Option<u64>,
    model_retry_ms: Option<u64>,
    reprobe_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub service_url: Url,
    pub backend: BackendSelection,
    pub jpeg_quality: u8,
    pub source: SourceConfig,
    pub model: ModelSettings,
    pub timing: TimingSettings,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    /// ONNX model file; without it the stub model is used.
    pub path: Option<PathBuf>,
    pub labels_path: Option<PathBuf>,
    pub input_width: u32,
    pub input_height: u32,
    pub confidence_threshold: f32,
}

#[derive(Debug, Clone)]
pub struct TimingSettings {
    pub redraw_fps: u32,
    pub remote_pacing: Duration,
    pub model_retry: Duration,
    pub reprobe_interval: Duration,
    pub request_timeout: Duration,
}

impl WatchConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("BEARWATCH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: WatchConfigFile) -> Result<Self> {
        let service_url = parse_service_url(
            file.service_url
                .as_deref()
                .unwrap_or(DEFAULT_SERVICE_URL),
        )?;
        let backend = match file.backend.as_deref() {
            Some(raw) => raw.parse()?,
            None => BackendSelection::default(),
        };
        let source = file.source.unwrap_or_default();
        let model = file.model.unwrap_or_default();
        let timing = file.timing.unwrap_or_default();

        Ok(Self {
            service_url,
            backend,
            jpeg_quality: file.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY),
            source: SourceConfig {
                url: source
                    .url
                    .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
                width: source.width.unwrap_or(DEFAULT_SOURCE_WIDTH),
                height: source.height.unwrap_or(DEFAULT_SOURCE_HEIGHT),
            },
            model: ModelSettings {
                path: model.path,
                labels_path: model.labels_path,
                input_width: model.input_width.unwrap_or(DEFAULT_MODEL_INPUT),
                input_height: model.input_height.unwrap_or(DEFAULT_MODEL_INPUT),
                confidence_threshold: model
                    .confidence_threshold
                    .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            },
            timing: TimingSettings {
                redraw_fps: timing.redraw_fps.unwrap_or(DEFAULT_REDRAW_FPS),
                remote_pacing: Duration::from_millis(
                    timing.remote_pacing_ms.unwrap_or(DEFAULT_REMOTE_PACING_MS),
                ),
                model_retry: Duration::from_millis(
                    timing.model_retry_ms.unwrap_or(DEFAULT_MODEL_RETRY_MS),
                ),
                reprobe_interval: Duration::from_secs(
                    timing.reprobe_secs.unwrap_or(DEFAULT_REPROBE_SECS),
                ),
                request_timeout: Duration::from_secs(
                    timing
                        .request_timeout_secs
                        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
                ),
            },
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("BEARWATCH_SERVICE_URL") {
            if !url.trim().is_empty() {
                self.service_url = parse_service_url(&url)?;
            }
        }
        if let Ok(backend) = std::env::var("BEARWATCH_BACKEND") {
            if !backend.trim().is_empty() {
                self.backend = backend.parse()?;
            }
        }
        if let Ok(url) = std::env::var("BEARWATCH_SOURCE_URL") {
            if !url.trim().is_empty() {
                self.source.url = url;
            }
        }
        if let Ok(path) = std::env::var("BEARWATCH_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.model.path = Some(PathBuf::from(path));
            }
        }
        if let Ok(pacing) = std::env::var("BEARWATCH_REMOTE_PACING_MS") {
            let millis: u64 = pacing.parse().map_err(|_| {
                anyhow!("BEARWATCH_REMOTE_PACING_MS must be an integer number of milliseconds")
            })?;
            self.timing.remote_pacing = Duration::from_millis(millis);
        }
        if let Ok(fps) = std::env::var("BEARWATCH_REDRAW_FPS") {
            self.timing.redraw_fps = fps
                .parse()
                .map_err(|_| anyhow!("BEARWATCH_REDRAW_FPS must be an integer"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.timing.redraw_fps == 0 {
            return Err(anyhow!("redraw_fps must be greater than zero"));
        }
        if self.timing.remote_pacing.is_zero() {
            return Err(anyhow!("remote pacing must be greater than zero"));
        }
        if self.timing.request_timeout.is_zero() {
            return Err(anyhow!("request timeout must be greater than zero"));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(anyhow!("jpeg_quality must be between 1 and 100"));
        }
        if !(0.0..=1.0).contains(&self.model.confidence_threshold) {
            return Err(anyhow!("confidence_threshold must be within [0, 1]"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source dimensions must be non-zero"));
        }
        Ok(())
    }

    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            frame_interval: frame_interval(self.timing.redraw_fps),
            remote_pacing: self.timing.remote_pacing,
            model_retry: self.timing.model_retry,
            reprobe_interval: self.timing.reprobe_interval,
        }
    }

    pub fn remote_config(&self) -> RemoteServiceConfig {
        RemoteServiceConfig {
            base_url: self.service_url.clone(),
            timeout: self.timing.request_timeout,
            jpeg_quality: self.jpeg_quality,
        }
    }
}

fn parse_service_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| anyhow!("invalid service url '{}': {}", raw, e))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(anyhow!(
            "service url must use http or https, got '{}'",
            other
        )),
    }
}

fn read_config_file(path: &Path) -> Result<WatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
