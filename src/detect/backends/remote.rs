//! Remote inference service backend.
//!
//! One cycle is one request: the frame is JPEG-encoded, posted as a
//! `multipart/form-data` body with a single `file` field to `{service}/detect`,
//! and the JSON reply's `predictions` list becomes the detection result.

use std::time::Duration;

use rand::Rng;
use serde::Deserialize;
use url::Url;

use crate::detect::backend::{BackendError, DetectionBackend};
use crate::detect::result::{Detection, DetectionResult};
use crate::frame::Frame;

const DETECT_PATH: &str = "detect";
const UPLOAD_FIELD: &str = "file";
const UPLOAD_FILENAME: &str = "frame.jpg";

#[derive(Clone, Debug)]
pub struct RemoteServiceConfig {
    /// Service root, e.g. `http://localhost:8001/`.
    pub base_url: Url,
    /// Upper bound on one request, connect through body.
    pub timeout: Duration,
    /// JPEG quality for uploaded frames (1-100).
    pub jpeg_quality: u8,
}

impl RemoteServiceConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: Duration::from_secs(10),
            jpeg_quality: 80,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PredictionsBody {
    predictions: Vec<Detection>,
}

pub struct RemoteServiceBackend {
    endpoint: Url,
    agent: ureq::Agent,
    jpeg_quality: u8,
}

impl RemoteServiceBackend {
    pub fn new(config: RemoteServiceConfig) -> Result<Self, BackendError> {
        let endpoint = service_url(&config.base_url, DETECT_PATH)?;
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        Ok(Self {
            endpoint,
            agent,
            jpeg_quality: config.jpeg_quality,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn post_frame(&self, jpeg: &[u8]) -> Result<String, BackendError> {
        let boundary = multipart_boundary();
        let body = multipart_body(&boundary, UPLOAD_FIELD, UPLOAD_FILENAME, "image/jpeg", jpeg);

        let response = self
            .agent
            .post(self.endpoint.as_str())
            .set(
                "Content-Type",
                &format!("multipart/form-data; boundary={boundary}"),
            )
            .send_bytes(&body)
            .map_err(|err| match err {
                ureq::Error::Status(code, _) => {
                    BackendError::new(format!("service responded with status {code}"))
                }
                ureq::Error::Transport(transport) => {
                    BackendError::new(format!("request to {} failed: {}", self.endpoint, transport))
                }
            })?;

        let status = response.status();
        if !(200..300).contains(&status) {
            return Err(BackendError::new(format!(
                "service responded with status {status}"
            )));
        }
        response
            .into_string()
            .map_err(|e| BackendError::new(format!("read response body: {e}")))
    }
}

impl DetectionBackend for RemoteServiceBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult, BackendError> {
        let jpeg = frame
            .encode_jpeg(self.jpeg_quality)
            .map_err(|e| BackendError::new(format!("{e:#}")))?;
        let body = self.post_frame(&jpeg)?;
        parse_predictions(&body)
    }
}

/// Parse a `{ "predictions": [...] }` reply. A missing or malformed list fails.
pub(crate) fn parse_predictions(body: &str) -> Result<DetectionResult, BackendError> {
    let parsed: PredictionsBody = serde_json::from_str(body)
        .map_err(|e| BackendError::new(format!("malformed service response: {e}")))?;
    Ok(DetectionResult::new(parsed.predictions))
}

/// Resolve `path` under the service root, treating the root as a directory.
pub(crate) fn service_url(base: &Url, path: &str) -> Result<Url, BackendError> {
    let mut root = base.clone();
    if !root.path().ends_with('/') {
        let with_slash = format!("{}/", root.path());
        root.set_path(&with_slash);
    }
    root.join(path)
        .map_err(|e| BackendError::new(format!("invalid service url {base}: {e}")))
}

fn multipart_boundary() -> String {
    format!("----bearwatch{:016x}", rand::thread_rng().gen::<u64>())
}

fn multipart_body(
    boundary: &str,
    field: &str,
    filename: &str,
    content_type: &str,
    data: &[u8],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(data.len() + 256);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}
