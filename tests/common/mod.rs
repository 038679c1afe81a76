//! Shared fixtures for the integration tests: a minimal HTTP server standing in
//! for the detection service, recording test doubles for the presentation
//! layer, and a polling helper.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use url::Url;

use bear_watch::{AlertSound, BoundingBox, Surface};

// -------------------- HTTP fixture --------------------

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Clone, Debug)]
pub struct FixtureResponse {
    pub status: u16,
    pub body: String,
}

impl FixtureResponse {
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

type Handler = dyn Fn(&RecordedRequest) -> FixtureResponse + Send + Sync;

/// Answers every connection with the handler's response. The accept thread
/// lives until the test process exits.
pub struct FixtureServer {
    url: Url,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl FixtureServer {
    pub fn start<F>(handler: F) -> Self
    where
        F: Fn(&RecordedRequest) -> FixtureResponse + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fixture");
        let addr = listener.local_addr().expect("fixture addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler: Arc<Handler> = Arc::new(handler);

        let recorded = requests.clone();
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else {
                    continue;
                };
                let handler = handler.clone();
                let recorded = recorded.clone();
                std::thread::spawn(move || serve(stream, handler.as_ref(), &recorded));
            }
        });

        Self {
            url: Url::parse(&format!("http://{addr}/")).expect("fixture url"),
            requests,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: &str, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }
}

fn serve(stream: TcpStream, handler: &Handler, recorded: &Mutex<Vec<RecordedRequest>>) {
    let Ok(request) = read_request(&stream) else {
        return;
    };
    recorded.lock().unwrap().push(request.clone());
    let response = handler(&request);
    let reply = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        response.status,
        reason(response.status),
        response.body.len(),
        response.body
    );
    let mut stream = stream;
    let _ = stream.write_all(reply.as_bytes());
    let _ = stream.flush();
}

fn read_request(stream: &TcpStream) -> std::io::Result<RecordedRequest> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    let mut parts = line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let mut content_length = 0usize;
    let mut content_type = None;
    loop {
        let mut header = String::new();
        reader.read_line(&mut header)?;
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            let value = value.trim();
            match name.trim().to_ascii_lowercase().as_str() {
                "content-length" => content_length = value.parse().unwrap_or(0),
                "content-type" => content_type = Some(value.to_string()),
                _ => {}
            }
        }
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body)?;
    Ok(RecordedRequest {
        method,
        path,
        content_type,
        body,
    })
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}

/// A URL nothing listens on.
pub fn closed_port_url() -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    Url::parse(&format!("http://{addr}/")).expect("url")
}

// -------------------- Presentation doubles --------------------

#[derive(Clone, Debug, PartialEq)]
pub enum SurfaceEvent {
    Clear(u32, u32),
    Box { label: String, origin: (f32, f32) },
    Debug(String),
    Banner(bool),
    Loading(Option<String>),
}

#[derive(Clone, Default)]
pub struct RecordingSurface {
    events: Arc<Mutex<Vec<SurfaceEvent>>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SurfaceEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn last_debug(&self) -> Option<String> {
        self.events().into_iter().rev().find_map(|e| match e {
            SurfaceEvent::Debug(text) => Some(text),
            _ => None,
        })
    }

    pub fn banner_visible(&self) -> bool {
        self.events()
            .into_iter()
            .rev()
            .find_map(|e| match e {
                SurfaceEvent::Banner(visible) => Some(visible),
                _ => None,
            })
            .unwrap_or(false)
    }

    pub fn boxes_drawn(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, SurfaceEvent::Box { .. }))
            .count()
    }

    fn push(&self, event: SurfaceEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl Surface for RecordingSurface {
    fn clear(&mut self, width: u32, height: u32) {
        self.push(SurfaceEvent::Clear(width, height));
    }

    fn draw_box(&mut self, _bbox: &BoundingBox, label: &str, label_origin: (f32, f32)) {
        self.push(SurfaceEvent::Box {
            label: label.to_string(),
            origin: label_origin,
        });
    }

    fn set_debug_text(&mut self, text: &str) {
        self.push(SurfaceEvent::Debug(text.to_string()));
    }

    fn set_banner_visible(&mut self, visible: bool) {
        self.push(SurfaceEvent::Banner(visible));
    }

    fn set_loading(&mut self, message: Option<&str>) {
        self.push(SurfaceEvent::Loading(message.map(str::to_string)));
    }
}

#[derive(Clone, Default)]
pub struct CountingSound {
    plays: Arc<AtomicU64>,
}

impl CountingSound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plays(&self) -> u64 {
        self.plays.load(Ordering::SeqCst)
    }
}

impl AlertSound for CountingSound {
    fn play(&mut self) -> anyhow::Result<()> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// -------------------- Helpers --------------------

/// Poll `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

pub const PREDICTIONS_WITH_BEAR: &str = r#"{
    "predictions": [
        {"class": "bear", "score": 0.91, "bbox": [40.0, 10.0, 120.0, 90.0]},
        {"class": "person", "score": 0.64, "bbox": [200.0, 50.0, 60.0, 150.0]}
    ]
}"#;
