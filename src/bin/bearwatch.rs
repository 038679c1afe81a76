//! bearwatch - live bear detection from a camera feed
//!
//! This binary:
//! 1. Loads configuration (file + environment + flags)
//! 2. Probes the remote detection service once at startup
//! 3. Runs the detection loop with a terminal presentation
//! 4. Accepts control commands on stdin: start, stop, local, remote, status, quit

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::{BufRead, IsTerminal};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bear_watch::config::WatchConfig;
use bear_watch::ingest::open_source;
use bear_watch::ui::{TerminalBell, TerminalSurface, Ui};
use bear_watch::{
    AlertRenderer, AvailabilityProbe, BackendRegistry, BackendSelection, DetectionLoop,
    LocalModelBackend, LoopState, ModelLoader, RemoteServiceBackend, StubLoader, WatchError,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Watch a camera feed and raise an alert when a bear appears")]
struct Args {
    /// Detection backend to start with (local|remote).
    #[arg(long, value_name = "BACKEND")]
    backend: Option<String>,

    /// Frame source URL (stub://name, file:///path, http://camera/snapshot.jpg).
    #[arg(long, value_name = "URL")]
    source: Option<String>,

    /// Remote detection service root URL.
    #[arg(long, value_name = "URL")]
    service_url: Option<String>,

    /// Wait for a `start` command instead of starting immediately.
    #[arg(long)]
    no_autostart: bool,

    /// Exit after this many seconds.
    #[arg(long)]
    seconds: Option<u64>,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

#[derive(Debug)]
enum Command {
    Start,
    Stop,
    Select(BackendSelection),
    Status,
    Quit,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = WatchConfig::load()?;
    if let Some(backend) = &args.backend {
        cfg.backend = backend.parse()?;
    }
    if let Some(source) = &args.source {
        cfg.source.url = source.clone();
    }
    if let Some(service_url) = &args.service_url {
        cfg.service_url = url::Url::parse(service_url)
            .map_err(|e| anyhow!("invalid --service-url '{}': {}", service_url, e))?;
    }

    let ui = Ui::from_args(Some(&args.ui), std::io::stderr().is_terminal());

    let probe = AvailabilityProbe::new(&cfg.service_url, Duration::from_secs(3))?;
    // Startup probe runs on the side; the loop never waits for it.
    let _ = probe.check_in_background();

    let local = LocalModelBackend::new(model_loader(&cfg)?)
        .with_threshold(cfg.model.confidence_threshold);
    log::info!(
        "local model: {} (threshold {:.2})",
        local.loader_name(),
        cfg.model.confidence_threshold
    );
    let remote = RemoteServiceBackend::new(cfg.remote_config())?;
    log::info!("remote detection endpoint: {}", remote.endpoint());
    let registry = BackendRegistry::new()
        .with(BackendSelection::LocalModel, local)
        .with(BackendSelection::RemoteService, remote);

    let renderer = AlertRenderer::new(
        Box::new(TerminalSurface::new(ui)),
        Box::new(TerminalBell),
    );
    let source = open_source(&cfg.source)?;
    let detection = DetectionLoop::new(
        source,
        registry,
        renderer,
        cfg.loop_settings(),
        Some(probe),
    );
    detection.set_selection(cfg.backend);

    let (tx, rx) = mpsc::channel();
    let ctrlc_tx = tx.clone();
    ctrlc::set_handler(move || {
        let _ = ctrlc_tx.send(Command::Quit);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;
    spawn_stdin_reader(tx);

    if !args.no_autostart {
        handle(&detection, Command::Start);
    }
    log::info!("bearwatch ready. commands: start, stop, local, remote, status, quit");

    let deadline = args
        .seconds
        .map(|secs| Instant::now() + Duration::from_secs(secs));
    loop {
        let command = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                match rx.recv_timeout(remaining) {
                    Ok(command) => command,
                    Err(mpsc::RecvTimeoutError::Timeout) => Command::Quit,
                    Err(mpsc::RecvTimeoutError::Disconnected) => Command::Quit,
                }
            }
            None => rx.recv().unwrap_or(Command::Quit),
        };
        if matches!(command, Command::Quit) {
            break;
        }
        handle(&detection, command);
    }

    log::info!("shutting down...");
    detection.shutdown();
    let stats = detection.stats();
    log::info!(
        "cycles={} local={} remote={} remote_failures={} alerts={}",
        stats.cycles,
        stats.local_detections,
        stats.remote_detections,
        stats.remote_failures,
        stats.alerts_raised
    );
    Ok(())
}

fn handle(detection: &DetectionLoop, command: Command) {
    let outcome = match command {
        Command::Start => detection.start(),
        Command::Stop => detection.stop(),
        Command::Select(selection) => {
            detection.set_selection(selection);
            Ok(())
        }
        Command::Status => {
            let state = match detection.state() {
                LoopState::Running => "running",
                LoopState::Idle => "idle",
            };
            log::info!(
                "state={} backend={} service={} alert={:?}",
                state,
                detection.selection(),
                detection.availability(),
                detection.alert_state()
            );
            Ok(())
        }
        Command::Quit => Ok(()),
    };
    match outcome {
        Ok(()) => {}
        // Misuse guards are no-ops from the operator's point of view.
        Err(WatchError::AlreadyRunning) | Err(WatchError::NotRunning) => {
            log::debug!("ignored redundant start/stop")
        }
        Err(err) => log::error!("{}", err),
    }
}

fn spawn_stdin_reader(tx: mpsc::Sender<Command>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            let command = match line.trim() {
                "" => continue,
                "start" => Command::Start,
                "stop" => Command::Stop,
                "status" => Command::Status,
                "quit" | "exit" => Command::Quit,
                other => match other.parse::<BackendSelection>() {
                    Ok(selection) => Command::Select(selection),
                    Err(err) => {
                        log::warn!("{}", err);
                        continue;
                    }
                },
            };
            if tx.send(command).is_err() {
                break;
            }
        }
    });
}

fn model_loader(cfg: &WatchConfig) -> Result<Arc<dyn ModelLoader>> {
    match cfg.model.path.as_ref() {
        Some(path) => onnx_loader(cfg, path),
        None => {
            log::warn!("no model path configured; local detection uses the stub model");
            Ok(Arc::new(StubLoader))
        }
    }
}

#[cfg(feature = "backend-tract")]
fn onnx_loader(cfg: &WatchConfig, path: &std::path::Path) -> Result<Arc<dyn ModelLoader>> {
    let mut loader = bear_watch::detect::backends::TractLoader::new(
        path,
        cfg.model.input_width,
        cfg.model.input_height,
    );
    if let Some(labels) = &cfg.model.labels_path {
        loader = loader.with_labels_file(labels)?;
    }
    Ok(Arc::new(loader))
}

#[cfg(not(feature = "backend-tract"))]
fn onnx_loader(_cfg: &WatchConfig, path: &std::path::Path) -> Result<Arc<dyn ModelLoader>> {
    Err(anyhow!(
        "model {} requires the backend-tract feature",
        path.display()
    ))
}
