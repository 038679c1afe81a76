//! The detection loop.
//!
//! `DetectionLoop` owns the Idle/Running state and one worker thread per running
//! session. Each session gets a fresh id; the worker checks that its id is still
//! current before capturing and again (under the presenter lock) before
//! rendering, so a call that resolves after `stop` leaves no trace.
//!
//! Cycle: read selection → (local) ensure model → capture → detect → render →
//! ask `next_schedule` when to go again.

mod schedule;

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

pub use schedule::{frame_interval, next_schedule, CycleOutcome, FrameClock, LoopSettings, Schedule};

use crate::alert::AlertRenderer;
use crate::detect::{BackendRegistry, DetectionResult};
use crate::ingest::FrameSource;
use crate::probe::{AvailabilityFlag, AvailabilityProbe};
use crate::{AlertState, BackendSelection, LoopState, ServiceAvailability, WatchError};

pub const LOADING_MESSAGE: &str = "loading detection model...";
pub const COMMUNICATION_FAILED: &str = "communication with the detection service failed";
pub const SERVICE_OFFLINE: &str = "detection service offline";
pub const MODEL_LOAD_FAILED: &str = "detection model failed to load";

/// Counter snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub cycles: u64,
    pub local_detections: u64,
    pub remote_detections: u64,
    pub remote_failures: u64,
    pub alerts_raised: u64,
}

#[derive(Default)]
struct Counters {
    cycles: AtomicU64,
    local_detections: AtomicU64,
    remote_detections: AtomicU64,
    remote_failures: AtomicU64,
}

/// What the surface currently says about a mid-run model load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ModelStatus {
    Settled,
    Loading,
    Failed,
}

struct Presenter {
    renderer: AlertRenderer,
    /// Dimensions of the last captured frame.
    dimensions: (u32, u32),
    model_status: ModelStatus,
}

struct Shared {
    registry: BackendRegistry,
    presenter: Mutex<Presenter>,
    source: Mutex<Box<dyn FrameSource>>,
    probe: Option<AvailabilityProbe>,
    availability: AvailabilityFlag,
    selection: AtomicU8,
    /// Set when LocalModel gets selected; lets a failed model load try again.
    local_retry: AtomicBool,
    running: AtomicBool,
    session: AtomicU64,
    settings: LoopSettings,
    counters: Counters,
    last_reprobe: Mutex<Option<Instant>>,
}

pub struct DetectionLoop {
    shared: Arc<Shared>,
    /// Serializes start/stop.
    control: Mutex<()>,
    /// Current worker plus stale ones still finishing an in-flight call.
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl DetectionLoop {
    pub fn new(
        source: Box<dyn FrameSource>,
        registry: BackendRegistry,
        renderer: AlertRenderer,
        settings: LoopSettings,
        probe: Option<AvailabilityProbe>,
    ) -> Self {
        let availability = probe
            .as_ref()
            .map(AvailabilityProbe::flag)
            .unwrap_or_default();
        let dimensions = source.dimensions().unwrap_or((0, 0));
        Self {
            shared: Arc::new(Shared {
                registry,
                presenter: Mutex::new(Presenter {
                    renderer,
                    dimensions,
                    model_status: ModelStatus::Settled,
                }),
                source: Mutex::new(source),
                probe,
                availability,
                selection: AtomicU8::new(BackendSelection::default().to_u8()),
                local_retry: AtomicBool::new(false),
                running: AtomicBool::new(false),
                session: AtomicU64::new(0),
                settings,
                counters: Counters::default(),
                last_reprobe: Mutex::new(None),
            }),
            control: Mutex::new(()),
            workers: Mutex::new(Vec::new()),
        }
    }

    pub fn state(&self) -> LoopState {
        if self.shared.running.load(Ordering::SeqCst) {
            LoopState::Running
        } else {
            LoopState::Idle
        }
    }

    pub fn selection(&self) -> BackendSelection {
        self.shared.selection()
    }

    /// Takes effect at the top of the next cycle.
    pub fn set_selection(&self, selection: BackendSelection) {
        let previous = BackendSelection::from_u8(
            self.shared.selection.swap(selection.to_u8(), Ordering::SeqCst),
        );
        if previous != selection {
            log::info!("backend selection: {} -> {}", previous, selection);
            if selection == BackendSelection::LocalModel {
                self.shared.local_retry.store(true, Ordering::SeqCst);
            }
        }
    }

    pub fn availability(&self) -> ServiceAvailability {
        self.shared.availability.get()
    }

    pub fn alert_state(&self) -> AlertState {
        lock(&self.shared.presenter).renderer.state()
    }

    pub fn stats(&self) -> LoopStats {
        let counters = &self.shared.counters;
        LoopStats {
            cycles: counters.cycles.load(Ordering::SeqCst),
            local_detections: counters.local_detections.load(Ordering::SeqCst),
            remote_detections: counters.remote_detections.load(Ordering::SeqCst),
            remote_failures: counters.remote_failures.load(Ordering::SeqCst),
            alerts_raised: lock(&self.shared.presenter).renderer.alerts_raised(),
        }
    }

    /// Open the camera, make sure the selected backend can run, then spawn the
    /// cycle worker. Returns without waiting for any detection.
    pub fn start(&self) -> Result<(), WatchError> {
        let _control = lock(&self.control);
        if self.shared.running.load(Ordering::SeqCst) {
            return Err(WatchError::AlreadyRunning);
        }

        {
            let mut source = lock(&self.shared.source);
            source
                .open()
                .map_err(|e| WatchError::CameraUnavailable(format!("{}: {:#}", source.name(), e)))?;
        }

        let selection = self.shared.selection();
        if selection == BackendSelection::LocalModel {
            if let Err(err) = self.warm_up_local() {
                lock(&self.shared.source).close();
                return Err(err);
            }
        }

        let session = {
            let _presenter = lock(&self.shared.presenter);
            let session = self.shared.session.fetch_add(1, Ordering::SeqCst) + 1;
            self.shared.running.store(true, Ordering::SeqCst);
            session
        };

        let shared = self.shared.clone();
        let handle = std::thread::Builder::new()
            .name(format!("detect-loop-{session}"))
            .spawn(move || run_worker(shared, session))
            .map_err(|e| {
                self.shared.running.store(false, Ordering::SeqCst);
                WatchError::CameraUnavailable(format!("failed to spawn loop worker: {e}"))
            })?;
        {
            let mut workers = lock(&self.workers);
            let (finished, live): (Vec<_>, Vec<_>) =
                workers.drain(..).partition(|worker| worker.is_finished());
            finished.into_iter().for_each(join_worker);
            *workers = live;
            workers.push(handle);
        }

        log::info!("detection loop started (session {}, backend {})", session, selection);
        Ok(())
    }

    /// Return to Idle. An in-flight backend call finishes on its own but its
    /// result is dropped.
    pub fn stop(&self) -> Result<(), WatchError> {
        let _control = lock(&self.control);
        {
            let mut presenter = lock(&self.shared.presenter);
            if !self.shared.running.load(Ordering::SeqCst) {
                return Err(WatchError::NotRunning);
            }
            self.shared.running.store(false, Ordering::SeqCst);
            self.shared.session.fetch_add(1, Ordering::SeqCst);
            let dimensions = presenter.dimensions;
            presenter.renderer.reset(dimensions);
            if presenter.model_status == ModelStatus::Loading {
                presenter.renderer.set_loading(None);
            }
            presenter.model_status = ModelStatus::Settled;
        }

        for worker in lock(&self.workers).iter() {
            worker.thread().unpark();
        }
        lock(&self.shared.source).close();
        log::info!("detection loop stopped");
        Ok(())
    }

    /// Stop if running and wait for every worker to exit, including ones still
    /// finishing a call from an earlier session.
    pub fn shutdown(&self) {
        if self.state() == LoopState::Running {
            let _ = self.stop();
        }
        let workers: Vec<_> = lock(&self.workers).drain(..).collect();
        workers.into_iter().for_each(join_worker);
    }

    fn warm_up_local(&self) -> Result<(), WatchError> {
        let backend = self
            .shared
            .registry
            .get(BackendSelection::LocalModel)
            .ok_or_else(|| WatchError::ModelLoad("no local backend registered".to_string()))?;
        let mut backend = lock(&*backend);
        if backend.poll_ready() {
            return Ok(());
        }

        lock(&self.shared.presenter)
            .renderer
            .set_loading(Some(LOADING_MESSAGE));
        let outcome = backend.warm_up();
        lock(&self.shared.presenter).renderer.set_loading(None);

        outcome.map_err(|e| {
            log::error!("local model failed to load: {}", e.reason);
            WatchError::ModelLoad(e.reason)
        })
    }
}

impl Drop for DetectionLoop {
    fn drop(&mut self) {
        if self.shared.running.load(Ordering::SeqCst) {
            let _ = self.stop();
        }
    }
}

impl Shared {
    fn selection(&self) -> BackendSelection {
        BackendSelection::from_u8(self.selection.load(Ordering::SeqCst))
    }

    fn is_current(&self, session: u64) -> bool {
        self.running.load(Ordering::SeqCst) && self.session.load(Ordering::SeqCst) == session
    }

    fn state_for(&self, session: u64) -> LoopState {
        if self.is_current(session) {
            LoopState::Running
        } else {
            LoopState::Idle
        }
    }

    /// Render a result if the session is still current. `None` means the result
    /// was discarded.
    fn present(
        &self,
        session: u64,
        dimensions: Option<(u32, u32)>,
        result: &DetectionResult,
        message: Option<&str>,
    ) -> Option<AlertState> {
        let mut presenter = lock(&self.presenter);
        if !self.is_current(session) {
            return None;
        }
        if let Some(dimensions) = dimensions {
            presenter.dimensions = dimensions;
        }
        let dimensions = presenter.dimensions;
        let state = presenter.renderer.render(dimensions, result);
        if let Some(message) = message {
            presenter.renderer.show_message(message);
        }
        Some(state)
    }

    /// Mirror a mid-run model load on the surface. Only changes are drawn.
    fn show_model_status(&self, session: u64, status: ModelStatus, reason: Option<&str>) {
        let mut presenter = lock(&self.presenter);
        if !self.is_current(session) || presenter.model_status == status {
            return;
        }
        match status {
            ModelStatus::Loading => presenter.renderer.set_loading(Some(LOADING_MESSAGE)),
            ModelStatus::Settled => presenter.renderer.set_loading(None),
            ModelStatus::Failed => {
                presenter.renderer.set_loading(None);
                let message = match reason {
                    Some(reason) => format!("{MODEL_LOAD_FAILED}: {reason}"),
                    None => MODEL_LOAD_FAILED.to_string(),
                };
                presenter.renderer.show_message(&message);
            }
        }
        presenter.model_status = status;
    }

    /// Kick off a background availability check. `min_interval` rate-limits
    /// requests made while the service is already known offline.
    fn request_reprobe(&self, min_interval: Option<Duration>) {
        let Some(probe) = self.probe.as_ref() else {
            return;
        };
        {
            let mut last = lock(&self.last_reprobe);
            if let (Some(min), Some(at)) = (min_interval, *last) {
                if at.elapsed() < min {
                    return;
                }
            }
            *last = Some(Instant::now());
        }
        if probe.check_in_background().is_none() {
            log::debug!("availability check already in flight");
        }
    }

    /// Sleep until `delay` passes or the session ends.
    fn sleep(&self, session: u64, delay: Duration) {
        let deadline = Instant::now() + delay;
        loop {
            let now = Instant::now();
            if now >= deadline || !self.is_current(session) {
                return;
            }
            std::thread::park_timeout(deadline - now);
        }
    }
}

fn run_worker(shared: Arc<Shared>, session: u64) {
    let mut clock = FrameClock::new(shared.settings.frame_interval);
    log::debug!("session {} worker running", session);

    loop {
        if !shared.is_current(session) {
            break;
        }
        let selection = shared.selection();
        let outcome = run_cycle(&shared, session, selection);
        log::trace!("session {} cycle ({}): {:?}", session, selection, outcome);

        match next_schedule(shared.state_for(session), selection, outcome, &shared.settings) {
            Schedule::Halt => break,
            Schedule::NextFrame => {
                let wait = clock.until_next_tick(Instant::now());
                shared.sleep(session, wait);
            }
            Schedule::After(delay) => {
                // Realign the redraw clock so a switch back to local starts on a fresh tick.
                clock = FrameClock::new(shared.settings.frame_interval);
                shared.sleep(session, delay);
            }
        }
    }
    log::debug!("session {} worker exiting", session);
}

fn run_cycle(shared: &Shared, session: u64, selection: BackendSelection) -> CycleOutcome {
    shared.counters.cycles.fetch_add(1, Ordering::SeqCst);

    let Some(backend) = shared.registry.get(selection) else {
        log::error!("no backend registered for {}", selection);
        return match shared.present(session, None, &DetectionResult::empty(), None) {
            Some(_) => CycleOutcome::Failed,
            None => CycleOutcome::Discarded,
        };
    };

    match selection {
        BackendSelection::LocalModel => {
            let mut guard = lock(&*backend);
            if shared.local_retry.swap(false, Ordering::SeqCst) {
                guard.clear_load_error();
            }
            if !guard.poll_ready() {
                if let Some(reason) = guard.load_error() {
                    shared.show_model_status(session, ModelStatus::Failed, Some(reason));
                    return CycleOutcome::Deferred;
                }
                log::debug!("waiting for local model to load");
                guard.warm_up_in_background();
                shared.show_model_status(session, ModelStatus::Loading, None);
                return CycleOutcome::Deferred;
            }
            shared.show_model_status(session, ModelStatus::Settled, None);
        }
        BackendSelection::RemoteService => {
            shared.show_model_status(session, ModelStatus::Settled, None);
            if shared.availability.get() == ServiceAvailability::Offline {
                shared.request_reprobe(Some(shared.settings.reprobe_interval));
                return match shared.present(
                    session,
                    None,
                    &DetectionResult::empty(),
                    Some(SERVICE_OFFLINE),
                ) {
                    Some(_) => CycleOutcome::Skipped,
                    None => CycleOutcome::Discarded,
                };
            }
        }
    }

    let frame = {
        let mut source = lock(&shared.source);
        if !shared.is_current(session) {
            return CycleOutcome::Discarded;
        }
        match source.next_frame() {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!("frame capture from {} failed: {:#}", source.name(), err);
                return CycleOutcome::Skipped;
            }
        }
    };
    let dimensions = frame.dimensions();

    let started = Instant::now();
    let detected = lock(&*backend).detect(&frame);
    let frame_age = frame.age_ms();
    drop(frame);

    match detected {
        Ok(result) => {
            let counter = match selection {
                BackendSelection::LocalModel => &shared.counters.local_detections,
                BackendSelection::RemoteService => &shared.counters.remote_detections,
            };
            counter.fetch_add(1, Ordering::SeqCst);
            log::debug!(
                "{} detection: {} object(s) in {}ms (frame age {}ms)",
                selection,
                result.len(),
                started.elapsed().as_millis(),
                frame_age
            );
            match shared.present(session, Some(dimensions), &result, None) {
                Some(state) => CycleOutcome::Rendered(state),
                None => CycleOutcome::Discarded,
            }
        }
        Err(err) => match selection {
            BackendSelection::RemoteService => {
                let presented = shared.present(
                    session,
                    Some(dimensions),
                    &DetectionResult::empty(),
                    Some(COMMUNICATION_FAILED),
                );
                if presented.is_none() {
                    log::debug!("dropping remote failure from ended session: {}", err.reason);
                    return CycleOutcome::Discarded;
                }
                shared.counters.remote_failures.fetch_add(1, Ordering::SeqCst);
                log::error!("remote detection failed: {}", err.reason);
                shared.request_reprobe(None);
                CycleOutcome::Failed
            }
            BackendSelection::LocalModel => {
                log::error!("local detection failed: {}", err.reason);
                if shared.is_current(session) {
                    CycleOutcome::Failed
                } else {
                    CycleOutcome::Discarded
                }
            }
        },
    }
}

fn join_worker(worker: JoinHandle<()>) {
    if worker.join().is_err() {
        log::error!("detection loop worker panicked");
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
