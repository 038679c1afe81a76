//! Scheduling rules for the detection loop.
//!
//! After every cycle the worker asks `next_schedule` what to do next. The rules
//! are a pure function of the loop state, the backend the cycle used and how the
//! cycle ended, so they can be tested without threads or clocks.

use std::time::{Duration, Instant};

use crate::{AlertState, BackendSelection, LoopState};

#[derive(Clone, Debug)]
pub struct LoopSettings {
    /// Display redraw interval; local cycles run once per tick.
    pub frame_interval: Duration,
    /// Delay between the end of one remote request and the start of the next.
    pub remote_pacing: Duration,
    /// Delay before retrying while the local model is still loading.
    pub model_retry: Duration,
    /// Minimum spacing of re-probes requested while the service is offline.
    pub reprobe_interval: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            frame_interval: frame_interval(30),
            remote_pacing: Duration::from_millis(250),
            model_retry: Duration::from_millis(500),
            reprobe_interval: Duration::from_secs(2),
        }
    }
}

/// How one cycle ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Detections were rendered.
    Rendered(AlertState),
    /// The local model is not loaded yet; nothing was captured.
    Deferred,
    /// The backend call failed. Remote failures rendered an empty result.
    Failed,
    /// No detection ran (capture failed, or the service is known offline).
    Skipped,
    /// The session ended while the cycle was in flight; its result was dropped.
    Discarded,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Schedule {
    /// Run again at the next redraw tick.
    NextFrame,
    /// Run again after a fixed delay.
    After(Duration),
    /// Do not reschedule.
    Halt,
}

/// Decide when the next cycle runs.
pub fn next_schedule(
    state: LoopState,
    selection: BackendSelection,
    outcome: CycleOutcome,
    settings: &LoopSettings,
) -> Schedule {
    if state == LoopState::Idle || outcome == CycleOutcome::Discarded {
        return Schedule::Halt;
    }
    if outcome == CycleOutcome::Deferred {
        return Schedule::After(settings.model_retry);
    }
    match selection {
        BackendSelection::LocalModel => Schedule::NextFrame,
        BackendSelection::RemoteService => Schedule::After(settings.remote_pacing),
    }
}

pub fn frame_interval(fps: u32) -> Duration {
    if fps == 0 {
        Duration::ZERO
    } else {
        Duration::from_millis((1000 / fps as u64).max(1))
    }
}

/// Fixed-rate tick source standing in for the display's redraw callback.
///
/// Ticks fall on multiples of `interval` from the clock's origin, so a cycle
/// that overruns one tick waits for the following one instead of drifting.
#[derive(Clone, Debug)]
pub struct FrameClock {
    origin: Instant,
    interval: Duration,
}

impl FrameClock {
    pub fn new(interval: Duration) -> Self {
        Self {
            origin: Instant::now(),
            interval,
        }
    }

    /// Time from `now` until the next tick.
    pub fn until_next_tick(&self, now: Instant) -> Duration {
        if self.interval.is_zero() {
            return Duration::ZERO;
        }
        let elapsed = now.saturating_duration_since(self.origin).as_nanos();
        let interval = self.interval.as_nanos();
        let into_tick = elapsed % interval;
        Duration::from_nanos((interval - into_tick) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> LoopSettings {
        LoopSettings::default()
    }

    #[test]
    fn idle_always_halts() {
        for outcome in [
            CycleOutcome::Rendered(AlertState::Active),
            CycleOutcome::Deferred,
            CycleOutcome::Failed,
        ] {
            assert_eq!(
                next_schedule(LoopState::Idle, BackendSelection::LocalModel, outcome, &settings()),
                Schedule::Halt
            );
        }
    }

    #[test]
    fn discarded_cycle_halts_even_if_running() {
        assert_eq!(
            next_schedule(
                LoopState::Running,
                BackendSelection::RemoteService,
                CycleOutcome::Discarded,
                &settings()
            ),
            Schedule::Halt
        );
    }

    #[test]
    fn local_runs_at_redraw_cadence_even_after_failure() {
        for outcome in [
            CycleOutcome::Rendered(AlertState::Clear),
            CycleOutcome::Failed,
            CycleOutcome::Skipped,
        ] {
            assert_eq!(
                next_schedule(LoopState::Running, BackendSelection::LocalModel, outcome, &settings()),
                Schedule::NextFrame
            );
        }
    }

    #[test]
    fn pending_model_waits_retry_delay() {
        assert_eq!(
            next_schedule(
                LoopState::Running,
                BackendSelection::LocalModel,
                CycleOutcome::Deferred,
                &settings()
            ),
            Schedule::After(Duration::from_millis(500))
        );
    }

    #[test]
    fn remote_paces_regardless_of_outcome() {
        for outcome in [
            CycleOutcome::Rendered(AlertState::Active),
            CycleOutcome::Failed,
            CycleOutcome::Skipped,
        ] {
            assert_eq!(
                next_schedule(
                    LoopState::Running,
                    BackendSelection::RemoteService,
                    outcome,
                    &settings()
                ),
                Schedule::After(Duration::from_millis(250))
            );
        }
    }

    #[test]
    fn frame_clock_aligns_to_ticks() {
        let clock = FrameClock::new(Duration::from_millis(40));
        let origin = clock.origin;
        assert_eq!(
            clock.until_next_tick(origin + Duration::from_millis(10)),
            Duration::from_millis(30)
        );
        assert_eq!(
            clock.until_next_tick(origin + Duration::from_millis(95)),
            Duration::from_millis(25)
        );
        assert_eq!(
            clock.until_next_tick(origin + Duration::from_millis(80)),
            Duration::from_millis(40)
        );
    }

    #[test]
    fn zero_fps_means_no_wait() {
        assert_eq!(frame_interval(0), Duration::ZERO);
        assert_eq!(frame_interval(30), Duration::from_millis(33));
        let clock = FrameClock::new(frame_interval(0));
        assert_eq!(clock.until_next_tick(Instant::now()), Duration::ZERO);
    }
}
