//! Timer engine implementation.
//!
//! The timer engine is a wall-clock-based state machine. It does not use
//! internal threads - the caller (a tick scheduler, a test, a host event
//! handler) is responsible for calling `reconcile()` whenever it wants the
//! engine to catch up with the clock.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Paused <-> Running -> Completed
//!           \__________\________-> Idle (abandon)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(clock, effects, settings, completion);
//! engine.start(routine, core)?;
//! engine.resume()?;
//! // Whenever a tick or a resume signal arrives:
//! let events = engine.reconcile();
//! ```

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use super::clock::Clock;
use super::display::DisplayFrame;
use super::phase::{self, Phase};
use super::state::{Reconciled, TimerState};
use crate::completion::CompletionHandler;
use crate::error::{Result, ValidationError};
use crate::events::{Event, ResumeReason};
use crate::platform::{
    AudioOutput, Cue, DisplaySink, NoPhotos, NoWakeLock, NullAudio, NullDisplay, PosePhotoLookup,
    WakeLock,
};
use crate::routine::{compute_duration, RoutineDefinition, ScalingParameter};
use crate::storage::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Paused,
    Running,
    Completed,
}

/// Host capabilities the engine drives.
#[derive(Clone)]
pub struct Effects {
    pub audio: Arc<dyn AudioOutput>,
    pub wake_lock: Arc<dyn WakeLock>,
    pub display: Arc<dyn DisplaySink>,
    pub photos: Arc<dyn PosePhotoLookup>,
}

impl Default for Effects {
    fn default() -> Self {
        Self {
            audio: Arc::new(NullAudio),
            wake_lock: Arc::new(NoWakeLock),
            display: Arc::new(NullDisplay),
            photos: Arc::new(NoPhotos),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Off means cues are decided but not played.
    pub bell_enabled: bool,
    pub wake_lock_enabled: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            bell_enabled: true,
            wake_lock_enabled: true,
        }
    }
}

impl From<&Config> for EngineSettings {
    fn from(config: &Config) -> Self {
        Self {
            bell_enabled: config.cues.bell_enabled,
            wake_lock_enabled: config.display.wake_lock_enabled,
        }
    }
}

/// What was captured when the session started.
struct ActiveSession {
    routine: RoutineDefinition,
    core: ScalingParameter,
    state: TimerState,
}

pub struct TimerEngine {
    clock: Arc<dyn Clock>,
    effects: Effects,
    settings: EngineSettings,
    completion: CompletionHandler,
    session: Option<ActiveSession>,
    status: SessionStatus,
}

impl TimerEngine {
    pub fn new(
        clock: Arc<dyn Clock>,
        effects: Effects,
        settings: EngineSettings,
        completion: CompletionHandler,
    ) -> Self {
        Self {
            clock,
            effects,
            settings,
            completion,
            session: None,
            status: SessionStatus::Idle,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn state(&self) -> Option<&TimerState> {
        self.session.as_ref().map(|s| &s.state)
    }

    pub fn routine(&self) -> Option<&RoutineDefinition> {
        self.session.as_ref().map(|s| &s.routine)
    }

    pub fn current_index(&self) -> Option<usize> {
        self.state().map(TimerState::current_index)
    }

    pub fn current_phase(&self) -> Option<&Phase> {
        self.state().map(TimerState::current_phase)
    }

    pub fn elapsed_ms(&self) -> Option<u64> {
        let now = self.now_ms();
        self.state().map(|s| s.elapsed_ms(now))
    }

    pub fn remaining_ms(&self) -> Option<u64> {
        let now = self.now_ms();
        self.state().map(|s| s.remaining_ms(now))
    }

    /// How long ago the current phase should have ended. `None` while paused,
    /// idle, or inside the phase.
    pub fn overdue_ms(&self) -> Option<u64> {
        if !self.is_running() {
            return None;
        }
        let now = self.now_ms();
        self.state().and_then(|s| s.overdue_ms(now))
    }

    pub fn frame(&self) -> Option<DisplayFrame> {
        let session = self.session.as_ref()?;
        Some(DisplayFrame::compose(
            &session.routine.name,
            &session.state,
            self.now_ms(),
            self.effects.photos.as_ref(),
        ))
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Build the phase list and install a fresh, paused session.
    pub fn start(&mut self, routine: RoutineDefinition, core: ScalingParameter) -> Result<Vec<Event>> {
        if let Some(active) = &self.session {
            return Err(ValidationError::SessionActive(active.routine.name.clone()).into());
        }
        routine.validate()?;

        let now = self.now_ms();
        let phases = phase::build(&routine, core);
        let phase_count = phases.len();
        let state = TimerState::new(phases, now)?;
        let planned_minutes = compute_duration(&routine, core);

        tracing::info!(
            routine = %routine.name,
            phases = phase_count,
            planned_minutes,
            core = core.get(),
            "session started"
        );

        let routine_name = routine.name.clone();
        self.session = Some(ActiveSession {
            routine,
            core,
            state,
        });
        self.status = SessionStatus::Paused;

        self.acquire_wake_lock();
        self.ensure_audio();
        self.render();

        Ok(vec![Event::SessionStarted {
            routine_name,
            phase_count,
            planned_minutes,
            at: Utc::now(),
        }])
    }

    pub fn resume(&mut self) -> Result<Vec<Event>, ValidationError> {
        let now = self.now_ms();
        let session = self.session.as_mut().ok_or(ValidationError::NoActiveSession)?;
        if !session.state.resume(now) {
            return Ok(Vec::new());
        }
        let event = Event::TimerResumed {
            phase_index: session.state.current_index(),
            remaining_ms: session.state.remaining_ms(now),
            at: Utc::now(),
        };
        self.status = SessionStatus::Running;
        // Every resume counts as a fresh gesture for the audio output.
        self.ensure_audio();
        self.render();
        Ok(vec![event])
    }

    pub fn pause(&mut self) -> Result<Vec<Event>, ValidationError> {
        let now = self.now_ms();
        let session = self.session.as_mut().ok_or(ValidationError::NoActiveSession)?;
        if !session.state.pause(now) {
            return Ok(Vec::new());
        }
        let event = Event::TimerPaused {
            phase_index: session.state.current_index(),
            remaining_ms: session.state.remaining_ms(now),
            at: Utc::now(),
        };
        self.status = SessionStatus::Paused;
        self.render();
        Ok(vec![event])
    }

    pub fn toggle(&mut self) -> Result<Vec<Event>, ValidationError> {
        if self.is_running() {
            self.pause()
        } else {
            self.resume()
        }
    }

    /// Manual skip forward. Skipping past the last phase completes the session.
    pub fn advance(&mut self) -> Result<Vec<Event>, ValidationError> {
        let now = self.now_ms();
        let session = self.session.as_mut().ok_or(ValidationError::NoActiveSession)?;
        let from = session.state.current_index();
        match session.state.advance(now) {
            Some(to) => Ok(vec![self.phase_changed(from, to, 1, true)]),
            None => Ok(self.complete()),
        }
    }

    /// Skip back. At phase 0 this only restarts the phase clock, silently.
    pub fn retreat(&mut self) -> Result<Vec<Event>, ValidationError> {
        let now = self.now_ms();
        let session = self.session.as_mut().ok_or(ValidationError::NoActiveSession)?;
        let from = session.state.current_index();
        let to = session.state.retreat(now);
        if to != from {
            self.play(Cue::PhaseChanged);
        }
        self.render();
        Ok(vec![Event::PhaseRewound {
            from,
            to,
            at: Utc::now(),
        }])
    }

    pub fn seek_to_phase(&mut self, index: usize) -> Result<Vec<Event>, ValidationError> {
        let now = self.now_ms();
        let session = self.session.as_mut().ok_or(ValidationError::NoActiveSession)?;
        let from = session.state.current_index();
        session.state.seek(index, now)?;

        if index > from {
            Ok(vec![self.phase_changed(from, index, index - from, true)])
        } else {
            self.play(Cue::PhaseChanged);
            self.render();
            Ok(vec![Event::PhaseRewound {
                from,
                to: index,
                at: Utc::now(),
            }])
        }
    }

    /// Catch up with the clock. Called by the tick drivers and by every
    /// resume signal; a no-op without an active session, so calls that land
    /// after completion do nothing.
    pub fn reconcile(&mut self) -> Vec<Event> {
        let now = self.now_ms();
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        match session.state.reconcile(now) {
            Reconciled::Tick => {
                self.render();
                Vec::new()
            }
            Reconciled::Advanced { from, to, crossed } => {
                if crossed > 1 {
                    tracing::info!(from, to, crossed, "caught up through several phases");
                }
                vec![self.phase_changed(from, to, crossed, false)]
            }
            Reconciled::Exhausted { from, crossed } => {
                tracing::debug!(from, crossed, "phase list exhausted");
                self.complete()
            }
        }
    }

    /// Recovery after a possible suspension: catch up, then win back any
    /// resources the host took away while we were gone.
    pub fn recover(&mut self, reason: ResumeReason) -> Vec<Event> {
        if self.session.is_none() {
            return Vec::new();
        }
        tracing::debug!(reason = reason.as_str(), "possible resume");
        let mut events = vec![Event::ResumeDetected {
            reason,
            at: Utc::now(),
        }];
        events.extend(self.reconcile());

        if self.is_running() {
            if !self.effects.wake_lock.is_held() {
                self.acquire_wake_lock();
            }
            self.ensure_audio();
        }
        events
    }

    /// Drop the session without a record.
    pub fn abandon(&mut self) -> Result<Vec<Event>, ValidationError> {
        let now = self.now_ms();
        let session = self.session.take().ok_or(ValidationError::NoActiveSession)?;
        self.status = SessionStatus::Idle;
        self.effects.wake_lock.release();
        tracing::info!(
            routine = %session.routine.name,
            phase = session.state.current_index(),
            elapsed_ms = session.state.elapsed_ms(now),
            "session abandoned"
        );
        self.effects.display.show_idle();
        Ok(vec![Event::SessionAbandoned {
            routine_name: session.routine.name,
            phase_index: session.state.current_index(),
            at: Utc::now(),
        }])
    }

    /// Return to the home view after a completed session. Ignored while a
    /// session is active, so a late linger cannot wipe a newer session.
    pub fn show_idle(&mut self) -> bool {
        if self.session.is_some() {
            return false;
        }
        if self.status == SessionStatus::Completed {
            self.status = SessionStatus::Idle;
        }
        self.effects.display.show_idle();
        true
    }

    /// Push buffered history to disk.
    pub fn flush_storage(&mut self) -> Result<()> {
        self.completion.flush()
    }

    /// Sink publishes started by completions and not yet collected.
    pub fn take_pending_publishes(&mut self) -> Vec<JoinHandle<()>> {
        self.completion.take_pending()
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn phase_changed(&mut self, from: usize, to: usize, crossed: usize, manual: bool) -> Event {
        self.play(Cue::PhaseChanged);
        self.render();
        let (category, label) = self
            .current_phase()
            .map(|p| (p.category, p.label.clone()))
            .unwrap_or((phase::PhaseCategory::Pose, String::new()));
        tracing::debug!(from, to, crossed, manual, label = %label, "phase changed");
        Event::PhaseAdvanced {
            from,
            to,
            crossed,
            category,
            label,
            manual,
            at: Utc::now(),
        }
    }

    fn complete(&mut self) -> Vec<Event> {
        let Some(session) = self.session.take() else {
            return Vec::new();
        };
        let now = self.now_ms();
        self.status = SessionStatus::Completed;
        self.effects.wake_lock.release();

        let record = CompletionHandler::build_record(
            &session.routine,
            session.core,
            session.state.session_started_at_ms(),
            now,
        );
        tracing::info!(
            routine = %record.routine_name,
            planned = record.planned_duration_min,
            actual = record.actual_duration_min,
            "session completed"
        );
        self.completion.finish(&record);
        self.play(Cue::SessionComplete);

        vec![Event::SessionCompleted {
            record,
            at: Utc::now(),
        }]
    }

    fn render(&self) {
        if let Some(frame) = self.frame() {
            self.effects.display.render(&frame);
        }
    }

    fn play(&self, cue: Cue) {
        if !self.settings.bell_enabled {
            return;
        }
        if let Err(e) = self.effects.audio.play(cue) {
            tracing::warn!(?cue, error = %e, "audio cue failed, continuing silently");
        }
    }

    fn ensure_audio(&self) {
        if let Err(e) = self.effects.audio.ensure_ready() {
            tracing::warn!(error = %e, "audio output unavailable");
        }
    }

    fn acquire_wake_lock(&self) {
        if !self.settings.wake_lock_enabled {
            return;
        }
        if let Err(e) = self.effects.wake_lock.acquire() {
            tracing::warn!(error = %e, "wake-lock unavailable, screen may sleep");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CoreError, ResourceError};
    use crate::platform::FlagWakeLock;
    use crate::routine::{catalog, PoseScaling, PoseSpec, RoutineBody, RoutineOrigin};
    use crate::storage::Database;
    use crate::timer::clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingAudio {
        changes: AtomicUsize,
        completes: AtomicUsize,
        readies: AtomicUsize,
    }

    impl AudioOutput for CountingAudio {
        fn ensure_ready(&self) -> Result<(), ResourceError> {
            self.readies.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn play(&self, cue: Cue) -> Result<(), ResourceError> {
            match cue {
                Cue::PhaseChanged => self.changes.fetch_add(1, Ordering::SeqCst),
                Cue::SessionComplete => self.completes.fetch_add(1, Ordering::SeqCst),
            };
            Ok(())
        }
    }

    #[derive(Default)]
    struct LastFrame(Mutex<Option<DisplayFrame>>);

    impl DisplaySink for LastFrame {
        fn render(&self, frame: &DisplayFrame) {
            *self.0.lock().unwrap() = Some(frame.clone());
        }

        fn show_idle(&self) {
            *self.0.lock().unwrap() = None;
        }
    }

    struct Harness {
        engine: TimerEngine,
        clock: Arc<ManualClock>,
        audio: Arc<CountingAudio>,
        lock: Arc<FlagWakeLock>,
        display: Arc<LastFrame>,
    }

    fn harness() -> Harness {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let audio = Arc::new(CountingAudio::default());
        let lock = Arc::new(FlagWakeLock::default());
        let display = Arc::new(LastFrame::default());
        let effects = Effects {
            audio: audio.clone(),
            wake_lock: lock.clone(),
            display: display.clone(),
            photos: Arc::new(NoPhotos),
        };
        let engine = TimerEngine::new(
            clock.clone(),
            effects,
            EngineSettings::default(),
            CompletionHandler::new(Box::new(Database::open_memory().unwrap())),
        );
        Harness {
            engine,
            clock,
            audio,
            lock,
            display,
        }
    }

    fn minutes_routine(minutes: &[f64]) -> RoutineDefinition {
        RoutineDefinition {
            name: "Short Flow".into(),
            focus: String::new(),
            body: RoutineBody::TimedSequence {
                poses: minutes
                    .iter()
                    .enumerate()
                    .map(|(i, m)| PoseSpec {
                        name: format!("Pose {}", i + 1),
                        base_duration_min: *m,
                        scaling: PoseScaling::Fixed,
                        description: String::new(),
                    })
                    .collect(),
            },
            origin: RoutineOrigin::BuiltIn,
        }
    }

    #[test]
    fn start_installs_paused_session_and_takes_resources() {
        let mut h = harness();
        let events = h
            .engine
            .start(catalog::upper_body(), ScalingParameter::default())
            .unwrap();
        assert!(matches!(events[0], Event::SessionStarted { planned_minutes: 58, .. }));
        assert_eq!(h.engine.status(), SessionStatus::Paused);
        assert!(h.lock.is_held());
        assert_eq!(h.audio.readies.load(Ordering::SeqCst), 1);

        let frame = h.display.0.lock().unwrap().clone().unwrap();
        assert_eq!(frame.label, "Melting Heart");
        assert!(!frame.running);
    }

    #[test]
    fn starting_twice_is_rejected_without_mutation() {
        let mut h = harness();
        h.engine.start(catalog::upper_body(), ScalingParameter::default()).unwrap();
        h.engine.resume().unwrap();
        h.clock.advance(5_000);

        let err = h
            .engine
            .start(catalog::yin_yoga(), ScalingParameter::default())
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::SessionActive(_))));
        assert_eq!(h.engine.routine().unwrap().name, "Upper Body");
        assert_eq!(h.engine.elapsed_ms(), Some(5_000));
    }

    #[test]
    fn commands_without_session_report_no_active_session() {
        let mut h = harness();
        assert!(matches!(h.engine.resume(), Err(ValidationError::NoActiveSession)));
        assert!(matches!(h.engine.advance(), Err(ValidationError::NoActiveSession)));
        assert!(matches!(h.engine.abandon(), Err(ValidationError::NoActiveSession)));
        assert!(h.engine.reconcile().is_empty());
    }

    #[test]
    fn resume_and_pause_are_idempotent() {
        let mut h = harness();
        h.engine.start(minutes_routine(&[1.0, 1.0]), ScalingParameter::default()).unwrap();
        assert_eq!(h.engine.resume().unwrap().len(), 1);
        assert!(h.engine.resume().unwrap().is_empty());
        assert_eq!(h.engine.pause().unwrap().len(), 1);
        assert!(h.engine.pause().unwrap().is_empty());
        assert_eq!(h.audio.readies.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn reconcile_coalesces_crossed_boundaries_into_one_cue() {
        let mut h = harness();
        h.engine
            .start(minutes_routine(&[1.0, 1.0, 1.0, 1.0, 1.0]), ScalingParameter::default())
            .unwrap();
        h.engine.resume().unwrap();
        h.clock.advance(3 * 60_000 + 20_000);

        let events = h.engine.reconcile();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            Event::PhaseAdvanced { from: 0, to: 3, crossed: 3, manual: false, .. }
        ));
        assert_eq!(h.audio.changes.load(Ordering::SeqCst), 1);
        assert_eq!(h.engine.elapsed_ms(), Some(20_000));
    }

    #[test]
    fn completion_happens_exactly_once() {
        let mut h = harness();
        h.engine.start(minutes_routine(&[1.0, 1.0]), ScalingParameter::default()).unwrap();
        h.engine.resume().unwrap();
        h.clock.advance(10 * 60_000);

        let events = h.engine.reconcile();
        assert!(events.iter().any(Event::is_completion));
        assert_eq!(h.engine.status(), SessionStatus::Completed);
        assert!(!h.lock.is_held());

        for _ in 0..3 {
            h.clock.advance(1_000);
            assert!(h.engine.reconcile().is_empty());
        }
        assert_eq!(h.audio.completes.load(Ordering::SeqCst), 1);
        assert!(!h.engine.has_session());

        assert!(h.engine.show_idle());
        assert_eq!(h.engine.status(), SessionStatus::Idle);
    }

    #[test]
    fn show_idle_leaves_an_active_session_alone() {
        let mut h = harness();
        h.engine.start(minutes_routine(&[1.0]), ScalingParameter::default()).unwrap();
        assert!(!h.engine.show_idle());
        assert_eq!(h.engine.status(), SessionStatus::Paused);
        assert!(h.display.0.lock().unwrap().is_some());
    }

    #[test]
    fn advance_on_last_phase_completes() {
        let mut h = harness();
        h.engine.start(minutes_routine(&[1.0, 1.0]), ScalingParameter::default()).unwrap();
        assert_eq!(h.engine.advance().unwrap().len(), 1);
        let events = h.engine.advance().unwrap();
        match &events[0] {
            Event::SessionCompleted { record, .. } => {
                assert_eq!(record.planned_duration_min, 2);
                assert_eq!(record.actual_duration_min, 0);
            }
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[test]
    fn retreat_never_completes() {
        let mut h = harness();
        h.engine.start(minutes_routine(&[1.0, 1.0]), ScalingParameter::default()).unwrap();
        h.engine.resume().unwrap();
        h.clock.advance(30_000);

        h.engine.retreat().unwrap();
        assert_eq!(h.engine.current_index(), Some(0));
        assert_eq!(h.engine.elapsed_ms(), Some(0));
        assert_eq!(h.audio.changes.load(Ordering::SeqCst), 0);

        h.engine.advance().unwrap();
        h.engine.retreat().unwrap();
        assert_eq!(h.engine.current_index(), Some(0));
        assert_eq!(h.audio.changes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn seek_rejects_bad_index_and_chimes_on_success() {
        let mut h = harness();
        h.engine
            .start(minutes_routine(&[1.0, 1.0, 1.0]), ScalingParameter::default())
            .unwrap();
        assert!(matches!(
            h.engine.seek_to_phase(3),
            Err(ValidationError::OutOfBounds { index: 3, len: 3, .. })
        ));
        assert_eq!(h.audio.changes.load(Ordering::SeqCst), 0);

        h.engine.seek_to_phase(2).unwrap();
        assert_eq!(h.engine.current_index(), Some(2));
        h.engine.seek_to_phase(0).unwrap();
        assert_eq!(h.engine.current_index(), Some(0));
        assert_eq!(h.audio.changes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn recover_reacquires_revoked_wake_lock() {
        let mut h = harness();
        h.engine.start(minutes_routine(&[5.0]), ScalingParameter::default()).unwrap();
        h.engine.resume().unwrap();
        h.lock.revoke();

        let events = h.engine.recover(ResumeReason::VisibilityRestored);
        assert!(matches!(events[0], Event::ResumeDetected { .. }));
        assert!(h.lock.is_held());
    }

    #[test]
    fn recover_while_paused_leaves_lock_alone() {
        let mut h = harness();
        h.engine.start(minutes_routine(&[5.0]), ScalingParameter::default()).unwrap();
        h.lock.revoke();
        h.engine.recover(ResumeReason::FocusRegained);
        assert!(!h.lock.is_held());
    }

    #[test]
    fn bell_disabled_keeps_events_but_silences_cues() {
        let mut h = harness();
        h.engine.settings.bell_enabled = false;
        h.engine.start(minutes_routine(&[1.0, 1.0]), ScalingParameter::default()).unwrap();
        let events = h.engine.advance().unwrap();
        assert!(matches!(events[0], Event::PhaseAdvanced { .. }));
        assert_eq!(h.audio.changes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn abandon_releases_lock_and_returns_to_idle() {
        let mut h = harness();
        h.engine.start(minutes_routine(&[1.0, 1.0]), ScalingParameter::default()).unwrap();
        h.engine.abandon().unwrap();
        assert_eq!(h.engine.status(), SessionStatus::Idle);
        assert!(!h.lock.is_held());
        assert!(h.display.0.lock().unwrap().is_none());
        h.engine
            .start(minutes_routine(&[1.0, 1.0]), ScalingParameter::default())
            .unwrap();
    }
}
