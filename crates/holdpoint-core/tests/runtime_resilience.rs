//! Integration tests for the async runtime: tick drivers, suspend recovery,
//! watchdog and completion linger. All run on paused tokio time.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use holdpoint_core::platform::{AudioOutput, Cue, FlagWakeLock, NoPhotos, NullDisplay, WakeLock};
use holdpoint_core::routine::{PoseScaling, PoseSpec, RoutineBody, RoutineOrigin};
use holdpoint_core::runtime::WatchdogVerdict;
use holdpoint_core::storage::TimingConfig;
use holdpoint_core::timer::{Clock, Effects, EngineSettings, TokioClock};
use holdpoint_core::{
    CompletionHandler, Database, Event, ResourceError, RoutineDefinition, ScalingParameter,
    SessionRuntime, SessionStatus, TimerEngine,
};
use tokio::sync::mpsc::UnboundedReceiver;

/// Follows tokio time, plus a jump that stands in for an OS suspend: wall time
/// moves while no task gets to run.
struct SuspendableClock {
    base: TokioClock,
    jumped: AtomicU64,
}

impl SuspendableClock {
    fn suspend_for(&self, ms: u64) {
        self.jumped.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for SuspendableClock {
    fn now_ms(&self) -> u64 {
        self.base.now_ms() + self.jumped.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct CountingAudio {
    changes: AtomicUsize,
    completes: AtomicUsize,
}

impl AudioOutput for CountingAudio {
    fn ensure_ready(&self) -> Result<(), ResourceError> {
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

struct Rig {
    runtime: SessionRuntime,
    events: UnboundedReceiver<Event>,
    clock: Arc<SuspendableClock>,
    audio: Arc<CountingAudio>,
    lock: Arc<FlagWakeLock>,
}

impl Rig {
    fn drain(&mut self) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    fn index(&self) -> Option<usize> {
        self.runtime.with_engine(|e| e.current_index())
    }
}

fn rig() -> Rig {
    let clock = Arc::new(SuspendableClock {
        base: TokioClock::new(1_700_000_000_000),
        jumped: AtomicU64::new(0),
    });
    let audio = Arc::new(CountingAudio::default());
    let lock = Arc::new(FlagWakeLock::default());
    let effects = Effects {
        audio: audio.clone(),
        wake_lock: lock.clone(),
        display: Arc::new(NullDisplay),
        photos: Arc::new(NoPhotos),
    };
    let engine = TimerEngine::new(
        clock.clone(),
        effects,
        EngineSettings::default(),
        CompletionHandler::new(Box::new(Database::open_memory().unwrap())),
    );
    let (runtime, events) = SessionRuntime::new(engine, &TimingConfig::default());
    Rig {
        runtime,
        events,
        clock,
        audio,
        lock,
    }
}

fn one_minute_poses(count: usize) -> RoutineDefinition {
    RoutineDefinition {
        name: "Minute Flow".into(),
        focus: String::new(),
        body: RoutineBody::TimedSequence {
            poses: (1..=count)
                .map(|i| PoseSpec {
                    name: format!("Pose {i}"),
                    base_duration_min: 1.0,
                    scaling: PoseScaling::Fixed,
                    description: String::new(),
                })
                .collect(),
        },
        origin: RoutineOrigin::BuiltIn,
    }
}

#[tokio::test(start_paused = true)]
async fn fallback_keeps_cues_on_time_while_hidden() {
    let mut rig = rig();
    rig.runtime.start(one_minute_poses(3), ScalingParameter::default()).unwrap();
    rig.runtime.resume().unwrap();
    assert_eq!(rig.runtime.drivers_armed(), (true, true));

    rig.runtime.set_visible(false);
    assert_eq!(rig.runtime.drivers_armed(), (false, true));

    tokio::time::sleep(Duration::from_millis(60_600)).await;
    assert_eq!(rig.index(), Some(1));
    assert_eq!(rig.audio.changes.load(Ordering::SeqCst), 1);
    assert!(!rig.runtime.drivers_armed().0, "frame loop must stay off while hidden");

    let advanced = rig
        .drain()
        .into_iter()
        .filter(|e| matches!(e, Event::PhaseAdvanced { manual: false, .. }))
        .count();
    assert_eq!(advanced, 1);
}

#[tokio::test(start_paused = true)]
async fn pause_turns_pending_ticks_into_no_ops() {
    let mut rig = rig();
    rig.runtime.start(one_minute_poses(2), ScalingParameter::default()).unwrap();
    rig.runtime.resume().unwrap();
    let armed_under = rig.runtime.tick_generation();

    rig.runtime.pause().unwrap();
    assert!(rig.runtime.tick_generation() > armed_under);
    assert_eq!(rig.runtime.drivers_armed(), (false, false));

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(rig.index(), Some(0));
    assert_eq!(rig.runtime.status(), SessionStatus::Paused);
    assert_eq!(rig.audio.changes.load(Ordering::SeqCst), 0);
    assert!(!rig.drain().iter().any(|e| matches!(e, Event::PhaseAdvanced { .. })));
}

#[tokio::test(start_paused = true)]
async fn visibility_restored_catches_up_after_suspend() {
    let mut rig = rig();
    rig.runtime.start(one_minute_poses(4), ScalingParameter::default()).unwrap();
    rig.runtime.resume().unwrap();
    rig.runtime.set_visible(false);
    rig.drain();

    rig.clock.suspend_for(150_000);
    rig.lock.revoke();
    rig.runtime.set_visible(true);

    let events = rig.drain();
    assert!(matches!(
        events[0],
        Event::ResumeDetected {
            reason: holdpoint_core::ResumeReason::VisibilityRestored,
            ..
        }
    ));
    assert!(matches!(
        events[1],
        Event::PhaseAdvanced { from: 0, to: 2, crossed: 2, .. }
    ));
    assert_eq!(rig.audio.changes.load(Ordering::SeqCst), 1);
    assert!(rig.lock.is_held());
    assert_eq!(rig.runtime.drivers_armed(), (true, true));
    let remaining = rig.runtime.with_engine(|e| e.remaining_ms());
    assert_eq!(remaining, Some(30_000));
}

#[tokio::test(start_paused = true)]
async fn suspend_past_the_end_completes_once() {
    let mut rig = rig();
    rig.runtime.start(one_minute_poses(2), ScalingParameter::default()).unwrap();
    rig.runtime.resume().unwrap();
    rig.clock.suspend_for(10 * 60_000);

    rig.runtime.on_possible_resume(holdpoint_core::ResumeReason::FocusRegained);
    rig.runtime.on_possible_resume(holdpoint_core::ResumeReason::RestoredFromCache);
    tokio::time::sleep(Duration::from_secs(1)).await;

    let completions = rig.drain().iter().filter(|e| e.is_completion()).count();
    assert_eq!(completions, 1);
    assert_eq!(rig.audio.completes.load(Ordering::SeqCst), 1);
    assert_eq!(rig.runtime.drivers_armed(), (false, false));
    assert!(!rig.lock.is_held());
}

#[tokio::test(start_paused = true)]
async fn watchdog_restarts_a_stalled_frame_loop() {
    let mut rig = rig();
    rig.runtime.start(one_minute_poses(3), ScalingParameter::default()).unwrap();
    rig.runtime.resume().unwrap();
    assert_eq!(rig.runtime.watchdog_check(), WatchdogVerdict::Healthy);

    // Wall time passes without any task running.
    rig.clock.suspend_for(61_500);
    assert_eq!(
        rig.runtime.watchdog_check(),
        WatchdogVerdict::Restarted {
            overdue_ms: 1_500,
            restarts: 1
        }
    );
    assert!(rig.runtime.drivers_armed().0);

    rig.runtime.watchdog_check();
    assert_eq!(rig.index(), Some(0));
    rig.runtime.watchdog_check();
    let events = rig.drain();
    let stalls: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, Event::SchedulerStalled { .. }))
        .collect();
    assert_eq!(stalls.len(), 1);
    assert!(matches!(stalls[0], Event::SchedulerStalled { restarts: 3, .. }));
    // The third strike escalates to a full recovery.
    assert!(events.iter().any(|e| matches!(
        e,
        Event::ResumeDetected {
            reason: holdpoint_core::ResumeReason::Watchdog,
            ..
        }
    )));
    assert_eq!(rig.index(), Some(1));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(rig.index(), Some(1));
    assert_eq!(rig.runtime.watchdog_check(), WatchdogVerdict::Healthy);
}

#[tokio::test(start_paused = true)]
async fn watchdog_ignores_hidden_and_paused_sessions() {
    let rig = rig();
    assert_eq!(rig.runtime.watchdog_check(), WatchdogVerdict::Idle);

    rig.runtime.start(one_minute_poses(2), ScalingParameter::default()).unwrap();
    rig.clock.suspend_for(120_000);
    assert_eq!(rig.runtime.watchdog_check(), WatchdogVerdict::Idle);

    rig.runtime.resume().unwrap();
    rig.runtime.set_visible(false);
    rig.clock.suspend_for(120_000);
    assert_eq!(rig.runtime.watchdog_check(), WatchdogVerdict::Idle);
}

#[tokio::test(start_paused = true)]
async fn completion_lingers_then_returns_to_idle() {
    let mut rig = rig();
    rig.runtime.start(one_minute_poses(1), ScalingParameter::default()).unwrap();
    rig.runtime.resume().unwrap();

    tokio::time::sleep(Duration::from_millis(60_100)).await;
    assert_eq!(rig.runtime.status(), SessionStatus::Completed);
    let events = rig.drain();
    let record = events
        .iter()
        .find_map(|e| match e {
            Event::SessionCompleted { record, .. } => Some(record.clone()),
            _ => None,
        })
        .expect("session completed");
    assert_eq!(record.routine_name, "Minute Flow");
    assert_eq!(record.planned_duration_min, 1);
    assert_eq!(record.actual_duration_min, 1);

    tokio::time::sleep(Duration::from_millis(1_600)).await;
    assert_eq!(rig.runtime.status(), SessionStatus::Idle);
    assert!(rig.drain().iter().any(|e| matches!(e, Event::ReturnedToIdle { .. })));
}

#[tokio::test(start_paused = true)]
async fn late_linger_leaves_a_new_session_alone() {
    let mut rig = rig();
    rig.runtime.start(one_minute_poses(1), ScalingParameter::default()).unwrap();
    rig.runtime.advance().unwrap();
    assert_eq!(rig.runtime.status(), SessionStatus::Completed);

    rig.runtime.start(one_minute_poses(2), ScalingParameter::default()).unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(rig.runtime.status(), SessionStatus::Paused);
    assert!(!rig.drain().iter().any(|e| matches!(e, Event::ReturnedToIdle { .. })));
}

#[tokio::test(start_paused = true)]
async fn abandon_stops_everything() {
    let rig = rig();
    rig.runtime.start(one_minute_poses(2), ScalingParameter::default()).unwrap();
    rig.runtime.resume().unwrap();
    rig.runtime.abandon().unwrap();

    assert_eq!(rig.runtime.status(), SessionStatus::Idle);
    assert_eq!(rig.runtime.drivers_armed(), (false, false));
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(rig.audio.changes.load(Ordering::SeqCst), 0);
    assert!(rig.runtime.resume().is_err());
}
