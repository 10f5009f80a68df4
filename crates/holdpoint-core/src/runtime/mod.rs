//! Async host for a [`TimerEngine`]: tick drivers, resume handling and the
//! completion linger, on tokio.
//!
//! All engine mutation goes through one mutex, so a tick, a resume signal
//! and a user command can never interleave mid-update. The lock is never held
//! across an await.

mod scheduler;
mod supervisor;

pub use scheduler::TickScheduler;
pub use supervisor::{ResilienceSupervisor, WatchdogVerdict};

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;

use crate::error::{Result, ValidationError};
use crate::events::{Event, ResumeReason};
use crate::routine::{RoutineDefinition, ScalingParameter};
use crate::storage::{Config, TimingConfig};
use crate::timer::{DisplayFrame, SessionStatus, TimerEngine};

/// Settings file the supervisor rewrites when the surface goes hidden.
struct SettingsFile {
    config: Config,
    path: PathBuf,
}

pub(crate) struct Core {
    engine: Mutex<TimerEngine>,
    scheduler: TickScheduler,
    supervisor: ResilienceSupervisor,
    events: mpsc::UnboundedSender<Event>,
    visible: AtomicBool,
    completion_linger: Duration,
    settings: Mutex<Option<SettingsFile>>,
}

impl Core {
    fn engine(&self) -> MutexGuard<'_, TimerEngine> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    fn emit(&self, event: Event) {
        // A host that stopped listening is not our problem.
        let _ = self.events.send(event);
    }

    /// Forward events to the host. On completion, stop both drivers and
    /// schedule the return to idle. Returns whether the session completed.
    fn dispatch(self: &Arc<Self>, events: Vec<Event>) -> bool {
        let completed = events.iter().any(Event::is_completion);
        for event in events {
            self.emit(event);
        }
        if completed {
            self.scheduler.disarm();
            let core = Arc::clone(self);
            tokio::spawn(async move {
                tokio::time::sleep(core.completion_linger).await;
                if core.engine().show_idle() {
                    core.emit(Event::ReturnedToIdle { at: Utc::now() });
                }
            });
        }
        completed
    }

    fn save_settings(&self) {
        let guard = self.settings.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(file) = guard.as_ref() {
            if let Err(e) = file.config.save_to(&file.path) {
                tracing::error!(path = %file.path.display(), error = %e, "failed to save settings");
            }
        }
    }
}

/// One engine, its tick drivers and its supervisor.
///
/// Every method that may arm a driver must run inside a tokio runtime.
pub struct SessionRuntime {
    core: Arc<Core>,
}

impl SessionRuntime {
    pub fn new(engine: TimerEngine, timing: &TimingConfig) -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let core = Arc::new(Core {
            engine: Mutex::new(engine),
            scheduler: TickScheduler::new(
                Duration::from_millis(timing.frame_interval_ms.max(1)),
                Duration::from_millis(timing.fallback_interval_ms.max(1)),
            ),
            supervisor: ResilienceSupervisor::new(
                Duration::from_millis(timing.watchdog_interval_ms.max(1)),
                timing.stall_threshold_ms,
                timing.max_stall_restarts,
            ),
            events: tx,
            visible: AtomicBool::new(true),
            completion_linger: Duration::from_millis(timing.completion_linger_ms),
            settings: Mutex::new(None),
        });
        (Self { core }, rx)
    }

    /// Save `config` to `path` whenever the surface goes hidden.
    pub fn persist_settings_to(self, config: Config, path: PathBuf) -> Self {
        *self
            .core
            .settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(SettingsFile { config, path });
        self
    }

    // ── User commands ────────────────────────────────────────────────

    /// Install a paused session and arm the fallback driver.
    pub fn start(&self, routine: RoutineDefinition, core_minutes: ScalingParameter) -> Result<()> {
        let events = self.core.engine().start(routine, core_minutes)?;
        self.core.dispatch(events);
        self.core.scheduler.arm_fallback(&self.core);
        self.core.supervisor.start_watchdog(&self.core);
        Ok(())
    }

    pub fn resume(&self) -> Result<(), ValidationError> {
        let events = self.core.engine().resume()?;
        if !events.is_empty() {
            self.core.dispatch(events);
            self.core.scheduler.arm(&self.core);
        }
        Ok(())
    }

    pub fn pause(&self) -> Result<(), ValidationError> {
        self.core.scheduler.disarm();
        let events = self.core.engine().pause()?;
        self.core.dispatch(events);
        Ok(())
    }

    pub fn toggle(&self) -> Result<(), ValidationError> {
        if self.core.engine().is_running() {
            self.pause()
        } else {
            self.resume()
        }
    }

    pub fn advance(&self) -> Result<(), ValidationError> {
        let events = self.core.engine().advance()?;
        self.core.dispatch(events);
        Ok(())
    }

    pub fn retreat(&self) -> Result<(), ValidationError> {
        let events = self.core.engine().retreat()?;
        self.core.dispatch(events);
        Ok(())
    }

    pub fn seek_to_phase(&self, index: usize) -> Result<(), ValidationError> {
        let events = self.core.engine().seek_to_phase(index)?;
        self.core.dispatch(events);
        Ok(())
    }

    /// Drivers are cancelled before the session is touched.
    pub fn abandon(&self) -> Result<(), ValidationError> {
        self.core.scheduler.disarm();
        let events = self.core.engine().abandon()?;
        self.core.dispatch(events);
        Ok(())
    }

    // ── Host lifecycle signals ───────────────────────────────────────

    pub fn set_visible(&self, visible: bool) {
        let was = self.core.visible.swap(visible, Ordering::SeqCst);
        if visible && !was {
            self.on_possible_resume(ResumeReason::VisibilityRestored);
        } else if !visible && was {
            self.core.supervisor.on_hidden(&self.core);
        }
    }

    pub fn on_possible_resume(&self, reason: ResumeReason) {
        self.core.supervisor.on_possible_resume(&self.core, reason);
    }

    /// Run one watchdog pass now instead of waiting for the interval.
    pub fn watchdog_check(&self) -> WatchdogVerdict {
        self.core.supervisor.check(&self.core)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn status(&self) -> SessionStatus {
        self.core.engine().status()
    }

    pub fn frame(&self) -> Option<DisplayFrame> {
        self.core.engine().frame()
    }

    pub fn is_visible(&self) -> bool {
        self.core.is_visible()
    }

    pub fn tick_generation(&self) -> u64 {
        self.core.scheduler.generation()
    }

    pub fn drivers_armed(&self) -> (bool, bool) {
        (
            self.core.scheduler.is_frame_armed(),
            self.core.scheduler.is_fallback_armed(),
        )
    }

    pub fn with_engine<R>(&self, f: impl FnOnce(&TimerEngine) -> R) -> R {
        f(&self.core.engine())
    }

    /// Wait up to `limit` for sink publishes still in flight, so a host that
    /// exits right after a session does not cut them off unlogged.
    pub async fn drain_publishes(&self, limit: Duration) {
        let pending = self.core.engine().take_pending_publishes();
        if pending.is_empty() {
            return;
        }
        let deadline = tokio::time::Instant::now() + limit;
        let total = pending.len();
        for (done, handle) in pending.into_iter().enumerate() {
            match tokio::time::timeout_at(deadline, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "session sink task failed"),
                Err(_) => {
                    tracing::warn!(
                        unfinished = total - done,
                        "session sinks still publishing at exit"
                    );
                    return;
                }
            }
        }
        tracing::debug!(count = total, "session sinks drained");
    }

    /// Stop every background task.
    pub fn shutdown(&self) {
        self.core.scheduler.disarm();
        self.core.supervisor.stop_watchdog();
    }
}

impl Drop for SessionRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}
