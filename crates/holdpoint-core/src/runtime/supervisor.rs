//! Suspend/resume detection and recovery.
//!
//! Every "we may have been asleep" signal funnels into
//! [`ResilienceSupervisor::on_possible_resume`]. A periodic watchdog covers
//! the case where no signal arrives at all but the frame loop quietly died.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use super::Core;
use crate::events::{Event, ResumeReason};

/// What one watchdog pass concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogVerdict {
    /// Paused, hidden, or no session: nothing to watch.
    Idle,
    Healthy,
    /// Deadline missed by more than the threshold; frame loop restarted.
    Restarted { overdue_ms: u64, restarts: u32 },
}

pub struct ResilienceSupervisor {
    watchdog: Mutex<Option<JoinHandle<()>>>,
    watchdog_interval: Duration,
    stall_threshold_ms: u64,
    max_stall_restarts: u32,
    restarts: AtomicU32,
}

impl ResilienceSupervisor {
    pub fn new(watchdog_interval: Duration, stall_threshold_ms: u64, max_stall_restarts: u32) -> Self {
        Self {
            watchdog: Mutex::new(None),
            watchdog_interval,
            stall_threshold_ms,
            max_stall_restarts,
            restarts: AtomicU32::new(0),
        }
    }

    /// Reconcile now, then win back whatever the host may have taken: the
    /// wake-lock, the audio output and both tick drivers.
    pub(crate) fn on_possible_resume(&self, core: &Arc<Core>, reason: ResumeReason) {
        let events = core.engine().recover(reason);
        if core.dispatch(events) {
            return;
        }
        if core.engine().is_running() {
            core.scheduler.arm(core);
        }
    }

    /// The host may kill us without further notice once hidden: stop the
    /// frame loop and push history and settings to disk.
    pub(crate) fn on_hidden(&self, core: &Arc<Core>) {
        core.scheduler.cancel_frame();
        if let Err(e) = core.engine().flush_storage() {
            tracing::error!(error = %e, "failed to flush session history");
        }
        core.save_settings();
    }

    /// One watchdog pass.
    pub(crate) fn check(&self, core: &Arc<Core>) -> WatchdogVerdict {
        if !core.is_visible() {
            self.restarts.store(0, Ordering::SeqCst);
            return WatchdogVerdict::Idle;
        }
        let overdue = {
            let engine = core.engine();
            if !engine.is_running() {
                None
            } else {
                Some(engine.overdue_ms().unwrap_or(0))
            }
        };
        let Some(overdue_ms) = overdue else {
            self.restarts.store(0, Ordering::SeqCst);
            return WatchdogVerdict::Idle;
        };
        if overdue_ms <= self.stall_threshold_ms {
            self.restarts.store(0, Ordering::SeqCst);
            return WatchdogVerdict::Healthy;
        }

        let restarts = self.restarts.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(overdue_ms, restarts, "watchdog restarting frame loop");
        core.scheduler.arm_frame(core);
        if restarts == self.max_stall_restarts {
            tracing::warn!(overdue_ms, restarts, "tick scheduler keeps stalling");
            core.emit(Event::SchedulerStalled {
                overdue_ms,
                restarts,
                at: Utc::now(),
            });
            // Restarting the frame loop alone did not help: run the full
            // recovery path.
            self.on_possible_resume(core, ResumeReason::Watchdog);
        }
        WatchdogVerdict::Restarted {
            overdue_ms,
            restarts,
        }
    }

    pub(crate) fn start_watchdog(&self, core: &Arc<Core>) {
        let mut slot = self.watchdog.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        let period = self.watchdog_interval;
        let task_core = Arc::clone(core);
        *slot = Some(tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;
            loop {
                interval.tick().await;
                task_core.supervisor.check(&task_core);
            }
        }));
    }

    pub fn stop_watchdog(&self) {
        if let Some(handle) = self
            .watchdog
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}
