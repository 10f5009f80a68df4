//! Two redundant tick drivers feeding the engine's `reconcile`.
//!
//! - The frame loop runs at display rate, only while the surface is visible
//!   and the session is running.
//! - The fallback runs at a low fixed rate regardless of visibility. When it
//!   finds the current phase overdue it cancels the frame loop and reconciles
//!   itself, so cues still fire while the frame loop is throttled.
//!
//! Both tasks capture the generation they were armed under. Disarming bumps
//! the generation before aborting the handles, so a callback that was already
//! past its await point when the abort landed still sees a stale generation
//! and does nothing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use super::Core;

pub struct TickScheduler {
    generation: AtomicU64,
    frame: Mutex<Option<JoinHandle<()>>>,
    fallback: Mutex<Option<JoinHandle<()>>>,
    frame_interval: Duration,
    fallback_interval: Duration,
}

impl TickScheduler {
    pub fn new(frame_interval: Duration, fallback_interval: Duration) -> Self {
        Self {
            generation: AtomicU64::new(0),
            frame: Mutex::new(None),
            fallback: Mutex::new(None),
            frame_interval,
            fallback_interval,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn is_frame_armed(&self) -> bool {
        Self::alive(&self.frame)
    }

    pub fn is_fallback_armed(&self) -> bool {
        Self::alive(&self.fallback)
    }

    fn alive(slot: &Mutex<Option<JoinHandle<()>>>) -> bool {
        slot.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    fn replace(slot: &Mutex<Option<JoinHandle<()>>>, handle: Option<JoinHandle<()>>) {
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = guard.take() {
            old.abort();
        }
        *guard = handle;
    }

    /// Stop both drivers. Any callback still in flight becomes a no-op.
    pub fn disarm(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        Self::replace(&self.frame, None);
        Self::replace(&self.fallback, None);
        tracing::debug!(generation, "tick drivers disarmed");
    }

    pub fn cancel_frame(&self) {
        Self::replace(&self.frame, None);
    }

    /// (Re)start the display-rate loop. Does nothing unless the surface is
    /// visible and the session is running.
    pub(crate) fn arm_frame(&self, core: &Arc<Core>) {
        if !core.is_visible() || !core.engine().is_running() {
            self.cancel_frame();
            return;
        }
        let generation = self.generation();
        let interval = self.frame_interval;
        let task_core = Arc::clone(core);
        let handle = tokio::spawn(async move {
            loop {
                time::sleep(interval).await;
                if task_core.scheduler.generation() != generation || !task_core.is_visible() {
                    break;
                }
                let (events, running) = {
                    let mut engine = task_core.engine();
                    let events = engine.reconcile();
                    (events, engine.is_running())
                };
                if task_core.dispatch(events) || !running {
                    break;
                }
            }
        });
        Self::replace(&self.frame, Some(handle));
    }

    /// (Re)start the background-safe fallback.
    pub(crate) fn arm_fallback(&self, core: &Arc<Core>) {
        let generation = self.generation();
        let period = self.fallback_interval;
        let task_core = Arc::clone(core);
        let handle = tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if task_core.scheduler.generation() != generation {
                    break;
                }
                let overdue = task_core.engine().overdue_ms();
                let Some(overdue_ms) = overdue else {
                    continue;
                };
                tracing::debug!(overdue_ms, "fallback forcing reconcile");
                task_core.scheduler.cancel_frame();
                let events = task_core.engine().reconcile();
                if task_core.dispatch(events) {
                    break;
                }
                task_core.scheduler.arm_frame(&task_core);
            }
        });
        Self::replace(&self.fallback, Some(handle));
    }

    /// Both drivers, as after `start` or `resume`.
    pub(crate) fn arm(&self, core: &Arc<Core>) {
        self.arm_fallback(core);
        self.arm_frame(core);
    }
}
