//! Finalizing a session: build the record, keep it, hand it on.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::integrations::{self, SessionSink};
use crate::routine::{compute_duration, RoutineDefinition, ScalingParameter};
use crate::storage::{SessionRecord, SessionStore};

/// Outcome of the post-write verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persisted {
    Verified,
    /// Written, but the immediate re-read did not match.
    Mismatch,
    Failed,
}

pub struct CompletionHandler {
    store: Box<dyn SessionStore>,
    sinks: Vec<Arc<dyn SessionSink>>,
    /// Sink publishes still running on the blocking pool.
    pending: Vec<JoinHandle<()>>,
}

impl CompletionHandler {
    pub fn new(store: Box<dyn SessionStore>) -> Self {
        Self {
            store,
            sinks: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub fn with_sinks(mut self, sinks: Vec<Arc<dyn SessionSink>>) -> Self {
        self.sinks = sinks;
        self
    }

    /// Build the record for a session that ran from `started_ms` to `now_ms`.
    ///
    /// Planned minutes come from the routine and core minutes captured at
    /// start, not from whatever the settings say now.
    pub fn build_record(
        routine: &RoutineDefinition,
        core: ScalingParameter,
        started_ms: u64,
        now_ms: u64,
    ) -> SessionRecord {
        let actual_min = (now_ms.saturating_sub(started_ms) as f64 / 60_000.0).round() as u64;
        SessionRecord {
            timestamp: DateTime::from_timestamp_millis(now_ms as i64).unwrap_or_else(Utc::now),
            routine_name: routine.name.clone(),
            actual_duration_min: actual_min,
            planned_duration_min: compute_duration(routine, core),
            scaling_parameter_used: core,
            units_completed: routine.units_summary(),
            routine_kind: routine.kind(),
        }
    }

    /// Persist locally, verify, then dispatch to sinks. Never fails: every
    /// problem is logged and the session moves on.
    pub fn finish(&mut self, record: &SessionRecord) -> Persisted {
        let persisted = self.persist(record);
        self.pending.retain(|h| !h.is_finished());
        self.pending
            .extend(integrations::dispatch(&self.sinks, record));
        persisted
    }

    /// Hand over the publishes still in flight.
    pub fn take_pending(&mut self) -> Vec<JoinHandle<()>> {
        std::mem::take(&mut self.pending)
    }

    fn persist(&mut self, record: &SessionRecord) -> Persisted {
        let id = match self.store.append(record) {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(routine = %record.routine_name, error = %e, "failed to save session");
                return Persisted::Failed;
            }
        };
        match self.store.read_back(id) {
            Ok(Some(stored)) if stored == *record => {
                tracing::info!(routine = %record.routine_name, id, "session saved and verified");
                Persisted::Verified
            }
            Ok(_) => {
                tracing::warn!(routine = %record.routine_name, id, "session saved but read-back did not match");
                Persisted::Mismatch
            }
            Err(e) => {
                tracing::warn!(routine = %record.routine_name, id, error = %e, "session saved but read-back failed");
                Persisted::Mismatch
            }
        }
    }

    pub fn flush(&mut self) -> Result<()> {
        self.store.flush()
    }
}
