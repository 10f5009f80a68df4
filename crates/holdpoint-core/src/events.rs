use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::SessionRecord;
use crate::timer::PhaseCategory;

/// Why the host thinks we may have been suspended. Diagnostic only; every
/// reason takes the same recovery path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeReason {
    VisibilityRestored,
    FocusRegained,
    RestoredFromCache,
    Watchdog,
}

impl ResumeReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ResumeReason::VisibilityRestored => "visibility",
            ResumeReason::FocusRegained => "focus",
            ResumeReason::RestoredFromCache => "restored",
            ResumeReason::Watchdog => "watchdog",
        }
    }
}

/// Every state change in a session produces an Event.
/// Hosts print or render them; tests count them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionStarted {
        routine_name: String,
        phase_count: usize,
        planned_minutes: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        phase_index: usize,
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        phase_index: usize,
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    /// Moved forward by `crossed` phases in one step. A reconcile that catches
    /// up through several expired phases yields one of these, not several.
    PhaseAdvanced {
        from: usize,
        to: usize,
        crossed: usize,
        category: PhaseCategory,
        label: String,
        manual: bool,
        at: DateTime<Utc>,
    },
    /// Skip back. At index 0 `from == to` and only the phase clock was reset.
    PhaseRewound {
        from: usize,
        to: usize,
        at: DateTime<Utc>,
    },
    SessionCompleted {
        record: SessionRecord,
        at: DateTime<Utc>,
    },
    SessionAbandoned {
        routine_name: String,
        phase_index: usize,
        at: DateTime<Utc>,
    },
    /// Completion linger elapsed and the host went back to its idle view.
    ReturnedToIdle {
        at: DateTime<Utc>,
    },
    ResumeDetected {
        reason: ResumeReason,
        at: DateTime<Utc>,
    },
    /// The watchdog restarted the frame loop repeatedly without recovery.
    SchedulerStalled {
        overdue_ms: u64,
        restarts: u32,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn is_completion(&self) -> bool {
        matches!(self, Event::SessionCompleted { .. })
    }
}
