//! The mutable heart of a session: position plus elapsed-time accounting.
//!
//! True elapsed time in the current phase is always
//! `accumulated_ms + (now - phase_started_at_ms)` while running, and just
//! `accumulated_ms` while paused. Nothing here reads a clock; every method that
//! needs the time takes `now` in epoch milliseconds.

use serde::{Deserialize, Serialize};

use super::phase::Phase;
use crate::error::ValidationError;

/// Outcome of a reconciliation against wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// Still inside the same phase.
    Tick,
    /// Caught up through `crossed` boundaries and landed inside `to`.
    Advanced { from: usize, to: usize, crossed: usize },
    /// Ran past the end of the final phase.
    Exhausted { from: usize, crossed: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerState {
    phases: Vec<Phase>,
    current_index: usize,
    /// `None` while paused.
    phase_started_at_ms: Option<u64>,
    accumulated_ms: u64,
    session_started_at_ms: u64,
}

impl TimerState {
    /// Fresh state at phase 0, paused.
    pub fn new(phases: Vec<Phase>, now_ms: u64) -> Result<Self, ValidationError> {
        if phases.is_empty() {
            return Err(ValidationError::EmptyCollection("phases".into()));
        }
        Ok(Self {
            phases,
            current_index: 0,
            phase_started_at_ms: None,
            accumulated_ms: 0,
            session_started_at_ms: now_ms,
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_phase(&self) -> &Phase {
        &self.phases[self.current_index]
    }

    pub fn next_phase(&self) -> Option<&Phase> {
        self.phases.get(self.current_index + 1)
    }

    pub fn is_running(&self) -> bool {
        self.phase_started_at_ms.is_some()
    }

    pub fn accumulated_ms(&self) -> u64 {
        self.accumulated_ms
    }

    pub fn session_started_at_ms(&self) -> u64 {
        self.session_started_at_ms
    }

    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        match self.phase_started_at_ms {
            Some(started) => self.accumulated_ms + now_ms.saturating_sub(started),
            None => self.accumulated_ms,
        }
    }

    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.current_phase()
            .duration_ms
            .saturating_sub(self.elapsed_ms(now_ms))
    }

    /// Fraction of the current phase done, clamped to 1.
    pub fn progress(&self, now_ms: u64) -> f64 {
        let duration = self.current_phase().duration_ms;
        if duration == 0 {
            return 1.0;
        }
        (self.elapsed_ms(now_ms) as f64 / duration as f64).min(1.0)
    }

    /// How far past the current phase's deadline we are, if at all.
    pub fn overdue_ms(&self, now_ms: u64) -> Option<u64> {
        self.elapsed_ms(now_ms)
            .checked_sub(self.current_phase().duration_ms)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Bank the running segment. Returns false if already paused.
    pub fn pause(&mut self, now_ms: u64) -> bool {
        match self.phase_started_at_ms.take() {
            Some(started) => {
                self.accumulated_ms += now_ms.saturating_sub(started);
                true
            }
            None => false,
        }
    }

    /// Start a new running segment. Returns false if already running.
    pub fn resume(&mut self, now_ms: u64) -> bool {
        if self.is_running() {
            return false;
        }
        self.phase_started_at_ms = Some(now_ms);
        true
    }

    /// Move to the next phase. `None` when there is no next phase.
    pub fn advance(&mut self, now_ms: u64) -> Option<usize> {
        if self.current_index + 1 >= self.phases.len() {
            return None;
        }
        self.enter(self.current_index + 1, 0, now_ms);
        Some(self.current_index)
    }

    /// Step back one phase, or restart phase 0. Never completes.
    pub fn retreat(&mut self, now_ms: u64) -> usize {
        let target = self.current_index.saturating_sub(1);
        self.enter(target, 0, now_ms);
        target
    }

    pub fn seek(&mut self, index: usize, now_ms: u64) -> Result<(), ValidationError> {
        if index >= self.phases.len() {
            return Err(ValidationError::OutOfBounds {
                collection: "phases".into(),
                index,
                len: self.phases.len(),
            });
        }
        self.enter(index, 0, now_ms);
        Ok(())
    }

    /// Catch up with wall-clock time, skipping through as many expired
    /// phases as the gap covers. Safe for arbitrarily large gaps.
    pub fn reconcile(&mut self, now_ms: u64) -> Reconciled {
        let from = self.current_index;
        let Some(mut overflow) = self.overdue_ms(now_ms) else {
            return Reconciled::Tick;
        };

        let mut crossed = 0;
        loop {
            let next = self.current_index + 1;
            let Some(phase) = self.phases.get(next) else {
                return Reconciled::Exhausted { from, crossed };
            };
            crossed += 1;
            if overflow < phase.duration_ms {
                self.enter(next, overflow, now_ms);
                return Reconciled::Advanced {
                    from,
                    to: next,
                    crossed,
                };
            }
            overflow -= phase.duration_ms;
            self.current_index = next;
        }
    }

    fn enter(&mut self, index: usize, banked_ms: u64, now_ms: u64) {
        self.current_index = index;
        self.accumulated_ms = banked_ms;
        if self.phase_started_at_ms.is_some() {
            self.phase_started_at_ms = Some(now_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::phase::{PhaseCategory, PhaseMeta};

    fn phases(durations_ms: &[u64]) -> Vec<Phase> {
        durations_ms
            .iter()
            .enumerate()
            .map(|(i, d)| Phase {
                label: format!("P{i}"),
                category: PhaseCategory::Pose,
                duration_ms: *d,
                ordinal: i,
                meta: PhaseMeta::default(),
                is_last: i + 1 == durations_ms.len(),
            })
            .collect()
    }

    #[test]
    fn empty_phase_list_is_rejected() {
        assert!(TimerState::new(Vec::new(), 0).is_err());
    }

    #[test]
    fn starts_paused_at_zero() {
        let state = TimerState::new(phases(&[1000]), 50).unwrap();
        assert!(!state.is_running());
        assert_eq!(state.elapsed_ms(10_000), 0);
        assert_eq!(state.session_started_at_ms(), 50);
    }

    #[test]
    fn pause_banks_running_segment() {
        let mut state = TimerState::new(phases(&[10_000]), 0).unwrap();
        assert!(state.resume(1_000));
        assert!(!state.resume(1_500));
        assert!(state.pause(4_000));
        assert!(!state.pause(4_500));
        assert_eq!(state.accumulated_ms(), 3_000);
        assert_eq!(state.elapsed_ms(99_000), 3_000);
        assert_eq!(state.remaining_ms(99_000), 7_000);
    }

    #[test]
    fn reconcile_lands_inside_fourth_phase() {
        let mut state = TimerState::new(phases(&[1_000, 2_000, 3_000, 4_000, 5_000]), 0).unwrap();
        state.resume(0);
        // 1000 + 2000 + 3000 fully, then 1500 into the fourth.
        let outcome = state.reconcile(7_500);
        assert_eq!(
            outcome,
            Reconciled::Advanced {
                from: 0,
                to: 3,
                crossed: 3
            }
        );
        assert_eq!(state.current_index(), 3);
        assert_eq!(state.accumulated_ms(), 1_500);
        assert_eq!(state.elapsed_ms(7_500), 1_500);
        assert_eq!(state.elapsed_ms(8_000), 2_000);
    }

    #[test]
    fn exact_boundary_moves_on() {
        let mut state = TimerState::new(phases(&[1_000, 1_000]), 0).unwrap();
        state.resume(0);
        assert!(matches!(state.reconcile(1_000), Reconciled::Advanced { to: 1, .. }));
        assert_eq!(state.elapsed_ms(1_000), 0);
    }

    #[test]
    fn reconcile_past_the_end_is_exhausted() {
        let mut state = TimerState::new(phases(&[1_000, 1_000]), 0).unwrap();
        state.resume(0);
        assert_eq!(
            state.reconcile(60_000),
            Reconciled::Exhausted { from: 0, crossed: 1 }
        );
    }

    #[test]
    fn paused_catch_up_stays_paused() {
        let mut state = TimerState::new(phases(&[1_000, 5_000]), 0).unwrap();
        state.resume(0);
        state.pause(2_500);
        assert!(matches!(state.reconcile(9_000), Reconciled::Advanced { to: 1, .. }));
        assert!(!state.is_running());
        assert_eq!(state.elapsed_ms(50_000), 1_500);
    }

    #[test]
    fn retreat_at_zero_only_resets_clock() {
        let mut state = TimerState::new(phases(&[10_000, 10_000]), 0).unwrap();
        state.resume(0);
        assert_eq!(state.retreat(4_000), 0);
        assert_eq!(state.current_index(), 0);
        assert_eq!(state.elapsed_ms(4_000), 0);
        assert!(state.is_running());
    }

    #[test]
    fn seek_out_of_bounds_does_not_mutate() {
        let mut state = TimerState::new(phases(&[1_000, 1_000]), 0).unwrap();
        state.resume(0);
        assert!(state.seek(2, 500).is_err());
        assert_eq!(state.current_index(), 0);
        assert_eq!(state.elapsed_ms(500), 500);
    }

    #[test]
    fn progress_is_clamped() {
        let mut state = TimerState::new(phases(&[1_000]), 0).unwrap();
        state.resume(0);
        assert_eq!(state.progress(500), 0.5);
        assert_eq!(state.progress(5_000), 1.0);
        assert_eq!(state.remaining_ms(5_000), 0);
        assert_eq!(state.overdue_ms(5_000), Some(4_000));
        assert_eq!(state.overdue_ms(500), None);
    }
}
