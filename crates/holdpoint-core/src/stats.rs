//! Aggregates over session history.
//!
//! Days and months are UTC calendar days, matching the timestamps stored in
//! the history table.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::routine::RoutineKind;
use crate::storage::SessionRecord;

/// Minutes and session count for one routine kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindTotals {
    pub sessions: u64,
    pub minutes: u64,
}

impl KindTotals {
    fn add(&mut self, record: &SessionRecord) {
        self.sessions += 1;
        self.minutes += record.actual_duration_min;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySummary {
    pub sessions: u64,
    pub minutes: u64,
    pub yoga: KindTotals,
    pub hangboard: KindTotals,
    /// Consecutive days with at least one session, ending today or yesterday.
    pub streak_days: u32,
    pub sessions_this_month: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthSummary {
    pub year: i32,
    /// 1-12
    pub month: u32,
    pub yoga_minutes: u64,
    pub hangboard_minutes: u64,
    pub sessions: u64,
}

impl MonthSummary {
    pub fn total_minutes(&self) -> u64 {
        self.yoga_minutes + self.hangboard_minutes
    }

    /// "March 2026"
    pub fn label(&self) -> String {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .map(|d| d.format("%B %Y").to_string())
            .unwrap_or_else(|| format!("{}-{:02}", self.year, self.month))
    }

    /// Share of the month's minutes spent on yoga, in whole percent.
    pub fn yoga_percent(&self) -> u64 {
        let total = self.total_minutes();
        if total == 0 {
            return 0;
        }
        (self.yoga_minutes * 100 + total / 2) / total
    }
}

/// Current streak of days with a session. Zero unless the newest session day
/// is `today` or the day before.
pub fn day_streak(records: &[SessionRecord], today: NaiveDate) -> u32 {
    let days: BTreeSet<NaiveDate> = records.iter().map(|r| r.timestamp.date_naive()).collect();
    let Some(&newest) = days.iter().next_back() else {
        return 0;
    };
    if newest != today && newest != today - Duration::days(1) {
        return 0;
    }

    let mut streak = 1;
    let mut expected = newest - Duration::days(1);
    for day in days.iter().rev().skip(1) {
        if *day != expected {
            break;
        }
        streak += 1;
        expected = expected - Duration::days(1);
    }
    streak
}

pub fn summarize(records: &[SessionRecord], today: NaiveDate) -> HistorySummary {
    let mut summary = HistorySummary {
        streak_days: day_streak(records, today),
        ..HistorySummary::default()
    };
    for record in records {
        summary.sessions += 1;
        summary.minutes += record.actual_duration_min;
        match record.routine_kind {
            RoutineKind::TimedSequence => summary.yoga.add(record),
            RoutineKind::GripCycle => summary.hangboard.add(record),
        }
        let day = record.timestamp.date_naive();
        if day.year() == today.year() && day.month() == today.month() {
            summary.sessions_this_month += 1;
        }
    }
    summary
}

/// One row per month that has history, newest month first.
pub fn monthly(records: &[SessionRecord]) -> Vec<MonthSummary> {
    let mut months: BTreeMap<(i32, u32), MonthSummary> = BTreeMap::new();
    for record in records {
        let day = record.timestamp.date_naive();
        let entry = months
            .entry((day.year(), day.month()))
            .or_insert_with(|| MonthSummary {
                year: day.year(),
                month: day.month(),
                yoga_minutes: 0,
                hangboard_minutes: 0,
                sessions: 0,
            });
        match record.routine_kind {
            RoutineKind::TimedSequence => entry.yoga_minutes += record.actual_duration_min,
            RoutineKind::GripCycle => entry.hangboard_minutes += record.actual_duration_min,
        }
        entry.sessions += 1;
    }
    months.into_values().rev().collect()
}
