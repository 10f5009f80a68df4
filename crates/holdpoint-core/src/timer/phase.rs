//! Expands a routine into the flat, ordered phase list a session runs.
//!
//! The list is built once at session start and only ever indexed after that.

use serde::{Deserialize, Serialize};

use crate::routine::{GripCycle, RoutineBody, RoutineDefinition, ScalingParameter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseCategory {
    Pose,
    Warmup,
    GetReady,
    Hang,
    Rest,
    Switch,
    SetRest,
}

impl PhaseCategory {
    /// Heading shown for hangboard phases.
    pub fn heading(self) -> &'static str {
        match self {
            PhaseCategory::Pose => "POSE",
            PhaseCategory::Warmup => "WARMUP",
            PhaseCategory::GetReady => "GET READY",
            PhaseCategory::Hang => "HANG",
            PhaseCategory::Rest => "REST",
            PhaseCategory::Switch => "SWITCH",
            PhaseCategory::SetRest => "SET REST",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Right,
    Left,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Right => "Right",
            Side::Left => "Left",
        }
    }
}

/// Display metadata. Never consulted for timing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseMeta {
    /// Grip name, suffixed "(Right)"/"(Left)" for single-arm sub-phases.
    pub grip: Option<String>,
    pub set: Option<u32>,
    pub total_sets: Option<u32>,
    pub rep: Option<u32>,
    pub total_reps: Option<u32>,
    pub description: String,
    /// Key for the pose photo lookup.
    pub photo_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub label: String,
    pub category: PhaseCategory,
    pub duration_ms: u64,
    pub ordinal: usize,
    pub meta: PhaseMeta,
    pub is_last: bool,
}

impl Phase {
    fn new(label: impl Into<String>, category: PhaseCategory, duration_ms: u64, meta: PhaseMeta) -> Self {
        Self {
            label: label.into(),
            category,
            duration_ms,
            ordinal: 0,
            meta,
            is_last: false,
        }
    }

    /// Preview text used for the phase after the current one.
    pub fn preview(&self) -> String {
        match (self.category, &self.meta.grip) {
            (PhaseCategory::Pose, _) => self.label.clone(),
            (_, Some(grip)) => format!("{} - {}", self.label, grip),
            (_, None) => self.label.clone(),
        }
    }
}

/// Build the phase list for `routine` at the given core minutes.
///
/// Pose phases use the unrounded per-pose minutes; only the displayed total
/// is ever rounded.
pub fn build(routine: &RoutineDefinition, core: ScalingParameter) -> Vec<Phase> {
    let mut phases = match &routine.body {
        RoutineBody::TimedSequence { poses } => poses
            .iter()
            .map(|pose| {
                let minutes = routine.pose_minutes(pose, core);
                Phase::new(
                    pose.name.clone(),
                    PhaseCategory::Pose,
                    minutes_to_ms(minutes),
                    PhaseMeta {
                        description: pose.description.clone(),
                        photo_key: Some(pose.name.clone()),
                        ..PhaseMeta::default()
                    },
                )
            })
            .collect(),
        RoutineBody::GripCycle(cycle) => GripPhases::new(cycle).build(),
    };

    let count = phases.len();
    for (i, phase) in phases.iter_mut().enumerate() {
        phase.ordinal = i;
        phase.is_last = i + 1 == count;
    }
    tracing::debug!(routine = %routine.name, phases = count, "built phase list");
    phases
}

fn minutes_to_ms(minutes: f64) -> u64 {
    (minutes * 60_000.0).round().max(0.0) as u64
}

fn secs_to_ms(secs: impl Into<u64>) -> u64 {
    secs.into().saturating_mul(1000)
}

struct GripPhases<'a> {
    cycle: &'a GripCycle,
    phases: Vec<Phase>,
}

impl<'a> GripPhases<'a> {
    fn new(cycle: &'a GripCycle) -> Self {
        Self {
            cycle,
            phases: Vec::new(),
        }
    }

    fn build(mut self) -> Vec<Phase> {
        let cycle = self.cycle;
        self.phases.push(Phase::new(
            PhaseCategory::Warmup.heading(),
            PhaseCategory::Warmup,
            secs_to_ms(cycle.warmup_secs),
            PhaseMeta {
                description: "Get warmed up".into(),
                ..PhaseMeta::default()
            },
        ));

        let grip_count = cycle.grips.len();
        for (grip_index, grip) in cycle.grips.iter().enumerate() {
            for set in 1..=cycle.sets_per_grip {
                let final_set = grip_index + 1 == grip_count && set == cycle.sets_per_grip;
                if cycle.is_single_arm(grip) {
                    self.single_arm_set(grip, set, final_set);
                } else {
                    self.two_hand_set(grip, set, final_set);
                }
            }
        }
        self.phases
    }

    fn set_meta(&self, grip: String, set: u32, description: String) -> PhaseMeta {
        PhaseMeta {
            grip: Some(grip),
            set: Some(set),
            total_sets: Some(self.cycle.sets_per_grip),
            description,
            ..PhaseMeta::default()
        }
    }

    fn push(&mut self, category: PhaseCategory, duration_ms: u64, meta: PhaseMeta) {
        self.phases
            .push(Phase::new(category.heading(), category, duration_ms, meta));
    }

    fn two_hand_set(&mut self, grip: &str, set: u32, final_set: bool) {
        let total = self.cycle.sets_per_grip;
        let meta = self.set_meta(grip.into(), set, format!("Set {set} of {total}"));
        self.push(
            PhaseCategory::GetReady,
            secs_to_ms(self.cycle.get_ready_secs),
            meta,
        );
        self.reps(grip, set, None);
        if !final_set {
            let meta = self.set_meta(grip.into(), set, grip.into());
            self.push(
                PhaseCategory::SetRest,
                secs_to_ms(self.cycle.set_rest_secs),
                meta,
            );
        }
    }

    fn single_arm_set(&mut self, grip: &str, set: u32, final_set: bool) {
        let total = self.cycle.sets_per_grip;
        let meta = self.set_meta(
            sided(grip, Side::Right),
            set,
            format!("Right · Set {set} of {total}"),
        );
        self.push(
            PhaseCategory::GetReady,
            secs_to_ms(self.cycle.get_ready_secs),
            meta,
        );
        self.reps(grip, set, Some(Side::Right));

        let meta = self.set_meta(
            sided(grip, Side::Left),
            set,
            format!("Switch to left hand · Set {set} of {total}"),
        );
        self.push(
            PhaseCategory::Switch,
            secs_to_ms(self.cycle.switch_secs),
            meta,
        );
        self.reps(grip, set, Some(Side::Left));

        if !final_set {
            if let Some(rest) = self.cycle.adjusted_set_rest_secs() {
                let meta = self.set_meta(grip.into(), set, grip.into());
                self.push(PhaseCategory::SetRest, secs_to_ms(rest), meta);
            }
        }
    }

    /// One arm's (or both hands') reps: HANG/REST pairs, no REST after the last HANG.
    fn reps(&mut self, grip: &str, set: u32, side: Option<Side>) {
        let cycle = self.cycle;
        let total_sets = cycle.sets_per_grip;
        let total_reps = cycle.reps_per_set;
        let grip_label = match side {
            Some(side) => sided(grip, side),
            None => grip.to_string(),
        };
        let prefix = side.map(|s| format!("{} · ", s.as_str())).unwrap_or_default();

        for rep in 1..=total_reps {
            let meta = PhaseMeta {
                grip: Some(grip_label.clone()),
                set: Some(set),
                total_sets: Some(total_sets),
                rep: Some(rep),
                total_reps: Some(total_reps),
                description: format!("{prefix}Rep {rep} of {total_reps} · Set {set} of {total_sets}"),
                photo_key: None,
            };
            self.push(PhaseCategory::Hang, secs_to_ms(cycle.hang_secs), meta.clone());
            if rep < total_reps {
                self.push(PhaseCategory::Rest, secs_to_ms(cycle.rep_rest_secs), meta);
            }
        }
    }
}

fn sided(grip: &str, side: Side) -> String {
    format!("{grip} ({})", side.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routine::catalog;

    fn cycle_of(routine: &RoutineDefinition) -> &GripCycle {
        match &routine.body {
            RoutineBody::GripCycle(cycle) => cycle,
            RoutineBody::TimedSequence { .. } => panic!("expected a grip cycle"),
        }
    }

    #[test]
    fn single_arm_cycle_phase_count() {
        let routine = catalog::twenty_mm_and_slopers();
        let phases = build(&routine, ScalingParameter::default());

        // warmup
        // + 20mm: 3 sets x (getready + 11 hang/rest) + 3 set rests
        // + slopers: 3 sets x (getready + 11 + switch + 11) + 2 adjusted rests
        let two_hand = 3 * (1 + 11) + 3;
        let single_arm = 3 * (1 + 11 + 1 + 11) + 2;
        assert_eq!(phases.len(), 1 + two_hand + single_arm);
        assert_eq!(phases.len(), 114);
    }

    #[test]
    fn final_set_of_final_grip_has_no_trailing_rest() {
        let routine = catalog::twenty_mm_and_pockets();
        let phases = build(&routine, ScalingParameter::default());
        let last = phases.last().unwrap();
        assert_eq!(last.category, PhaseCategory::Hang);
        assert!(last.is_last);
        assert_eq!(last.meta.grip.as_deref(), Some("2-Finger Pockets"));
        assert_eq!(
            phases
                .iter()
                .filter(|p| p.category == PhaseCategory::SetRest)
                .count(),
            5
        );
    }

    #[test]
    fn adjusted_rest_appears_as_phase_duration() {
        let routine = catalog::twenty_mm_and_slopers();
        let phases = build(&routine, ScalingParameter::default());
        let slopers_rests: Vec<_> = phases
            .iter()
            .filter(|p| p.category == PhaseCategory::SetRest && p.meta.grip.as_deref() == Some("Slopers"))
            .collect();
        assert_eq!(slopers_rests.len(), 2);
        assert!(slopers_rests.iter().all(|p| p.duration_ms == 118_000));
    }

    #[test]
    fn phase_durations_sum_to_cycle_total() {
        let routine = catalog::twenty_mm_and_slopers();
        let phases = build(&routine, ScalingParameter::default());
        let sum: u64 = phases.iter().map(|p| p.duration_ms).sum();
        assert_eq!(sum, cycle_of(&routine).total_secs() * 1000);
    }

    #[test]
    fn single_arm_labels_carry_side() {
        let routine = catalog::twenty_mm_and_slopers();
        let phases = build(&routine, ScalingParameter::default());
        let switch = phases
            .iter()
            .find(|p| p.category == PhaseCategory::Switch)
            .unwrap();
        assert_eq!(switch.meta.grip.as_deref(), Some("Slopers (Left)"));
        assert_eq!(switch.meta.description, "Switch to left hand · Set 1 of 3");
        assert_eq!(phases.last().unwrap().meta.grip.as_deref(), Some("Slopers (Left)"));
        assert_eq!(
            phases.last().unwrap().meta.description,
            "Left · Rep 6 of 6 · Set 3 of 3"
        );
    }

    #[test]
    fn pose_phases_use_unrounded_minutes() {
        let routine = catalog::yin_yoga();
        let phases = build(&routine, ScalingParameter::new(3).unwrap());
        // Low Dragon Left: 2.5 / 5 * 3 = 1.5 min
        let dragon = phases.iter().find(|p| p.label == "Low Dragon Left").unwrap();
        assert_eq!(dragon.duration_ms, 90_000);
        assert_eq!(dragon.meta.photo_key.as_deref(), Some("Low Dragon Left"));
        assert_eq!(phases.iter().map(|p| p.ordinal).collect::<Vec<_>>(), (0..phases.len()).collect::<Vec<_>>());
    }
}
