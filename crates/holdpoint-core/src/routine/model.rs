//! Routine definitions and duration rules.
//!
//! Everything here is immutable data plus pure functions. Durations are kept
//! as fractional minutes until the very end so that the displayed total is
//! rounded once, never per pose.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Core minutes: the user's scaling knob for scalable poses (1-10).
///
/// `ScalesWithCore` poses are authored against a reference of 5 core minutes
/// and scale proportionally; `HalfCore` poses run for half the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ScalingParameter(u8);

impl ScalingParameter {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;
    /// Core minutes the built-in poses were authored against.
    pub const REFERENCE: u8 = 5;

    pub fn new(value: u8) -> Result<Self, ValidationError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ValidationError::InvalidValue {
                field: "core_minutes".into(),
                message: format!(
                    "must be between {} and {}, got {value}",
                    Self::MIN,
                    Self::MAX
                ),
            })
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn minutes(self) -> f64 {
        f64::from(self.0)
    }
}

impl Default for ScalingParameter {
    fn default() -> Self {
        Self(Self::REFERENCE)
    }
}

impl TryFrom<u8> for ScalingParameter {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ScalingParameter> for u8 {
    fn from(value: ScalingParameter) -> Self {
        value.0
    }
}

impl fmt::Display for ScalingParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoseScaling {
    /// Transition poses: always `base_duration_min`.
    Fixed,
    /// `base / 5 * core`.
    ScalesWithCore,
    /// `core / 2`, regardless of base.
    HalfCore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseSpec {
    pub name: String,
    pub base_duration_min: f64,
    pub scaling: PoseScaling,
    #[serde(default)]
    pub description: String,
}

impl PoseSpec {
    /// Minutes this pose runs for at the given core time.
    pub fn scaled_minutes(&self, core: ScalingParameter) -> f64 {
        match self.scaling {
            PoseScaling::Fixed => self.base_duration_min,
            PoseScaling::HalfCore => core.minutes() / 2.0,
            PoseScaling::ScalesWithCore => {
                self.base_duration_min / f64::from(ScalingParameter::REFERENCE) * core.minutes()
            }
        }
    }
}

/// Upper bounds for grip cycle fields. Loose enough for any real session,
/// tight enough that the arithmetic stays small.
const MAX_GRIPS: usize = 50;
const MAX_COUNT: u32 = 100;
const MAX_STEP_SECS: u32 = 3_600;

fn default_switch_secs() -> u32 {
    5
}

/// Hangboard grip cycle parameters. All durations in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GripCycle {
    pub grips: Vec<String>,
    #[serde(default)]
    pub single_arm_grips: BTreeSet<String>,
    pub warmup_secs: u32,
    pub get_ready_secs: u32,
    pub hang_secs: u32,
    pub rep_rest_secs: u32,
    pub set_rest_secs: u32,
    #[serde(default = "default_switch_secs")]
    pub switch_secs: u32,
    pub reps_per_set: u32,
    pub sets_per_grip: u32,
}

impl GripCycle {
    pub fn is_single_arm(&self, grip: &str) -> bool {
        self.single_arm_grips.contains(grip)
    }

    /// One arm's worth of reps: every hang, and a rest between consecutive hangs.
    pub fn one_arm_rep_secs(&self) -> u64 {
        let reps = u64::from(self.reps_per_set);
        reps.saturating_mul(u64::from(self.hang_secs))
            .saturating_add(reps.saturating_sub(1).saturating_mul(u64::from(self.rep_rest_secs)))
    }

    /// Set rest after a single-arm set. The rest clock starts when the first
    /// arm finishes, so the switch and the second arm are already spent.
    /// `None` means the rest is omitted entirely.
    pub fn adjusted_set_rest_secs(&self) -> Option<u64> {
        let spent = u64::from(self.switch_secs).saturating_add(self.one_arm_rep_secs());
        u64::from(self.set_rest_secs)
            .checked_sub(spent)
            .filter(|remaining| *remaining > 0)
    }

    pub fn total_sets(&self) -> u64 {
        (self.grips.len() as u64).saturating_mul(u64::from(self.sets_per_grip))
    }

    /// Work and trailing rest of one set on `grip`, in seconds.
    fn set_secs(&self, grip: &str) -> (u64, u64) {
        let one_arm = self.one_arm_rep_secs();
        if self.is_single_arm(grip) {
            let work = one_arm
                .saturating_mul(2)
                .saturating_add(u64::from(self.switch_secs));
            (work, self.adjusted_set_rest_secs().unwrap_or(0))
        } else {
            (one_arm, u64::from(self.set_rest_secs))
        }
    }

    /// Exact session length in seconds, matching the built phase list. The
    /// final set of the session has no rest after it.
    pub fn total_secs(&self) -> u64 {
        let sets = u64::from(self.sets_per_grip);
        let mut total = u64::from(self.warmup_secs);
        let mut last_rest = 0;
        for grip in &self.grips {
            let (work, rest) = self.set_secs(grip);
            let per_set = u64::from(self.get_ready_secs)
                .saturating_add(work)
                .saturating_add(rest);
            total = total.saturating_add(sets.saturating_mul(per_set));
            last_rest = rest;
        }
        if sets > 0 {
            total = total.saturating_sub(last_rest);
        }
        total
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.grips.is_empty() {
            return Err(ValidationError::EmptyCollection("grips".into()));
        }
        if self.grips.len() > MAX_GRIPS {
            return Err(ValidationError::InvalidValue {
                field: "grips".into(),
                message: format!("at most {MAX_GRIPS} grips"),
            });
        }
        for (field, value) in [
            ("reps_per_set", self.reps_per_set),
            ("sets_per_grip", self.sets_per_grip),
        ] {
            if !(1..=MAX_COUNT).contains(&value) {
                return Err(ValidationError::InvalidValue {
                    field: field.into(),
                    message: format!("must be between 1 and {MAX_COUNT}"),
                });
            }
        }
        for (field, value) in [
            ("warmup_secs", self.warmup_secs),
            ("get_ready_secs", self.get_ready_secs),
            ("hang_secs", self.hang_secs),
            ("rep_rest_secs", self.rep_rest_secs),
            ("set_rest_secs", self.set_rest_secs),
            ("switch_secs", self.switch_secs),
        ] {
            if value > MAX_STEP_SECS {
                return Err(ValidationError::InvalidValue {
                    field: field.into(),
                    message: format!("at most {MAX_STEP_SECS} seconds"),
                });
            }
        }
        if let Some(stray) = self
            .single_arm_grips
            .iter()
            .find(|g| !self.grips.contains(g))
        {
            return Err(ValidationError::InvalidValue {
                field: "single_arm_grips".into(),
                message: format!("'{stray}' is not one of the routine's grips"),
            });
        }
        Ok(())
    }
}

/// Discriminant of a routine, recorded on every session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutineKind {
    TimedSequence,
    GripCycle,
}

impl RoutineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RoutineKind::TimedSequence => "timed_sequence",
            RoutineKind::GripCycle => "grip_cycle",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "timed_sequence" => Some(RoutineKind::TimedSequence),
            "grip_cycle" => Some(RoutineKind::GripCycle),
            _ => None,
        }
    }

    /// Human label used by outbound sinks.
    pub fn workout_label(self) -> &'static str {
        match self {
            RoutineKind::TimedSequence => "Yoga",
            RoutineKind::GripCycle => "Hangboard",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoutineBody {
    TimedSequence { poses: Vec<PoseSpec> },
    GripCycle(GripCycle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum RoutineOrigin {
    BuiltIn,
    /// Authored by the user; durations are literal and the id is stable
    /// across edits so remote persistence can key on it.
    UserAuthored { id: Uuid },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineDefinition {
    pub name: String,
    #[serde(default)]
    pub focus: String,
    pub body: RoutineBody,
    pub origin: RoutineOrigin,
}

impl RoutineDefinition {
    pub fn kind(&self) -> RoutineKind {
        match self.body {
            RoutineBody::TimedSequence { .. } => RoutineKind::TimedSequence,
            RoutineBody::GripCycle(_) => RoutineKind::GripCycle,
        }
    }

    pub fn is_user_authored(&self) -> bool {
        matches!(self.origin, RoutineOrigin::UserAuthored { .. })
    }

    pub fn id(&self) -> Option<Uuid> {
        match self.origin {
            RoutineOrigin::UserAuthored { id } => Some(id),
            RoutineOrigin::BuiltIn => None,
        }
    }

    /// Minutes for one pose of this routine. User-authored routines store
    /// literal durations, so scaling never applies to them.
    pub fn pose_minutes(&self, pose: &PoseSpec, core: ScalingParameter) -> f64 {
        if self.is_user_authored() {
            pose.base_duration_min
        } else {
            pose.scaled_minutes(core)
        }
    }

    /// Unrounded session length in minutes.
    pub fn exact_minutes(&self, core: ScalingParameter) -> f64 {
        match &self.body {
            RoutineBody::TimedSequence { poses } => {
                poses.iter().map(|p| self.pose_minutes(p, core)).sum()
            }
            RoutineBody::GripCycle(cycle) => cycle.total_secs() as f64 / 60.0,
        }
    }

    /// "6 poses" / "2 grips": what a completed session covered.
    pub fn units_summary(&self) -> String {
        match &self.body {
            RoutineBody::TimedSequence { poses } => format!("{} poses", poses.len()),
            RoutineBody::GripCycle(cycle) => format!("{} grips", cycle.grips.len()),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "name".into(),
                message: "routine name is empty".into(),
            });
        }
        match &self.body {
            RoutineBody::TimedSequence { poses } => {
                if poses.is_empty() {
                    return Err(ValidationError::EmptyCollection("poses".into()));
                }
                if let Some(bad) = poses
                    .iter()
                    .find(|p| !p.base_duration_min.is_finite() || p.base_duration_min <= 0.0)
                {
                    return Err(ValidationError::InvalidValue {
                        field: "base_duration_min".into(),
                        message: format!("pose '{}' needs a positive duration", bad.name),
                    });
                }
                Ok(())
            }
            RoutineBody::GripCycle(cycle) => cycle.validate(),
        }
    }
}

/// Planned session length in whole minutes, rounded once at the end.
pub fn compute_duration(routine: &RoutineDefinition, core: ScalingParameter) -> u64 {
    routine.exact_minutes(core).round() as u64
}
