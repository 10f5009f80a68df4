//! Property tests for planned durations and the built phase lists.

use holdpoint_core::routine::{
    catalog, compute_duration, PoseScaling, PoseSpec, RoutineBody, RoutineDefinition,
    RoutineOrigin, ScalingParameter,
};
use holdpoint_core::timer::phase;
use proptest::prelude::*;

fn core(value: u8) -> ScalingParameter {
    ScalingParameter::new(value).unwrap()
}

fn scaling() -> impl Strategy<Value = PoseScaling> {
    prop_oneof![
        Just(PoseScaling::Fixed),
        Just(PoseScaling::ScalesWithCore),
        Just(PoseScaling::HalfCore),
    ]
}

fn built_in_routine(poses: Vec<(f64, PoseScaling)>) -> RoutineDefinition {
    RoutineDefinition {
        name: "Generated".into(),
        focus: String::new(),
        body: RoutineBody::TimedSequence {
            poses: poses
                .into_iter()
                .enumerate()
                .map(|(i, (minutes, scaling))| PoseSpec {
                    name: format!("Pose {i}"),
                    base_duration_min: minutes,
                    scaling,
                    description: String::new(),
                })
                .collect(),
        },
        origin: RoutineOrigin::BuiltIn,
    }
}

proptest! {
    #[test]
    fn planned_duration_never_shrinks_as_core_grows(
        poses in prop::collection::vec((0.5f64..12.0, scaling()), 1..12),
        low in 1u8..=10,
        high in 1u8..=10,
    ) {
        let (low, high) = if low <= high { (low, high) } else { (high, low) };
        let routine = built_in_routine(poses);
        prop_assert!(compute_duration(&routine, core(low)) <= compute_duration(&routine, core(high)));
    }

    #[test]
    fn phase_list_matches_exact_duration(
        poses in prop::collection::vec((0.5f64..12.0, scaling()), 1..12),
        c in 1u8..=10,
    ) {
        let routine = built_in_routine(poses);
        let phases = phase::build(&routine, core(c));
        prop_assert_eq!(phases.len(), match &routine.body {
            RoutineBody::TimedSequence { poses } => poses.len(),
            RoutineBody::GripCycle(_) => unreachable!(),
        });
        prop_assert!(phases.last().is_some_and(|p| p.is_last));
        prop_assert!(phases.iter().rev().skip(1).all(|p| !p.is_last));

        let built_ms: u64 = phases.iter().map(|p| p.duration_ms).sum();
        let exact_ms = routine.exact_minutes(core(c)) * 60_000.0;
        // Per-phase rounding to whole milliseconds.
        prop_assert!((built_ms as f64 - exact_ms).abs() <= phases.len() as f64);
    }

    #[test]
    fn grip_cycles_ignore_core_time(c in 1u8..=10) {
        for routine in [catalog::twenty_mm_and_slopers(), catalog::twenty_mm_and_pockets()] {
            prop_assert_eq!(
                compute_duration(&routine, core(c)),
                compute_duration(&routine, ScalingParameter::default())
            );
        }
    }
}

#[test]
fn catalog_durations_are_monotonic_in_core_time() {
    for routine in catalog::built_in() {
        let durations: Vec<u64> = (1..=10).map(|c| compute_duration(&routine, core(c))).collect();
        assert!(
            durations.windows(2).all(|w| w[0] <= w[1]),
            "{} is not monotonic: {durations:?}",
            routine.name
        );
    }
}
