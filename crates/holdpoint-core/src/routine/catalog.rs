//! Built-in routine catalog: four yin sequences and two hangboard cycles.
//!
//! Pose durations are minutes at the reference core time of 5.

use super::model::{
    GripCycle, PoseScaling, PoseSpec, RoutineBody, RoutineDefinition, RoutineOrigin,
};

fn core(name: &str, minutes: f64, description: &str) -> PoseSpec {
    PoseSpec {
        name: name.into(),
        base_duration_min: minutes,
        scaling: PoseScaling::ScalesWithCore,
        description: description.into(),
    }
}

fn transition(name: &str, minutes: f64, description: &str) -> PoseSpec {
    PoseSpec {
        name: name.into(),
        base_duration_min: minutes,
        scaling: PoseScaling::Fixed,
        description: description.into(),
    }
}

fn savasana(minutes: f64, description: &str) -> PoseSpec {
    PoseSpec {
        name: "Savasana".into(),
        base_duration_min: minutes,
        scaling: PoseScaling::HalfCore,
        description: description.into(),
    }
}

fn sequence(name: &str, focus: &str, poses: Vec<PoseSpec>) -> RoutineDefinition {
    RoutineDefinition {
        name: name.into(),
        focus: focus.into(),
        body: RoutineBody::TimedSequence { poses },
        origin: RoutineOrigin::BuiltIn,
    }
}

/// Kneeling toes-tucked / feet-flat opener shared by three sequences.
fn kneeling_opener(short: f64, long: f64) -> Vec<PoseSpec> {
    vec![
        transition("On Knees Toes Tucked", short, "Kneel with toes tucked under"),
        transition("On Knees Feet Flat", short, "Kneel with feet flat"),
        transition("On Knees Toes Tucked", short, "Toes tucked, deeper"),
        transition("On Knees Feet Flat", short, "Feet flat, gentle"),
        transition("On Knees Toes Tucked", long, "Toes tucked, long hold"),
        transition("On Knees Feet Flat", long, "Feet flat, long hold"),
    ]
}

pub fn yin_yoga() -> RoutineDefinition {
    let mut poses = kneeling_opener(0.5, 1.5);
    poses.extend([
        core("Long Legged Butterfly", 5.0, "Legs extended wide, fold forward"),
        core("Straddle Fold Left", 5.0, "Wide legs, fold toward left foot"),
        core("Straddle Fold Right", 5.0, "Wide legs, fold toward right foot"),
        core("Straddle Fold Middle", 5.0, "Wide legs, fold straight forward"),
        core("Sphinx", 5.0, "Lie on belly, prop up on forearms, gentle backbend"),
        core("Seal", 5.0, "Like sphinx but arms straight, deeper backbend"),
        transition("Child's Pose", 2.0, "Knees wide, fold forward, arms extended"),
        core("Low Dragon Left", 2.5, "Deep lunge, left foot forward, hands on floor"),
        core("Dragon Hands on Knee Left", 2.5, "Left foot forward, hands on front knee, upright"),
        core("Wide Dragon Left", 2.5, "Left foot forward, foot steps wide, sink hips"),
        core("Dragon Knee Down Left", 2.5, "Left foot forward, back knee down, hands on floor"),
        transition("Downward Dog", 1.0, "Inverted V, press hips up and back"),
        core("Low Dragon Right", 2.5, "Deep lunge, right foot forward, hands on floor"),
        core("Dragon Hands on Knee Right", 2.5, "Right foot forward, hands on front knee, upright"),
        core("Wide Dragon Right", 2.5, "Right foot forward, foot steps wide, sink hips"),
        core("Dragon Knee Down Right", 2.5, "Right foot forward, back knee down, hands on floor"),
        transition("Downward Dog", 1.0, "Inverted V, press hips up and back"),
        core("Twist Right", 3.0, "Lying twist, knees fall to right"),
        core("Twist Left", 3.0, "Lying twist, knees fall to left"),
        savasana(3.0, "Final rest, lie flat on back, relax completely"),
    ]);
    sequence(
        "Yin Yoga",
        "Full body flow with straddles, backbends, dragons, twists",
        poses,
    )
}

pub fn happy_hips() -> RoutineDefinition {
    let mut poses = kneeling_opener(0.75, 1.5);
    poses.extend([
        core("Long Legged Butterfly", 5.0, "Legs extended wide, fold forward"),
        transition("Right Shoelace Twist", 1.0, "Legs crossed right over left, gentle twist"),
        core("Right Shoelace Fold", 5.0, "Legs crossed right over left, fold forward"),
        transition("Right Half Pigeon Chest Up", 1.0, "Right shin forward, chest lifted"),
        core("Right Half Pigeon Fold", 5.0, "Right shin forward, fold over front leg"),
        transition("Left Shoelace Twist", 1.0, "Legs crossed left over right, gentle twist"),
        core("Left Shoelace Fold", 5.0, "Legs crossed left over right, fold forward"),
        transition("Left Half Pigeon Chest Up", 1.0, "Left shin forward, chest lifted"),
        core("Left Half Pigeon Fold", 5.0, "Left shin forward, fold over front leg"),
        transition("Downward Dog", 1.0, "Inverted V, shake it out"),
        core("On Knees Full Layback", 5.0, "Kneel and lean all the way back"),
        transition("Downward Dog", 1.0, "Inverted V, shake it out"),
        core("Hurdler Right", 5.0, "Right leg extended, left foot to inner thigh, fold forward"),
        core("Hurdler Left", 5.0, "Left leg extended, right foot to inner thigh, fold forward"),
        core("Straddle Fold", 5.0, "Wide legs, fold straight forward"),
        core("Twist Right", 5.0, "Lying twist, knees fall to right"),
        core("Twist Left", 5.0, "Lying twist, knees fall to left"),
        savasana(3.0, "Final rest, lie flat, relax"),
    ]);
    sequence(
        "Happy Yin Happy Hips",
        "Hip openers with shoelace, pigeon, hurdlers, twists",
        poses,
    )
}

pub fn letting_go() -> RoutineDefinition {
    let mut poses = kneeling_opener(0.5, 1.5);
    poses.extend([
        core("Long Legged Butterfly", 5.0, "Legs extended wide, fold forward"),
        core("Sphinx", 5.0, "Lie on belly, prop up on forearms"),
        core("Sphinx + Seal", 5.0, "Transition from sphinx to seal, deeper backbend"),
        transition("Child's Pose", 1.0, "Counterpose, knees wide, fold forward"),
        transition("Cat Cow", 1.0, "Hands and knees, alternate arch and round spine"),
        transition("Right Shoelace Twist", 1.0, "Legs crossed right over left, gentle twist"),
        core("Right Shoelace Side Stretch", 4.0, "Legs crossed right over left, side stretch"),
        transition("Shake Out Right", 0.5, "Release and shake out right side"),
        transition("Left Shoelace Twist", 1.0, "Legs crossed left over right, gentle twist"),
        core("Left Shoelace Side Stretch", 4.0, "Legs crossed left over right, side stretch"),
        transition("Shake Out Left", 0.5, "Release and shake out left side"),
        transition("Right Pigeon Chest Up", 2.0, "Right shin forward, chest lifted"),
        core("Right Pigeon Fold", 4.0, "Right shin forward, fold forward"),
        transition("Left Pigeon Chest Up", 2.0, "Left shin forward, chest lifted"),
        core("Left Pigeon Fold", 4.0, "Left shin forward, fold forward"),
        transition("Downward Dog", 2.0, "Inverted V, shake it out"),
        core("Twist Right", 5.0, "Lying twist, knees fall to right"),
        core("Twist Left", 5.0, "Lying twist, knees fall to left"),
        savasana(3.0, "Final rest, lie flat, relax"),
    ]);
    sequence(
        "The Yin Side of Letting Go",
        "Spine work, shoelace, pigeon, and deep twists",
        poses,
    )
}

pub fn upper_body() -> RoutineDefinition {
    sequence(
        "Upper Body",
        "Shoulders, chest, upper back release",
        vec![
            core("Melting Heart", 5.0, "Knees on floor, chest melts toward ground, arms extended"),
            core("Thread the Needle Right", 5.0, "Right arm threads under left, shoulder to floor"),
            core("Thread the Needle Left", 5.0, "Left arm threads under right, shoulder to floor"),
            core("Broken Wing Right", 5.0, "Lie on right side, right arm extended behind"),
            core("Broken Wing Left", 5.0, "Lie on left side, left arm extended behind"),
            core("Eagle Arms Right", 5.0, "Right arm under left, wrap forearms, lift elbows"),
            core("Eagle Arms Left", 5.0, "Left arm under right, wrap forearms, lift elbows"),
            core("Sphinx", 5.0, "Lie on belly, prop up on forearms, gentle backbend"),
            core("Seal", 5.0, "Like sphinx but arms straight, deeper backbend"),
            core("Twisted Dragon Right", 5.0, "Low lunge right foot forward, twist and reach"),
            core("Twisted Dragon Left", 5.0, "Low lunge left foot forward, twist and reach"),
            savasana(5.0, "Final rest, lie flat on back, relax completely"),
        ],
    )
}

fn grip_cycle(name: &str, focus: &str, grips: &[&str], single_arm: &[&str]) -> RoutineDefinition {
    RoutineDefinition {
        name: name.into(),
        focus: focus.into(),
        body: RoutineBody::GripCycle(GripCycle {
            grips: grips.iter().map(|g| g.to_string()).collect(),
            single_arm_grips: single_arm.iter().map(|g| g.to_string()).collect(),
            warmup_secs: 300,
            get_ready_secs: 5,
            hang_secs: 7,
            rep_rest_secs: 3,
            set_rest_secs: 180,
            switch_secs: 5,
            reps_per_set: 6,
            sets_per_grip: 3,
        }),
        origin: RoutineOrigin::BuiltIn,
    }
}

pub fn twenty_mm_and_slopers() -> RoutineDefinition {
    grip_cycle(
        "20mm + Slopers",
        "3 sets each grip, 7s hang / 3s rest, 6 reps per set",
        &["20mm Edge", "Slopers"],
        &["Slopers"],
    )
}

pub fn twenty_mm_and_pockets() -> RoutineDefinition {
    grip_cycle(
        "20mm + 2-Finger Pockets",
        "3 sets each grip, 7s hang / 3s rest, 6 reps per set",
        &["20mm Edge", "2-Finger Pockets"],
        &[],
    )
}

/// All built-in routines, yoga first.
pub fn built_in() -> Vec<RoutineDefinition> {
    vec![
        yin_yoga(),
        happy_hips(),
        letting_go(),
        upper_body(),
        twenty_mm_and_slopers(),
        twenty_mm_and_pockets(),
    ]
}

pub fn find(name: &str) -> Option<RoutineDefinition> {
    built_in().into_iter().find(|r| r.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routine::model::{compute_duration, RoutineKind, ScalingParameter};

    #[test]
    fn catalog_has_six_valid_routines() {
        let all = built_in();
        assert_eq!(all.len(), 6);
        assert_eq!(
            all.iter()
                .filter(|r| r.kind() == RoutineKind::GripCycle)
                .count(),
            2
        );
        for routine in &all {
            routine.validate().unwrap();
        }
    }

    #[test]
    fn upper_body_scales_with_core_minutes() {
        let routine = upper_body();
        // 11 core poses at 5 min + savasana at core/2.
        assert_eq!(compute_duration(&routine, ScalingParameter::default()), 58);
        // 11 * 2 + 1 = 23
        assert_eq!(compute_duration(&routine, ScalingParameter::new(2).unwrap()), 23);
    }

    #[test]
    fn find_by_name() {
        assert!(find("Yin Yoga").is_some());
        assert!(find("yin yoga").is_none());
    }
}
