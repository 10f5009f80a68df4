use clap::Subcommand;
use holdpoint_core::routine::{compute_duration, DraftPose, RoutineDraft, RoutineStore};
use holdpoint_core::timer::{format_countdown, phase};
use holdpoint_core::{Config, RoutineLibrary, ScalingParameter};
use serde::Serialize;

#[derive(Subcommand)]
pub enum RoutineAction {
    /// List every routine with its planned length
    List {
        /// Core minutes to plan with (defaults to practice.core_minutes)
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=10))]
        core: Option<u8>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the phase list of one routine
    Show {
        /// Routine name
        name: String,
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=10))]
        core: Option<u8>,
        #[arg(long)]
        json: bool,
    },
    /// Create or replace a user-authored routine
    Add {
        /// Routine name
        name: String,
        /// What the routine targets
        #[arg(long, default_value = "")]
        focus: String,
        /// Pose as NAME=MINUTES, repeat for each pose in order
        #[arg(long = "pose", required = true)]
        poses: Vec<String>,
    },
    /// Delete a user-authored routine by name or id
    Remove {
        name_or_id: String,
    },
}

#[derive(Serialize)]
struct RoutineRow {
    name: String,
    kind: &'static str,
    planned_min: u64,
    units: String,
    custom: bool,
}

#[derive(Serialize)]
struct PhaseRow {
    index: usize,
    label: String,
    detail: String,
    duration: String,
}

/// `--core` if given, else the configured core minutes.
pub fn core_or_config(core: Option<u8>, config: &Config) -> Result<ScalingParameter, Box<dyn std::error::Error>> {
    match core {
        Some(value) => Ok(ScalingParameter::new(value)?),
        None => Ok(config.practice.core_minutes),
    }
}

fn parse_pose(raw: &str) -> Result<DraftPose, String> {
    let (name, minutes) = raw
        .rsplit_once('=')
        .ok_or_else(|| format!("pose '{raw}' must look like NAME=MINUTES"))?;
    let minutes: f64 = minutes
        .trim()
        .parse()
        .map_err(|_| format!("pose '{raw}' has no valid minutes"))?;
    Ok(DraftPose {
        name: name.trim().to_string(),
        minutes,
        description: String::new(),
    })
}

pub fn run(action: RoutineAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = RoutineStore::open()?;

    match action {
        RoutineAction::List { core, json } => {
            let config = Config::load_or_default();
            let core = core_or_config(core, &config)?;
            let library = RoutineLibrary::from_store(&store)?;
            let rows: Vec<RoutineRow> = library
                .all()
                .iter()
                .map(|r| RoutineRow {
                    name: r.name.clone(),
                    kind: r.kind().workout_label(),
                    planned_min: compute_duration(r, core),
                    units: r.units_summary(),
                    custom: r.is_user_authored(),
                })
                .collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                for row in rows {
                    let marker = if row.custom { " *" } else { "" };
                    println!(
                        "{:<32} {:<10} {:>4} min  {}{marker}",
                        row.name, row.kind, row.planned_min, row.units
                    );
                }
            }
        }
        RoutineAction::Show { name, core, json } => {
            let config = Config::load_or_default();
            let core = core_or_config(core, &config)?;
            let routine = RoutineLibrary::from_store(&store)?.find(&name)?;
            let phases = phase::build(&routine, core);
            let rows: Vec<PhaseRow> = phases
                .iter()
                .map(|p| PhaseRow {
                    index: p.ordinal + 1,
                    label: p.preview(),
                    detail: p.meta.description.clone(),
                    duration: format_countdown(p.duration_ms),
                })
                .collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                println!(
                    "{} ({} min at core {}, {})",
                    routine.name,
                    compute_duration(&routine, core),
                    core.get(),
                    routine.units_summary()
                );
                if !routine.focus.is_empty() {
                    println!("{}", routine.focus);
                }
                for row in rows {
                    println!("{:>4}. {:>6}  {}  {}", row.index, row.duration, row.label, row.detail);
                }
            }
        }
        RoutineAction::Add { name, focus, poses } => {
            let poses = poses
                .iter()
                .map(|raw| parse_pose(raw))
                .collect::<Result<Vec<_>, _>>()?;
            let routine = store.upsert(RoutineDraft { name, focus, poses })?;
            let id = routine.id().map(|id| id.to_string()).unwrap_or_default();
            println!("saved {} ({id})", routine.name);
        }
        RoutineAction::Remove { name_or_id } => {
            if store.remove(&name_or_id)? {
                println!("removed {name_or_id}");
            } else {
                eprintln!("no user-authored routine named {name_or_id}");
                std::process::exit(1);
            }
        }
    }
    Ok(())
}
