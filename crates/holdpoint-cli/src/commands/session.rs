use std::sync::Arc;
use std::time::Duration;

use clap::Subcommand;
use holdpoint_core::integrations::{sinks_from_config, PUBLISH_TIMEOUT};
use holdpoint_core::platform::{FlagWakeLock, NoPhotos, PhotoDirectory, PosePhotoLookup};
use holdpoint_core::routine::{compute_duration, RoutineStore};
use holdpoint_core::storage::data_dir;
use holdpoint_core::timer::{Effects, EngineSettings, SystemClock};
use holdpoint_core::{
    CompletionHandler, Config, Database, Event, ResumeReason, RoutineDefinition, RoutineLibrary,
    ScalingParameter, SessionRuntime, SessionStatus, TimerEngine,
};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::routine::core_or_config;
use crate::terminal::{StatusLine, TerminalBell};

const LAST_ROUTINE_KEY: &str = "last_routine";
/// Slack on top of the request timeout before giving up on sinks at exit.
const SINK_GRACE: Duration = Duration::from_secs(1);

#[derive(Subcommand)]
pub enum SessionAction {
    /// Run a routine interactively. Keys (then Enter): p pause/resume,
    /// n next, b back, q quit, v/h simulate the window becoming visible/hidden,
    /// f simulate focus regained
    Run {
        /// Routine name (defaults to the last routine run)
        name: Option<String>,
        /// Core minutes for scalable poses (defaults to practice.core_minutes)
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=10))]
        core: Option<u8>,
        /// Silence the terminal bell for this session
        #[arg(long)]
        no_bell: bool,
        /// Start counting immediately instead of waiting for `p`
        #[arg(long)]
        autostart: bool,
    },
    /// Print the plan for a routine without running it
    Plan {
        name: Option<String>,
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=10))]
        core: Option<u8>,
    },
}

fn resolve_name(name: Option<String>, db: &Database) -> Result<String, Box<dyn std::error::Error>> {
    match name {
        Some(name) => Ok(name),
        None => db
            .kv_get(LAST_ROUTINE_KEY)?
            .ok_or_else(|| "no routine given and no previous session to repeat".into()),
    }
}

fn photos() -> Arc<dyn PosePhotoLookup> {
    match data_dir() {
        Ok(dir) if dir.join("photos").is_dir() => Arc::new(PhotoDirectory::new(dir.join("photos"))),
        _ => Arc::new(NoPhotos),
    }
}

pub fn run(action: SessionAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let db = Database::open()?;
    let library = RoutineLibrary::from_store(&RoutineStore::open()?)?;

    match action {
        SessionAction::Plan { name, core } => {
            let routine = library.find(&resolve_name(name, &db)?)?;
            let core = core_or_config(core, &config)?;
            println!(
                "{}: {} min at core {} ({})",
                routine.name,
                compute_duration(&routine, core),
                core.get(),
                routine.units_summary()
            );
            Ok(())
        }
        SessionAction::Run {
            name,
            core,
            no_bell,
            autostart,
        } => {
            let routine = library.find(&resolve_name(name, &db)?)?;
            let core = core_or_config(core, &config)?;
            db.kv_set(LAST_ROUTINE_KEY, &routine.name)?;

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            let result = runtime.block_on(interactive(config, routine, core, no_bell, autostart));
            // Sinks were drained inside `interactive`; a pending stdin read
            // cannot be cancelled, so do not wait for it.
            runtime.shutdown_background();
            result
        }
    }
}

async fn interactive(
    config: Config,
    routine: RoutineDefinition,
    core: ScalingParameter,
    no_bell: bool,
    autostart: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let status_line = Arc::new(StatusLine::default());
    let effects = Effects {
        audio: Arc::new(TerminalBell),
        wake_lock: Arc::new(FlagWakeLock::default()),
        display: status_line.clone(),
        photos: photos(),
    };
    let mut settings = EngineSettings::from(&config);
    if no_bell {
        settings.bell_enabled = false;
    }
    let completion = CompletionHandler::new(Box::new(Database::open()?))
        .with_sinks(sinks_from_config(&config.sync));
    let engine = TimerEngine::new(Arc::new(SystemClock), effects, settings, completion);

    let (session, mut events) = SessionRuntime::new(engine, &config.timing);
    let session = session.persist_settings_to(config.clone(), Config::path()?);

    session.start(routine, core)?;
    if autostart {
        session.resume()?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut input_open = true;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if report(&event, &status_line) {
                    break;
                }
            }
            line = lines.next_line(), if input_open => {
                match line? {
                    Some(line) => handle_key(line.trim(), &session),
                    None => {
                        input_open = false;
                        // Nobody left to press play.
                        if session.status() == SessionStatus::Paused {
                            handle_key("q", &session);
                        }
                    }
                }
            }
        }
    }
    session.shutdown();
    session.drain_publishes(PUBLISH_TIMEOUT + SINK_GRACE).await;
    Ok(())
}

fn handle_key(key: &str, session: &SessionRuntime) {
    let result = match key {
        "p" | "" => session.toggle(),
        "n" => session.advance(),
        "b" => session.retreat(),
        "q" => session.abandon(),
        "v" => {
            session.set_visible(true);
            Ok(())
        }
        "h" => {
            session.set_visible(false);
            Ok(())
        }
        "f" => {
            session.on_possible_resume(ResumeReason::FocusRegained);
            Ok(())
        }
        other => {
            eprintln!("unknown key '{other}' (p n b q v h f)");
            Ok(())
        }
    };
    if let Err(e) = result {
        eprintln!("{e}");
    }
}

/// Print one event. Returns true when the session is over.
fn report(event: &Event, status_line: &StatusLine) -> bool {
    match event {
        Event::SessionStarted {
            routine_name,
            phase_count,
            planned_minutes,
            ..
        } => {
            println!("{routine_name}: {phase_count} phases, {planned_minutes} min. Press p then Enter to begin.");
        }
        Event::SessionCompleted { record, .. } => {
            status_line.break_line();
            println!(
                "Session complete: {} in {} min (planned {}).",
                record.routine_name, record.actual_duration_min, record.planned_duration_min
            );
        }
        Event::SessionAbandoned { routine_name, .. } => {
            status_line.break_line();
            println!("{routine_name} abandoned.");
            return true;
        }
        Event::ReturnedToIdle { .. } => return true,
        Event::SchedulerStalled {
            overdue_ms,
            restarts,
            ..
        } => {
            status_line.break_line();
            eprintln!("timer stalled {overdue_ms} ms past a phase end ({restarts} restarts)");
        }
        Event::ResumeDetected { reason, .. } => {
            tracing::info!(reason = reason.as_str(), "resume detected");
        }
        _ => {}
    }
    false
}
