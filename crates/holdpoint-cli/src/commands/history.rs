use chrono::{Local, Utc};
use clap::Subcommand;
use holdpoint_core::stats;
use holdpoint_core::Database;
use serde::Serialize;

#[derive(Subcommand)]
pub enum HistoryAction {
    /// Completed sessions, newest first
    List {
        /// Show at most this many sessions
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Streak, totals and monthly summary
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Delete every stored session
    Clear {
        /// Required; history cannot be recovered
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Serialize)]
struct StatsReport {
    summary: stats::HistorySummary,
    months: Vec<stats::MonthSummary>,
}

fn hours(minutes: u64) -> String {
    format!("{:.1}", minutes as f64 / 60.0)
}

pub fn run(action: HistoryAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        HistoryAction::List { limit, json } => {
            let history = db.history(limit)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&history)?);
            } else if history.is_empty() {
                println!("no sessions yet");
            } else {
                for record in history {
                    println!(
                        "{}  {:<32} {:>3}/{:<3} min  core {:<2} {}",
                        record.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                        record.routine_name,
                        record.actual_duration_min,
                        record.planned_duration_min,
                        record.scaling_parameter_used.get(),
                        record.units_completed,
                    );
                }
            }
        }
        HistoryAction::Stats { json } => {
            let history = db.history(None)?;
            let report = StatsReport {
                summary: stats::summarize(&history, Utc::now().date_naive()),
                months: stats::monthly(&history),
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                let s = &report.summary;
                println!("sessions:    {}", s.sessions);
                println!("hours:       {}", hours(s.minutes));
                println!("this month:  {}", s.sessions_this_month);
                println!("streak:      {} days", s.streak_days);
                println!(
                    "yoga:        {} sessions, {} h",
                    s.yoga.sessions,
                    hours(s.yoga.minutes)
                );
                println!(
                    "hangboard:   {} sessions, {} h",
                    s.hangboard.sessions,
                    hours(s.hangboard.minutes)
                );
                for month in &report.months {
                    println!(
                        "{:<16} {:>5} h  {:>3} sessions  yoga {}%",
                        month.label(),
                        hours(month.total_minutes()),
                        month.sessions,
                        month.yoga_percent()
                    );
                }
            }
        }
        HistoryAction::Clear { yes } => {
            if !yes {
                eprintln!("refusing to clear history without --yes");
                std::process::exit(1);
            }
            let removed = db.clear_history()?;
            println!("removed {removed} sessions");
        }
    }
    Ok(())
}
