//! Terminal stand-ins for the host capabilities.

use std::io::Write;
use std::sync::Mutex;

use holdpoint_core::platform::{AudioOutput, Cue, DisplaySink};
use holdpoint_core::{DisplayFrame, ResourceError};

/// Both cues as the terminal bell: one ring on a phase change, three on
/// completion.
#[derive(Debug, Default)]
pub struct TerminalBell;

impl AudioOutput for TerminalBell {
    fn ensure_ready(&self) -> Result<(), ResourceError> {
        Ok(())
    }

    fn play(&self, cue: Cue) -> Result<(), ResourceError> {
        let rings = match cue {
            Cue::PhaseChanged => "\x07",
            Cue::SessionComplete => "\x07\x07\x07",
        };
        let mut out = std::io::stdout().lock();
        out.write_all(rings.as_bytes())
            .and_then(|_| out.flush())
            .map_err(|e| ResourceError::Unavailable(e.to_string()))
    }
}

/// Redraws one status line in place, only when its text changes.
#[derive(Debug, Default)]
pub struct StatusLine {
    last: Mutex<String>,
}

const BAR_WIDTH: usize = 20;

pub fn status_text(frame: &DisplayFrame) -> String {
    let filled = ((frame.progress * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);
    let state = if frame.running { "" } else { " [paused]" };
    format!(
        "{} {} [{}{}] {}  {}  {}{}",
        frame.position,
        frame.countdown,
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled),
        frame.label,
        frame.detail,
        frame.next_preview,
        state
    )
}

impl StatusLine {
    fn draw(&self, text: String) {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if *last == text {
            return;
        }
        let mut out = std::io::stdout().lock();
        // Write errors on a status line are not worth surfacing.
        let _ = write!(out, "\r\x1b[2K{text}");
        let _ = out.flush();
        *last = text;
    }

    /// End the in-place line so regular output starts on a fresh one.
    pub fn break_line(&self) {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if !last.is_empty() {
            println!();
            last.clear();
        }
    }
}

impl DisplaySink for StatusLine {
    fn render(&self, frame: &DisplayFrame) {
        self.draw(status_text(frame));
    }

    fn show_idle(&self) {
        self.break_line();
    }
}
