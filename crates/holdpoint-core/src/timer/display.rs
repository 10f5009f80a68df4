use serde::{Deserialize, Serialize};

use super::phase::PhaseCategory;
use super::state::TimerState;
use crate::platform::PosePhotoLookup;

/// Everything a host needs to draw one frame of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayFrame {
    pub routine_name: String,
    pub label: String,
    pub category: PhaseCategory,
    /// "3/20"
    pub position: String,
    /// "m:ss", seconds rounded up.
    pub countdown: String,
    pub remaining_ms: u64,
    pub progress: f64,
    pub next_preview: String,
    pub detail: String,
    pub photo: Option<String>,
    pub running: bool,
}

impl DisplayFrame {
    pub fn compose(
        routine_name: &str,
        state: &TimerState,
        now_ms: u64,
        photos: &dyn PosePhotoLookup,
    ) -> Self {
        let phase = state.current_phase();
        let remaining_ms = state.remaining_ms(now_ms);

        let next_preview = match state.next_phase() {
            Some(next) => format!("Next: {}", next.preview()),
            None if phase.category == PhaseCategory::Pose => "Last pose!".to_string(),
            None => "Last phase!".to_string(),
        };

        Self {
            routine_name: routine_name.to_string(),
            label: phase.label.clone(),
            category: phase.category,
            position: format!("{}/{}", state.current_index() + 1, state.phases().len()),
            countdown: format_countdown(remaining_ms),
            remaining_ms,
            progress: state.progress(now_ms),
            next_preview,
            detail: phase.meta.description.clone(),
            photo: phase
                .meta
                .photo_key
                .as_deref()
                .and_then(|key| photos.photo_for(key)),
            running: state.is_running(),
        }
    }
}

/// Milliseconds as "m:ss", rounding partial seconds up so 0:00 only shows
/// once the phase is really over.
pub fn format_countdown(ms: u64) -> String {
    let total_secs = ms.div_ceil(1000);
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}
