//! Host capabilities the engine drives but does not render: audio cues, the
//! display wake-lock, the display surface and pose photos.
//!
//! Audio and wake-lock are process-wide and outlive any one session.
//! Acquire, release and `ensure_ready` must all be idempotent: the engine calls
//! them on every resume-like signal, not just once.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::ResourceError;
use crate::timer::DisplayFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cue {
    PhaseChanged,
    SessionComplete,
}

pub trait AudioOutput: Send + Sync {
    /// Wake the output if the host suspended it. Cheap when already awake.
    fn ensure_ready(&self) -> Result<(), ResourceError>;

    fn play(&self, cue: Cue) -> Result<(), ResourceError>;
}

pub trait WakeLock: Send + Sync {
    fn acquire(&self) -> Result<(), ResourceError>;

    fn release(&self);

    /// False after the host revoked the lock, even if we never released it.
    fn is_held(&self) -> bool;
}

pub trait DisplaySink: Send + Sync {
    fn render(&self, frame: &DisplayFrame);

    /// Back to the host's home view after a session ends.
    fn show_idle(&self);
}

pub trait PosePhotoLookup: Send + Sync {
    fn photo_for(&self, pose_name: &str) -> Option<String>;
}

/// Silent output.
#[derive(Debug, Default)]
pub struct NullAudio;

impl AudioOutput for NullAudio {
    fn ensure_ready(&self) -> Result<(), ResourceError> {
        Ok(())
    }

    fn play(&self, _cue: Cue) -> Result<(), ResourceError> {
        Ok(())
    }
}

/// Wake-lock for hosts without one. Acquisition always reports unsupported.
#[derive(Debug, Default)]
pub struct NoWakeLock;

impl WakeLock for NoWakeLock {
    fn acquire(&self) -> Result<(), ResourceError> {
        Err(ResourceError::Unsupported("wake-lock"))
    }

    fn release(&self) {}

    fn is_held(&self) -> bool {
        false
    }
}

/// In-process flag lock. Useful where keeping the process alive is enough,
/// and as a stand-in the host can revoke.
#[derive(Debug, Default)]
pub struct FlagWakeLock {
    held: AtomicBool,
}

impl FlagWakeLock {
    /// Simulate the host dropping the lock.
    pub fn revoke(&self) {
        if self.held.swap(false, Ordering::SeqCst) {
            tracing::warn!("wake-lock revoked by host");
        }
    }
}

impl WakeLock for FlagWakeLock {
    fn acquire(&self) -> Result<(), ResourceError> {
        self.held.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn release(&self) {
        self.held.store(false, Ordering::SeqCst);
    }

    fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
pub struct NullDisplay;

impl DisplaySink for NullDisplay {
    fn render(&self, _frame: &DisplayFrame) {}

    fn show_idle(&self) {}
}

#[derive(Debug, Default)]
pub struct NoPhotos;

impl PosePhotoLookup for NoPhotos {
    fn photo_for(&self, _pose_name: &str) -> Option<String> {
        None
    }
}

/// Photos named after the pose: "Low Dragon Left" -> "<dir>/low-dragon-left.jpg".
#[derive(Debug, Clone)]
pub struct PhotoDirectory {
    dir: std::path::PathBuf,
}

impl PhotoDirectory {
    pub fn new(dir: impl Into<std::path::PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn slug(pose_name: &str) -> String {
        let mut slug = String::with_capacity(pose_name.len());
        for c in pose_name.chars() {
            if c.is_ascii_alphanumeric() {
                slug.push(c.to_ascii_lowercase());
            } else if !slug.ends_with('-') && !slug.is_empty() {
                slug.push('-');
            }
        }
        slug.trim_end_matches('-').to_string()
    }
}

impl PosePhotoLookup for PhotoDirectory {
    fn photo_for(&self, pose_name: &str) -> Option<String> {
        let path = self.dir.join(format!("{}.jpg", Self::slug(pose_name)));
        path.exists().then(|| path.display().to_string())
    }
}
