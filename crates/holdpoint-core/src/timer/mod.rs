mod clock;
mod display;
mod engine;
pub mod phase;
mod state;

pub use clock::{Clock, ManualClock, SystemClock, TokioClock};
pub use display::{format_countdown, DisplayFrame};
pub use engine::{EngineSettings, Effects, SessionStatus, TimerEngine};
pub use phase::{Phase, PhaseCategory, PhaseMeta, Side};
pub use state::{Reconciled, TimerState};
