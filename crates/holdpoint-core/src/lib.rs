//! # HoldPoint Core Library
//!
//! Timing engine for guided workouts: yin yoga sequences and hangboard grip
//! cycles. A routine is expanded into a flat list of timed phases which the
//! engine walks through against the wall clock, so the session stays correct
//! even when the host throttles or suspends it.
//!
//! ## Architecture
//!
//! - **Routines**: built-in catalog plus user-authored routines on disk
//! - **Timer**: phase builder, pure [`TimerState`] and the [`TimerEngine`]
//!   state machine; the caller invokes `reconcile()` to catch up
//! - **Runtime**: [`SessionRuntime`] drives an engine on tokio with a
//!   display-rate loop, a background-safe fallback and a watchdog
//! - **Storage**: SQLite session history and TOML configuration
//! - **Integrations**: outbound sinks for completed sessions
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: session state machine
//! - [`SessionRuntime`]: async host with suspend/resume recovery
//! - [`Database`]: session history persistence
//! - [`Config`]: application configuration management
//! - [`SessionSink`]: trait for outbound session sinks

pub mod completion;
pub mod error;
pub mod events;
pub mod integrations;
pub mod platform;
pub mod routine;
pub mod runtime;
pub mod stats;
pub mod storage;
pub mod timer;

pub use completion::{CompletionHandler, Persisted};
pub use error::{ConfigError, CoreError, DatabaseError, ResourceError, SinkError, ValidationError};
pub use events::{Event, ResumeReason};
pub use integrations::SessionSink;
pub use routine::{RoutineDefinition, RoutineKind, RoutineLibrary, ScalingParameter};
pub use runtime::SessionRuntime;
pub use storage::{Config, Database, SessionRecord, SessionStore};
pub use timer::{DisplayFrame, Phase, PhaseCategory, SessionStatus, TimerEngine, TimerState};
