pub mod catalog;
mod model;
mod store;

pub use model::{
    compute_duration, GripCycle, PoseScaling, PoseSpec, RoutineBody, RoutineDefinition,
    RoutineKind, RoutineOrigin, ScalingParameter,
};
pub use store::{DraftPose, RoutineDraft, RoutineStore, MIN_AUTHORED_POSES};

use crate::error::{Result, ValidationError};

/// Name lookup over user-authored routines and the built-in catalog.
/// User routines shadow built-ins of the same name.
#[derive(Debug, Clone, Default)]
pub struct RoutineLibrary {
    custom: Vec<RoutineDefinition>,
}

impl RoutineLibrary {
    pub fn new(custom: Vec<RoutineDefinition>) -> Self {
        Self { custom }
    }

    pub fn from_store(store: &RoutineStore) -> Result<Self> {
        Ok(Self::new(store.load_all()?))
    }

    /// Look a routine up by name. Routines read back from disk may have been
    /// hand-edited, so the match is validated before it is returned.
    pub fn find(&self, name: &str) -> Result<RoutineDefinition, ValidationError> {
        let routine = self
            .custom
            .iter()
            .find(|r| r.name == name)
            .cloned()
            .or_else(|| catalog::find(name))
            .ok_or_else(|| ValidationError::UnknownRoutine(name.to_string()))?;
        routine.validate()?;
        Ok(routine)
    }

    /// Built-ins first, then user routines not shadowing one.
    pub fn all(&self) -> Vec<RoutineDefinition> {
        let mut all: Vec<RoutineDefinition> = catalog::built_in()
            .into_iter()
            .filter(|b| !self.custom.iter().any(|c| c.name == b.name))
            .collect();
        all.extend(self.custom.iter().cloned());
        all
    }
}
