//! User-authored routine storage.
//!
//! Routines live in `routines.json` in the data directory. Each carries a
//! stable uuid so remote persistence can follow renames.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::model::{PoseScaling, PoseSpec, RoutineBody, RoutineDefinition, RoutineOrigin};
use crate::error::{DatabaseError, Result, ValidationError};
use crate::storage::data_dir;

/// Minimum number of poses in a user-authored routine.
pub const MIN_AUTHORED_POSES: usize = 2;

/// A routine as the user writes it: literal minutes per pose.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutineDraft {
    pub name: String,
    #[serde(default)]
    pub focus: String,
    pub poses: Vec<DraftPose>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftPose {
    pub name: String,
    pub minutes: f64,
    #[serde(default)]
    pub description: String,
}

impl RoutineDraft {
    fn into_definition(self, id: Uuid) -> RoutineDefinition {
        RoutineDefinition {
            name: self.name.trim().to_string(),
            focus: self.focus,
            body: RoutineBody::TimedSequence {
                poses: self
                    .poses
                    .into_iter()
                    .map(|p| PoseSpec {
                        name: p.name,
                        base_duration_min: p.minutes,
                        scaling: PoseScaling::Fixed,
                        description: p.description,
                    })
                    .collect(),
            },
            origin: RoutineOrigin::UserAuthored { id },
        }
    }
}

#[derive(Serialize, Deserialize, Default)]
struct RoutinesFile {
    routines: Vec<RoutineDefinition>,
}

/// File-backed store for user-authored routines, keyed by name.
pub struct RoutineStore {
    path: PathBuf,
}

impl RoutineStore {
    /// Open the store at `<data_dir>/routines.json`.
    pub fn open() -> Result<Self> {
        let dir = data_dir().map_err(|e| DatabaseError::DataDir(e.to_string()))?;
        Ok(Self {
            path: dir.join("routines.json"),
        })
    }

    /// Store backed by an explicit file.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load_all(&self) -> Result<Vec<RoutineDefinition>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        let file: RoutinesFile = serde_json::from_str(&content)?;
        Ok(file.routines)
    }

    fn save_all(&self, routines: &[RoutineDefinition]) -> Result<()> {
        let file = RoutinesFile {
            routines: routines.to_vec(),
        };
        std::fs::write(&self.path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Option<RoutineDefinition>> {
        Ok(self.load_all()?.into_iter().find(|r| r.name == name))
    }

    /// Create a routine, or replace the one with the same name. Replacing
    /// keeps the existing id.
    pub fn upsert(&self, draft: RoutineDraft) -> Result<RoutineDefinition> {
        if draft.poses.len() < MIN_AUTHORED_POSES {
            return Err(ValidationError::InvalidValue {
                field: "poses".into(),
                message: format!("add at least {MIN_AUTHORED_POSES} poses"),
            }
            .into());
        }

        let mut routines = self.load_all()?;
        let name = draft.name.trim().to_string();
        let existing = routines.iter().position(|r| r.name == name);
        let id = existing
            .and_then(|i| routines[i].id())
            .unwrap_or_else(Uuid::new_v4);

        let routine = draft.into_definition(id);
        routine.validate()?;

        match existing {
            Some(i) => {
                tracing::info!(name = %routine.name, "updated custom routine");
                routines[i] = routine.clone();
            }
            None => {
                tracing::info!(name = %routine.name, "created custom routine");
                routines.push(routine.clone());
            }
        }
        self.save_all(&routines)?;
        Ok(routine)
    }

    /// Remove by name or by id string. Returns whether anything was removed.
    pub fn remove(&self, name_or_id: &str) -> Result<bool> {
        let mut routines = self.load_all()?;
        let before = routines.len();
        routines.retain(|r| {
            r.name != name_or_id && r.id().map(|id| id.to_string()) != Some(name_or_id.to_string())
        });
        let removed = routines.len() != before;
        if removed {
            self.save_all(&routines)?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn draft(name: &str, minutes: &[f64]) -> RoutineDraft {
        RoutineDraft {
            name: name.into(),
            focus: "evening".into(),
            poses: minutes
                .iter()
                .enumerate()
                .map(|(i, m)| DraftPose {
                    name: format!("Pose {}", i + 1),
                    minutes: *m,
                    description: String::new(),
                })
                .collect(),
        }
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = RoutineStore::with_path(dir.path().join("routines.json"));
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn upsert_preserves_id_on_edit() {
        let dir = TempDir::new().unwrap();
        let store = RoutineStore::with_path(dir.path().join("routines.json"));

        let first = store.upsert(draft("Wind Down", &[2.0, 3.0])).unwrap();
        let edited = store.upsert(draft("Wind Down", &[4.0, 4.0, 1.0])).unwrap();

        assert_eq!(first.id(), edited.id());
        let all = store.load_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].units_summary(), "3 poses");
    }

    #[test]
    fn upsert_rejects_single_pose() {
        let dir = TempDir::new().unwrap();
        let store = RoutineStore::with_path(dir.path().join("routines.json"));
        assert!(store.upsert(draft("Tiny", &[1.0])).is_err());
    }

    #[test]
    fn remove_by_name_or_id() {
        let dir = TempDir::new().unwrap();
        let store = RoutineStore::with_path(dir.path().join("routines.json"));
        let a = store.upsert(draft("A", &[1.0, 1.0])).unwrap();
        store.upsert(draft("B", &[1.0, 1.0])).unwrap();

        assert!(store.remove(&a.id().unwrap().to_string()).unwrap());
        assert!(store.remove("B").unwrap());
        assert!(!store.remove("B").unwrap());
        assert!(store.load_all().unwrap().is_empty());
    }
}
