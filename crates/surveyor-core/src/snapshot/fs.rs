//! Filesystem snapshot store.
//!
//! Layout:
//!
//! ```text
//! <root>/<mission_id>/00_initial.json
//! <root>/<mission_id>/01_plan.json
//! <root>/<mission_id>/02_web_sailor.json
//! <root>/<mission_id>/outcome.json
//! ```
//!
//! Each file is written to a `.partial` sibling first and then published
//! with a hard link, so readers never see a half-written snapshot and an
//! existing step is never overwritten.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::{MissionOutcome, SnapshotError, SnapshotStore, StepName};
use crate::state::{MissionId, MissionState};

const OUTCOME_FILE: &str = "outcome.json";
const SNAPSHOT_EXT: &str = "json";

#[derive(Debug, Clone)]
pub struct FsSnapshotStore {
    root: PathBuf,
}

impl FsSnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn mission_dir(&self, mission_id: &MissionId) -> PathBuf {
        self.root.join(mission_id.as_str())
    }

    fn snapshot_path(&self, mission_id: &MissionId, step: &StepName) -> PathBuf {
        self.mission_dir(mission_id)
            .join(format!("{step}.{SNAPSHOT_EXT}"))
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> SnapshotError + '_ {
    move |source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Sibling file that never parses as a step.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    path.with_file_name(name)
}

async fn write_synced(path: &Path, bytes: &[u8]) -> Result<(), SnapshotError> {
    let mut file = tokio::fs::File::create(path).await.map_err(io_err(path))?;
    file.write_all(bytes).await.map_err(io_err(path))?;
    file.sync_all().await.map_err(io_err(path))
}

fn serde_err(path: &Path) -> impl FnOnce(serde_json::Error) -> SnapshotError + '_ {
    move |source| SnapshotError::Serde {
        path: path.to_path_buf(),
        source,
    }
}

#[async_trait]
impl SnapshotStore for FsSnapshotStore {
    async fn save(
        &self,
        mission_id: &MissionId,
        step: &StepName,
        state: &MissionState,
    ) -> Result<(), SnapshotError> {
        let dir = self.mission_dir(mission_id);
        tokio::fs::create_dir_all(&dir).await.map_err(io_err(&dir))?;

        let path = self.snapshot_path(mission_id, step);
        let bytes = serde_json::to_vec_pretty(state).map_err(serde_err(&path))?;

        let staging = staging_path(&path);
        write_synced(&staging, &bytes).await?;
        let published = tokio::fs::hard_link(&staging, &path).await;
        let _ = tokio::fs::remove_file(&staging).await;
        match published {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(SnapshotError::Collision {
                    mission_id: mission_id.clone(),
                    step: step.clone(),
                });
            }
            Err(e) => return Err(io_err(&path)(e)),
        }

        tracing::debug!(
            mission_id = %mission_id,
            step = %step,
            path = %path.display(),
            "snapshot saved"
        );
        Ok(())
    }

    async fn steps(&self, mission_id: &MissionId) -> Result<Vec<StepName>, SnapshotError> {
        let dir = self.mission_dir(mission_id);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SnapshotError::MissionNotFound(mission_id.clone()));
            }
            Err(e) => return Err(io_err(&dir)(e)),
        };

        let mut steps = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err(&dir))? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SNAPSHOT_EXT) {
                continue;
            }
            // outcome.json and stray files fail the step-name check.
            if let Some(step) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<StepName>().ok())
            {
                steps.push(step);
            }
        }
        steps.sort();
        Ok(steps)
    }

    async fn load(
        &self,
        mission_id: &MissionId,
        step: &StepName,
    ) -> Result<MissionState, SnapshotError> {
        let path = self.snapshot_path(mission_id, step);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SnapshotError::StepNotFound {
                    mission_id: mission_id.clone(),
                    step: step.clone(),
                });
            }
            Err(e) => return Err(io_err(&path)(e)),
        };
        serde_json::from_slice(&bytes).map_err(serde_err(&path))
    }

    async fn record_outcome(
        &self,
        mission_id: &MissionId,
        outcome: &MissionOutcome,
    ) -> Result<(), SnapshotError> {
        let dir = self.mission_dir(mission_id);
        tokio::fs::create_dir_all(&dir).await.map_err(io_err(&dir))?;

        let path = dir.join(OUTCOME_FILE);
        let bytes = serde_json::to_vec_pretty(outcome).map_err(serde_err(&path))?;
        let staging = staging_path(&path);
        write_synced(&staging, &bytes).await?;
        tokio::fs::rename(&staging, &path).await.map_err(io_err(&path))
    }

    async fn outcome(&self, mission_id: &MissionId) -> Result<Option<MissionOutcome>, SnapshotError> {
        let path = self.mission_dir(mission_id).join(OUTCOME_FILE);
        match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(serde_err(&path)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(&path)(e)),
        }
    }

    async fn missions(&self) -> Result<Vec<MissionId>, SnapshotError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(&self.root)(e)),
        };

        let mut missions = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err(&self.root))? {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }
            if let Some(id) = entry
                .file_name()
                .to_str()
                .and_then(|s| s.parse::<MissionId>().ok())
            {
                missions.push(id);
            }
        }
        missions.sort();
        Ok(missions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::OutcomeStatus;
    use crate::state::MissionRequest;

    fn state(id: &MissionId) -> MissionState {
        MissionState::new(id.clone(), MissionRequest::new("coffee", None).unwrap())
    }

    #[tokio::test]
    async fn save_then_load_and_list_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSnapshotStore::new(dir.path());
        let id = MissionId::generate();
        let s = state(&id);

        store.save(&id, &StepName::initial(), &s).await.unwrap();
        store.save(&id, &StepName::stage(1, "viral_content"), &s).await.unwrap();
        store.save(&id, &StepName::plan(), &s).await.unwrap();

        let steps = store.steps(&id).await.unwrap();
        let names: Vec<&str> = steps.iter().map(StepName::as_str).collect();
        assert_eq!(names, ["00_initial", "01_plan", "03_viral_content"]);

        let loaded = store.load(&id, &StepName::initial()).await.unwrap();
        assert_eq!(loaded, state(&id));

        let (latest, _) = store.latest(&id).await.unwrap();
        assert_eq!(latest.as_str(), "03_viral_content");
    }

    #[tokio::test]
    async fn existing_step_is_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSnapshotStore::new(dir.path());
        let id = MissionId::generate();
        store.save(&id, &StepName::initial(), &state(&id)).await.unwrap();

        let err = store
            .save(&id, &StepName::initial(), &state(&id))
            .await
            .unwrap_err();
        assert!(matches!(err, SnapshotError::Collision { .. }));
    }

    #[tokio::test]
    async fn unknown_mission_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSnapshotStore::new(dir.path());
        let id = MissionId::generate();

        assert!(matches!(
            store.steps(&id).await.unwrap_err(),
            SnapshotError::MissionNotFound(_)
        ));
        assert!(matches!(
            store.latest(&id).await.unwrap_err(),
            SnapshotError::MissionNotFound(_)
        ));
        assert!(matches!(
            store.load(&id, &StepName::plan()).await.unwrap_err(),
            SnapshotError::StepNotFound { .. }
        ));
        assert_eq!(store.outcome(&id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn outcome_is_separate_from_steps() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSnapshotStore::new(dir.path());
        let id = MissionId::generate();
        store.save(&id, &StepName::initial(), &state(&id)).await.unwrap();
        store
            .record_outcome(&id, &MissionOutcome::completed(Some(StepName::initial())))
            .await
            .unwrap();

        assert_eq!(store.steps(&id).await.unwrap(), vec![StepName::initial()]);
        let outcome = store.outcome(&id).await.unwrap().unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Completed);
    }

    #[tokio::test]
    async fn missions_lists_only_mission_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSnapshotStore::new(dir.path().join("sessions"));
        assert!(store.missions().await.unwrap().is_empty());

        let a = MissionId::generate();
        let b = MissionId::generate();
        store.save(&a, &StepName::initial(), &state(&a)).await.unwrap();
        store.save(&b, &StepName::initial(), &state(&b)).await.unwrap();
        std::fs::create_dir_all(store.root().join("not-a-mission")).unwrap();
        std::fs::write(store.root().join("notes.txt"), "x").unwrap();

        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(store.missions().await.unwrap(), expected);
    }
}
