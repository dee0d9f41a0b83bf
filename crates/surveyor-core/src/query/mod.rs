//! Read-side queries over stored missions: status and full results.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::snapshot::{OutcomeStatus, SnapshotError, SnapshotStore, StepName};
use crate::state::{DataSummary, MissionId, MissionState};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("mission {0} not found")]
    NotFound(MissionId),

    #[error(transparent)]
    Snapshot(SnapshotError),
}

impl From<SnapshotError> for QueryError {
    fn from(e: SnapshotError) -> Self {
        match e {
            SnapshotError::MissionNotFound(id) => Self::NotFound(id),
            other => Self::Snapshot(other),
        }
    }
}

/// Coarse mission status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionStatus {
    /// No outcome recorded yet.
    Running,
    Completed,
    Failed,
}

impl From<OutcomeStatus> for MissionStatus {
    fn from(status: OutcomeStatus) -> Self {
        match status {
            OutcomeStatus::Completed => Self::Completed,
            OutcomeStatus::Failed => Self::Failed,
        }
    }
}

impl std::fmt::Display for MissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => f.write_str("running"),
            Self::Completed => f.write_str("completed"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Status view of one mission, built from its latest snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionStatusReport {
    pub mission_id: MissionId,
    pub status: MissionStatus,
    pub last_step: StepName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub data_summary: DataSummary,
}

/// Status of a mission. Unknown ids are [`QueryError::NotFound`].
pub async fn mission_status(
    store: &dyn SnapshotStore,
    mission_id: &MissionId,
) -> Result<MissionStatusReport, QueryError> {
    let (last_step, state) = store.latest(mission_id).await?;
    let outcome = store.outcome(mission_id).await?;

    let (status, reason) = match outcome {
        Some(o) => (MissionStatus::from(o.status), o.reason),
        None => (MissionStatus::Running, None),
    };

    Ok(MissionStatusReport {
        mission_id: mission_id.clone(),
        status,
        last_step,
        reason,
        data_summary: state.summary(),
    })
}

/// Full content of the most recent snapshot.
pub async fn mission_result(
    store: &dyn SnapshotStore,
    mission_id: &MissionId,
) -> Result<MissionState, QueryError> {
    let (_, state) = store.latest(mission_id).await?;
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{FsSnapshotStore, MissionOutcome};
    use crate::state::MissionRequest;

    #[tokio::test]
    async fn status_follows_outcome_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSnapshotStore::new(dir.path());
        let id = MissionId::generate();
        let state = MissionState::new(id.clone(), MissionRequest::new("coffee", None).unwrap());
        store.save(&id, &StepName::initial(), &state).await.unwrap();

        let report = mission_status(&store, &id).await.unwrap();
        assert_eq!(report.status, MissionStatus::Running);
        assert_eq!(report.last_step, StepName::initial());
        assert_eq!(report.data_summary, DataSummary::default());

        store
            .record_outcome(&id, &MissionOutcome::failed("plan invalid", None))
            .await
            .unwrap();
        let report = mission_status(&store, &id).await.unwrap();
        assert_eq!(report.status, MissionStatus::Failed);
        assert_eq!(report.reason.as_deref(), Some("plan invalid"));
    }

    #[tokio::test]
    async fn unknown_mission_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSnapshotStore::new(dir.path());
        let id = MissionId::generate();
        assert!(matches!(
            mission_status(&store, &id).await.unwrap_err(),
            QueryError::NotFound(_)
        ));
        assert!(matches!(
            mission_result(&store, &id).await.unwrap_err(),
            QueryError::NotFound(_)
        ));
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(MissionStatus::Running).unwrap(),
            "running"
        );
    }
}
