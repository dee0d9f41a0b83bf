//! Durable, append-only mission snapshots.
//!
//! A snapshot is the full [`MissionState`] at one step boundary, keyed by
//! mission id and [`StepName`]. Step names start with a zero-padded ordinal,
//! so sorting them lexicographically gives execution order:
//!
//! ```text
//! 00_initial
//! 01_plan
//! 02_web_sailor
//! 04_content_extractor   (03 was a skipped descriptor)
//! ```
//!
//! Alongside the snapshots, each finished mission gets one
//! [`MissionOutcome`] record. It is not a snapshot and never changes the
//! snapshot sequence.

pub mod fs;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::{MissionId, MissionState};

pub use fs::FsSnapshotStore;

/// Name of one pipeline step, e.g. `02_web_sailor`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StepName(String);

impl StepName {
    pub fn initial() -> Self {
        Self("00_initial".to_string())
    }

    pub fn plan() -> Self {
        Self("01_plan".to_string())
    }

    /// Step for the team descriptor at `index`; ordinals start at `02`.
    pub fn stage(index: usize, stage_name: &str) -> Self {
        Self(format!("{:02}_{stage_name}", index + 2))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The zero-padded ordinal prefix as a number.
    pub fn ordinal(&self) -> usize {
        self.0
            .split_once('_')
            .and_then(|(n, _)| n.parse().ok())
            .unwrap_or_default()
    }
}

impl FromStr for StepName {
    type Err = SnapshotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = s.split_once('_').is_some_and(|(ordinal, label)| {
            ordinal.len() == 2
                && ordinal.chars().all(|c| c.is_ascii_digit())
                && !label.is_empty()
                && label.chars().all(|c| c.is_ascii_lowercase() || c == '_')
        });
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(SnapshotError::InvalidStep(s.to_string()))
        }
    }
}

impl TryFrom<String> for StepName {
    type Error = SnapshotError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StepName> for String {
    fn from(step: StepName) -> Self {
        step.0
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Terminal status of a mission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Completed,
    Failed,
}

/// How a mission ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionOutcome {
    pub status: OutcomeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub last_step: Option<StepName>,
    pub finished_at: DateTime<Utc>,
}

impl MissionOutcome {
    pub fn completed(last_step: Option<StepName>) -> Self {
        Self {
            status: OutcomeStatus::Completed,
            reason: None,
            last_step,
            finished_at: Utc::now(),
        }
    }

    pub fn failed(reason: impl Into<String>, last_step: Option<StepName>) -> Self {
        Self {
            status: OutcomeStatus::Failed,
            reason: Some(reason.into()),
            last_step,
            finished_at: Utc::now(),
        }
    }
}

/// Errors from the snapshot store.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot {step} already exists for mission {mission_id}")]
    Collision { mission_id: MissionId, step: StepName },

    #[error("mission {0} not found")]
    MissionNotFound(MissionId),

    #[error("snapshot {step} not found for mission {mission_id}")]
    StepNotFound { mission_id: MissionId, step: StepName },

    #[error("invalid step name {0:?}")]
    InvalidStep(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed snapshot at {path}: {source}")]
    Serde {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Append-only storage of mission snapshots and outcomes.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Persist `state` under `step`. Fails with
    /// [`SnapshotError::Collision`] if that step already exists.
    async fn save(
        &self,
        mission_id: &MissionId,
        step: &StepName,
        state: &MissionState,
    ) -> Result<(), SnapshotError>;

    /// All steps recorded for a mission, in execution order.
    async fn steps(&self, mission_id: &MissionId) -> Result<Vec<StepName>, SnapshotError>;

    async fn load(
        &self,
        mission_id: &MissionId,
        step: &StepName,
    ) -> Result<MissionState, SnapshotError>;

    async fn record_outcome(
        &self,
        mission_id: &MissionId,
        outcome: &MissionOutcome,
    ) -> Result<(), SnapshotError>;

    /// The outcome record, or `None` while the mission is still running.
    async fn outcome(&self, mission_id: &MissionId) -> Result<Option<MissionOutcome>, SnapshotError>;

    /// Every mission with stored data, sorted by id.
    async fn missions(&self) -> Result<Vec<MissionId>, SnapshotError>;

    /// The most recent snapshot of a mission.
    async fn latest(
        &self,
        mission_id: &MissionId,
    ) -> Result<(StepName, MissionState), SnapshotError> {
        let step = self
            .steps(mission_id)
            .await?
            .pop()
            .ok_or_else(|| SnapshotError::MissionNotFound(mission_id.clone()))?;
        let state = self.load(mission_id, &step).await?;
        Ok((step, state))
    }
}

// Compile-time check: SnapshotStore must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn SnapshotStore) {}
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_names_sort_in_execution_order() {
        let mut steps = vec![
            StepName::stage(9, "visual_evidence"),
            StepName::stage(0, "web_sailor"),
            StepName::plan(),
            StepName::stage(1, "viral_content"),
            StepName::initial(),
        ];
        steps.sort();
        let names: Vec<&str> = steps.iter().map(StepName::as_str).collect();
        assert_eq!(
            names,
            ["00_initial", "01_plan", "02_web_sailor", "03_viral_content", "11_visual_evidence"]
        );
    }

    #[test]
    fn ordinal_reads_prefix() {
        assert_eq!(StepName::initial().ordinal(), 0);
        assert_eq!(StepName::stage(3, "content_extractor").ordinal(), 5);
    }

    #[test]
    fn step_name_parsing() {
        assert_eq!(
            "02_web_sailor".parse::<StepName>().unwrap(),
            StepName::stage(0, "web_sailor")
        );
        for bad in ["", "2_web", "02_", "02-web", "../01_plan", "outcome", "0a_plan"] {
            assert!(bad.parse::<StepName>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn outcome_serializes_status_snake_case() {
        let outcome = MissionOutcome::failed("boom", Some(StepName::initial()));
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["reason"], "boom");
        assert_eq!(value["last_step"], "00_initial");
    }
}
