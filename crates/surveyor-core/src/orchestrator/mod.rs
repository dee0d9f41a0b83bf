//! Mission controller: plans a mission and runs its team of stages in order,
//! persisting a snapshot after every step.
//!
//! ```text
//! initialize --> plan --(empty team)--------------------------> completed
//!                  |                                                ^
//!                  +--> stage[0] --> stage[1] --> ... --> stage[n] -+
//!                  |        |
//!                  v        v
//!               failed   failed (stage error or panic)
//! ```
//!
//! Top-level execution is strictly sequential; concurrency only happens
//! inside a stage. There is no rollback: each snapshot commits the state it
//! records.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use thiserror::Error;

use crate::plan::{PlanProducer, PlanValidationError, validate_plan};
use crate::snapshot::{MissionOutcome, SnapshotError, SnapshotStore, StepName};
use crate::stage::{StageCharter, StageRegistry};
use crate::state::{DataSummary, InputError, MissionId, MissionRequest, MissionState, PlanSource};

/// Errors that end a mission.
#[derive(Debug, Error)]
pub enum MissionError {
    #[error("research topic is required and must not be blank")]
    MissingTopic,

    #[error(transparent)]
    InvalidInput(InputError),

    #[error("plan validation failed: {0}")]
    PlanValidation(#[from] PlanValidationError),

    #[error("stage {stage} (team entry #{index}) failed: {source:#}")]
    Stage {
        stage: String,
        index: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("stage {stage} (team entry #{index}) panicked: {message}")]
    StagePanicked {
        stage: String,
        index: usize,
        message: String,
    },

    #[error("snapshot persistence failed: {0}")]
    Snapshot(#[from] SnapshotError),
}

impl From<InputError> for MissionError {
    fn from(e: InputError) -> Self {
        match e {
            InputError::MissingTopic => Self::MissingTopic,
            other => Self::InvalidInput(other),
        }
    }
}

/// A team entry that was not executed because its key is unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedStage {
    pub index: usize,
    pub implementation: String,
}

/// Summary of a mission that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissionReport {
    pub mission_id: MissionId,
    pub plan_source: PlanSource,
    /// Stage steps executed, in order (excludes `00_initial` and `01_plan`).
    pub executed: Vec<StepName>,
    pub skipped: Vec<SkippedStage>,
    pub last_step: StepName,
    pub summary: DataSummary,
}

/// Drives missions from request to terminal outcome.
pub struct MissionController {
    producer: PlanProducer,
    registry: Arc<StageRegistry>,
    store: Arc<dyn SnapshotStore>,
}

impl MissionController {
    pub fn new(
        producer: PlanProducer,
        registry: Arc<StageRegistry>,
        store: Arc<dyn SnapshotStore>,
    ) -> Self {
        Self {
            producer,
            registry,
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn SnapshotStore> {
        &self.store
    }

    /// Run a mission in the foreground until it finishes.
    pub async fn run(&self, request: MissionRequest) -> Result<MissionReport, MissionError> {
        let state = self.initialize(request).await?;
        self.drive(state).await
    }

    /// Start a mission in the background and return its id as soon as the
    /// initial snapshot is persisted.
    pub async fn start(self: &Arc<Self>, request: MissionRequest) -> Result<MissionId, MissionError> {
        let state = self.initialize(request).await?;
        let mission_id = state.mission_id.clone();

        let controller = Arc::clone(self);
        tokio::spawn(async move {
            // Failures are recorded in the outcome by `drive`.
            let _ = controller.drive(state).await;
        });

        Ok(mission_id)
    }

    /// Allocate an id, build the initial state and persist `00_initial`.
    async fn initialize(&self, request: MissionRequest) -> Result<MissionState, MissionError> {
        let mission_id = MissionId::generate();
        tracing::info!(
            mission_id = %mission_id,
            topic = %request.topic,
            user_id = request.user_id.as_deref().unwrap_or("-"),
            "mission started"
        );
        let state = MissionState::new(mission_id.clone(), request);
        self.store
            .save(&mission_id, &StepName::initial(), &state)
            .await?;
        Ok(state)
    }

    /// Execute the remaining steps and record the outcome either way.
    async fn drive(&self, state: MissionState) -> Result<MissionReport, MissionError> {
        let mission_id = state.mission_id.clone();
        let mut last_step = StepName::initial();

        let result = self.execute(state, &mut last_step).await;
        let outcome = match &result {
            Ok(report) => {
                tracing::info!(
                    mission_id = %mission_id,
                    executed = report.executed.len(),
                    skipped = report.skipped.len(),
                    last_step = %report.last_step,
                    "mission completed"
                );
                MissionOutcome::completed(Some(report.last_step.clone()))
            }
            Err(e) => {
                tracing::error!(
                    mission_id = %mission_id,
                    last_step = %last_step,
                    error = %e,
                    "mission failed"
                );
                MissionOutcome::failed(e.to_string(), Some(last_step))
            }
        };

        if let Err(e) = self.store.record_outcome(&mission_id, &outcome).await {
            tracing::error!(mission_id = %mission_id, error = %e, "failed to record mission outcome");
        }
        result
    }

    async fn execute(
        &self,
        mut state: MissionState,
        last_step: &mut StepName,
    ) -> Result<MissionReport, MissionError> {
        let mission_id = state.mission_id.clone();

        // Plan.
        let produced = self.producer.produce(state.topic()).await;
        let plan = validate_plan(&produced.value)?;
        let team = plan.team().to_vec();
        tracing::info!(
            mission_id = %mission_id,
            source = %produced.source,
            queries = plan.search_queries().len(),
            team_size = team.len(),
            "plan validated"
        );
        state.plan = Some(plan);
        state.plan_source = Some(produced.source);
        self.persist(&state, StepName::plan(), last_step).await?;

        if team.is_empty() {
            tracing::info!(mission_id = %mission_id, "plan has an empty team, nothing to run");
        }

        // Stages, strictly in team order.
        let mut executed = Vec::new();
        let mut skipped = Vec::new();
        for (index, descriptor) in team.iter().enumerate() {
            let charter = StageCharter::from_descriptor(&mission_id, descriptor);
            let mut stage = match self.registry.instantiate(descriptor.implementation(), charter) {
                Ok(stage) => stage,
                Err(e) => {
                    tracing::warn!(
                        mission_id = %mission_id,
                        index,
                        error = %e,
                        "skipping team entry"
                    );
                    skipped.push(SkippedStage {
                        index,
                        implementation: descriptor.implementation().to_string(),
                    });
                    continue;
                }
            };

            let stage_name = stage.name();
            let step = StepName::stage(index, stage_name);
            tracing::info!(mission_id = %mission_id, step = %step, "running stage");

            state = match AssertUnwindSafe(stage.run(state)).catch_unwind().await {
                Ok(Ok(next)) => next,
                Ok(Err(source)) => {
                    return Err(MissionError::Stage {
                        stage: stage_name.to_string(),
                        index,
                        source,
                    });
                }
                Err(payload) => {
                    return Err(MissionError::StagePanicked {
                        stage: stage_name.to_string(),
                        index,
                        message: panic_message(payload.as_ref()),
                    });
                }
            };

            self.persist(&state, step.clone(), last_step).await?;
            executed.push(step);
        }

        Ok(MissionReport {
            mission_id,
            plan_source: produced.source,
            executed,
            skipped,
            last_step: last_step.clone(),
            summary: state.summary(),
        })
    }

    async fn persist(
        &self,
        state: &MissionState,
        step: StepName,
        last_step: &mut StepName,
    ) -> Result<(), MissionError> {
        self.store.save(&state.mission_id, &step, state).await?;
        tracing::debug!(mission_id = %state.mission_id, step = %step, "snapshot persisted");
        *last_step = step;
        Ok(())
    }
}

impl std::fmt::Debug for MissionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MissionController")
            .field("producer", &self.producer)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_topic_maps_to_missing_topic() {
        let err: MissionError = MissionRequest::new("  ", None).unwrap_err().into();
        assert!(matches!(err, MissionError::MissingTopic));
    }

    #[test]
    fn input_errors_keep_their_reason() {
        assert!(matches!(
            MissionError::from(InputError::MissingTopic),
            MissionError::MissingTopic
        ));
        let err = MissionError::from(InputError::InvalidMissionId("../x".to_string()));
        assert!(matches!(
            &err,
            MissionError::InvalidInput(InputError::InvalidMissionId(raw)) if raw == "../x"
        ));
        assert!(err.to_string().contains("invalid mission id"));
    }

    #[test]
    fn panic_message_reads_str_and_string() {
        let a: Box<dyn std::any::Any + Send> = Box::new("boom");
        let b: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        let c: Box<dyn std::any::Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(a.as_ref()), "boom");
        assert_eq!(panic_message(b.as_ref()), "bang");
        assert_eq!(panic_message(c.as_ref()), "non-string panic payload");
    }
}
