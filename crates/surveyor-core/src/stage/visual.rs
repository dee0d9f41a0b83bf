//! Visual evidence stage: screenshots the plan's capture targets.
//!
//! Reads: `plan.screenshot_targets`, `visual_captures`. Writes:
//! `visual_captures` (appended, successful captures only).

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use super::{DedupMemory, FanOut, FanOutLimits, Stage, StageCharter, StageKind};
use crate::providers::VisualCapturer;
use crate::state::MissionState;

pub struct VisualEvidenceStage {
    charter: StageCharter,
    capturer: Arc<dyn VisualCapturer>,
    fanout: FanOut,
    memory: DedupMemory,
}

impl VisualEvidenceStage {
    pub fn new(
        charter: StageCharter,
        capturer: Arc<dyn VisualCapturer>,
        limits: FanOutLimits,
    ) -> Self {
        Self {
            charter,
            capturer,
            fanout: FanOut::new(StageKind::VisualEvidence.as_str(), limits),
            memory: DedupMemory::new(),
        }
    }
}

#[async_trait]
impl Stage for VisualEvidenceStage {
    fn kind(&self) -> StageKind {
        StageKind::VisualEvidence
    }

    fn memory(&self) -> &DedupMemory {
        &self.memory
    }

    async fn run(&mut self, mut state: MissionState) -> Result<MissionState> {
        let mission_id = self.charter.mission_id.clone();
        tracing::info!(
            mission_id = %mission_id,
            stage = self.name(),
            goal = %self.charter.goal,
            "starting visual evidence capture"
        );

        let targets: Vec<String> = {
            let captured: HashSet<&str> = state
                .visual_captures
                .iter()
                .map(|c| c.url.as_str())
                .collect();
            state
                .plan
                .iter()
                .flat_map(|p| p.screenshot_targets())
                .filter(|url| !captured.contains(url.as_str()))
                .cloned()
                .collect()
        };

        if targets.is_empty() {
            tracing::info!(
                mission_id = %mission_id,
                stage = self.name(),
                "no screenshot targets to capture"
            );
            return Ok(state);
        }

        let capturer = Arc::clone(&self.capturer);
        let report = self
            .fanout
            .run(
                &mut self.memory,
                targets,
                |url| url.clone(),
                |url| {
                    let capturer = Arc::clone(&capturer);
                    let mission_id = mission_id.clone();
                    async move {
                        let result = capturer.capture(&url, &mission_id).await?;
                        if result.success {
                            Ok::<_, anyhow::Error>(Some(result))
                        } else {
                            Err(anyhow!(
                                "capture of {url} failed: {}",
                                result.error.as_deref().unwrap_or("unknown error")
                            ))
                        }
                    }
                },
            )
            .await;

        let captures = report.into_successes();
        tracing::info!(
            mission_id = %mission_id,
            stage = self.name(),
            captured = captures.len(),
            "visual evidence capture finished"
        );
        state.visual_captures.extend(captures);
        Ok(state)
    }
}
