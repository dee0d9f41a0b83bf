//! Viral content stage: searches social platforms for the topic and for any
//! plan query that already targets a social platform.
//!
//! Reads: `request.topic`, `plan.search_queries`. Writes: `viral_results`
//! (appended, unique by URL).

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use super::web_sailor::unique_by_url;
use super::{DedupMemory, FanOut, FanOutLimits, Stage, StageCharter, StageKind};
use crate::providers::{SearchChannel, SearchProvider};
use crate::state::MissionState;

pub struct ViralContentStage {
    charter: StageCharter,
    search: Arc<dyn SearchProvider>,
    fanout: FanOut,
    memory: DedupMemory,
}

impl ViralContentStage {
    pub fn new(charter: StageCharter, search: Arc<dyn SearchProvider>, limits: FanOutLimits) -> Self {
        Self {
            charter,
            search,
            fanout: FanOut::new(StageKind::ViralContent.as_str(), limits),
            memory: DedupMemory::new(),
        }
    }
}

#[async_trait]
impl Stage for ViralContentStage {
    fn kind(&self) -> StageKind {
        StageKind::ViralContent
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
            "starting viral content search"
        );

        let mut queries = vec![state.topic().as_str().to_string()];
        if let Some(plan) = &state.plan {
            queries.extend(
                plan.search_queries()
                    .iter()
                    .filter(|q| SearchChannel::for_query(q) == SearchChannel::Social)
                    .cloned(),
            );
        }

        let search = Arc::clone(&self.search);
        let report = self
            .fanout
            .run(
                &mut self.memory,
                queries,
                |q| q.clone(),
                |q| {
                    let search = Arc::clone(&search);
                    async move {
                        let hits = search.search(&q, SearchChannel::Social).await?;
                        Ok::<_, anyhow::Error>((!hits.is_empty()).then_some(hits))
                    }
                },
            )
            .await;

        let found = report.into_successes().into_iter().flatten();
        let before = state.viral_results.len();
        let merged = unique_by_url(state.viral_results.drain(..).chain(found));
        state.viral_results = merged;

        let added = state.viral_results.len().saturating_sub(before);
        if added == 0 {
            tracing::info!(
                mission_id = %mission_id,
                stage = self.name(),
                "no new viral content found"
            );
        } else {
            tracing::info!(
                mission_id = %mission_id,
                stage = self.name(),
                added,
                "viral content search finished"
            );
        }
        Ok(state)
    }
}
