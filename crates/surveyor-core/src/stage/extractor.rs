//! Content extraction stage: fetches every discovered URL and keeps the
//! readable text.
//!
//! Reads: `plan.extraction_tasks`, `search_results`, `viral_results`,
//! `extracted_contents`. Writes: `extracted_contents` (appended).
//!
//! Plan-directed URLs come first and carry their requested content type;
//! URLs already present in `extracted_contents` are not fetched again.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use super::{DedupMemory, FanOut, FanOutLimits, Stage, StageCharter, StageKind};
use crate::providers::ContentFetcher;
use crate::state::MissionState;

/// One URL to extract.
#[derive(Debug, Clone)]
struct Target {
    url: String,
    content_type: Option<String>,
}

pub struct ContentExtractorStage {
    charter: StageCharter,
    fetcher: Arc<dyn ContentFetcher>,
    fanout: FanOut,
    memory: DedupMemory,
}

impl ContentExtractorStage {
    pub fn new(
        charter: StageCharter,
        fetcher: Arc<dyn ContentFetcher>,
        limits: FanOutLimits,
    ) -> Self {
        Self {
            charter,
            fetcher,
            fanout: FanOut::new(StageKind::ContentExtractor.as_str(), limits),
            memory: DedupMemory::new(),
        }
    }
}

fn collect_targets(state: &MissionState) -> Vec<Target> {
    let already: HashSet<&str> = state
        .extracted_contents
        .iter()
        .map(|c| c.url.as_str())
        .collect();

    let planned = state
        .plan
        .iter()
        .flat_map(|p| p.extraction_tasks())
        .map(|t| Target {
            url: t.url().to_string(),
            content_type: t.content_type().map(str::to_string),
        });
    let discovered = state
        .search_results
        .iter()
        .chain(state.viral_results.iter())
        .map(|h| Target {
            url: h.url.clone(),
            content_type: None,
        });

    planned
        .chain(discovered)
        .filter(|t| !t.url.trim().is_empty() && !already.contains(t.url.as_str()))
        .collect()
}

#[async_trait]
impl Stage for ContentExtractorStage {
    fn kind(&self) -> StageKind {
        StageKind::ContentExtractor
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
            "starting content extraction"
        );

        let targets = collect_targets(&state);
        if targets.is_empty() {
            tracing::info!(
                mission_id = %mission_id,
                stage = self.name(),
                "no URLs to extract"
            );
            return Ok(state);
        }

        let fetcher = Arc::clone(&self.fetcher);
        let report = self
            .fanout
            .run(
                &mut self.memory,
                targets,
                |t| t.url.clone(),
                |t| {
                    let fetcher = Arc::clone(&fetcher);
                    async move {
                        let extracted = fetcher.fetch(&t.url).await?;
                        Ok::<_, anyhow::Error>(
                            extracted
                                .filter(|c| !c.content.trim().is_empty())
                                .map(|mut c| {
                                    if c.content_type.is_none() {
                                        c.content_type = t.content_type;
                                    }
                                    c
                                }),
                        )
                    }
                },
            )
            .await;

        let submitted = report.submitted();
        let extracted = report.into_successes();
        tracing::info!(
            mission_id = %mission_id,
            stage = self.name(),
            submitted,
            extracted = extracted.len(),
            "content extraction finished"
        );
        state.extracted_contents.extend(extracted);
        Ok(state)
    }
}
