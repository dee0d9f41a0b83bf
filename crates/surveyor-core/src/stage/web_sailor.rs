//! Web search stage: runs every plan search query and records the unique
//! hits.
//!
//! Reads: `plan.search_queries`. Writes: `search_results` (replaced).

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use super::{DedupMemory, FanOut, FanOutLimits, Stage, StageCharter, StageKind};
use crate::providers::{SearchChannel, SearchHit, SearchProvider};
use crate::state::MissionState;

pub struct WebSailorStage {
    charter: StageCharter,
    search: Arc<dyn SearchProvider>,
    fanout: FanOut,
    memory: DedupMemory,
}

impl WebSailorStage {
    pub fn new(charter: StageCharter, search: Arc<dyn SearchProvider>, limits: FanOutLimits) -> Self {
        Self {
            charter,
            search,
            fanout: FanOut::new(StageKind::WebSailor.as_str(), limits),
            memory: DedupMemory::new(),
        }
    }
}

#[async_trait]
impl Stage for WebSailorStage {
    fn kind(&self) -> StageKind {
        StageKind::WebSailor
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
            tools = ?self.charter.tools,
            "starting web search"
        );

        let queries: Vec<String> = state
            .plan
            .as_ref()
            .map(|p| p.search_queries().to_vec())
            .unwrap_or_default();

        if queries.is_empty() {
            tracing::info!(
                mission_id = %mission_id,
                stage = self.name(),
                "no search queries in plan, nothing to search"
            );
            return Ok(state);
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
                        let hits = search.search(&q, SearchChannel::for_query(&q)).await?;
                        Ok::<_, anyhow::Error>((!hits.is_empty()).then_some(hits))
                    }
                },
            )
            .await;

        let hits = unique_by_url(report.into_successes().into_iter().flatten());
        tracing::info!(
            mission_id = %mission_id,
            stage = self.name(),
            unique_urls = hits.len(),
            "web search finished"
        );
        state.search_results = hits;
        Ok(state)
    }
}

/// Keep the first hit for each non-empty URL, preserving order.
pub(crate) fn unique_by_url(hits: impl IntoIterator<Item = SearchHit>) -> Vec<SearchHit> {
    let mut seen = HashSet::new();
    hits.into_iter()
        .filter(|h| !h.url.trim().is_empty() && seen.insert(h.url.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(url: &str) -> SearchHit {
        SearchHit {
            title: url.to_string(),
            url: url.to_string(),
            snippet: String::new(),
            platform: None,
        }
    }

    #[test]
    fn unique_by_url_keeps_first_and_drops_blank() {
        let out = unique_by_url(vec![hit("a"), hit(""), hit("b"), hit("a")]);
        let urls: Vec<&str> = out.iter().map(|h| h.url.as_str()).collect();
        assert_eq!(urls, vec!["a", "b"]);
    }
}
