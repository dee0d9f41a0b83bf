//! External capability providers consumed by the pipeline.
//!
//! Each capability is a narrow, object-safe trait so stages only see
//! `Arc<dyn ...>` handles. Concrete network-backed implementations live in
//! the submodules; tests substitute fakes.
//!
//! ```text
//! PlanProducer ----> PlanGenerator   (prompt -> JSON plan | nothing)
//! WebSailor    ----> SearchProvider  (query, channel -> hits)
//! Viral        ----> SearchProvider
//! Extractor    ----> ContentFetcher  (url -> content | nothing)
//! Visual       ----> VisualCapturer  (url, mission -> capture result)
//! ```

pub mod capture;
pub mod fetch;
pub mod openrouter;
pub mod rotator;
pub mod serper;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::state::MissionId;

pub use capture::BrowserCapturer;
pub use fetch::HttpContentFetcher;
pub use openrouter::OpenRouterPlanner;
pub use rotator::KeyRotator;
pub use serper::SerperSearch;

/// One web search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: String,
    /// Social platform the hit came from, for social-channel searches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

/// Text extracted from one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedContent {
    pub url: String,
    pub content: String,
    /// Extraction method that produced `content`.
    pub method: String,
    /// Content category requested by the plan, if the URL came from it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// Result of one screenshot attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureResult {
    pub success: bool,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filepath: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Which index a search query is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchChannel {
    /// General web search.
    Web,
    /// Social platforms (Instagram, YouTube, TikTok, ...).
    Social,
}

/// Markers that route a query to the social channel.
const SOCIAL_MARKERS: &[&str] = &["social", "instagram", "tiktok", "youtube", "reddit"];

impl SearchChannel {
    /// Pick the channel for a query based on the platforms it mentions.
    pub fn for_query(query: &str) -> Self {
        let lower = query.to_lowercase();
        if SOCIAL_MARKERS.iter().any(|m| lower.contains(m)) {
            Self::Social
        } else {
            Self::Web
        }
    }
}

/// Produces a raw, untrusted plan from a planning prompt.
#[async_trait]
pub trait PlanGenerator: Send + Sync {
    /// Human-readable name for logs (e.g. "openrouter").
    fn name(&self) -> &str;

    /// Return the generated plan value, or `Ok(None)` when the generator is
    /// unavailable (e.g. no credentials configured).
    async fn generate(&self, prompt: &str) -> Result<Option<serde_json::Value>>;
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, channel: SearchChannel) -> Result<Vec<SearchHit>>;
}

#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Fetch and extract the readable text of `url`; `Ok(None)` when the
    /// page yields nothing usable.
    async fn fetch(&self, url: &str) -> Result<Option<ExtractedContent>>;
}

#[async_trait]
pub trait VisualCapturer: Send + Sync {
    async fn capture(&self, url: &str, mission_id: &MissionId) -> Result<CaptureResult>;
}

/// The capability handles shared by every stage of a mission.
#[derive(Clone)]
pub struct Capabilities {
    pub search: Arc<dyn SearchProvider>,
    pub fetcher: Arc<dyn ContentFetcher>,
    pub capturer: Arc<dyn VisualCapturer>,
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}

// Compile-time assertion: every capability is object-safe.
const _: () = {
    fn _assert_object_safe(
        _: &dyn PlanGenerator,
        _: &dyn SearchProvider,
        _: &dyn ContentFetcher,
        _: &dyn VisualCapturer,
    ) {
    }
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn social_queries_route_to_social_channel() {
        assert_eq!(
            SearchChannel::for_query("coffee trends Instagram"),
            SearchChannel::Social
        );
        assert_eq!(
            SearchChannel::for_query("coffee reviews reddit"),
            SearchChannel::Social
        );
        assert_eq!(
            SearchChannel::for_query("coffee market size 2025"),
            SearchChannel::Web
        );
    }

    #[test]
    fn search_hit_omits_absent_platform() {
        let hit = SearchHit {
            title: "t".into(),
            url: "https://example.com".into(),
            snippet: String::new(),
            platform: None,
        };
        let value = serde_json::to_value(&hit).unwrap();
        assert!(value.get("platform").is_none());
    }
}
