//! Pipeline stages: the contract, the closed registry of implementations,
//! and the bounded fan-out they share.
//!
//! # Architecture
//!
//! ```text
//! MissionController
//!     |
//!     v
//! StageRegistry --instantiate("web_sailor", charter)--> Box<dyn Stage>
//!                                                         |
//!                                     run(state) ---------+
//!                                         |
//!                                         v
//!                              FanOut (per-item timeout, ceiling C)
//!                                         |
//!                                         v
//!                              SearchProvider / ContentFetcher / VisualCapturer
//! ```

pub mod extractor;
pub mod fanout;
pub mod memory;
pub mod registry;
pub mod trait_def;
pub mod viral;
pub mod visual;
pub mod web_sailor;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::plan::StageDescriptor;
use crate::state::MissionId;

pub use extractor::ContentExtractorStage;
pub use fanout::{FanOut, FanOutLimits, FanOutReport, ItemOutcome};
pub use memory::DedupMemory;
pub use registry::{StageRegistry, UnknownStage};
pub use trait_def::Stage;
pub use viral::ViralContentStage;
pub use visual::VisualEvidenceStage;
pub use web_sailor::WebSailorStage;

/// The closed set of stage implementations a plan may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Runs the plan's search queries.
    WebSailor,
    /// Searches social platforms for viral content on the topic.
    ViralContent,
    /// Fetches and extracts text from discovered URLs.
    ContentExtractor,
    /// Captures screenshots of the plan's visual targets.
    VisualEvidence,
}

impl StageKind {
    /// Every kind, in default pipeline order.
    pub const ALL: [StageKind; 4] = [
        StageKind::WebSailor,
        StageKind::ViralContent,
        StageKind::ContentExtractor,
        StageKind::VisualEvidence,
    ];

    /// Canonical implementation key.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WebSailor => "web_sailor",
            Self::ViralContent => "viral_content",
            Self::ContentExtractor => "content_extractor",
            Self::VisualEvidence => "visual_evidence",
        }
    }

    /// Alternate key accepted from generated plans.
    fn legacy_key(self) -> &'static str {
        match self {
            Self::WebSailor => "WebSailorV2",
            Self::ViralContent => "ViralContentAgent",
            Self::ContentExtractor => "ContentExtractorV2",
            Self::VisualEvidence => "VisualEvidenceAgent",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageKind {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == key || k.legacy_key() == key)
            .ok_or_else(|| UnknownStage(s.to_string()))
    }
}

/// The constitution a stage is instantiated with: who it is for this
/// mission and what it may use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCharter {
    pub mission_id: MissionId,
    pub role: String,
    pub goal: String,
    pub tools: Vec<String>,
    pub constraints: Vec<String>,
}

impl StageCharter {
    pub fn from_descriptor(mission_id: &MissionId, descriptor: &StageDescriptor) -> Self {
        Self {
            mission_id: mission_id.clone(),
            role: descriptor.role().to_string(),
            goal: descriptor.goal().to_string(),
            tools: descriptor.tools().to_vec(),
            constraints: descriptor.constraints().to_vec(),
        }
    }
}

/// Fan-out ceilings per stage category.
///
/// Lightweight HTTP work gets a higher ceiling than browser-based capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissionLimits {
    pub search: FanOutLimits,
    pub extraction: FanOutLimits,
    pub capture: FanOutLimits,
}

impl Default for MissionLimits {
    fn default() -> Self {
        Self {
            search: FanOutLimits::new(5, Duration::from_secs(30)),
            extraction: FanOutLimits::new(10, Duration::from_secs(20)),
            capture: FanOutLimits::new(3, Duration::from_secs(60)),
        }
    }
}
