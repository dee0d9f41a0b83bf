//! Stage registry -- resolves a plan's implementation keys to concrete
//! stages.
//!
//! The set of implementations is closed ([`StageKind`]); a key that does not
//! parse is reported as [`UnknownStage`] so the controller can skip that
//! descriptor explicitly.

use thiserror::Error;

use super::{
    ContentExtractorStage, MissionLimits, Stage, StageCharter, StageKind, ViralContentStage,
    VisualEvidenceStage, WebSailorStage,
};
use crate::providers::Capabilities;

/// A plan named a stage implementation that does not exist.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown stage implementation {0:?}")]
pub struct UnknownStage(pub String);

/// Builds stage instances from implementation keys.
///
/// # Example
///
/// ```ignore
/// let registry = StageRegistry::new(capabilities, MissionLimits::default());
/// let stage = registry.instantiate("web_sailor", charter)?;
/// ```
pub struct StageRegistry {
    capabilities: Capabilities,
    limits: MissionLimits,
}

impl StageRegistry {
    pub fn new(capabilities: Capabilities, limits: MissionLimits) -> Self {
        Self {
            capabilities,
            limits,
        }
    }

    /// Resolve an implementation key without instantiating anything.
    pub fn resolve(&self, key: &str) -> Result<StageKind, UnknownStage> {
        key.parse()
    }

    /// Create a fresh stage instance (with empty memory) for `key`.
    pub fn instantiate(
        &self,
        key: &str,
        charter: StageCharter,
    ) -> Result<Box<dyn Stage>, UnknownStage> {
        let kind = self.resolve(key)?;
        Ok(self.build(kind, charter))
    }

    fn build(&self, kind: StageKind, charter: StageCharter) -> Box<dyn Stage> {
        let caps = &self.capabilities;
        match kind {
            StageKind::WebSailor => Box::new(WebSailorStage::new(
                charter,
                caps.search.clone(),
                self.limits.search,
            )),
            StageKind::ViralContent => Box::new(ViralContentStage::new(
                charter,
                caps.search.clone(),
                self.limits.search,
            )),
            StageKind::ContentExtractor => Box::new(ContentExtractorStage::new(
                charter,
                caps.fetcher.clone(),
                self.limits.extraction,
            )),
            StageKind::VisualEvidence => Box::new(VisualEvidenceStage::new(
                charter,
                caps.capturer.clone(),
                self.limits.capture,
            )),
        }
    }

    /// Canonical keys of every available implementation.
    pub fn list(&self) -> Vec<&'static str> {
        StageKind::ALL.iter().map(|k| k.as_str()).collect()
    }

    pub fn limits(&self) -> MissionLimits {
        self.limits
    }
}

impl std::fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageRegistry")
            .field("stages", &self.list())
            .field("limits", &self.limits)
            .finish()
    }
}
