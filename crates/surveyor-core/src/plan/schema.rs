//! Plan data types.
//!
//! [`RawPlan`] mirrors the JSON a plan generator emits; [`ValidatedPlan`] is
//! the immutable result of checking it. Deserializing a `ValidatedPlan`
//! (e.g. from a snapshot) runs the same checks.

use serde::{Deserialize, Serialize};

use super::validate::{PlanValidationError, check};

/// A plan that passed validation. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPlan")]
pub struct ValidatedPlan {
    pub(super) search_queries: Vec<String>,
    pub(super) extraction_tasks: Vec<ExtractionTask>,
    pub(super) screenshot_targets: Vec<String>,
    pub(super) team: Vec<StageDescriptor>,
}

impl ValidatedPlan {
    pub fn search_queries(&self) -> &[String] {
        &self.search_queries
    }

    pub fn extraction_tasks(&self) -> &[ExtractionTask] {
        &self.extraction_tasks
    }

    pub fn screenshot_targets(&self) -> &[String] {
        &self.screenshot_targets
    }

    pub fn team(&self) -> &[StageDescriptor] {
        &self.team
    }
}

impl TryFrom<RawPlan> for ValidatedPlan {
    type Error = PlanValidationError;

    fn try_from(raw: RawPlan) -> Result<Self, Self::Error> {
        check(raw)
    }
}

/// A location the extraction stage must fetch, with the kind of content
/// expected there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionTask {
    pub(super) url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) content_type: Option<String>,
}

impl ExtractionTask {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }
}

/// One entry in the plan's team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDescriptor {
    /// Implementation key, resolved against the stage registry.
    #[serde(rename = "agent_class", alias = "implementation")]
    pub(super) implementation: String,
    pub(super) role: String,
    pub(super) goal: String,
    #[serde(default)]
    pub(super) tools: Vec<String>,
    #[serde(default)]
    pub(super) constraints: Vec<String>,
}

impl StageDescriptor {
    pub fn implementation(&self) -> &str {
        &self.implementation
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    /// Allowed tool names, duplicates removed, first occurrence order.
    pub fn tools(&self) -> &[String] {
        &self.tools
    }

    pub fn constraints(&self) -> &[String] {
        &self.constraints
    }
}

/// Unchecked plan shape as emitted by a generator.
///
/// Optional lists accept both a missing key and `null`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPlan {
    pub search_queries: Vec<String>,
    #[serde(default)]
    pub extraction_tasks: Option<Vec<ExtractionTask>>,
    #[serde(default)]
    pub screenshot_targets: Option<Vec<String>>,
    pub team: Vec<StageDescriptor>,
}
