//! Mission state: the typed record threaded through every pipeline step.
//!
//! A [`MissionState`] is created once per mission, handed by value to one
//! stage at a time, and returned (possibly updated) to the controller. Field
//! ownership per stage:
//!
//! | field                | written by                                  |
//! |----------------------|---------------------------------------------|
//! | `mission_id`         | controller (initialize)                     |
//! | `request`            | controller (initialize)                     |
//! | `plan`, `plan_source`| controller (plan step)                      |
//! | `search_results`     | web search stage (replace)                  |
//! | `viral_results`      | viral content stage (append)                |
//! | `extracted_contents` | content extraction stage (append)           |
//! | `visual_captures`    | visual evidence stage (append)              |
//!
//! Every collection is always serialized, so snapshots never lack a key.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::plan::ValidatedPlan;
use crate::providers::{CaptureResult, ExtractedContent, SearchHit};

/// Prefix carried by every mission identifier.
const MISSION_ID_PREFIX: &str = "mission_";

/// Errors raised while building mission inputs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("research topic is required and must not be blank")]
    MissingTopic,

    #[error("invalid mission id {0:?}")]
    InvalidMissionId(String),
}

/// Unique identifier for one mission, e.g. `mission_3f2a...`.
///
/// Identifiers double as directory names in the snapshot store, so parsing
/// only accepts the prefix followed by lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MissionId(String);

impl MissionId {
    /// Allocate a fresh identifier.
    pub fn generate() -> Self {
        Self(format!("{MISSION_ID_PREFIX}{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for MissionId {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = s
            .strip_prefix(MISSION_ID_PREFIX)
            .is_some_and(|rest| {
                !rest.is_empty()
                    && rest
                        .chars()
                        .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
            });
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(InputError::InvalidMissionId(s.to_string()))
        }
    }
}

impl TryFrom<String> for MissionId {
    type Error = InputError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MissionId> for String {
    fn from(id: MissionId) -> Self {
        id.0
    }
}

impl fmt::Display for MissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A research topic, guaranteed non-blank and trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Topic(String);

impl Topic {
    pub fn new(raw: impl AsRef<str>) -> Result<Self, InputError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(InputError::MissingTopic);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Topic {
    type Error = InputError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The request that starts a mission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionRequest {
    pub topic: Topic,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl MissionRequest {
    /// Build a request from raw caller input, rejecting a blank topic.
    pub fn new(topic: impl AsRef<str>, user_id: Option<String>) -> Result<Self, InputError> {
        Ok(Self {
            topic: Topic::new(topic)?,
            user_id: user_id.filter(|u| !u.trim().is_empty()),
        })
    }
}

/// Where the validated plan came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    /// Produced by the external plan generator.
    Generated,
    /// Synthesized locally because the generator was unavailable.
    Fallback,
}

impl fmt::Display for PlanSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generated => f.write_str("generated"),
            Self::Fallback => f.write_str("fallback"),
        }
    }
}

/// The full state of one mission at a step boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionState {
    pub mission_id: MissionId,
    pub request: MissionRequest,
    pub plan: Option<ValidatedPlan>,
    pub plan_source: Option<PlanSource>,
    #[serde(default)]
    pub search_results: Vec<SearchHit>,
    #[serde(default)]
    pub viral_results: Vec<SearchHit>,
    #[serde(default)]
    pub extracted_contents: Vec<ExtractedContent>,
    #[serde(default)]
    pub visual_captures: Vec<CaptureResult>,
}

impl MissionState {
    /// Initial state: no plan, every collection empty.
    pub fn new(mission_id: MissionId, request: MissionRequest) -> Self {
        Self {
            mission_id,
            request,
            plan: None,
            plan_source: None,
            search_results: Vec::new(),
            viral_results: Vec::new(),
            extracted_contents: Vec::new(),
            visual_captures: Vec::new(),
        }
    }

    pub fn topic(&self) -> &Topic {
        &self.request.topic
    }

    /// Counts shown by the status query.
    pub fn summary(&self) -> DataSummary {
        DataSummary {
            urls_found: self.search_results.len(),
            viral_items: self.viral_results.len(),
            contents_extracted: self.extracted_contents.len(),
            screenshots_captured: self.visual_captures.len(),
        }
    }
}

/// Per-collection counts for a mission state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSummary {
    pub urls_found: usize,
    pub viral_items: usize,
    pub contents_extracted: usize,
    pub screenshots_captured: usize,
}
