//! Structural validation of raw plans.
//!
//! Checks, in order:
//! - The value is a JSON object carrying `search_queries` and `team`.
//! - Every field has the expected type and nesting.
//! - `search_queries` is non-empty and holds no blank entries.
//! - Extraction and screenshot locations are non-blank.
//! - Every team entry names an implementation, and the team is not larger
//!   than [`MAX_TEAM_SIZE`].
//!
//! Violations are reported, never repaired. The only normalization is
//! dropping repeated tool names within a descriptor.

use std::collections::HashSet;
use std::ops::RangeInclusive;

use serde_json::Value;
use thiserror::Error;

use super::schema::{RawPlan, StageDescriptor, ValidatedPlan};

/// Snapshot ordinals are two digits; the plan step takes `01`.
pub const MAX_TEAM_SIZE: usize = 98;

/// Team sizes outside this range are allowed but logged.
pub const RECOMMENDED_TEAM_SIZE: RangeInclusive<usize> = 3..=5;

const REQUIRED_FIELDS: [&str; 2] = ["search_queries", "team"];

/// Errors that can occur while validating a raw plan.
#[derive(Debug, Error)]
pub enum PlanValidationError {
    #[error("plan must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("plan is missing required field {0:?}")]
    MissingField(&'static str),

    #[error("plan has an invalid shape: {0}")]
    InvalidShape(#[from] serde_json::Error),

    #[error("plan must contain at least one search query")]
    NoSearchQueries,

    #[error("search query #{index} is blank")]
    BlankQuery { index: usize },

    #[error("{field} entry #{index} has a blank location")]
    BlankLocation { field: &'static str, index: usize },

    #[error("team entry #{index} has a blank implementation key")]
    BlankImplementation { index: usize },

    #[error("team has {size} entries, at most {max} are allowed")]
    TeamTooLarge { size: usize, max: usize },
}

/// Validate an untrusted plan value.
pub fn validate_plan(raw: &Value) -> Result<ValidatedPlan, PlanValidationError> {
    let object = raw
        .as_object()
        .ok_or(PlanValidationError::NotAnObject(json_kind(raw)))?;

    for field in REQUIRED_FIELDS {
        if object.get(field).is_none_or(Value::is_null) {
            return Err(PlanValidationError::MissingField(field));
        }
    }

    let parsed: RawPlan = serde_json::from_value(raw.clone())?;
    let plan = check(parsed)?;

    if !RECOMMENDED_TEAM_SIZE.contains(&plan.team.len()) {
        tracing::warn!(
            team_size = plan.team.len(),
            "team size is outside the recommended {}..={}",
            RECOMMENDED_TEAM_SIZE.start(),
            RECOMMENDED_TEAM_SIZE.end()
        );
    }

    Ok(plan)
}

/// Semantic checks on an already well-typed plan.
pub(super) fn check(raw: RawPlan) -> Result<ValidatedPlan, PlanValidationError> {
    if raw.search_queries.is_empty() {
        return Err(PlanValidationError::NoSearchQueries);
    }
    if let Some(index) = raw.search_queries.iter().position(|q| q.trim().is_empty()) {
        return Err(PlanValidationError::BlankQuery { index });
    }

    let extraction_tasks = raw.extraction_tasks.unwrap_or_default();
    if let Some(index) = extraction_tasks.iter().position(|t| t.url.trim().is_empty()) {
        return Err(PlanValidationError::BlankLocation {
            field: "extraction_tasks",
            index,
        });
    }

    let screenshot_targets = raw.screenshot_targets.unwrap_or_default();
    if let Some(index) = screenshot_targets.iter().position(|u| u.trim().is_empty()) {
        return Err(PlanValidationError::BlankLocation {
            field: "screenshot_targets",
            index,
        });
    }

    if raw.team.len() > MAX_TEAM_SIZE {
        return Err(PlanValidationError::TeamTooLarge {
            size: raw.team.len(),
            max: MAX_TEAM_SIZE,
        });
    }
    if let Some(index) = raw
        .team
        .iter()
        .position(|d| d.implementation.trim().is_empty())
    {
        return Err(PlanValidationError::BlankImplementation { index });
    }

    Ok(ValidatedPlan {
        search_queries: raw.search_queries,
        extraction_tasks,
        screenshot_targets,
        team: raw.team.into_iter().map(dedup_tools).collect(),
    })
}

fn dedup_tools(mut descriptor: StageDescriptor) -> StageDescriptor {
    let mut seen = HashSet::new();
    descriptor.tools.retain(|t| seen.insert(t.clone()));
    descriptor
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
