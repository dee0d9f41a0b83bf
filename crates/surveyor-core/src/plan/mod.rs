//! Mission plans: schema, validation, prompt, fallback and production.

pub mod fallback;
pub mod producer;
pub mod prompt;
pub mod schema;
pub mod validate;

pub use fallback::fallback_plan;
pub use producer::{DEFAULT_GENERATOR_TIMEOUT, PlanProducer, ProducedPlan};
pub use prompt::build_planning_prompt;
pub use schema::{ExtractionTask, RawPlan, StageDescriptor, ValidatedPlan};
pub use validate::{MAX_TEAM_SIZE, PlanValidationError, RECOMMENDED_TEAM_SIZE, validate_plan};
