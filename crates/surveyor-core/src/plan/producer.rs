//! Plan producer: external generator first, deterministic fallback second.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde_json::Value;

use super::fallback::fallback_plan;
use super::prompt::build_planning_prompt;
use crate::providers::PlanGenerator;
use crate::state::{PlanSource, Topic};

/// Default bound on one generator call.
pub const DEFAULT_GENERATOR_TIMEOUT: Duration = Duration::from_secs(90);

/// A raw (not yet validated) plan and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ProducedPlan {
    pub value: Value,
    pub source: PlanSource,
}

/// Produces raw plans for a topic.
#[derive(Clone)]
pub struct PlanProducer {
    generator: Option<Arc<dyn PlanGenerator>>,
    timeout: Duration,
}

impl PlanProducer {
    pub fn new(generator: Option<Arc<dyn PlanGenerator>>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    /// A producer that always uses the fallback plan.
    pub fn fallback_only() -> Self {
        Self::new(None, DEFAULT_GENERATOR_TIMEOUT)
    }

    /// Produce a raw plan for `topic`. Never fails: any generator problem
    /// is logged and answered with the fallback plan.
    pub async fn produce(&self, topic: &Topic) -> ProducedPlan {
        if let Some(generator) = &self.generator {
            let prompt = build_planning_prompt(topic);
            let call = AssertUnwindSafe(generator.generate(&prompt)).catch_unwind();
            match tokio::time::timeout(self.timeout, call).await {
                Ok(Ok(Ok(Some(value)))) if !value.is_null() => {
                    tracing::info!(generator = generator.name(), "plan generated");
                    return ProducedPlan {
                        value,
                        source: PlanSource::Generated,
                    };
                }
                Ok(Ok(Ok(_))) => {
                    tracing::warn!(
                        generator = generator.name(),
                        "generator returned no plan, using fallback"
                    );
                }
                Ok(Ok(Err(e))) => {
                    tracing::warn!(
                        generator = generator.name(),
                        error = %e,
                        "generator failed, using fallback"
                    );
                }
                Ok(Err(_)) => {
                    tracing::warn!(
                        generator = generator.name(),
                        "generator panicked, using fallback"
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        generator = generator.name(),
                        timeout_secs = self.timeout.as_secs(),
                        "generator timed out, using fallback"
                    );
                }
            }
        } else {
            tracing::info!("no plan generator configured, using fallback");
        }

        ProducedPlan {
            value: fallback_plan(topic),
            source: PlanSource::Fallback,
        }
    }
}

impl std::fmt::Debug for PlanProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanProducer")
            .field("generator", &self.generator.as_ref().map(|g| g.name()))
            .field("timeout", &self.timeout)
            .finish()
    }
}
