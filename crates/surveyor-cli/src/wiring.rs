//! Assemble a [`MissionController`] from resolved configuration.

use std::sync::Arc;

use anyhow::{Context, Result};

use surveyor_core::orchestrator::MissionController;
use surveyor_core::plan::PlanProducer;
use surveyor_core::providers::capture::BrowserConfig;
use surveyor_core::providers::{
    BrowserCapturer, Capabilities, HttpContentFetcher, OpenRouterPlanner, PlanGenerator,
    SerperSearch,
};
use surveyor_core::snapshot::FsSnapshotStore;
use surveyor_core::stage::StageRegistry;

use crate::config::SurveyorConfig;

const SCREENSHOT_WINDOW: (u32, u32) = (1920, 1080);

/// The plan producer alone, for commands that never run stages.
pub fn build_producer(config: &SurveyorConfig) -> Result<PlanProducer> {
    let generator: Option<Arc<dyn PlanGenerator>> = if config.planner.api_key.is_some() {
        let planner = OpenRouterPlanner::new(config.planner.clone())
            .context("failed to build plan generator")?;
        Some(Arc::new(planner))
    } else {
        tracing::warn!("OPENROUTER_API_KEY not set, plans will use the fallback");
        None
    };
    Ok(PlanProducer::new(generator, config.generator_timeout))
}

/// Concrete network-backed capabilities.
pub fn build_capabilities(config: &SurveyorConfig) -> Result<Capabilities> {
    let keys = config.search_keys();
    if keys.is_empty() {
        tracing::warn!("SERPER_API_KEY not set, searches will fail");
    }
    let search = SerperSearch::new(
        config.search_base_url.clone(),
        keys,
        config.limits.search.timeout,
    )
    .context("failed to build search client")?;
    let fetcher = HttpContentFetcher::new(config.limits.extraction.timeout)
        .context("failed to build content fetcher")?;
    let capturer = BrowserCapturer::new(BrowserConfig {
        binary: config.browser.clone(),
        output_root: config.sessions_dir.clone(),
        window_size: SCREENSHOT_WINDOW,
    });

    Ok(Capabilities {
        search: Arc::new(search),
        fetcher: Arc::new(fetcher),
        capturer: Arc::new(capturer),
    })
}

/// Snapshot store rooted at the configured sessions directory.
pub fn build_store(config: &SurveyorConfig) -> Arc<FsSnapshotStore> {
    Arc::new(FsSnapshotStore::new(config.sessions_dir.clone()))
}

/// Full controller: producer, registry over real capabilities, file store.
pub fn build_controller(config: &SurveyorConfig) -> Result<MissionController> {
    let producer = build_producer(config)?;
    let registry = StageRegistry::new(build_capabilities(config)?, config.limits);
    tracing::debug!(
        sessions_dir = %config.sessions_dir.display(),
        generator_timeout_secs = config.generator_timeout.as_secs(),
        "mission controller configured"
    );
    Ok(MissionController::new(
        producer,
        Arc::new(registry),
        build_store(config),
    ))
}
