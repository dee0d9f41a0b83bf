//! Individual stages run against the fake capabilities.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use surveyor_core::plan::validate_plan;
use surveyor_core::providers::{CaptureResult, SearchChannel, SearchHit};
use surveyor_core::stage::{
    FanOutLimits, Stage, StageCharter, ViralContentStage, VisualEvidenceStage,
};
use surveyor_core::state::{MissionId, MissionRequest, MissionState};
use surveyor_test_utils::{FakeCapturer, FakeSearch};

fn charter(mission_id: &MissionId) -> StageCharter {
    StageCharter {
        mission_id: mission_id.clone(),
        role: "trend scout".to_string(),
        goal: "find viral posts".to_string(),
        tools: vec!["social_search".to_string()],
        constraints: Vec::new(),
    }
}

fn state_with_queries(topic: &str, queries: &[&str]) -> MissionState {
    let id = MissionId::generate();
    let mut state = MissionState::new(id, MissionRequest::new(topic, None).unwrap());
    let plan = json!({"search_queries": queries, "team": []});
    state.plan = Some(validate_plan(&plan).unwrap());
    state
}

#[tokio::test]
async fn only_topic_and_social_queries_hit_the_social_channel() {
    let search = Arc::new(FakeSearch::new());
    let state = state_with_queries(
        "coffee",
        &["coffee prices 2024", "coffee reddit threads", "coffee on Instagram"],
    );
    let mut stage = ViralContentStage::new(
        charter(&state.mission_id),
        search.clone(),
        FanOutLimits::new(2, Duration::from_secs(2)),
    );

    let state = stage.run(state).await.unwrap();

    let mut calls = search.calls();
    calls.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        calls,
        vec![
            ("coffee".to_string(), SearchChannel::Social),
            ("coffee on Instagram".to_string(), SearchChannel::Social),
            ("coffee reddit threads".to_string(), SearchChannel::Social),
        ]
    );
    assert_eq!(state.viral_results.len(), 6);
    assert!(state.search_results.is_empty());
}

#[tokio::test]
async fn results_append_to_existing_viral_results_unique_by_url() {
    let search = Arc::new(FakeSearch::new());
    let mut state = state_with_queries("coffee", &["coffee tiktok"]);
    let existing = SearchHit {
        title: "already known".to_string(),
        url: FakeSearch::url_for("coffee", 0),
        snippet: String::new(),
        platform: Some("instagram".to_string()),
    };
    state.viral_results.push(existing.clone());

    let mut stage = ViralContentStage::new(
        charter(&state.mission_id),
        search.clone(),
        FanOutLimits::new(2, Duration::from_secs(2)),
    );
    let state = stage.run(state).await.unwrap();

    // Earlier entries keep their place and win over later duplicates.
    assert_eq!(state.viral_results[0], existing);
    let mut urls: Vec<&str> = state.viral_results.iter().map(|h| h.url.as_str()).collect();
    assert_eq!(urls.len(), 4);
    urls.sort();
    urls.dedup();
    assert_eq!(urls.len(), 4);

    // A second run on the same instance submits nothing new.
    let before = search.calls().len();
    let state = stage.run(state).await.unwrap();
    assert_eq!(search.calls().len(), before);
    assert_eq!(state.viral_results.len(), 4);
}

#[tokio::test]
async fn visual_stage_skips_targets_already_captured() {
    let capturer = Arc::new(FakeCapturer::new());
    let id = MissionId::generate();
    let mut state = MissionState::new(id.clone(), MissionRequest::new("coffee", None).unwrap());
    let plan = json!({
        "search_queries": ["q"],
        "screenshot_targets": ["https://shots.test/a", "https://shots.test/b"],
        "team": []
    });
    state.plan = Some(validate_plan(&plan).unwrap());
    state.visual_captures.push(CaptureResult {
        success: true,
        url: "https://shots.test/a".to_string(),
        filepath: Some("/captures/a.png".to_string()),
        error: None,
    });

    let mut stage = VisualEvidenceStage::new(
        charter(&id),
        capturer.clone(),
        FanOutLimits::new(1, Duration::from_secs(2)),
    );
    let state = stage.run(state).await.unwrap();

    assert_eq!(
        capturer.calls(),
        vec![("https://shots.test/b".to_string(), id)]
    );
    let urls: Vec<&str> = state.visual_captures.iter().map(|c| c.url.as_str()).collect();
    assert_eq!(urls, ["https://shots.test/a", "https://shots.test/b"]);
}
