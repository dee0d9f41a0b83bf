//! Integration tests for the mission controller.
//!
//! Every test runs a real controller over in-process fake capabilities and
//! a filesystem snapshot store in a temporary directory.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use surveyor_core::orchestrator::{MissionError, SkippedStage};
use surveyor_core::plan::PlanValidationError;
use surveyor_core::providers::{PlanGenerator, SearchChannel};
use surveyor_core::query::{MissionStatus, mission_result, mission_status};
use surveyor_core::snapshot::{OutcomeStatus, SnapshotStore, StepName};
use surveyor_core::state::{MissionRequest, PlanSource};
use surveyor_test_utils::{
    FakeCapturer, FakeFetcher, FakeProviders, FakeSearch, ScriptedPlanner, controller, temp_store,
};

// ===========================================================================
// Helpers
// ===========================================================================

fn request(topic: &str) -> MissionRequest {
    MissionRequest::new(topic, None).unwrap()
}

fn descriptor(key: &str) -> Value {
    json!({
        "agent_class": key,
        "role": "test role",
        "goal": "test goal",
        "tools": ["tool"],
        "constraints": []
    })
}

fn generated(plan: Value) -> Option<Arc<dyn PlanGenerator>> {
    Some(Arc::new(ScriptedPlanner::returning(plan)))
}

fn step_names(steps: &[StepName]) -> Vec<&str> {
    steps.iter().map(StepName::as_str).collect()
}

// ===========================================================================
// Full pipeline
// ===========================================================================

#[tokio::test]
async fn fallback_mission_runs_all_four_stages_in_order() {
    let (_dir, store) = temp_store();
    let providers = FakeProviders::default();
    let controller = controller(&providers, None, store.clone());

    let report = controller
        .run(request("artisanal coffee market"))
        .await
        .unwrap();

    assert_eq!(report.plan_source, PlanSource::Fallback);
    assert!(report.skipped.is_empty());
    assert_eq!(
        step_names(&report.executed),
        [
            "02_web_sailor",
            "03_viral_content",
            "04_content_extractor",
            "05_visual_evidence"
        ]
    );

    let steps = store.steps(&report.mission_id).await.unwrap();
    assert_eq!(
        step_names(&steps),
        [
            "00_initial",
            "01_plan",
            "02_web_sailor",
            "03_viral_content",
            "04_content_extractor",
            "05_visual_evidence"
        ]
    );

    // Five queries with two hits each.
    assert_eq!(report.summary.urls_found, 10);
    // Topic plus the two social queries.
    assert_eq!(report.summary.viral_items, 6);
    // Two plan targets plus every distinct discovered URL; the social
    // queries were searched by both stages and yield the same URLs.
    assert_eq!(report.summary.contents_extracted, 14);
    assert_eq!(providers.fetcher.calls().len(), 14);
    assert_eq!(report.summary.screenshots_captured, 2);

    let final_state = store
        .load(&report.mission_id, &StepName::stage(3, "visual_evidence"))
        .await
        .unwrap();
    let value = serde_json::to_value(&final_state).unwrap();
    for key in [
        "search_results",
        "viral_results",
        "extracted_contents",
        "visual_captures",
    ] {
        assert!(value[key].is_array(), "{key} should be present");
    }
    assert_eq!(value["plan_source"], "fallback");

    let outcome = store.outcome(&report.mission_id).await.unwrap().unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Completed);
    assert_eq!(outcome.last_step.unwrap().as_str(), "05_visual_evidence");
}

#[tokio::test]
async fn capture_calls_carry_the_mission_id() {
    let (_dir, store) = temp_store();
    let providers = FakeProviders::default();
    let report = controller(&providers, None, store)
        .run(request("standing desks"))
        .await
        .unwrap();

    let calls = providers.capturer.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|(_, id)| *id == report.mission_id));
}

#[tokio::test]
async fn generated_plan_is_used_when_available() {
    let (_dir, store) = temp_store();
    let providers = FakeProviders::default();
    let plan = json!({
        "search_queries": ["espresso machines"],
        "team": [descriptor("WebSailorV2")]
    });
    let report = controller(&providers, generated(plan), store)
        .run(request("espresso"))
        .await
        .unwrap();

    assert_eq!(report.plan_source, PlanSource::Generated);
    assert_eq!(step_names(&report.executed), ["02_web_sailor"]);
    assert_eq!(
        providers.search.calls(),
        vec![("espresso machines".to_string(), SearchChannel::Web)]
    );
}

#[tokio::test]
async fn failing_generator_falls_back_silently() {
    let (_dir, store) = temp_store();
    let providers = FakeProviders::default();
    let planner = Arc::new(ScriptedPlanner::failing());
    let report = controller(
        &providers,
        Some(planner.clone() as Arc<dyn PlanGenerator>),
        store,
    )
    .run(request("artisanal coffee market"))
    .await
    .unwrap();

    assert_eq!(planner.calls(), 1);
    assert_eq!(report.plan_source, PlanSource::Fallback);
    assert_eq!(report.executed.len(), 4);
}

// ===========================================================================
// Degenerate and skipped teams
// ===========================================================================

#[tokio::test]
async fn empty_team_completes_with_initial_and_plan_only() {
    let (_dir, store) = temp_store();
    let providers = FakeProviders::default();
    let plan = json!({"search_queries": ["q"], "team": []});
    let report = controller(&providers, generated(plan), store.clone())
        .run(request("anything"))
        .await
        .unwrap();

    assert!(report.executed.is_empty());
    assert_eq!(report.last_step, StepName::plan());
    let steps = store.steps(&report.mission_id).await.unwrap();
    assert_eq!(step_names(&steps), ["00_initial", "01_plan"]);
    assert!(providers.search.calls().is_empty());

    let status = mission_status(&*store, &report.mission_id)
        .await
        .unwrap();
    assert_eq!(status.status, MissionStatus::Completed);
}

#[tokio::test]
async fn stages_with_nothing_to_do_still_write_unchanged_snapshots() {
    let (_dir, store) = temp_store();
    let providers = FakeProviders::default();
    let plan = json!({
        "search_queries": ["q"],
        "team": [descriptor("content_extractor"), descriptor("visual_evidence")]
    });
    let report = controller(&providers, generated(plan), store.clone())
        .run(request("anything"))
        .await
        .unwrap();

    let id = &report.mission_id;
    let steps = store.steps(id).await.unwrap();
    assert_eq!(
        step_names(&steps),
        ["00_initial", "01_plan", "02_content_extractor", "03_visual_evidence"]
    );
    assert!(providers.fetcher.calls().is_empty());
    assert!(providers.capturer.calls().is_empty());

    let planned = store.load(id, &StepName::plan()).await.unwrap();
    for step in &steps[2..] {
        assert_eq!(store.load(id, step).await.unwrap(), planned, "step {step}");
    }

    let raw: Value = serde_json::from_slice(
        &std::fs::read(store.mission_dir(id).join("03_visual_evidence.json")).unwrap(),
    )
    .unwrap();
    for field in [
        "search_results",
        "viral_results",
        "extracted_contents",
        "visual_captures",
    ] {
        assert_eq!(raw[field], json!([]), "{field}");
    }

    let status = mission_status(&*store, id).await.unwrap();
    assert_eq!(status.status, MissionStatus::Completed);
}

#[tokio::test]
async fn unknown_key_is_skipped_and_later_entries_still_run() {
    let (_dir, store) = temp_store();
    let providers = FakeProviders::default();
    let plan = json!({
        "search_queries": ["q"],
        "screenshot_targets": ["https://shots.test/a"],
        "team": [descriptor("web_sailor"), descriptor("Astrologer"), descriptor("visual_evidence")]
    });
    let report = controller(&providers, generated(plan), store.clone())
        .run(request("anything"))
        .await
        .unwrap();

    assert_eq!(
        report.skipped,
        vec![SkippedStage {
            index: 1,
            implementation: "Astrologer".to_string()
        }]
    );
    let steps = store.steps(&report.mission_id).await.unwrap();
    assert_eq!(
        step_names(&steps),
        ["00_initial", "01_plan", "02_web_sailor", "04_visual_evidence"]
    );
    assert_eq!(report.summary.screenshots_captured, 1);
}

// ===========================================================================
// Fatal failures
// ===========================================================================

#[tokio::test]
async fn missing_search_queries_halts_after_initial_snapshot() {
    let (_dir, store) = temp_store();
    let providers = FakeProviders::default();
    let plan = json!({"team": [descriptor("web_sailor")]});
    let err = controller(&providers, generated(plan), store.clone())
        .run(request("anything"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        MissionError::PlanValidation(PlanValidationError::MissingField("search_queries"))
    ));

    let missions = store.missions().await.unwrap();
    assert_eq!(missions.len(), 1);
    let steps = store.steps(&missions[0]).await.unwrap();
    assert_eq!(step_names(&steps), ["00_initial"]);
    assert!(providers.search.calls().is_empty());

    let status = mission_status(&*store, &missions[0]).await.unwrap();
    assert_eq!(status.status, MissionStatus::Failed);
    assert_eq!(status.last_step, StepName::initial());
    assert!(status.reason.unwrap().contains("search_queries"));
}

#[tokio::test]
async fn stage_panic_is_fatal_and_keeps_earlier_snapshots() {
    let (_dir, store) = temp_store();
    let providers = FakeProviders::new(
        FakeSearch::new(),
        FakeFetcher::new().panicking_on("https://boom.test/"),
        FakeCapturer::new(),
    );
    let plan = json!({
        "search_queries": ["q"],
        "extraction_tasks": [{"url": "https://boom.test/"}],
        "screenshot_targets": ["https://shots.test/a"],
        "team": [descriptor("web_sailor"), descriptor("content_extractor"), descriptor("visual_evidence")]
    });
    let err = controller(&providers, generated(plan), store.clone())
        .run(request("anything"))
        .await
        .unwrap_err();

    match err {
        MissionError::StagePanicked { stage, index, message } => {
            assert_eq!(stage, "content_extractor");
            assert_eq!(index, 1);
            assert!(message.contains("boom.test"));
        }
        other => panic!("expected StagePanicked, got {other:?}"),
    }

    let id = store.missions().await.unwrap().remove(0);
    let steps = store.steps(&id).await.unwrap();
    assert_eq!(step_names(&steps), ["00_initial", "01_plan", "02_web_sailor"]);
    assert!(providers.capturer.calls().is_empty());

    let outcome = store.outcome(&id).await.unwrap().unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert_eq!(outcome.last_step.unwrap().as_str(), "02_web_sailor");
}

#[test]
fn blank_topic_is_rejected_before_anything_runs() {
    let err: MissionError = MissionRequest::new("   ", None).unwrap_err().into();
    assert!(matches!(err, MissionError::MissingTopic));
}

// ===========================================================================
// Sub-operation containment
// ===========================================================================

#[tokio::test]
async fn failed_sub_operations_do_not_fail_the_mission() {
    let (_dir, store) = temp_store();
    let good = FakeSearch::url_for("good", 0);
    let providers = FakeProviders::new(
        FakeSearch::new().hits_per_query(1).failing_on("bad"),
        FakeFetcher::new()
            .failing_on("https://fail.test/")
            .empty_on("https://empty.test/"),
        FakeCapturer::new().failing_on("https://shots.test/broken"),
    );
    let plan = json!({
        "search_queries": ["bad", "good"],
        "extraction_tasks": [{"url": "https://fail.test/"}, {"url": "https://empty.test/"}],
        "screenshot_targets": ["https://shots.test/broken", "https://shots.test/ok"],
        "team": [descriptor("web_sailor"), descriptor("content_extractor"), descriptor("visual_evidence")]
    });
    let report = controller(&providers, generated(plan), store.clone())
        .run(request("anything"))
        .await
        .unwrap();

    let state = mission_result(&*store, &report.mission_id)
        .await
        .unwrap();
    let urls: Vec<&str> = state.search_results.iter().map(|h| h.url.as_str()).collect();
    assert_eq!(urls, [good.as_str()]);

    let extracted: Vec<&str> = state
        .extracted_contents
        .iter()
        .map(|c| c.url.as_str())
        .collect();
    assert_eq!(extracted, [good.as_str()]);

    let captured: Vec<&str> = state.visual_captures.iter().map(|c| c.url.as_str()).collect();
    assert_eq!(captured, ["https://shots.test/ok"]);
    assert!(state.visual_captures.iter().all(|c| c.success));
}

#[tokio::test]
async fn plan_content_type_is_carried_to_extracted_content() {
    let (_dir, store) = temp_store();
    let providers = FakeProviders::default();
    let plan = json!({
        "search_queries": ["q"],
        "extraction_tasks": [{"url": "https://stats.test/", "content_type": "statistics"}],
        "team": [descriptor("content_extractor")]
    });
    let report = controller(&providers, generated(plan), store.clone())
        .run(request("anything"))
        .await
        .unwrap();

    let state = mission_result(&*store, &report.mission_id)
        .await
        .unwrap();
    assert_eq!(state.extracted_contents.len(), 1);
    assert_eq!(
        state.extracted_contents[0].content_type.as_deref(),
        Some("statistics")
    );
}

#[tokio::test]
async fn fan_out_respects_per_category_ceilings() {
    let (_dir, store) = temp_store();
    let delay = Duration::from_millis(20);
    let providers = FakeProviders::new(
        FakeSearch::new().with_delay(delay),
        FakeFetcher::new().with_delay(delay),
        FakeCapturer::new().with_delay(delay),
    );
    controller(&providers, None, store)
        .run(request("artisanal coffee market"))
        .await
        .unwrap();

    // Ceilings from `test_limits`: search 2, extraction 3, capture 1.
    assert!(providers.search.peak_concurrency() <= 2);
    assert!(providers.fetcher.peak_concurrency() <= 3);
    assert!(providers.fetcher.peak_concurrency() > 1);
    assert_eq!(providers.capturer.peak_concurrency(), 1);
}

// ===========================================================================
// Mission identity and background execution
// ===========================================================================

#[tokio::test]
async fn same_topic_twice_gives_independent_missions() {
    let (_dir, store) = temp_store();
    let providers = FakeProviders::default();
    let controller = controller(&providers, None, store.clone());

    let a = controller.run(request("vinyl records")).await.unwrap();
    let b = controller.run(request("vinyl records")).await.unwrap();

    assert_ne!(a.mission_id, b.mission_id);
    assert_eq!(store.missions().await.unwrap().len(), 2);
    assert_eq!(
        store.steps(&a.mission_id).await.unwrap(),
        store.steps(&b.mission_id).await.unwrap()
    );
}

#[tokio::test]
async fn started_mission_runs_in_background_until_completed() {
    let (_dir, store) = temp_store();
    let providers = FakeProviders::default();
    let controller = Arc::new(controller(&providers, None, store.clone()));

    let id = controller
        .start(request("artisanal coffee market"))
        .await
        .unwrap();

    // The initial snapshot exists as soon as start returns.
    assert!(!store.steps(&id).await.unwrap().is_empty());

    let status = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let status = mission_status(&*store, &id).await.unwrap();
            if status.status != MissionStatus::Running {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("mission should finish");

    assert_eq!(status.status, MissionStatus::Completed);
    assert_eq!(status.last_step.as_str(), "05_visual_evidence");
    assert_eq!(status.data_summary.screenshots_captured, 2);
}

#[tokio::test]
async fn panicking_generator_falls_back_in_a_started_mission() {
    let (_dir, store) = temp_store();
    let providers = FakeProviders::default();
    let planner = Arc::new(ScriptedPlanner::panicking());
    let generator: Arc<dyn PlanGenerator> = planner.clone();
    let controller = Arc::new(controller(&providers, Some(generator), store.clone()));

    let id = controller.start(request("anything")).await.unwrap();

    let status = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let status = mission_status(&*store, &id).await.unwrap();
            if status.status != MissionStatus::Running {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("mission should finish");

    assert_eq!(planner.calls(), 1);
    assert_eq!(status.status, MissionStatus::Completed);
    assert_eq!(status.last_step.as_str(), "05_visual_evidence");
    let result = mission_result(&*store, &id).await.unwrap();
    assert_eq!(result.plan_source, Some(PlanSource::Fallback));
}
