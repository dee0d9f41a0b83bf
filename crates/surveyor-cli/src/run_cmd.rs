//! `surveyor run` and `surveyor plan`: foreground mission and dry planning.

use anyhow::{Context, Result};

use surveyor_core::orchestrator::{MissionController, MissionReport};
use surveyor_core::plan::{PlanProducer, validate_plan};
use surveyor_core::state::{MissionRequest, Topic};

/// Run a full mission in the foreground and print its report.
pub async fn run_mission(
    controller: &MissionController,
    topic: &str,
    user_id: Option<String>,
) -> Result<()> {
    let request = MissionRequest::new(topic, user_id)?;
    let report = controller
        .run(request)
        .await
        .context("mission failed")?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &MissionReport) {
    println!("Mission: {}", report.mission_id);
    println!("Plan source: {}", report.plan_source);
    println!("Last step: {}", report.last_step);
    println!();

    println!("Steps:");
    for step in &report.executed {
        println!("  + {step}");
    }
    for skipped in &report.skipped {
        println!(
            "  - team[{}] skipped (unknown implementation {:?})",
            skipped.index, skipped.implementation
        );
    }
    println!();

    let s = &report.summary;
    println!("URLs found:           {}", s.urls_found);
    println!("Viral items:          {}", s.viral_items);
    println!("Contents extracted:   {}", s.contents_extracted);
    println!("Screenshots captured: {}", s.screenshots_captured);
}

/// Produce and validate a plan for `topic` without running a mission.
pub async fn run_plan(producer: &PlanProducer, topic: &str) -> Result<()> {
    let topic = Topic::new(topic)?;
    let produced = producer.produce(&topic).await;
    let plan = validate_plan(&produced.value)
        .with_context(|| format!("{} plan failed validation", produced.source))?;

    eprintln!("Plan source: {}", produced.source);
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}
