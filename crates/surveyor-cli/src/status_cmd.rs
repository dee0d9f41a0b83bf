//! `surveyor status`, `surveyor show` and `surveyor list`: read stored
//! missions from the sessions directory.

use anyhow::{Context, Result};

use surveyor_core::query::{self, MissionStatus};
use surveyor_core::snapshot::{SnapshotStore, StepName};
use surveyor_core::state::MissionId;

fn parse_mission_id(raw: &str) -> Result<MissionId> {
    raw.parse()
        .with_context(|| format!("invalid mission ID: {raw}"))
}

/// Print the status of one mission.
pub async fn run_status(store: &dyn SnapshotStore, mission_id: &str) -> Result<()> {
    let id = parse_mission_id(mission_id)?;
    let report = query::mission_status(store, &id).await?;

    println!("Mission: {}", report.mission_id);
    println!("Status: {}", report.status);
    println!("Last step: {}", report.last_step);
    if let Some(reason) = &report.reason {
        println!("Reason: {reason}");
    }
    if let Some(outcome) = store.outcome(&id).await? {
        println!(
            "Finished: {}",
            outcome.finished_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    let s = &report.data_summary;
    println!(
        "Data: urls={} viral={} contents={} screenshots={}",
        s.urls_found, s.viral_items, s.contents_extracted, s.screenshots_captured
    );
    Ok(())
}

/// Print a snapshot as JSON: the latest one, or `step` when given.
pub async fn run_show(
    store: &dyn SnapshotStore,
    mission_id: &str,
    step: Option<&str>,
) -> Result<()> {
    let id = parse_mission_id(mission_id)?;
    let state = match step {
        Some(raw) => {
            let step: StepName = raw.parse()?;
            store.load(&id, &step).await?
        }
        None => query::mission_result(store, &id).await?,
    };
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}

/// List every stored mission with its status and last step.
pub async fn run_list(store: &dyn SnapshotStore) -> Result<()> {
    let missions = store.missions().await?;
    if missions.is_empty() {
        println!("No missions found.");
        return Ok(());
    }

    println!("{:<40} {:<10} {:<24} TOPIC", "MISSION", "STATUS", "LAST STEP");
    for id in &missions {
        match query::mission_status(store, id).await {
            Ok(report) => {
                let topic = store
                    .load(id, &StepName::initial())
                    .await
                    .map(|s| s.request.topic.to_string())
                    .unwrap_or_default();
                let icon = match report.status {
                    MissionStatus::Running => "*",
                    MissionStatus::Completed => "+",
                    MissionStatus::Failed => "!",
                };
                println!(
                    "{:<40} {icon} {:<8} {:<24} {topic}",
                    id.as_str(),
                    report.status.to_string(),
                    report.last_step.as_str(),
                );
            }
            Err(e) => {
                tracing::warn!(mission_id = %id, error = %e, "unreadable mission");
            }
        }
    }
    Ok(())
}
