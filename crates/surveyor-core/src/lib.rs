//! Research mission orchestration engine.
//!
//! A mission turns a topic into a validated plan, then runs the plan's team
//! of stages over a shared [`state::MissionState`], snapshotting after each
//! step.

pub mod orchestrator;
pub mod plan;
pub mod providers;
pub mod query;
pub mod snapshot;
pub mod stage;
pub mod state;
