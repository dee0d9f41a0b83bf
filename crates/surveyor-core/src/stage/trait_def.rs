//! The `Stage` trait -- the uniform contract for pipeline workers.
//!
//! The trait is object-safe so the controller can hold any stage as
//! `Box<dyn Stage>` without knowing which implementation it is.

use anyhow::Result;
use async_trait::async_trait;

use super::StageKind;
use super::memory::DedupMemory;
use crate::state::MissionState;

/// A pipeline stage.
///
/// Implementors receive the full mission state by value and must return a
/// well-formed state: they may replace or append to the collections they
/// own, but never clear fields owned by other stages. The "nothing to do"
/// case is a normal return (with a log line), not an error.
#[async_trait]
pub trait Stage: Send {
    /// The implementation this stage was resolved from.
    fn kind(&self) -> StageKind;

    /// Identity used in logs and snapshot names.
    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Keys this instance has already submitted.
    fn memory(&self) -> &DedupMemory;

    /// Execute the stage against the current mission state.
    async fn run(&mut self, state: MissionState) -> Result<MissionState>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn Stage) {}
};
