//! Pipeline stage trait.
//!
//! RULE: Every stage is a pure transformation over the full output of the
//! stage before it. The runner calls stages in the fixed order documented in
//! pipeline.rs and never lets one stage reach into another's state.

use crate::error::PipelineResult;

/// The contract every pipeline stage must fulfill.
pub trait PipelineStage {
    /// The full upstream output this stage consumes.
    type Input: ?Sized;
    /// The stage's own immutable output.
    type Output;

    /// Unique stable name for this stage. Used in the event log.
    fn name(&self) -> &'static str;

    /// Transform the entire input set. Must be deterministic.
    fn run(&self, input: &Self::Input) -> PipelineResult<Self::Output>;

    /// Row count of an output, recorded when the stage completes.
    fn output_rows(&self, output: &Self::Output) -> usize;
}
