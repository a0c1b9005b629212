// core/src/workflow/control.rs

//! Flow signals returned by step handlers and the outcome of a whole run.

/// Returned by a handler to keep going or to halt the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineControl {
  Continue,
  /// Halt immediately. Remaining handlers of this step and all later steps are skipped.
  /// Used when an operation ends in a recorded, non-exceptional outcome
  /// (a declined capture, a payout that is no longer pending).
  Stop,
}

/// Outcome of a full pipeline execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineResult {
  /// Every non-skipped step ran.
  Completed,
  /// A handler returned `PipelineControl::Stop`.
  Stopped,
}
