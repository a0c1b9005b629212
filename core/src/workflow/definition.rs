// core/src/workflow/definition.rs

//! The `Pipeline<TData, Err>` struct: declared steps and their handlers.

use super::error::WorkflowError;
use super::step::{Handler, SkipCondition, StepDef};
use std::collections::HashMap;

/// An ordered list of named steps over a shared context `TData`, each step
/// carrying `before`, `on` and `after` handlers that return `Err` on failure.
pub struct Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
{
  pub(crate) name: String,
  pub(crate) steps: Vec<StepDef<TData>>,

  pub(crate) before: HashMap<String, Vec<Handler<TData, Err>>>,
  pub(crate) on: HashMap<String, Vec<Handler<TData, Err>>>,
  pub(crate) after: HashMap<String, Vec<Handler<TData, Err>>>,
}

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
{
  /// Builds a pipeline from `(step name, optional, skip condition)` triples.
  pub fn new(name: &str, step_defs: &[(&str, bool, Option<SkipCondition<TData>>)]) -> Self {
    let steps = step_defs
      .iter()
      .map(|(step_name, optional, skip_if)| StepDef {
        name: (*step_name).to_string(),
        optional: *optional,
        skip_if: skip_if.clone(),
      })
      .collect();

    Self {
      name: name.to_string(),
      steps,
      before: HashMap::new(),
      on: HashMap::new(),
      after: HashMap::new(),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn step_names(&self) -> Vec<&str> {
    self.steps.iter().map(|s| s.name.as_str()).collect()
  }

  fn position(&self, step_name: &str) -> Result<usize, WorkflowError> {
    self
      .steps
      .iter()
      .position(|s| s.name == step_name)
      .ok_or_else(|| WorkflowError::StepNotFound {
        step_name: step_name.to_string(),
      })
  }

  /// Checks that step names are unique and every registered handler is
  /// bound to a declared step. The registry calls this before accepting a
  /// pipeline.
  pub fn validate(&self) -> Result<(), WorkflowError> {
    for (idx, step) in self.steps.iter().enumerate() {
      if self.steps[..idx].iter().any(|earlier| earlier.name == step.name) {
        return Err(WorkflowError::DuplicateStep {
          step_name: step.name.clone(),
        });
      }
    }
    for phase in [&self.before, &self.on, &self.after] {
      for step_name in phase.keys() {
        self.position(step_name)?;
      }
    }
    Ok(())
  }
}
