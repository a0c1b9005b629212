// tests/workflow_tests.rs
mod common;

use common::setup_tracing;
use serial_test::serial;
use settlement_core::workflow::{Handler, SkipCondition};
use settlement_core::{
  ContextData, Pipeline, PipelineControl, PipelineRegistry, PipelineResult, SettlementError, WorkflowError,
};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Trace {
  steps: Vec<String>,
  stop_at: Option<&'static str>,
}

fn record(step: &'static str) -> Handler<Trace, SettlementError> {
  Box::new(move |ctx: ContextData<Trace>| {
    Box::pin(async move {
      let mut guard = ctx.write();
      guard.steps.push(step.to_string());
      if guard.stop_at == Some(step) {
        return Ok(PipelineControl::Stop);
      }
      Ok(PipelineControl::Continue)
    })
  })
}

#[tokio::test]
#[serial]
async fn test_phases_run_before_on_after_in_step_order() {
  setup_tracing();
  let mut p = Pipeline::<Trace, SettlementError>::new("trace", &[("a", false, None), ("b", false, None)]);
  p.before_root("a", record("a.before"));
  p.on_root("a", record("a.on"));
  p.after_root("a", record("a.after"));
  p.on_root("b", record("b.on"));

  let ctx = ContextData::new(Trace::default());
  assert_eq!(p.run(ctx.clone()).await.unwrap(), PipelineResult::Completed);
  assert_eq!(ctx.read().steps, vec!["a.before", "a.on", "a.after", "b.on"]);
}

#[tokio::test]
#[serial]
async fn test_stop_halts_remaining_steps() {
  setup_tracing();
  let mut p = Pipeline::<Trace, SettlementError>::new("trace", &[("a", false, None), ("b", false, None)]);
  p.on_root("a", record("a"));
  p.on_root("b", record("b"));

  let ctx = ContextData::new(Trace {
    stop_at: Some("a"),
    ..Trace::default()
  });
  assert_eq!(p.run(ctx.clone()).await.unwrap(), PipelineResult::Stopped);
  assert_eq!(ctx.read().steps, vec!["a"]);
}

#[tokio::test]
#[serial]
async fn test_handler_error_propagates_and_skips_rest() {
  setup_tracing();
  let mut p = Pipeline::<Trace, SettlementError>::new("trace", &[("bad", false, None), ("never", false, None)]);
  p.on_root("bad", |_ctx: ContextData<Trace>| {
    Box::pin(async move { Err::<PipelineControl, _>(SettlementError::validation("nope")) })
  });
  p.on_root("never", record("never"));

  let ctx = ContextData::new(Trace::default());
  let err = p.run(ctx.clone()).await.unwrap_err();
  assert!(matches!(err, SettlementError::Validation(_)));
  assert!(ctx.read().steps.is_empty());
}

#[tokio::test]
#[serial]
async fn test_missing_handler_and_skip_conditions() {
  setup_tracing();
  let always: SkipCondition<Trace> = Arc::new(|_ctx: ContextData<Trace>| true);
  let mut p = Pipeline::<Trace, SettlementError>::new(
    "trace",
    &[
      ("skipped", false, Some(always)),
      ("optional", true, None),
      ("required", false, None),
    ],
  );
  p.on_root("skipped", record("skipped"));

  let err = p.run(ContextData::new(Trace::default())).await.unwrap_err();
  assert!(matches!(
    err,
    SettlementError::Workflow {
      source: WorkflowError::HandlerMissing { .. }
    }
  ));
}

#[tokio::test]
#[serial]
async fn test_validation_catches_duplicate_steps_and_unbound_handlers() {
  let twice = Pipeline::<Trace, SettlementError>::new("trace", &[("a", false, None), ("a", true, None)]);
  assert!(matches!(twice.validate(), Err(WorkflowError::DuplicateStep { .. })));

  let mut p = Pipeline::<Trace, SettlementError>::new("trace", &[("a", false, None), ("b", true, None)]);
  assert_eq!(p.step_names(), vec!["a", "b"]);
  assert!(p.validate().is_ok());

  p.on_root("typo", record("typo"));
  assert!(matches!(p.validate(), Err(WorkflowError::StepNotFound { .. })));

  let registry = PipelineRegistry::<SettlementError>::new();
  assert!(matches!(
    registry.register_pipeline(p),
    Err(WorkflowError::StepNotFound { .. })
  ));
}

#[tokio::test]
#[serial]
async fn test_registry_dispatches_by_context_type() {
  setup_tracing();
  let registry = PipelineRegistry::<SettlementError>::new();
  let mut p = Pipeline::<Trace, SettlementError>::new("trace", &[("only", false, None)]);
  p.on_root("only", record("only"));
  registry.register_pipeline(p).unwrap();
  assert!(registry.is_registered::<Trace>());

  let dup = Pipeline::<Trace, SettlementError>::new("trace", &[]);
  assert!(matches!(
    registry.register_pipeline(dup),
    Err(WorkflowError::AlreadyRegistered { .. })
  ));

  let ctx = ContextData::new(Trace::default());
  registry.run(ctx.clone()).await.unwrap();
  assert_eq!(ctx.read().steps, vec!["only"]);

  let unregistered = registry.run(ContextData::new(0u32)).await;
  assert!(matches!(
    unregistered,
    Err(SettlementError::Workflow {
      source: WorkflowError::NotRegistered { .. }
    })
  ));
}
