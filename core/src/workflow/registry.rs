// core/src/workflow/registry.rs

//! `PipelineRegistry<E>`: pipelines keyed by the `TypeId` of their context
//! data, so a caller runs "the capture pipeline" just by handing over a
//! `ContextData<CaptureContext>`.

use super::context_data::ContextData;
use super::control::PipelineResult;
use super::definition::Pipeline;
use super::error::WorkflowError;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{event, instrument, Level};

#[async_trait]
trait AnyPipelineRunner<ApplicationError>: Send + Sync
where
  ApplicationError: std::error::Error + Send + Sync + 'static,
{
  async fn run_erased(&self, ctx_obj: Box<dyn Any + Send>) -> Result<PipelineResult, ApplicationError>;
}

struct PipelineWrapper<TData, HandlerError>
where
  TData: 'static + Send + Sync,
  HandlerError: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
{
  pipeline: Arc<Pipeline<TData, HandlerError>>,
}

#[async_trait]
impl<TData, HandlerError, ApplicationError> AnyPipelineRunner<ApplicationError> for PipelineWrapper<TData, HandlerError>
where
  TData: 'static + Send + Sync,
  HandlerError: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
  ApplicationError: std::error::Error + From<HandlerError> + From<WorkflowError> + Send + Sync + 'static,
  Pipeline<TData, HandlerError>: Send + Sync,
{
  async fn run_erased(&self, ctx_obj: Box<dyn Any + Send>) -> Result<PipelineResult, ApplicationError> {
    let typed_ctx_data = match ctx_obj.downcast::<ContextData<TData>>() {
      Ok(boxed) => *boxed,
      Err(_) => {
        let expected_type = std::any::type_name::<ContextData<TData>>().to_string();
        event!(Level::ERROR, %expected_type, "Context object type mismatch.");
        return Err(ApplicationError::from(WorkflowError::TypeMismatch { expected_type }));
      }
    };
    self.pipeline.run(typed_ctx_data).await.map_err(ApplicationError::from)
  }
}

/// Type-keyed pipeline registry. `ApplicationError` is what `run` returns.
pub struct PipelineRegistry<ApplicationError>
where
  ApplicationError: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
{
  registry: RwLock<HashMap<TypeId, (String, Arc<dyn AnyPipelineRunner<ApplicationError>>)>>,
  _phantom_app_err: PhantomData<ApplicationError>,
}

impl<ApplicationError> Default for PipelineRegistry<ApplicationError>
where
  ApplicationError: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

impl<ApplicationError> PipelineRegistry<ApplicationError>
where
  ApplicationError: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self {
      registry: RwLock::new(HashMap::new()),
      _phantom_app_err: PhantomData,
    }
  }

  /// Validates and registers `pipeline` under its context type. A second
  /// pipeline for the same context type is rejected.
  pub fn register_pipeline<TData, HandlerError>(&self, pipeline: Pipeline<TData, HandlerError>) -> Result<(), WorkflowError>
  where
    TData: 'static + Send + Sync,
    HandlerError: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
    ApplicationError: From<HandlerError>,
    Pipeline<TData, HandlerError>: Send + Sync,
  {
    pipeline.validate()?;
    let type_name = std::any::type_name::<TData>().to_string();
    let mut guard = self.registry.write();
    if guard.contains_key(&TypeId::of::<TData>()) {
      return Err(WorkflowError::AlreadyRegistered { type_name });
    }
    event!(Level::DEBUG, pipeline = %pipeline.name(), tdata_type = %type_name, "Registering pipeline.");
    let wrapper = PipelineWrapper::<TData, HandlerError> {
      pipeline: Arc::new(pipeline),
    };
    guard.insert(TypeId::of::<TData>(), (type_name, Arc::new(wrapper)));
    Ok(())
  }

  pub fn is_registered<TData: 'static>(&self) -> bool {
    self.registry.read().contains_key(&TypeId::of::<TData>())
  }

  /// Names of every registered context type, sorted.
  pub fn registered_types(&self) -> Vec<String> {
    let mut names: Vec<String> = self.registry.read().values().map(|(name, _)| name.clone()).collect();
    names.sort();
    names
  }

  /// Runs the pipeline registered for `TData`.
  #[instrument(name = "PipelineRegistry::run", skip_all, fields(tdata_type = %std::any::type_name::<TData>()))]
  pub async fn run<TData>(&self, ctx_data: ContextData<TData>) -> Result<PipelineResult, ApplicationError>
  where
    TData: 'static + Send + Sync,
  {
    let runner = {
      let guard = self.registry.read();
      guard.get(&TypeId::of::<TData>()).map(|(_, runner)| runner.clone())
    };
    let runner = runner.ok_or_else(|| {
      let type_name = std::any::type_name::<TData>().to_string();
      event!(Level::ERROR, %type_name, "No pipeline registered.");
      ApplicationError::from(WorkflowError::NotRegistered { type_name })
    })?;

    let owned_ctx_obj: Box<dyn Any + Send> = Box::new(ctx_data);
    runner.run_erased(owned_ctx_obj).await
  }
}
