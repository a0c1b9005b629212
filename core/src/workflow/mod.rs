// core/src/workflow/mod.rs

//! Async step pipelines that every settlement operation is expressed as.
//!
//! A pipeline is a list of named steps over one shared context type. Each step
//! has `before`, `on` and `after` handlers; any handler may stop the run or
//! fail it. Pipelines are registered once in a [`PipelineRegistry`] and
//! dispatched by context type.

pub mod context_data;
pub mod control;
pub mod definition;
pub mod error;
pub mod execution;
pub mod hooks;
pub mod registry;
pub mod step;

pub use context_data::ContextData;
pub use control::{PipelineControl, PipelineResult};
pub use definition::Pipeline;
pub use error::WorkflowError;
pub use registry::PipelineRegistry;
pub use step::{Handler, SkipCondition, StepDef};
