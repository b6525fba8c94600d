//! Pipeline composition.
//!
//! This module provides:
//! - The immutable pipeline description
//! - A composer that validates every declaration as it is made
//! - A helper for create/test/delete lifecycle stages
//! - The execution plan (stage order and run-order waves)
//! - The lifecycle state machine for disposable test infrastructure

mod builder;
mod builder_helpers;
mod lifecycle;
mod plan;
mod spec;

pub use builder::PipelineComposer;
pub use builder_helpers::TestLifecycleStage;
pub use lifecycle::{LifecycleError, LifecyclePhase, Outcome, TestLifecycle};
pub use plan::{ExecutionPlan, StagePlan, Wave};
pub use spec::{Pipeline, PipelineSettings};
