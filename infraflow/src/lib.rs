//! # Infraflow
//!
//! Declarative delivery pipelines for disposable test infrastructure.
//!
//! A pipeline is an ordered list of stages. Each stage holds actions that
//! run in ascending run-order, passing named artifacts forward. Infraflow
//! composes and validates that description, then synthesizes it into
//! deterministic templates for an external orchestration service:
//!
//! - **Composition**: [`pipeline::PipelineComposer`] checks names, run-orders,
//!   artifact visibility and service limits as stages are added
//! - **Lifecycle stages**: create a resource stack, test it, optionally wait
//!   for approval, then delete it
//! - **Synthesis**: pipeline and resource stacks become byte-stable JSON
//!   templates with a digest manifest
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use infraflow::prelude::*;
//!
//! let config = AppConfig::default().with_env_overrides();
//! let app = infraflow::reference::app(&config)?;
//! let manifest = app.synth("cdk.out")?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod assembly;
pub mod config;
pub mod core;
pub mod errors;
pub mod observability;
pub mod pipeline;
pub mod reference;
pub mod resources;
pub mod template;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::assembly::{App, CloudAssembly, Manifest, StackKind};
    pub use crate::config::{AppConfig, Environment, ServiceLimits, SourceConfig};
    pub use crate::core::{Action, ActionKind, Artifact, ArtifactPath, BuildProject, PolicyStatement, Stage};
    pub use crate::errors::{ContractErrorInfo, InfraflowError, PipelineValidationError};
    pub use crate::observability::{init_logging, LogFormat};
    pub use crate::pipeline::{
        ExecutionPlan, LifecyclePhase, Outcome, Pipeline, PipelineComposer, PipelineSettings,
        TestLifecycle, TestLifecycleStage,
    };
    pub use crate::resources::{Bucket, Instance, MachineImage, RemovalPolicy, StackDefinition, Vpc};
    pub use crate::template::{synthesize, synthesize_stack, Template};
}
