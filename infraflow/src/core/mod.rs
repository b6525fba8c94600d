//! Core data model.
//!
//! This module contains the declarative building blocks of a pipeline:
//! - Artifacts and artifact paths
//! - Build projects and permission statements
//! - Typed actions and the stages that group them

mod action;
mod artifact;
mod build;
mod stage;

pub use action::{Action, ActionCategory, ActionKind, DEFAULT_RUN_ORDER};
pub use artifact::{Artifact, ArtifactPath};
pub use build::{BuildProject, Effect, PolicyStatement, BUILDSPEC_VERSION};
pub use stage::Stage;
