//! Template documents and synthesis.
//!
//! Synthesis is deterministic: maps are ordered, logical ids derive from
//! construct paths, and nothing reads the clock or the environment.

mod auto_delete;
mod document;
pub mod intrinsics;
mod pipeline_template;
mod stack_template;

pub use auto_delete::{AUTO_DELETE_RESOURCE_TYPE, AUTO_DELETE_TAG};
pub use document::{Output, Parameter, Resource, Template, FORMAT_VERSION};
pub use pipeline_template::{synthesize, PIPELINE_ARN_OUTPUT};
pub use stack_template::{primary_logical_id, synthesize_stack};
