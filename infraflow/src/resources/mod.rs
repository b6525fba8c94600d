//! Resource stacks deployed and torn down by the pipeline.
//!
//! A [`StackDefinition`] collects buckets, networks and instances under
//! construct ids. [`crate::template::synthesize_stack`] turns it into a
//! template.

mod bucket;
mod compute;
mod network;
mod stack;

pub use bucket::{Bucket, RemovalPolicy};
pub use compute::{Instance, MachineImage, AL2023_IMAGE_PARAMETER, AL2_IMAGE_PARAMETER, IMAGE_PARAMETER_TYPE};
pub use network::{SubnetConfig, SubnetKind, SubnetPlacement, Vpc, DEFAULT_VPC_CIDR};
pub use stack::{ResourceRef, StackDefinition, StackOutput, StackResource};
