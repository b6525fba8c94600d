//! A deployable group of resources with named outputs.

use super::bucket::Bucket;
use super::compute::Instance;
use super::network::Vpc;
use crate::errors::PipelineValidationError;
use crate::utils::{validate_name, validate_stack_name};
use serde::{Deserialize, Serialize};

const MAX_CONSTRUCT_ID_LEN: usize = 255;

/// One resource declared in a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StackResource {
    /// A bucket.
    Bucket(Bucket),
    /// A network.
    Vpc(Vpc),
    /// A virtual machine.
    Instance(Instance),
}

/// A value exported from a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceRef {
    /// The resource's primary identifier: bucket name, VPC id, instance id.
    Id(String),
    /// A named attribute of the resource.
    Attribute {
        /// Resource id.
        resource: String,
        /// Attribute name, e.g. `Arn`.
        name: String,
    },
}

impl ResourceRef {
    /// The resource this reference points at.
    #[must_use]
    pub fn resource(&self) -> &str {
        match self {
            Self::Id(resource) | Self::Attribute { resource, .. } => resource,
        }
    }
}

/// A named stack output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackOutput {
    /// Output name.
    pub name: String,
    /// Exported value.
    pub value: ResourceRef,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
}

/// A stack of resources, synthesized into its own template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDefinition {
    name: String,
    resources: Vec<(String, StackResource)>,
    outputs: Vec<StackOutput>,
}

impl StackDefinition {
    /// Creates an empty stack.
    ///
    /// # Errors
    ///
    /// Fails if `name` is not a valid stack name.
    pub fn new(name: impl Into<String>) -> Result<Self, PipelineValidationError> {
        let name = name.into();
        validate_stack_name(&name)?;
        Ok(Self {
            name,
            resources: Vec::new(),
            outputs: Vec::new(),
        })
    }

    /// Stack name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resources in declaration order.
    #[must_use]
    pub fn resources(&self) -> &[(String, StackResource)] {
        &self.resources
    }

    /// Outputs in declaration order.
    #[must_use]
    pub fn outputs(&self) -> &[StackOutput] {
        &self.outputs
    }

    /// Looks up a resource by id.
    #[must_use]
    pub fn resource(&self, id: &str) -> Option<&StackResource> {
        self.resources.iter().find(|(rid, _)| rid == id).map(|(_, r)| r)
    }

    /// Looks up a VPC by id.
    #[must_use]
    pub fn vpc(&self, id: &str) -> Option<&Vpc> {
        match self.resource(id) {
            Some(StackResource::Vpc(vpc)) => Some(vpc),
            _ => None,
        }
    }

    fn insert(&mut self, id: &str, resource: StackResource) -> Result<(), PipelineValidationError> {
        validate_name("resource id", id, MAX_CONSTRUCT_ID_LEN)?;
        if self.resource(id).is_some() {
            return Err(PipelineValidationError::malformed_identifier(
                "resource id",
                id,
                &format!("already declared in stack '{}'", self.name),
            ));
        }
        self.resources.push((id.to_string(), resource));
        Ok(())
    }

    /// Declares a bucket.
    ///
    /// # Errors
    ///
    /// Fails on a bad or duplicate id, or when objects are auto-deleted from
    /// a bucket that is not itself destroyed.
    pub fn add_bucket(&mut self, id: &str, bucket: Bucket) -> Result<(), PipelineValidationError> {
        if bucket.auto_delete_objects && bucket.removal_policy != super::RemovalPolicy::Destroy {
            return Err(PipelineValidationError::malformed_identifier(
                "bucket",
                id,
                "auto_delete_objects requires the Destroy removal policy",
            ));
        }
        self.insert(id, StackResource::Bucket(bucket))
    }

    /// Declares a VPC.
    ///
    /// # Errors
    ///
    /// Fails on a bad or duplicate id, or an invalid subnet layout.
    pub fn add_vpc(&mut self, id: &str, vpc: Vpc) -> Result<(), PipelineValidationError> {
        vpc.layout(id)?;
        self.insert(id, StackResource::Vpc(vpc))
    }

    /// Declares an instance.
    ///
    /// # Errors
    ///
    /// Fails on a bad or duplicate id, when the VPC is not declared in this
    /// stack, or when it has no subnet of the requested kind.
    pub fn add_instance(&mut self, id: &str, instance: Instance) -> Result<(), PipelineValidationError> {
        let vpc = self.vpc(&instance.vpc).ok_or_else(|| {
            PipelineValidationError::malformed_identifier(
                "VPC reference",
                &instance.vpc,
                &format!("no VPC with this id in stack '{}'", self.name),
            )
        })?;
        if let Some(kind) = instance.subnet_kind {
            if !vpc.has_kind(kind) {
                return Err(PipelineValidationError::malformed_identifier(
                    "instance",
                    id,
                    &format!("VPC '{}' has no {kind} subnets", instance.vpc),
                ));
            }
        }
        self.insert(id, StackResource::Instance(instance))
    }

    /// Exports a value.
    ///
    /// # Errors
    ///
    /// Fails on a bad or duplicate output name, or a reference to an
    /// undeclared resource.
    pub fn add_output(
        &mut self,
        name: &str,
        value: ResourceRef,
        description: Option<&str>,
    ) -> Result<(), PipelineValidationError> {
        validate_name("output name", name, MAX_CONSTRUCT_ID_LEN)?;
        if self.outputs.iter().any(|o| o.name == name) {
            return Err(PipelineValidationError::malformed_identifier(
                "output name",
                name,
                "already exported",
            ));
        }
        if self.resource(value.resource()).is_none() {
            return Err(PipelineValidationError::malformed_identifier(
                "output reference",
                value.resource(),
                &format!("no resource with this id in stack '{}'", self.name),
            ));
        }
        self.outputs.push(StackOutput {
            name: name.to_string(),
            value,
            description: description.map(str::to_string),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MALFORMED_ID;
    use crate::resources::{MachineImage, RemovalPolicy, SubnetKind};

    fn stack() -> StackDefinition {
        let mut stack = StackDefinition::new("Resources").unwrap();
        stack.add_vpc("Net", Vpc::default().with_max_azs(1)).unwrap();
        stack
    }

    #[test]
    fn test_rejects_bad_stack_name() {
        assert!(StackDefinition::new("not a stack").is_err());
    }

    #[test]
    fn test_duplicate_resource_id() {
        let mut stack = stack();
        let err = stack.add_bucket("Net", Bucket::default()).unwrap_err();
        assert_eq!(err.code(), Some(MALFORMED_ID));
    }

    #[test]
    fn test_auto_delete_requires_destroy() {
        let mut stack = stack();
        let bucket = Bucket::default().auto_delete_objects(true);
        assert!(stack.add_bucket("Data", bucket.clone()).is_err());
        stack
            .add_bucket("Data", bucket.with_removal_policy(RemovalPolicy::Destroy))
            .unwrap();
    }

    #[test]
    fn test_instance_needs_declared_vpc() {
        let mut stack = stack();
        let orphan = Instance::new("Elsewhere", "t2.micro", MachineImage::latest_al2023());
        assert!(stack.add_instance("Box", orphan).is_err());

        let isolated = Instance::new("Net", "t2.micro", MachineImage::latest_al2023())
            .in_subnets(SubnetKind::Isolated);
        assert!(stack.add_instance("Box", isolated).is_err());

        let placed = Instance::new("Net", "t2.micro", MachineImage::latest_al2023());
        stack.add_instance("Box", placed).unwrap();
        assert!(matches!(stack.resource("Box"), Some(StackResource::Instance(_))));
    }

    #[test]
    fn test_outputs_must_reference_declared_resources() {
        let mut stack = stack();
        assert!(stack
            .add_output("Missing", ResourceRef::Id("Ghost".into()), None)
            .is_err());
        stack
            .add_output("NetId", ResourceRef::Id("Net".into()), Some("network"))
            .unwrap();
        assert!(stack.add_output("NetId", ResourceRef::Id("Net".into()), None).is_err());
        assert_eq!(stack.outputs().len(), 1);
    }
}
