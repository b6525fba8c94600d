//! The declarative template document.

use crate::errors::{InfraflowError, PipelineValidationError};
use crate::utils::sha256_hex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Template format version accepted by the provisioning engine.
pub const FORMAT_VERSION: &str = "2010-09-09";

/// A template parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter type.
    #[serde(rename = "Type")]
    pub parameter_type: String,
    /// Default value.
    #[serde(rename = "Default", skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Human description.
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One resource declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource type, e.g. `AWS::S3::Bucket`.
    #[serde(rename = "Type")]
    pub resource_type: String,
    /// Resource properties.
    #[serde(rename = "Properties", skip_serializing_if = "is_empty_object", default)]
    pub properties: serde_json::Value,
    /// Logical ids this resource must be created after.
    #[serde(rename = "DependsOn", skip_serializing_if = "Vec::is_empty", default)]
    pub depends_on: Vec<String>,
    /// What happens to the physical resource when the stack is deleted.
    #[serde(rename = "DeletionPolicy", skip_serializing_if = "Option::is_none", default)]
    pub deletion_policy: Option<String>,
    /// What happens to the physical resource when it is replaced.
    #[serde(rename = "UpdateReplacePolicy", skip_serializing_if = "Option::is_none", default)]
    pub update_replace_policy: Option<String>,
}

fn is_empty_object(value: &serde_json::Value) -> bool {
    value.is_null() || value.as_object().is_some_and(serde_json::Map::is_empty)
}

impl Resource {
    /// Creates a resource with the given type and properties.
    #[must_use]
    pub fn new(resource_type: impl Into<String>, properties: serde_json::Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            properties,
            depends_on: Vec::new(),
            deletion_policy: None,
            update_replace_policy: None,
        }
    }

    /// Adds a creation dependency.
    #[must_use]
    pub fn depends_on(mut self, logical_id: impl Into<String>) -> Self {
        self.depends_on.push(logical_id.into());
        self
    }

    /// Sets both deletion and update-replace policies.
    #[must_use]
    pub fn with_removal_policy(mut self, policy: &str) -> Self {
        self.deletion_policy = Some(policy.to_string());
        self.update_replace_policy = Some(policy.to_string());
        self
    }
}

/// A stack output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    /// Output value (usually an intrinsic).
    #[serde(rename = "Value")]
    pub value: serde_json::Value,
    /// Human description.
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
}

/// A complete template.
///
/// All maps are ordered, so serialization is a pure function of the content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Format version.
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,
    /// Template description.
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
    /// Parameters, keyed by name.
    #[serde(rename = "Parameters", skip_serializing_if = "BTreeMap::is_empty", default)]
    pub parameters: BTreeMap<String, Parameter>,
    /// Resources, keyed by logical id.
    #[serde(rename = "Resources")]
    pub resources: BTreeMap<String, Resource>,
    /// Outputs, keyed by name.
    #[serde(rename = "Outputs", skip_serializing_if = "BTreeMap::is_empty", default)]
    pub outputs: BTreeMap<String, Output>,
}

impl Template {
    /// Creates an empty template.
    #[must_use]
    pub fn new(description: Option<String>) -> Self {
        Self {
            format_version: FORMAT_VERSION.to_string(),
            description,
            parameters: BTreeMap::new(),
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    /// Declares a resource.
    ///
    /// # Errors
    ///
    /// Fails if the logical id is empty, not alphanumeric, or already taken.
    pub fn add_resource(
        &mut self,
        logical_id: impl Into<String>,
        resource: Resource,
    ) -> Result<(), PipelineValidationError> {
        let logical_id = logical_id.into();
        if logical_id.is_empty() || !logical_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(PipelineValidationError::malformed_identifier(
                "logical id",
                &logical_id,
                "expected one or more ASCII letters or digits",
            ));
        }
        if self.resources.contains_key(&logical_id) {
            return Err(PipelineValidationError::malformed_identifier(
                "logical id",
                &logical_id,
                "already used by another resource",
            ));
        }
        self.resources.insert(logical_id, resource);
        Ok(())
    }

    /// Declares a parameter.
    pub fn add_parameter(&mut self, name: impl Into<String>, parameter: Parameter) {
        self.parameters.insert(name.into(), parameter);
    }

    /// Declares an output.
    pub fn add_output(&mut self, name: impl Into<String>, output: Output) {
        self.outputs.insert(name.into(), output);
    }

    /// Looks up a resource by logical id.
    #[must_use]
    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.get(logical_id)
    }

    /// Logical ids of all resources of a given type.
    #[must_use]
    pub fn resources_of_type(&self, resource_type: &str) -> Vec<&str> {
        self.resources
            .iter()
            .filter(|(_, r)| r.resource_type == resource_type)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Renders the template as pretty JSON with a trailing newline.
    pub fn to_json_string(&self) -> Result<String, InfraflowError> {
        let mut rendered = serde_json::to_string_pretty(self)?;
        rendered.push('\n');
        Ok(rendered)
    }

    /// SHA-256 of the rendered template.
    pub fn digest(&self) -> Result<String, InfraflowError> {
        Ok(sha256_hex(self.to_json_string()?.as_bytes()))
    }
}
