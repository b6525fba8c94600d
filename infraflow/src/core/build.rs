//! Build projects and the permission statements attached to them.

use serde::{Deserialize, Serialize};

/// Buildspec schema version understood by the build service.
pub const BUILDSPEC_VERSION: &str = "0.2";

/// Effect of a policy statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// Grants the listed actions.
    Allow,
    /// Denies the listed actions.
    Deny,
}

/// One IAM-style permission statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyStatement {
    /// Allow or deny.
    pub effect: Effect,
    /// Service actions, e.g. `cloudformation:ValidateTemplate`.
    pub actions: Vec<String>,
    /// Resource patterns the statement applies to.
    pub resources: Vec<String>,
}

impl PolicyStatement {
    /// Creates an allow statement.
    #[must_use]
    pub fn allow<A, R>(actions: A, resources: R) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            effect: Effect::Allow,
            actions: actions.into_iter().map(Into::into).collect(),
            resources: resources.into_iter().map(Into::into).collect(),
        }
    }

    /// Renders the statement in policy-document form.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "Effect": self.effect,
            "Action": one_or_many(&self.actions),
            "Resource": one_or_many(&self.resources),
        })
    }
}

fn one_or_many(values: &[String]) -> serde_json::Value {
    match values {
        [single] => serde_json::json!(single),
        many => serde_json::json!(many),
    }
}

/// A managed build project: image, shell commands, published files, and any
/// extra permissions the commands need.
///
/// Commands are opaque strings passed through to the build service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildProject {
    /// Container image to run the commands in.
    pub image: String,
    /// Ordered shell commands for the build phase.
    pub commands: Vec<String>,
    /// Files published as the output artifact.
    #[serde(default)]
    pub artifact_files: Vec<String>,
    /// Base directory for `artifact_files`.
    #[serde(default)]
    pub base_directory: Option<String>,
    /// Extra permissions granted to the project's role.
    #[serde(default)]
    pub policy_statements: Vec<PolicyStatement>,
}

impl BuildProject {
    /// Creates a project running on the given image.
    #[must_use]
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            commands: Vec::new(),
            artifact_files: Vec::new(),
            base_directory: None,
            policy_statements: Vec::new(),
        }
    }

    /// Appends one command.
    #[must_use]
    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.commands.push(command.into());
        self
    }

    /// Appends several commands in order.
    #[must_use]
    pub fn commands<I>(mut self, commands: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.commands.extend(commands.into_iter().map(Into::into));
        self
    }

    /// Publishes files from `base_directory` as the build output.
    #[must_use]
    pub fn artifact_files<I>(mut self, files: I, base_directory: impl Into<String>) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.artifact_files = files.into_iter().map(Into::into).collect();
        self.base_directory = Some(base_directory.into());
        self
    }

    /// Grants an extra permission to the project's role.
    #[must_use]
    pub fn with_policy(mut self, statement: PolicyStatement) -> Self {
        self.policy_statements.push(statement);
        self
    }

    /// Renders the buildspec document.
    #[must_use]
    pub fn buildspec(&self) -> serde_json::Value {
        let mut spec = serde_json::json!({
            "version": BUILDSPEC_VERSION,
            "phases": {
                "build": {
                    "commands": self.commands,
                }
            }
        });

        if !self.artifact_files.is_empty() {
            let mut artifacts = serde_json::json!({ "files": self.artifact_files });
            if let Some(ref base) = self.base_directory {
                artifacts["base-directory"] = serde_json::json!(base);
            }
            spec["artifacts"] = artifacts;
        }

        spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_buildspec_without_artifacts() {
        let project = BuildProject::new("aws/codebuild/standard:6.0")
            .command("echo hi")
            .command("ls -la");

        assert_eq!(
            project.buildspec(),
            serde_json::json!({
                "version": "0.2",
                "phases": {"build": {"commands": ["echo hi", "ls -la"]}}
            })
        );
    }

    #[test]
    fn test_buildspec_with_artifacts() {
        let project = BuildProject::new("img")
            .commands(["a", "b"])
            .artifact_files(["template.yml"], ".");

        let spec = project.buildspec();
        assert_eq!(spec["artifacts"]["files"], serde_json::json!(["template.yml"]));
        assert_eq!(spec["artifacts"]["base-directory"], ".");
    }

    #[test]
    fn test_policy_statement_json() {
        let single = PolicyStatement::allow(["ec2:DescribeInstances"], ["*"]);
        assert_eq!(
            single.to_json(),
            serde_json::json!({"Effect": "Allow", "Action": "ec2:DescribeInstances", "Resource": "*"})
        );

        let many = PolicyStatement::allow(["s3:ListAllMyBuckets", "ec2:DescribeInstances"], ["*"]);
        assert_eq!(
            many.to_json()["Action"],
            serde_json::json!(["s3:ListAllMyBuckets", "ec2:DescribeInstances"])
        );
    }
}
