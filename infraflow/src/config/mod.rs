//! Application configuration.
//!
//! [`AppConfig`] is the single immutable value that carries account, region
//! and source-connection settings into the composer. Nothing in the library
//! reads configuration from ambient state; the CLI loads it once and passes it
//! down.

mod limits;

pub use limits::ServiceLimits;

use crate::errors::{InfraflowError, PipelineValidationError};
use crate::utils::{
    parse_connection_arn, validate_account, validate_branch, validate_name, validate_region,
    validate_repo_segment, validate_stack_name,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable overriding [`Environment::account`].
pub const ENV_ACCOUNT: &str = "INFRAFLOW_ACCOUNT";
/// Environment variable overriding [`Environment::region`].
pub const ENV_REGION: &str = "INFRAFLOW_REGION";
/// Environment variable overriding [`SourceConfig::connection_arn`].
pub const ENV_CONNECTION_ARN: &str = "INFRAFLOW_CONNECTION_ARN";
/// Environment variable overriding [`SourceConfig::branch`].
pub const ENV_BRANCH: &str = "INFRAFLOW_BRANCH";

/// Target account and region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// 12-digit account id.
    #[serde(default = "default_account")]
    pub account: String,
    /// Region code.
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_account() -> String {
    "996200611121".to_string()
}

fn default_region() -> String {
    "ap-south-1".to_string()
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            account: default_account(),
            region: default_region(),
        }
    }
}

impl Environment {
    /// Creates an environment for the given account and region.
    #[must_use]
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            region: region.into(),
        }
    }
}

/// Source-control connection settings, passed through to the source action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Code-connection ARN.
    #[serde(default = "default_connection_arn")]
    pub connection_arn: String,
    /// Repository owner.
    #[serde(default = "default_owner")]
    pub owner: String,
    /// Repository name.
    #[serde(default = "default_repo")]
    pub repo: String,
    /// Branch to track.
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Start an execution on every push.
    #[serde(default = "default_true")]
    pub trigger_on_push: bool,
}

fn default_connection_arn() -> String {
    "arn:aws:codeconnections:ap-south-1:996200611121:connection/e8c4c109-bb57-4c4a-aeb7-9589ffa6d954"
        .to_string()
}

fn default_owner() -> String {
    "learnysthq".to_string()
}

fn default_repo() -> String {
    "plato".to_string()
}

fn default_branch() -> String {
    "CDK_demo".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            connection_arn: default_connection_arn(),
            owner: default_owner(),
            repo: default_repo(),
            branch: default_branch(),
            trigger_on_push: true,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Target environment.
    #[serde(default)]
    pub environment: Environment,
    /// Source connection.
    #[serde(default)]
    pub source: SourceConfig,
    /// Name of the delivery pipeline.
    #[serde(default = "default_pipeline_name")]
    pub pipeline_name: String,
    /// Restart a running execution when the pipeline definition changes.
    #[serde(default = "default_true")]
    pub restart_execution_on_update: bool,
    /// Name of the disposable test-resources stack.
    #[serde(default = "default_test_stack_name")]
    pub test_stack_name: String,
    /// Build image used by build and test projects.
    #[serde(default = "default_build_image")]
    pub build_image: String,
    /// Template file the build stage validates and publishes.
    #[serde(default = "default_template_file")]
    pub template_file: String,
    /// Insert a manual approval before deleting the test resources.
    #[serde(default)]
    pub require_approval_before_delete: bool,
    /// Service limits applied during composition and synthesis.
    #[serde(default)]
    pub limits: ServiceLimits,
}

fn default_pipeline_name() -> String {
    "TestPipeline".to_string()
}

fn default_test_stack_name() -> String {
    "TestResourcesStack".to_string()
}

fn default_build_image() -> String {
    "aws/codebuild/standard:6.0".to_string()
}

fn default_template_file() -> String {
    "template.yml".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            source: SourceConfig::default(),
            pipeline_name: default_pipeline_name(),
            restart_execution_on_update: true,
            test_stack_name: default_test_stack_name(),
            build_image: default_build_image(),
            template_file: default_template_file(),
            require_approval_before_delete: false,
            limits: ServiceLimits::default(),
        }
    }
}

impl AppConfig {
    /// Parses configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, InfraflowError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, InfraflowError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            InfraflowError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_json_str(&raw)?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Applies `INFRAFLOW_*` overrides from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary lookup.
    #[must_use]
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(account) = lookup(ENV_ACCOUNT) {
            self.environment.account = account;
        }
        if let Some(region) = lookup(ENV_REGION) {
            self.environment.region = region;
        }
        if let Some(arn) = lookup(ENV_CONNECTION_ARN) {
            self.source.connection_arn = arn;
        }
        if let Some(branch) = lookup(ENV_BRANCH) {
            self.source.branch = branch;
        }
        self
    }

    /// Checks every identifier in the configuration.
    pub fn validate(&self) -> Result<(), PipelineValidationError> {
        validate_account(&self.environment.account)?;
        validate_region(&self.environment.region)?;
        parse_connection_arn(&self.source.connection_arn)?;
        validate_repo_segment("owner", &self.source.owner)?;
        validate_repo_segment("repo", &self.source.repo)?;
        validate_branch(&self.source.branch)?;
        validate_name("pipeline name", &self.pipeline_name, self.limits.max_name_len)?;
        validate_stack_name(&self.test_stack_name)?;
        if self.build_image.trim().is_empty() {
            return Err(PipelineValidationError::malformed_identifier(
                "build image",
                &self.build_image,
                "cannot be empty",
            ));
        }
        Ok(())
    }
}
