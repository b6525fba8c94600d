//! Actions: the typed units of work inside a stage.

use super::artifact::{Artifact, ArtifactPath};
use super::build::BuildProject;
use crate::config::SourceConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Run-order assigned when none is given.
pub const DEFAULT_RUN_ORDER: u32 = 1;

/// The category an action belongs to in the orchestration service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionCategory {
    /// Fetches source from version control.
    Source,
    /// Runs a build container.
    Build,
    /// Runs a test container.
    Test,
    /// Creates, updates or deletes a resource stack.
    Deploy,
    /// Waits for a human decision.
    Approval,
}

impl fmt::Display for ActionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "Source"),
            Self::Build => write!(f, "Build"),
            Self::Test => write!(f, "Test"),
            Self::Deploy => write!(f, "Deploy"),
            Self::Approval => write!(f, "Approval"),
        }
    }
}

/// Action-specific parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    /// Pulls a branch through a code connection.
    Source {
        /// Code-connection ARN.
        connection_arn: String,
        /// Repository owner.
        owner: String,
        /// Repository name.
        repo: String,
        /// Branch to track.
        branch: String,
        /// Start the pipeline on push.
        trigger_on_push: bool,
    },
    /// Runs a build project.
    Build {
        /// The project to run.
        project: BuildProject,
    },
    /// Creates or updates the disposable resource stack.
    CreateResources {
        /// Stack to create or update.
        stack_name: String,
        /// Template file inside an input artifact.
        template_path: ArtifactPath,
        /// Deploy with full administrative permissions.
        admin_permissions: bool,
        /// Stack parameter values.
        #[serde(default)]
        parameter_overrides: BTreeMap<String, String>,
    },
    /// Runs a test project against the created resources.
    RunTests {
        /// The project to run.
        project: BuildProject,
    },
    /// Deletes the disposable resource stack.
    DeleteResources {
        /// Stack to delete.
        stack_name: String,
        /// Delete with full administrative permissions.
        admin_permissions: bool,
    },
    /// Blocks until someone approves.
    ManualApproval {
        /// Text shown to the approver.
        summary: Option<String>,
    },
}

impl ActionKind {
    /// Returns the service category for this kind.
    #[must_use]
    pub fn category(&self) -> ActionCategory {
        match self {
            Self::Source { .. } => ActionCategory::Source,
            Self::Build { .. } => ActionCategory::Build,
            Self::RunTests { .. } => ActionCategory::Test,
            Self::CreateResources { .. } | Self::DeleteResources { .. } => ActionCategory::Deploy,
            Self::ManualApproval { .. } => ActionCategory::Approval,
        }
    }

    /// Returns the provider that executes this kind.
    #[must_use]
    pub fn provider(&self) -> &'static str {
        match self {
            Self::Source { .. } => "CodeStarSourceConnection",
            Self::Build { .. } | Self::RunTests { .. } => "CodeBuild",
            Self::CreateResources { .. } | Self::DeleteResources { .. } => "CloudFormation",
            Self::ManualApproval { .. } => "Manual",
        }
    }

    /// Whether actions of this kind may declare output artifacts.
    #[must_use]
    pub fn produces_artifacts(&self) -> bool {
        matches!(
            self,
            Self::Source { .. } | Self::Build { .. } | Self::CreateResources { .. }
        )
    }

    /// Returns the build project, for kinds that run one.
    #[must_use]
    pub fn project(&self) -> Option<&BuildProject> {
        match self {
            Self::Build { project } | Self::RunTests { project } => Some(project),
            _ => None,
        }
    }

    /// Returns the target stack name, for deploy kinds.
    #[must_use]
    pub fn stack_name(&self) -> Option<&str> {
        match self {
            Self::CreateResources { stack_name, .. } | Self::DeleteResources { stack_name, .. } => {
                Some(stack_name)
            }
            _ => None,
        }
    }
}

/// A single declared unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Name, unique within its stage.
    pub name: String,
    /// Equal values may run concurrently; distinct values run ascending.
    pub run_order: u32,
    /// Artifacts consumed.
    #[serde(default)]
    pub inputs: Vec<Artifact>,
    /// Artifacts produced.
    #[serde(default)]
    pub outputs: Vec<Artifact>,
    /// Kind-specific parameters.
    pub kind: ActionKind,
}

impl Action {
    fn with_kind(name: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            name: name.into(),
            run_order: DEFAULT_RUN_ORDER,
            inputs: Vec::new(),
            outputs: Vec::new(),
            kind,
        }
    }

    /// A source action writing the checked-out branch to `output`.
    #[must_use]
    pub fn source(name: impl Into<String>, source: &SourceConfig, output: Artifact) -> Self {
        let mut action = Self::with_kind(
            name,
            ActionKind::Source {
                connection_arn: source.connection_arn.clone(),
                owner: source.owner.clone(),
                repo: source.repo.clone(),
                branch: source.branch.clone(),
                trigger_on_push: source.trigger_on_push,
            },
        );
        action.outputs.push(output);
        action
    }

    /// A build action reading `input` and producing `outputs`.
    #[must_use]
    pub fn build(
        name: impl Into<String>,
        project: BuildProject,
        input: Artifact,
        outputs: impl IntoIterator<Item = Artifact>,
    ) -> Self {
        let mut action = Self::with_kind(name, ActionKind::Build { project });
        action.inputs.push(input);
        action.outputs.extend(outputs);
        action
    }

    /// A create-or-update of `stack_name` from `template_path`.
    ///
    /// The artifact holding the template becomes an input of the action.
    #[must_use]
    pub fn create_resources(
        name: impl Into<String>,
        stack_name: impl Into<String>,
        template_path: ArtifactPath,
    ) -> Self {
        let input = template_path.artifact.clone();
        let mut action = Self::with_kind(
            name,
            ActionKind::CreateResources {
                stack_name: stack_name.into(),
                template_path,
                admin_permissions: false,
                parameter_overrides: BTreeMap::new(),
            },
        );
        action.inputs.push(input);
        action
    }

    /// A test run reading `input`.
    #[must_use]
    pub fn run_tests(name: impl Into<String>, project: BuildProject, input: Artifact) -> Self {
        let mut action = Self::with_kind(name, ActionKind::RunTests { project });
        action.inputs.push(input);
        action
    }

    /// A delete of `stack_name`.
    #[must_use]
    pub fn delete_resources(name: impl Into<String>, stack_name: impl Into<String>) -> Self {
        Self::with_kind(
            name,
            ActionKind::DeleteResources {
                stack_name: stack_name.into(),
                admin_permissions: false,
            },
        )
    }

    /// A manual approval gate.
    #[must_use]
    pub fn manual_approval(name: impl Into<String>) -> Self {
        Self::with_kind(name, ActionKind::ManualApproval { summary: None })
    }

    /// Sets the run-order.
    #[must_use]
    pub fn with_run_order(mut self, run_order: u32) -> Self {
        self.run_order = run_order;
        self
    }

    /// Grants administrative permissions to a deploy action. No effect on
    /// other kinds.
    #[must_use]
    pub fn with_admin_permissions(mut self, enabled: bool) -> Self {
        match &mut self.kind {
            ActionKind::CreateResources { admin_permissions, .. }
            | ActionKind::DeleteResources { admin_permissions, .. } => *admin_permissions = enabled,
            _ => {}
        }
        self
    }

    /// Sets a stack parameter on a create action. No effect on other kinds.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let ActionKind::CreateResources { parameter_overrides, .. } = &mut self.kind {
            parameter_overrides.insert(key.into(), value.into());
        }
        self
    }

    /// Sets the approver-facing summary. No effect on other kinds.
    #[must_use]
    pub fn with_summary(mut self, text: impl Into<String>) -> Self {
        if let ActionKind::ManualApproval { summary } = &mut self.kind {
            *summary = Some(text.into());
        }
        self
    }

    /// Returns the service category.
    #[must_use]
    pub fn category(&self) -> ActionCategory {
        self.kind.category()
    }

    /// True for actions that tear resources down.
    #[must_use]
    pub fn is_cleanup(&self) -> bool {
        matches!(self.kind, ActionKind::DeleteResources { .. })
    }

    /// True for source actions.
    #[must_use]
    pub fn is_source(&self) -> bool {
        matches!(self.kind, ActionKind::Source { .. })
    }
}
