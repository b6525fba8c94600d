//! Helper for declaring a create/test/delete stage in one call.

use super::PipelineComposer;
use crate::core::{Action, Artifact, ArtifactPath, BuildProject};
use crate::errors::PipelineValidationError;

/// Describes a lifecycle stage for disposable test infrastructure.
///
/// Expands to, in strictly ascending run-order:
/// 1. a create of `stack_name` from `template_path`,
/// 2. a test run of `test_project` reading `test_input`,
/// 3. an optional manual approval,
/// 4. a delete of `stack_name`.
///
/// Teardown is always an explicit delete action in the same stage.
#[derive(Debug, Clone)]
pub struct TestLifecycleStage {
    stack_name: String,
    template_path: ArtifactPath,
    test_project: BuildProject,
    test_input: Artifact,
    approval: Option<String>,
    admin_permissions: bool,
    create_name: String,
    test_name: String,
    approval_name: String,
    delete_name: String,
}

impl TestLifecycleStage {
    /// Creates a lifecycle description with default action names.
    #[must_use]
    pub fn new(
        stack_name: impl Into<String>,
        template_path: ArtifactPath,
        test_project: BuildProject,
        test_input: Artifact,
    ) -> Self {
        Self {
            stack_name: stack_name.into(),
            template_path,
            test_project,
            test_input,
            approval: None,
            admin_permissions: false,
            create_name: "CreateTestResources".to_string(),
            test_name: "RunTests".to_string(),
            approval_name: "ApproveDelete".to_string(),
            delete_name: "DeleteTestResources".to_string(),
        }
    }

    /// Requires a manual approval, with the given summary, before deleting.
    #[must_use]
    pub fn with_approval(mut self, summary: impl Into<String>) -> Self {
        self.approval = Some(summary.into());
        self
    }

    /// Runs create and delete with administrative permissions.
    #[must_use]
    pub fn with_admin_permissions(mut self, enabled: bool) -> Self {
        self.admin_permissions = enabled;
        self
    }

    /// Overrides the create, test and delete action names. The approval
    /// action is named separately with [`with_approval_name`](Self::with_approval_name).
    #[must_use]
    pub fn with_action_names(
        mut self,
        create: impl Into<String>,
        test: impl Into<String>,
        delete: impl Into<String>,
    ) -> Self {
        self.create_name = create.into();
        self.test_name = test.into();
        self.delete_name = delete.into();
        self
    }

    /// Overrides the approval action name (`ApproveDelete` by default).
    /// Only used when an approval is required.
    #[must_use]
    pub fn with_approval_name(mut self, name: impl Into<String>) -> Self {
        self.approval_name = name.into();
        self
    }

    /// Expands into actions with run-orders 1, 2, [3,] last.
    #[must_use]
    pub fn actions(&self) -> Vec<Action> {
        let mut run_order = 1;
        let mut next = || {
            let current = run_order;
            run_order += 1;
            current
        };

        let mut actions = vec![
            Action::create_resources(&self.create_name, &self.stack_name, self.template_path.clone())
                .with_admin_permissions(self.admin_permissions)
                .with_run_order(next()),
            Action::run_tests(&self.test_name, self.test_project.clone(), self.test_input.clone())
                .with_run_order(next()),
        ];

        if let Some(ref summary) = self.approval {
            actions.push(
                Action::manual_approval(&self.approval_name)
                    .with_summary(summary)
                    .with_run_order(next()),
            );
        }

        actions.push(
            Action::delete_resources(&self.delete_name, &self.stack_name)
                .with_admin_permissions(self.admin_permissions)
                .with_run_order(next()),
        );

        actions
    }
}

impl PipelineComposer {
    /// Appends a create/test/delete stage.
    ///
    /// # Errors
    ///
    /// See [`PipelineComposer::add_stage`].
    pub fn lifecycle_stage(
        self,
        name: &str,
        lifecycle: &TestLifecycleStage,
    ) -> Result<Self, PipelineValidationError> {
        self.stage(name, lifecycle.actions())
    }
}
