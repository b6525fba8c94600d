//! Pipeline composer with declaration-time validation.

use super::{Pipeline, PipelineSettings};
use crate::config::{AppConfig, Environment, ServiceLimits};
use crate::core::{Action, ActionKind, Artifact, Stage};
use crate::errors::PipelineValidationError;
use crate::utils::{
    parse_connection_arn, validate_account, validate_artifact_name, validate_branch,
    validate_name, validate_region, validate_repo_segment, validate_stack_name,
};
use std::collections::HashMap;

/// Where an artifact is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Origin {
    stage: usize,
    run_order: u32,
}

/// Builds the ordered stage/action graph of a pipeline.
///
/// Every `add_*` call validates immediately, so a bad declaration fails at
/// the call that introduced it. Composition never performs I/O.
#[derive(Debug, Clone)]
pub struct PipelineComposer {
    settings: PipelineSettings,
    environment: Environment,
    limits: ServiceLimits,
    stages: Vec<Stage>,
    produced: HashMap<Artifact, Origin>,
}

impl PipelineComposer {
    /// Creates a composer.
    #[must_use]
    pub fn new(settings: PipelineSettings, environment: Environment, limits: ServiceLimits) -> Self {
        Self {
            settings,
            environment,
            limits,
            stages: Vec::new(),
            produced: HashMap::new(),
        }
    }

    /// Creates a composer from application configuration.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            PipelineSettings::new(&config.pipeline_name)
                .restart_on_update(config.restart_execution_on_update),
            config.environment.clone(),
            config.limits,
        )
    }

    /// Appends a stage with the given actions.
    ///
    /// Actions are added in ascending run-order (declaration order breaks
    /// ties). If any action is rejected the whole stage is rolled back.
    ///
    /// # Errors
    ///
    /// Fails if the name collides with an existing stage, is malformed, the
    /// stage limit is reached, or any action is invalid.
    pub fn add_stage(
        &mut self,
        name: &str,
        actions: Vec<Action>,
    ) -> Result<(), PipelineValidationError> {
        validate_name("stage name", name, self.limits.max_name_len)?;

        if self.stages.iter().any(|s| s.name == name) {
            return Err(PipelineValidationError::duplicate_stage(name));
        }
        if self.stages.len() >= self.limits.max_stages {
            return Err(PipelineValidationError::limit_exceeded(
                "Stage count",
                self.limits.max_stages,
                self.stages.len() + 1,
            ));
        }

        let index = self.stages.len();
        self.stages.push(Stage::new(name));

        let mut actions = actions;
        actions.sort_by_key(|a| a.run_order);

        for action in actions {
            if let Err(err) = self.add_action(name, action) {
                self.rollback_stage(index);
                return Err(err);
            }
        }

        tracing::debug!(
            pipeline = %self.settings.name,
            stage = name,
            actions = self.stages[index].len(),
            "Stage added"
        );
        Ok(())
    }

    /// Consuming variant of [`add_stage`](Self::add_stage) for chaining.
    ///
    /// # Errors
    ///
    /// See [`add_stage`](Self::add_stage).
    pub fn stage(mut self, name: &str, actions: Vec<Action>) -> Result<Self, PipelineValidationError> {
        self.add_stage(name, actions)?;
        Ok(self)
    }

    /// Appends an action to an existing stage.
    ///
    /// Actions sharing a run-order may run concurrently; distinct values run
    /// in ascending order. Inputs must be produced by an earlier stage, or at
    /// a strictly lower run-order in the same stage.
    ///
    /// # Errors
    ///
    /// Fails on an unknown stage, duplicate action name, out-of-range
    /// run-order, dangling or duplicated artifact, malformed identifier,
    /// misplaced source action, or when the stage is full.
    pub fn add_action(&mut self, stage: &str, action: Action) -> Result<(), PipelineValidationError> {
        let index = self
            .stages
            .iter()
            .position(|s| s.name == stage)
            .ok_or_else(|| PipelineValidationError::unknown_stage(stage))?;

        self.check_action(index, &action)?;

        for output in &action.outputs {
            self.produced.insert(
                output.clone(),
                Origin {
                    stage: index,
                    run_order: action.run_order,
                },
            );
        }

        tracing::trace!(
            stage,
            action = %action.name,
            run_order = action.run_order,
            category = %action.category(),
            "Action added"
        );
        if let ActionKind::CreateResources { admin_permissions: true, .. }
        | ActionKind::DeleteResources { admin_permissions: true, .. } = &action.kind
        {
            tracing::warn!(stage, action = %action.name, "Deploy action runs with admin permissions");
        }

        self.stages[index].actions.push(action);
        Ok(())
    }

    /// Finishes composition.
    ///
    /// # Errors
    ///
    /// Fails when the pipeline has no stages, any stage has no actions, or
    /// the pipeline name or environment is malformed.
    pub fn build(self) -> Result<Pipeline, PipelineValidationError> {
        validate_name("pipeline name", &self.settings.name, self.limits.max_name_len)?;
        if !self.settings.name.chars().any(|c| c.is_ascii_alphanumeric()) {
            return Err(PipelineValidationError::malformed_identifier(
                "pipeline name",
                &self.settings.name,
                "must contain at least one letter or digit",
            ));
        }
        validate_account(&self.environment.account)?;
        validate_region(&self.environment.region)?;

        if self.stages.is_empty() {
            return Err(PipelineValidationError::empty_pipeline(&self.settings.name));
        }
        if let Some(empty) = self.stages.iter().find(|s| s.is_empty()) {
            return Err(PipelineValidationError::empty_stage(&empty.name));
        }

        Ok(Pipeline::new(self.settings, self.environment, self.stages))
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.settings.name
    }

    /// Returns the number of stages declared so far.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Returns the limits this composer enforces.
    #[must_use]
    pub fn limits(&self) -> &ServiceLimits {
        &self.limits
    }

    fn check_action(&self, index: usize, action: &Action) -> Result<(), PipelineValidationError> {
        let stage = &self.stages[index];

        validate_name("action name", &action.name, self.limits.max_name_len)?;

        if stage.action(&action.name).is_some() {
            return Err(PipelineValidationError::duplicate_action(&stage.name, &action.name));
        }
        if stage.len() >= self.limits.max_actions_per_stage {
            return Err(PipelineValidationError::limit_exceeded(
                &format!("Action count in stage '{}'", stage.name),
                self.limits.max_actions_per_stage,
                stage.len() + 1,
            ));
        }
        if action.run_order == 0 || action.run_order > self.limits.max_run_order {
            return Err(PipelineValidationError::run_order(
                &stage.name,
                &action.name,
                action.run_order,
                self.limits.max_run_order,
            ));
        }

        match (index == 0, action.is_source()) {
            (true, false) => {
                return Err(PipelineValidationError::source_placement(
                    &stage.name,
                    &action.name,
                    "the first stage may only contain source actions",
                ))
            }
            (false, true) => {
                return Err(PipelineValidationError::source_placement(
                    &stage.name,
                    &action.name,
                    "source actions are only allowed in the first stage",
                ))
            }
            _ => {}
        }

        self.check_kind(&action.kind)?;

        if let ActionKind::CreateResources { template_path, .. } = &action.kind {
            if !action.inputs.contains(&template_path.artifact) {
                return Err(PipelineValidationError::dangling_artifact(
                    &stage.name,
                    &action.name,
                    template_path.artifact.name(),
                ));
            }
        }
        if !action.outputs.is_empty() && !action.kind.produces_artifacts() {
            return Err(PipelineValidationError::malformed_identifier(
                "action outputs",
                &format!("{}/{}", stage.name, action.name),
                &format!("{} actions do not produce artifacts", action.category()),
            ));
        }

        for input in &action.inputs {
            let visible = self.produced.get(input).is_some_and(|origin| {
                origin.stage < index || (origin.stage == index && origin.run_order < action.run_order)
            });
            if !visible {
                return Err(PipelineValidationError::dangling_artifact(
                    &stage.name,
                    &action.name,
                    input.name(),
                ));
            }
        }

        for (i, output) in action.outputs.iter().enumerate() {
            validate_artifact_name(output.name(), self.limits.max_name_len)?;
            if self.produced.contains_key(output) || action.outputs[..i].contains(output) {
                return Err(PipelineValidationError::duplicate_artifact(
                    &stage.name,
                    &action.name,
                    output.name(),
                ));
            }
        }

        Ok(())
    }

    fn check_kind(&self, kind: &ActionKind) -> Result<(), PipelineValidationError> {
        match kind {
            ActionKind::Source {
                connection_arn,
                owner,
                repo,
                branch,
                ..
            } => {
                parse_connection_arn(connection_arn)?;
                validate_repo_segment("owner", owner)?;
                validate_repo_segment("repo", repo)?;
                validate_branch(branch)
            }
            ActionKind::CreateResources {
                stack_name,
                template_path,
                ..
            } => {
                validate_stack_name(stack_name)?;
                if template_path.path.trim().is_empty() {
                    return Err(PipelineValidationError::malformed_identifier(
                        "template path",
                        &template_path.to_string(),
                        "file path cannot be empty",
                    ));
                }
                Ok(())
            }
            ActionKind::DeleteResources { stack_name, .. } => validate_stack_name(stack_name),
            ActionKind::Build { project } | ActionKind::RunTests { project } => {
                if project.image.trim().is_empty() {
                    return Err(PipelineValidationError::malformed_identifier(
                        "build image",
                        &project.image,
                        "cannot be empty",
                    ));
                }
                Ok(())
            }
            ActionKind::ManualApproval { .. } => Ok(()),
        }
    }

    fn rollback_stage(&mut self, index: usize) {
        self.stages.truncate(index);
        self.produced.retain(|_, origin| origin.stage < index);
    }
}
