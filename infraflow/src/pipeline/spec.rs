//! The composed, immutable pipeline description.

use super::PipelineComposer;
use crate::config::{Environment, ServiceLimits};
use crate::core::{Artifact, Stage};
use crate::errors::PipelineValidationError;
use serde::{Deserialize, Serialize};

/// Pipeline-level settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// The pipeline name.
    pub name: String,
    /// Restart a running execution when the definition is updated.
    #[serde(default)]
    pub restart_execution_on_update: bool,
}

impl PipelineSettings {
    /// Creates settings for a pipeline with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            restart_execution_on_update: false,
        }
    }

    /// Sets `restart_execution_on_update`.
    #[must_use]
    pub fn restart_on_update(mut self, enabled: bool) -> Self {
        self.restart_execution_on_update = enabled;
        self
    }
}

/// A complete pipeline description.
///
/// Only [`PipelineComposer::build`] and deserialization produce one, and no
/// method mutates it. Stage order is execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    settings: PipelineSettings,
    environment: Environment,
    stages: Vec<Stage>,
}

impl Pipeline {
    pub(crate) fn new(settings: PipelineSettings, environment: Environment, stages: Vec<Stage>) -> Self {
        Self {
            settings,
            environment,
            stages,
        }
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.settings.name
    }

    /// Returns the pipeline settings.
    #[must_use]
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Returns the target environment.
    #[must_use]
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Returns the stages in execution order.
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Looks up a stage by name.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    /// Total number of actions across all stages.
    #[must_use]
    pub fn action_count(&self) -> usize {
        self.stages.iter().map(Stage::len).sum()
    }

    /// Every artifact produced, in stage order.
    #[must_use]
    pub fn artifacts(&self) -> Vec<&Artifact> {
        self.stages
            .iter()
            .flat_map(|s| s.actions.iter())
            .flat_map(|a| a.outputs.iter())
            .collect()
    }

    /// Re-checks the description against `limits` by composing it again.
    ///
    /// A pipeline that came out of a composer with the same limits always
    /// passes; a deserialized one may not.
    pub fn validate(&self, limits: &ServiceLimits) -> Result<(), PipelineValidationError> {
        let mut composer =
            PipelineComposer::new(self.settings.clone(), self.environment.clone(), *limits);
        for stage in &self.stages {
            composer.add_stage(&stage.name, stage.actions.clone())?;
        }
        composer.build().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceConfig;
    use crate::core::Action;
    use crate::errors::{DANGLING_ARTIFACT, MALFORMED_ID};

    fn pipeline() -> Pipeline {
        PipelineComposer::new(
            PipelineSettings::new("p").restart_on_update(true),
            Environment::default(),
            ServiceLimits::default(),
        )
        .stage(
            "Source",
            vec![Action::source("Source", &SourceConfig::default(), Artifact::new("Src"))],
        )
        .unwrap()
        .stage("Approve", vec![Action::manual_approval("Approve")])
        .unwrap()
        .build()
        .unwrap()
    }

    #[test]
    fn test_accessors() {
        let pipeline = pipeline();
        assert_eq!(pipeline.name(), "p");
        assert!(pipeline.settings().restart_execution_on_update);
        assert_eq!(pipeline.stage_names(), vec!["Source", "Approve"]);
        assert_eq!(pipeline.action_count(), 2);
        assert_eq!(pipeline.artifacts(), vec![&Artifact::new("Src")]);
        assert!(pipeline.stage("Approve").is_some());
    }

    #[test]
    fn test_validate_composed_pipeline() {
        assert!(pipeline().validate(&ServiceLimits::default()).is_ok());
    }

    #[test]
    fn test_validate_deserialized_pipeline_with_dangling_artifact() {
        let mut json = serde_json::to_value(pipeline()).unwrap();
        json["stages"][1]["actions"][0]["inputs"] = serde_json::json!(["Nope"]);
        let tampered: Pipeline = serde_json::from_value(json).unwrap();

        let err = tampered.validate(&ServiceLimits::default()).unwrap_err();
        assert_eq!(err.code(), Some(DANGLING_ARTIFACT));
    }

    #[test]
    fn test_validate_deserialized_pipeline_with_outputs_on_approval() {
        let mut json = serde_json::to_value(pipeline()).unwrap();
        json["stages"][1]["actions"][0]["outputs"] = serde_json::json!(["Decision"]);
        let tampered: Pipeline = serde_json::from_value(json).unwrap();

        let err = tampered.validate(&ServiceLimits::default()).unwrap_err();
        assert_eq!(err.code(), Some(MALFORMED_ID));
    }

    #[test]
    fn test_validate_against_tighter_limits() {
        let limits = ServiceLimits::default().with_max_stages(1);
        assert!(pipeline().validate(&limits).is_err());
    }
}
