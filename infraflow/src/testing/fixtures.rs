//! Ready-made pipelines and composers for tests.

use crate::config::{AppConfig, Environment, ServiceLimits, SourceConfig};
use crate::core::{Action, Artifact, BuildProject};
use crate::errors::PipelineValidationError;
use crate::pipeline::{Pipeline, PipelineComposer, PipelineSettings, TestLifecycleStage};

/// Image used by fixture build projects.
pub const FIXTURE_IMAGE: &str = "aws/codebuild/standard:7.0";

/// Builds small, valid pipelines and their parts.
#[derive(Debug, Clone)]
pub struct TestPipelineFixture {
    /// Pipeline name.
    pub name: String,
    /// Source settings used by [`Self::source_action`].
    pub source: SourceConfig,
    /// Limits handed to composers.
    pub limits: ServiceLimits,
}

impl TestPipelineFixture {
    /// Creates a fixture for a pipeline with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: SourceConfig::default(),
            limits: ServiceLimits::default(),
        }
    }

    /// Uses the given limits.
    #[must_use]
    pub fn with_limits(mut self, limits: ServiceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// An empty composer in the default environment.
    #[must_use]
    pub fn composer(&self) -> PipelineComposer {
        PipelineComposer::new(
            PipelineSettings::new(&self.name),
            Environment::default(),
            self.limits,
        )
    }

    /// A source action writing `output`.
    #[must_use]
    pub fn source_action(&self, output: &str) -> Action {
        Action::source("Source", &self.source, Artifact::new(output))
    }

    /// A build action running `true`, reading `input` and writing `output`.
    #[must_use]
    pub fn build_action(&self, name: &str, input: &str, output: &str) -> Action {
        Action::build(
            name,
            BuildProject::new(FIXTURE_IMAGE).command("true"),
            Artifact::new(input),
            [Artifact::new(output)],
        )
    }

    /// A manual approval at the given run-order. Handy for filling stages
    /// without touching artifacts.
    #[must_use]
    pub fn approval(&self, name: &str, run_order: u32) -> Action {
        Action::manual_approval(name).with_run_order(run_order)
    }

    /// A create/test/delete lifecycle over `stack`, reading `template.yml`
    /// from `artifact`.
    #[must_use]
    pub fn lifecycle(&self, stack: &str, artifact: &str) -> TestLifecycleStage {
        TestLifecycleStage::new(
            stack,
            Artifact::new(artifact).at_path("template.yml"),
            BuildProject::new(FIXTURE_IMAGE).command("true"),
            Artifact::new(artifact),
        )
    }

    /// A composer already holding the `Source` stage, writing `Src`.
    ///
    /// # Errors
    ///
    /// Fails only if the fixture's own settings are invalid.
    pub fn with_source(&self) -> Result<PipelineComposer, PipelineValidationError> {
        self.composer().stage("Source", vec![self.source_action("Src")])
    }

    /// Source → Build → Test, with Test running the lifecycle over `Stack`.
    ///
    /// # Errors
    ///
    /// Fails only if the fixture's own settings are invalid.
    pub fn standard(&self) -> Result<Pipeline, PipelineValidationError> {
        self.with_source()?
            .stage("Build", vec![self.build_action("Compile", "Src", "Out")])?
            .lifecycle_stage("Test", &self.lifecycle("Stack", "Out"))?
            .build()
    }

    /// An application config matching the fixture.
    #[must_use]
    pub fn config(&self) -> AppConfig {
        AppConfig {
            pipeline_name: self.name.clone(),
            source: self.source.clone(),
            limits: self.limits,
            ..AppConfig::default()
        }
    }
}

impl Default for TestPipelineFixture {
    fn default() -> Self {
        Self::new("FixturePipeline")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_pipeline() {
        let pipeline = TestPipelineFixture::default().standard().unwrap();
        assert_eq!(pipeline.stage_names(), vec!["Source", "Build", "Test"]);
        assert_eq!(pipeline.action_count(), 5);
    }

    #[test]
    fn test_config_matches_fixture() {
        let fixture = TestPipelineFixture::new("Other").with_limits(ServiceLimits::default().with_max_stages(3));
        let config = fixture.config();
        assert_eq!(config.pipeline_name, "Other");
        assert_eq!(config.limits.max_stages, 3);
    }
}
