//! The reference application: a pipeline that validates a resource
//! template, stands the resources up, tests them, and tears them down.

use crate::assembly::App;
use crate::config::AppConfig;
use crate::core::{Action, Artifact, BuildProject, PolicyStatement};
use crate::errors::PipelineValidationError;
use crate::pipeline::{Pipeline, PipelineComposer, TestLifecycleStage};
use crate::resources::{
    Bucket, Instance, MachineImage, ResourceRef, StackDefinition, SubnetConfig, SubnetKind, Vpc,
};

/// Name of the stack holding the pipeline.
pub const PIPELINE_STACK_NAME: &str = "TestPipelineStack";

/// Artifact carrying the checked-out repository.
pub const SOURCE_ARTIFACT: &str = "SourceArtifact";

/// Artifact carrying the validated template.
pub const BUILD_ARTIFACT: &str = "BuildArtifact";

/// Instance type of the throwaway test instance.
pub const TEST_INSTANCE_TYPE: &str = "t2.micro";

/// Builds the template validation project.
#[must_use]
pub fn validate_template_project(config: &AppConfig) -> BuildProject {
    let template = &config.template_file;
    BuildProject::new(&config.build_image)
        .commands([
            "echo 'Current directory: $(pwd)'".to_string(),
            "ls -la".to_string(),
            format!("find . -name '{template}' -type f"),
            "echo 'Validating CloudFormation template...'".to_string(),
            format!(
                "if [ -f '{template}' ]; then aws cloudformation validate-template --template-body file://{template} \
                 && echo 'Template validation successful'; else echo 'ERROR: {template} not found'; ls -la; exit 1; fi"
            ),
            "echo 'Build phase completed'".to_string(),
        ])
        .artifact_files([template.clone()], ".")
        .with_policy(PolicyStatement::allow(
            ["cloudformation:ValidateTemplate", "cloudformation:DescribeStacks"],
            ["*"],
        ))
}

/// Builds the project that checks the created resources.
#[must_use]
pub fn resource_test_project(config: &AppConfig) -> BuildProject {
    BuildProject::new(&config.build_image)
        .commands([
            "echo 'Testing created resources...'",
            "aws s3 ls | grep test-bucket || echo 'Bucket test passed'",
            "aws ec2 describe-instances --filters Name=instance-state-name,Values=running \
             --query 'Reservations[].Instances[].InstanceId' --output text | grep i- || echo 'EC2 test passed'",
            "echo 'All tests completed successfully'",
        ])
        .with_policy(PolicyStatement::allow(
            ["s3:ListAllMyBuckets", "ec2:DescribeInstances"],
            ["*"],
        ))
}

/// Composes Source → Build → Test, where Test creates, tests and deletes
/// the resource stack.
///
/// # Errors
///
/// Fails if the configuration produces an invalid pipeline, e.g. a malformed
/// connection ARN or pipeline name.
pub fn test_pipeline(config: &AppConfig) -> Result<Pipeline, PipelineValidationError> {
    let source = Artifact::new(SOURCE_ARTIFACT);
    let build = Artifact::new(BUILD_ARTIFACT);

    let mut lifecycle = TestLifecycleStage::new(
        &config.test_stack_name,
        build.at_path(&config.template_file),
        resource_test_project(config),
        build.clone(),
    )
    .with_admin_permissions(true);
    if config.require_approval_before_delete {
        lifecycle = lifecycle.with_approval(format!(
            "Tests finished. Approve to delete stack {}.",
            config.test_stack_name
        ));
    }

    PipelineComposer::from_config(config)
        .stage("Source", vec![Action::source("Source", &config.source, source.clone())])?
        .stage(
            "Build",
            vec![Action::build(
                "ValidateTemplate",
                validate_template_project(config),
                source,
                [build],
            )],
        )?
        .lifecycle_stage("Test", &lifecycle)?
        .build()
}

/// The disposable resources the pipeline deploys and deletes.
///
/// # Errors
///
/// Fails if the configured stack name is invalid.
pub fn test_resources_stack(config: &AppConfig) -> Result<StackDefinition, PipelineValidationError> {
    let mut stack = StackDefinition::new(&config.test_stack_name)?;

    stack.add_bucket("TestBucket", Bucket::disposable())?;
    stack.add_vpc(
        "TestVpc",
        Vpc::default()
            .with_max_azs(1)
            .with_nat_gateways(0)
            .with_subnets(vec![SubnetConfig::new("Public", SubnetKind::Public, 24)]),
    )?;
    stack.add_instance(
        "TestInstance",
        Instance::new("TestVpc", TEST_INSTANCE_TYPE, MachineImage::latest_al2023()),
    )?;

    stack.add_output("TestBucketName", ResourceRef::Id("TestBucket".into()), None)?;
    stack.add_output("TestInstanceId", ResourceRef::Id("TestInstance".into()), None)?;
    stack.add_output("TestVpcId", ResourceRef::Id("TestVpc".into()), None)?;

    Ok(stack)
}

/// The whole application: the pipeline stack and the resource stack.
///
/// # Errors
///
/// Fails if either stack is invalid under `config`.
pub fn app(config: &AppConfig) -> Result<App, PipelineValidationError> {
    let mut app = App::new(&config.pipeline_name, config.limits);
    app.add_pipeline_stack(PIPELINE_STACK_NAME, test_pipeline(config)?)?;
    app.add_stack(test_resources_stack(config)?)?;
    Ok(app)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ActionKind;
    use crate::pipeline::{ExecutionPlan, TestLifecycle};
    use crate::testing::{assert_run_order_ascending, assert_stage_order};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_reference_pipeline_layout() {
        let pipeline = test_pipeline(&AppConfig::default()).unwrap();
        assert_stage_order(&pipeline, &["Source", "Build", "Test"]);
        assert_run_order_ascending(
            &pipeline,
            "Test",
            &["CreateTestResources", "RunTests", "DeleteTestResources"],
        );
        assert_eq!(pipeline.name(), "TestPipeline");
        assert!(pipeline.settings().restart_execution_on_update);
    }

    #[test]
    fn test_build_publishes_template() {
        let pipeline = test_pipeline(&AppConfig::default()).unwrap();
        let build = pipeline.stage("Build").unwrap().action("ValidateTemplate").unwrap();

        assert_eq!(build.outputs, vec![Artifact::new(BUILD_ARTIFACT)]);
        let project = build.kind.project().unwrap();
        assert_eq!(project.image, "aws/codebuild/standard:6.0");
        assert_eq!(project.artifact_files, vec!["template.yml".to_string()]);
    }

    #[test]
    fn test_create_reads_template_from_build() {
        let pipeline = test_pipeline(&AppConfig::default()).unwrap();
        let create = pipeline.stage("Test").unwrap().action("CreateTestResources").unwrap();
        match &create.kind {
            ActionKind::CreateResources {
                stack_name,
                template_path,
                admin_permissions,
                ..
            } => {
                assert_eq!(stack_name, "TestResourcesStack");
                assert_eq!(template_path.to_string(), "BuildArtifact::template.yml");
                assert!(admin_permissions);
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn test_approval_gate_is_optional() {
        let config = AppConfig {
            require_approval_before_delete: true,
            ..AppConfig::default()
        };
        let pipeline = test_pipeline(&config).unwrap();
        let test = pipeline.stage("Test").unwrap();
        assert_eq!(test.len(), 4);
        assert!(TestLifecycle::from_stage(test).unwrap().has_approval_gate());

        let plan = ExecutionPlan::from_pipeline(&pipeline);
        assert_eq!(
            plan.happens_before(("Test", "ApproveDelete"), ("Test", "DeleteTestResources")),
            Some(true)
        );
    }

    #[test]
    fn test_resources_stack_contents() {
        let stack = test_resources_stack(&AppConfig::default()).unwrap();
        assert_eq!(stack.name(), "TestResourcesStack");
        assert_eq!(stack.resources().len(), 3);

        let outputs: Vec<&str> = stack.outputs().iter().map(|o| o.name.as_str()).collect();
        assert_eq!(outputs, vec!["TestBucketName", "TestInstanceId", "TestVpcId"]);
    }

    #[test]
    fn test_bad_connection_arn_is_rejected() {
        let mut config = AppConfig::default();
        config.source.connection_arn = "arn:aws:s3:::bucket".to_string();
        assert!(test_pipeline(&config).is_err());
    }
}
