//! Translates a composed pipeline into a template.

use super::document::{Output, Resource, Template};
use super::intrinsics::{arn, concat, get_att, reference};
use crate::config::{Environment, ServiceLimits};
use crate::core::{Action, ActionKind, BuildProject, PolicyStatement};
use crate::errors::PipelineValidationError;
use crate::pipeline::Pipeline;
use crate::utils::logical_id;
use serde_json::{json, Value};

const CFN_CAPABILITIES: &str = "CAPABILITY_NAMED_IAM,CAPABILITY_AUTO_EXPAND";

const ARTIFACT_READ_WRITE: &[&str] = &[
    "s3:GetObject*",
    "s3:GetBucket*",
    "s3:List*",
    "s3:DeleteObject*",
    "s3:PutObject",
    "s3:PutObjectLegalHold",
    "s3:PutObjectRetention",
    "s3:PutObjectTagging",
    "s3:PutObjectVersionTagging",
    "s3:Abort*",
];

const STACK_ACTIONS: &[&str] = &[
    "cloudformation:CreateStack",
    "cloudformation:DeleteStack",
    "cloudformation:DescribeStack*",
    "cloudformation:GetStackPolicy",
    "cloudformation:GetTemplate*",
    "cloudformation:SetStackPolicy",
    "cloudformation:UpdateStack",
    "cloudformation:ValidateTemplate",
];

/// Name of the output carrying the pipeline ARN.
pub const PIPELINE_ARN_OUTPUT: &str = "PipelineArn";

/// Logical ids shared across the pipeline's resources.
struct Ids {
    pipeline: String,
    bucket: String,
    role: String,
    policy: String,
}

impl Ids {
    fn new(name: &str) -> Self {
        Self {
            pipeline: logical_id(&[name]),
            bucket: logical_id(&[name, "ArtifactsBucket"]),
            role: logical_id(&[name, "Role"]),
            policy: logical_id(&[name, "RoleDefaultPolicy"]),
        }
    }
}

/// Synthesizes the template for a pipeline.
///
/// The result is a pure function of `pipeline` and `limits`: no clock, no
/// randomness, no environment lookups. The description is re-validated
/// first, so a deserialized pipeline with a dangling artifact or malformed
/// identifier fails here rather than at the service.
///
/// # Errors
///
/// Returns a [`PipelineValidationError`] when the description is invalid.
pub fn synthesize(
    pipeline: &Pipeline,
    limits: &ServiceLimits,
) -> Result<Template, PipelineValidationError> {
    pipeline.validate(limits)?;

    let name = pipeline.name();
    let env = pipeline.environment();
    let ids = Ids::new(name);
    let mut template = Template::new(Some(format!("Delivery pipeline {name}")));

    template.add_resource(&ids.bucket, artifacts_bucket())?;
    template.add_resource(&ids.role, role("codepipeline.amazonaws.com"))?;

    let mut connection_arns: Vec<String> = Vec::new();
    let mut project_ids: Vec<String> = Vec::new();
    let mut stack_names: Vec<String> = Vec::new();
    let mut deploy_role_ids: Vec<String> = Vec::new();
    let mut stages_json = Vec::with_capacity(pipeline.stages().len());

    for stage in pipeline.stages() {
        let mut actions_json = Vec::with_capacity(stage.len());

        for action in stage.actions_by_run_order() {
            let path = [name, stage.name.as_str(), action.name.as_str()];

            let configuration = match &action.kind {
                ActionKind::Source {
                    connection_arn,
                    owner,
                    repo,
                    branch,
                    trigger_on_push,
                } => {
                    if !connection_arns.contains(connection_arn) {
                        connection_arns.push(connection_arn.clone());
                    }
                    Some(json!({
                        "ConnectionArn": connection_arn,
                        "FullRepositoryId": format!("{owner}/{repo}"),
                        "BranchName": branch,
                        "DetectChanges": trigger_on_push,
                        "OutputArtifactFormat": "CODE_ZIP",
                    }))
                }
                ActionKind::Build { project } | ActionKind::RunTests { project } => {
                    let project_id = child_id(&path, "Project");
                    add_build_project(&mut template, &path, &project_id, project, &ids, env)?;
                    project_ids.push(project_id.clone());
                    Some(json!({ "ProjectName": reference(&project_id) }))
                }
                ActionKind::CreateResources {
                    stack_name,
                    template_path,
                    admin_permissions,
                    parameter_overrides,
                } => {
                    let role_id = add_deployment_role(&mut template, &path, *admin_permissions)?;
                    remember(&mut stack_names, stack_name);
                    deploy_role_ids.push(role_id.clone());

                    let mut config = json!({
                        "ActionMode": "CREATE_UPDATE",
                        "StackName": stack_name,
                        "TemplatePath": template_path.to_string(),
                        "RoleArn": get_att(&role_id, "Arn"),
                        "Capabilities": CFN_CAPABILITIES,
                    });
                    if !parameter_overrides.is_empty() {
                        let overrides: serde_json::Map<String, Value> = parameter_overrides
                            .iter()
                            .map(|(key, value)| (key.clone(), json!(value)))
                            .collect();
                        config["ParameterOverrides"] = json!(Value::Object(overrides).to_string());
                    }
                    Some(config)
                }
                ActionKind::DeleteResources {
                    stack_name,
                    admin_permissions,
                } => {
                    let role_id = add_deployment_role(&mut template, &path, *admin_permissions)?;
                    remember(&mut stack_names, stack_name);
                    deploy_role_ids.push(role_id.clone());

                    Some(json!({
                        "ActionMode": "DELETE_ONLY",
                        "StackName": stack_name,
                        "RoleArn": get_att(&role_id, "Arn"),
                    }))
                }
                ActionKind::ManualApproval { summary } => {
                    summary.as_ref().map(|text| json!({ "CustomData": text }))
                }
            };

            actions_json.push(action_json(action, configuration));
        }

        stages_json.push(json!({ "Name": stage.name, "Actions": actions_json }));
    }

    let mut statements = vec![json!({
        "Effect": "Allow",
        "Action": ARTIFACT_READ_WRITE,
        "Resource": bucket_resources(&ids.bucket),
    })];

    if !connection_arns.is_empty() {
        statements.push(json!({
            "Effect": "Allow",
            "Action": ["codeconnections:UseConnection", "codestar-connections:UseConnection"],
            "Resource": connection_arns,
        }));
    }
    if !project_ids.is_empty() {
        statements.push(json!({
            "Effect": "Allow",
            "Action": ["codebuild:BatchGetBuilds", "codebuild:StartBuild", "codebuild:StopBuild"],
            "Resource": project_ids.iter().map(|id| get_att(id, "Arn")).collect::<Vec<_>>(),
        }));
    }
    if !stack_names.is_empty() {
        statements.push(json!({
            "Effect": "Allow",
            "Action": STACK_ACTIONS,
            "Resource": stack_names
                .iter()
                .map(|stack| arn("cloudformation", &env.region, &env.account, json!(format!("stack/{stack}/*"))))
                .collect::<Vec<_>>(),
        }));
        statements.push(json!({
            "Effect": "Allow",
            "Action": "iam:PassRole",
            "Resource": deploy_role_ids.iter().map(|id| get_att(id, "Arn")).collect::<Vec<_>>(),
        }));
    }

    template.add_resource(&ids.policy, inline_policy(&ids.policy, &ids.role, statements))?;

    let settings = pipeline.settings();
    template.add_resource(
        &ids.pipeline,
        Resource::new(
            "AWS::CodePipeline::Pipeline",
            json!({
                "Name": settings.name,
                "RoleArn": get_att(&ids.role, "Arn"),
                "RestartExecutionOnUpdate": settings.restart_execution_on_update,
                "ArtifactStore": { "Type": "S3", "Location": reference(&ids.bucket) },
                "Stages": stages_json,
            }),
        )
        .depends_on(&ids.policy)
        .depends_on(&ids.role),
    )?;

    template.add_output(
        PIPELINE_ARN_OUTPUT,
        Output {
            value: arn("codepipeline", &env.region, &env.account, reference(&ids.pipeline)),
            description: Some(format!("ARN of pipeline {name}")),
        },
    );

    tracing::info!(
        pipeline = name,
        stages = pipeline.stages().len(),
        actions = pipeline.action_count(),
        resources = template.resources.len(),
        "Pipeline template synthesized"
    );

    Ok(template)
}

fn child_id(path: &[&str], suffix: &str) -> String {
    let mut parts = path.to_vec();
    parts.push(suffix);
    logical_id(&parts)
}

fn remember(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

fn action_json(action: &Action, configuration: Option<Value>) -> Value {
    let mut value = json!({
        "Name": action.name,
        "ActionTypeId": {
            "Category": action.category().to_string(),
            "Owner": "AWS",
            "Provider": action.kind.provider(),
            "Version": "1",
        },
        "RunOrder": action.run_order,
    });

    if let Some(config) = configuration {
        value["Configuration"] = config;
    }
    if !action.inputs.is_empty() {
        value["InputArtifacts"] = action
            .inputs
            .iter()
            .map(|a| json!({ "Name": a.name() }))
            .collect();
    }
    if !action.outputs.is_empty() {
        value["OutputArtifacts"] = action
            .outputs
            .iter()
            .map(|a| json!({ "Name": a.name() }))
            .collect();
    }
    value
}

fn artifacts_bucket() -> Resource {
    Resource::new(
        "AWS::S3::Bucket",
        json!({
            "BucketEncryption": {
                "ServerSideEncryptionConfiguration": [
                    { "ServerSideEncryptionByDefault": { "SSEAlgorithm": "aws:kms" } }
                ]
            },
            "PublicAccessBlockConfiguration": {
                "BlockPublicAcls": true,
                "BlockPublicPolicy": true,
                "IgnorePublicAcls": true,
                "RestrictPublicBuckets": true,
            },
        }),
    )
    .with_removal_policy("Retain")
}

fn bucket_resources(bucket_id: &str) -> Value {
    json!([
        get_att(bucket_id, "Arn"),
        concat(vec![get_att(bucket_id, "Arn"), json!("/*")]),
    ])
}

/// A role assumable by `service`.
pub(crate) fn role(service: &str) -> Resource {
    Resource::new(
        "AWS::IAM::Role",
        json!({
            "AssumeRolePolicyDocument": {
                "Version": "2012-10-17",
                "Statement": [{
                    "Action": "sts:AssumeRole",
                    "Effect": "Allow",
                    "Principal": { "Service": service },
                }],
            }
        }),
    )
}

/// An inline policy attached to `role_id`.
pub(crate) fn inline_policy(policy_id: &str, role_id: &str, statements: Vec<Value>) -> Resource {
    Resource::new(
        "AWS::IAM::Policy",
        json!({
            "PolicyName": policy_id,
            "PolicyDocument": { "Version": "2012-10-17", "Statement": statements },
            "Roles": [reference(role_id)],
        }),
    )
}

fn add_build_project(
    template: &mut Template,
    path: &[&str],
    project_id: &str,
    project: &BuildProject,
    ids: &Ids,
    env: &Environment,
) -> Result<(), PipelineValidationError> {
    let role_id = child_id(path, "ProjectRole");
    let policy_id = child_id(path, "ProjectRoleDefaultPolicy");

    let mut statements = vec![
        json!({
            "Effect": "Allow",
            "Action": ["logs:CreateLogGroup", "logs:CreateLogStream", "logs:PutLogEvents"],
            "Resource": arn("logs", &env.region, &env.account, json!("log-group:/aws/codebuild/*")),
        }),
        json!({
            "Effect": "Allow",
            "Action": ["s3:GetObject*", "s3:GetBucket*", "s3:List*", "s3:PutObject"],
            "Resource": bucket_resources(&ids.bucket),
        }),
    ];
    statements.extend(project.policy_statements.iter().map(PolicyStatement::to_json));

    template.add_resource(&role_id, role("codebuild.amazonaws.com"))?;
    template.add_resource(&policy_id, inline_policy(&policy_id, &role_id, statements))?;
    template.add_resource(
        project_id,
        Resource::new(
            "AWS::CodeBuild::Project",
            json!({
                "Artifacts": { "Type": "CODEPIPELINE" },
                "Cache": { "Type": "NO_CACHE" },
                "EncryptionKey": "alias/aws/s3",
                "Environment": {
                    "ComputeType": "BUILD_GENERAL1_SMALL",
                    "Image": project.image,
                    "ImagePullCredentialsType": "CODEBUILD",
                    "PrivilegedMode": false,
                    "Type": "LINUX_CONTAINER",
                },
                "ServiceRole": get_att(&role_id, "Arn"),
                "Source": {
                    "BuildSpec": project.buildspec().to_string(),
                    "Type": "CODEPIPELINE",
                },
            }),
        )
        .depends_on(&policy_id),
    )
}

fn add_deployment_role(
    template: &mut Template,
    path: &[&str],
    admin_permissions: bool,
) -> Result<String, PipelineValidationError> {
    let role_id = child_id(path, "DeploymentRole");
    template.add_resource(&role_id, role("cloudformation.amazonaws.com"))?;

    if admin_permissions {
        let policy_id = child_id(path, "DeploymentRoleDefaultPolicy");
        template.add_resource(
            &policy_id,
            inline_policy(
                &policy_id,
                &role_id,
                vec![json!({ "Effect": "Allow", "Action": "*", "Resource": "*" })],
            ),
        )?;
    }

    Ok(role_id)
}
