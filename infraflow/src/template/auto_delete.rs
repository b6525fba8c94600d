//! Emptying buckets before the stack deletes them.
//!
//! The provisioning engine refuses to delete a bucket that still holds
//! objects. A bucket declared with `auto_delete_objects` therefore gets a
//! custom resource whose handler empties it on delete. The custom resource
//! depends on the bucket (through its policy), so on teardown it is removed,
//! and the bucket emptied, before the bucket itself.
//!
//! One handler function and role serve every such bucket in a stack.

use super::document::{Resource, Template};
use super::intrinsics::{concat, get_att, partition, reference};
use super::pipeline_template::role;
use crate::errors::PipelineValidationError;
use crate::utils::logical_id;
use serde_json::json;

/// Tag marking a bucket whose objects the handler may remove.
pub const AUTO_DELETE_TAG: &str = "infraflow:auto-delete-objects";

/// Resource type of the per-bucket custom resource.
pub const AUTO_DELETE_RESOURCE_TYPE: &str = "Custom::S3AutoDeleteObjects";

/// Runtime of the handler function.
const HANDLER_RUNTIME: &str = "python3.12";

/// Inline handler source. It only empties buckets carrying
/// [`AUTO_DELETE_TAG`], so a bucket that lost the flag is left alone.
const HANDLER_SOURCE: &str = r#"import boto3
import cfnresponse

TAG = {'Key': 'infraflow:auto-delete-objects', 'Value': 'true'}


def tagged(s3, name):
    try:
        return TAG in s3.get_bucket_tagging(Bucket=name).get('TagSet', [])
    except s3.exceptions.ClientError:
        return False


def handler(event, context):
    try:
        if event['RequestType'] == 'Delete':
            name = event['ResourceProperties']['BucketName']
            if tagged(boto3.client('s3'), name):
                boto3.resource('s3').Bucket(name).object_versions.delete()
        cfnresponse.send(event, context, cfnresponse.SUCCESS, {})
    except Exception as err:
        cfnresponse.send(event, context, cfnresponse.FAILED, {'Error': str(err)})
"#;

/// Logical id of the shared handler role.
#[must_use]
pub fn provider_role_id() -> String {
    logical_id(&["AutoDeleteObjectsProvider", "Role"])
}

/// Logical id of the shared handler function.
#[must_use]
pub fn provider_handler_id() -> String {
    logical_id(&["AutoDeleteObjectsProvider", "Handler"])
}

/// Logical id of the custom resource emptying bucket `id`.
#[must_use]
pub fn custom_resource_id(id: &str) -> String {
    logical_id(&[id, "AutoDeleteObjectsCustomResource"])
}

/// Declares the handler (once per template), a bucket policy letting it
/// empty `bucket_id`, and the custom resource that triggers it.
pub(crate) fn emit_auto_delete(
    template: &mut Template,
    id: &str,
    bucket_id: &str,
) -> Result<(), PipelineValidationError> {
    let role_id = provider_role_id();
    let handler_id = provider_handler_id();

    if template.resource(&handler_id).is_none() {
        let mut handler_role = role("lambda.amazonaws.com");
        handler_role.properties["ManagedPolicyArns"] = json!([concat(vec![
            json!("arn:"),
            partition(),
            json!(":iam::aws:policy/service-role/AWSLambdaBasicExecutionRole"),
        ])]);
        template.add_resource(&role_id, handler_role)?;
        template.add_resource(
            &handler_id,
            Resource::new(
                "AWS::Lambda::Function",
                json!({
                    "Code": { "ZipFile": HANDLER_SOURCE },
                    "Handler": "index.handler",
                    "MemorySize": 128,
                    "Role": get_att(&role_id, "Arn"),
                    "Runtime": HANDLER_RUNTIME,
                    "Timeout": 900,
                    "Description": "Empties tagged buckets before they are deleted",
                }),
            )
            .depends_on(&role_id),
        )?;
    }

    let policy_id = logical_id(&[id, "Policy"]);
    let bucket_arn = get_att(bucket_id, "Arn");
    template.add_resource(
        &policy_id,
        Resource::new(
            "AWS::S3::BucketPolicy",
            json!({
                "Bucket": reference(bucket_id),
                "PolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Action": [
                            "s3:DeleteObject*",
                            "s3:GetBucket*",
                            "s3:List*",
                            "s3:PutBucketPolicy",
                        ],
                        "Effect": "Allow",
                        "Principal": { "AWS": get_att(&role_id, "Arn") },
                        "Resource": [bucket_arn.clone(), concat(vec![bucket_arn, json!("/*")])],
                    }],
                },
            }),
        ),
    )?;

    template.add_resource(
        custom_resource_id(id),
        Resource::new(
            AUTO_DELETE_RESOURCE_TYPE,
            json!({
                "ServiceToken": get_att(&handler_id, "Arn"),
                "BucketName": reference(bucket_id),
            }),
        )
        .depends_on(&policy_id)
        .with_removal_policy("Delete"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn template_with_bucket(ids: &[&str]) -> Template {
        let mut template = Template::new(None);
        for id in ids {
            let bucket_id = logical_id(&[id, "Resource"]);
            template
                .add_resource(&bucket_id, Resource::new("AWS::S3::Bucket", json!({})))
                .unwrap();
            emit_auto_delete(&mut template, id, &bucket_id).unwrap();
        }
        template
    }

    #[test]
    fn test_custom_resource_targets_bucket() {
        let template = template_with_bucket(&["Data"]);
        let bucket_id = logical_id(&["Data", "Resource"]);
        let custom = template.resource(&custom_resource_id("Data")).unwrap();

        assert_eq!(custom.resource_type, AUTO_DELETE_RESOURCE_TYPE);
        assert_eq!(custom.properties["BucketName"], reference(&bucket_id));
        assert_eq!(
            custom.properties["ServiceToken"],
            get_att(&provider_handler_id(), "Arn")
        );
        assert_eq!(custom.depends_on, vec![logical_id(&["Data", "Policy"])]);
    }

    #[test]
    fn test_handler_can_empty_the_bucket() {
        let template = template_with_bucket(&["Data"]);
        let policy = template.resource(&logical_id(&["Data", "Policy"])).unwrap();
        let statement = &policy.properties["PolicyDocument"]["Statement"][0];

        assert_eq!(statement["Principal"]["AWS"], get_att(&provider_role_id(), "Arn"));
        assert!(statement["Action"]
            .as_array()
            .unwrap()
            .contains(&json!("s3:DeleteObject*")));

        let handler = template.resource(&provider_handler_id()).unwrap();
        let source = handler.properties["Code"]["ZipFile"].as_str().unwrap();
        assert!(source.contains(AUTO_DELETE_TAG));
        assert!(source.contains("object_versions.delete()"));
    }

    #[test]
    fn test_handler_is_shared() {
        let template = template_with_bucket(&["A", "B"]);
        assert_eq!(template.resources_of_type("AWS::Lambda::Function").len(), 1);
        assert_eq!(template.resources_of_type(AUTO_DELETE_RESOURCE_TYPE).len(), 2);
        assert_eq!(template.resources_of_type("AWS::S3::BucketPolicy").len(), 2);
    }
}
