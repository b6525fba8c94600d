//! Translates a resource stack into a template.

use super::auto_delete::{emit_auto_delete, AUTO_DELETE_TAG};
use super::document::{Output, Parameter, Resource, Template};
use super::intrinsics::{availability_zone, get_att, reference};
use super::pipeline_template::role;
use crate::errors::PipelineValidationError;
use crate::resources::{
    Bucket, Instance, ResourceRef, StackDefinition, StackResource, SubnetKind, SubnetPlacement, Vpc,
    IMAGE_PARAMETER_TYPE,
};
use crate::utils::logical_id;
use serde_json::{json, Value};
use std::collections::HashMap;

/// Logical id of a construct's primary resource.
#[must_use]
pub fn primary_logical_id(id: &str) -> String {
    logical_id(&[id, "Resource"])
}

/// A subnet as emitted, for placing instances.
struct EmittedSubnet {
    kind: SubnetKind,
    az_index: usize,
    logical_id: String,
}

/// Synthesizes the template for a resource stack.
///
/// Like pipeline synthesis this is deterministic: the same definition always
/// renders the same bytes.
///
/// # Errors
///
/// Returns a [`PipelineValidationError`] if the definition is inconsistent,
/// e.g. after deserialization from hand-edited JSON.
pub fn synthesize_stack(stack: &StackDefinition) -> Result<Template, PipelineValidationError> {
    let mut template = Template::new(Some(format!("Resources of stack {}", stack.name())));
    let mut subnets: HashMap<&str, Vec<EmittedSubnet>> = HashMap::new();

    for (id, resource) in stack.resources() {
        match resource {
            StackResource::Bucket(bucket) => emit_bucket(&mut template, id, bucket)?,
            StackResource::Vpc(vpc) => {
                let emitted = emit_vpc(&mut template, stack.name(), id, vpc)?;
                subnets.insert(id.as_str(), emitted);
            }
            StackResource::Instance(instance) => {
                let available = subnets.get(instance.vpc.as_str()).ok_or_else(|| {
                    PipelineValidationError::malformed_identifier(
                        "VPC reference",
                        &instance.vpc,
                        "must be declared before the instances placed in it",
                    )
                })?;
                emit_instance(&mut template, stack.name(), id, instance, available)?;
            }
        }
    }

    for output in stack.outputs() {
        let target = primary_logical_id(output.value.resource());
        if template.resource(&target).is_none() {
            return Err(PipelineValidationError::malformed_identifier(
                "output reference",
                output.value.resource(),
                "no such resource",
            ));
        }
        let value = match &output.value {
            ResourceRef::Id(_) => reference(&target),
            ResourceRef::Attribute { name, .. } => get_att(&target, name),
        };
        template.add_output(
            &output.name,
            Output {
                value,
                description: output.description.clone(),
            },
        );
    }

    tracing::info!(
        stack = stack.name(),
        resources = template.resources.len(),
        outputs = template.outputs.len(),
        "Stack template synthesized"
    );

    Ok(template)
}

fn name_tag(stack: &str, path: &str) -> Value {
    json!([{ "Key": "Name", "Value": format!("{stack}/{path}") }])
}

fn emit_bucket(template: &mut Template, id: &str, bucket: &Bucket) -> Result<(), PipelineValidationError> {
    let mut properties = serde_json::Map::new();
    if bucket.versioned {
        properties.insert(
            "VersioningConfiguration".into(),
            json!({ "Status": "Enabled" }),
        );
    }
    if bucket.auto_delete_objects {
        properties.insert(
            "Tags".into(),
            json!([{ "Key": AUTO_DELETE_TAG, "Value": "true" }]),
        );
    }

    let bucket_id = primary_logical_id(id);
    template.add_resource(
        &bucket_id,
        Resource::new("AWS::S3::Bucket", Value::Object(properties))
            .with_removal_policy(bucket.removal_policy.deletion_policy()),
    )?;
    if bucket.auto_delete_objects {
        emit_auto_delete(template, id, &bucket_id)?;
    }
    Ok(())
}

fn emit_vpc(
    template: &mut Template,
    stack: &str,
    id: &str,
    vpc: &Vpc,
) -> Result<Vec<EmittedSubnet>, PipelineValidationError> {
    let placements = vpc.layout(id)?;
    let vpc_id = primary_logical_id(id);

    template.add_resource(
        &vpc_id,
        Resource::new(
            "AWS::EC2::VPC",
            json!({
                "CidrBlock": vpc.cidr,
                "EnableDnsHostnames": true,
                "EnableDnsSupport": true,
                "InstanceTenancy": "default",
                "Tags": name_tag(stack, id),
            }),
        ),
    )?;

    let has_public = vpc.has_kind(SubnetKind::Public);
    let igw_id = logical_id(&[id, "IGW"]);
    let attachment_id = logical_id(&[id, "VPCGW"]);
    if has_public {
        template.add_resource(
            &igw_id,
            Resource::new("AWS::EC2::InternetGateway", json!({ "Tags": name_tag(stack, id) })),
        )?;
        template.add_resource(
            &attachment_id,
            Resource::new(
                "AWS::EC2::VPCGatewayAttachment",
                json!({ "VpcId": reference(&vpc_id), "InternetGatewayId": reference(&igw_id) }),
            ),
        )?;
    }

    let nat_count = vpc.effective_nat_gateways();
    let mut nat_gateways: Vec<String> = Vec::with_capacity(nat_count);
    let mut emitted = Vec::with_capacity(placements.len());

    // Public subnets first so egress routes can point at their NAT gateways.
    let (public, rest): (Vec<&SubnetPlacement>, Vec<&SubnetPlacement>) =
        placements.iter().partition(|p| p.kind == SubnetKind::Public);

    for placement in public.into_iter().chain(rest) {
        let segment = placement.segment();
        let subnet_id = logical_id(&[id, &segment, "Subnet"]);
        let table_id = logical_id(&[id, &segment, "RouteTable"]);
        let association_id = logical_id(&[id, &segment, "RouteTableAssociation"]);
        let path = format!("{id}/{segment}");

        template.add_resource(
            &subnet_id,
            Resource::new(
                "AWS::EC2::Subnet",
                json!({
                    "AvailabilityZone": availability_zone(placement.az_index),
                    "CidrBlock": placement.cidr,
                    "MapPublicIpOnLaunch": placement.kind == SubnetKind::Public,
                    "Tags": name_tag(stack, &path),
                    "VpcId": reference(&vpc_id),
                }),
            ),
        )?;
        template.add_resource(
            &table_id,
            Resource::new(
                "AWS::EC2::RouteTable",
                json!({ "Tags": name_tag(stack, &path), "VpcId": reference(&vpc_id) }),
            ),
        )?;
        template.add_resource(
            &association_id,
            Resource::new(
                "AWS::EC2::SubnetRouteTableAssociation",
                json!({ "RouteTableId": reference(&table_id), "SubnetId": reference(&subnet_id) }),
            ),
        )?;

        match placement.kind {
            SubnetKind::Public => {
                template.add_resource(
                    logical_id(&[id, &segment, "DefaultRoute"]),
                    Resource::new(
                        "AWS::EC2::Route",
                        json!({
                            "DestinationCidrBlock": "0.0.0.0/0",
                            "GatewayId": reference(&igw_id),
                            "RouteTableId": reference(&table_id),
                        }),
                    )
                    .depends_on(&attachment_id),
                )?;

                if placement.az_index < nat_count {
                    let eip_id = logical_id(&[id, &segment, "EIP"]);
                    let nat_id = logical_id(&[id, &segment, "NATGateway"]);
                    template.add_resource(
                        &eip_id,
                        Resource::new(
                            "AWS::EC2::EIP",
                            json!({ "Domain": "vpc", "Tags": name_tag(stack, &path) }),
                        ),
                    )?;
                    template.add_resource(
                        &nat_id,
                        Resource::new(
                            "AWS::EC2::NatGateway",
                            json!({
                                "AllocationId": get_att(&eip_id, "AllocationId"),
                                "SubnetId": reference(&subnet_id),
                                "Tags": name_tag(stack, &path),
                            }),
                        )
                        .depends_on(&attachment_id),
                    )?;
                    nat_gateways.push(nat_id);
                }
            }
            SubnetKind::PrivateWithEgress => {
                let nat_id = nat_gateways
                    .get(placement.az_index % nat_gateways.len().max(1))
                    .ok_or_else(|| {
                        PipelineValidationError::malformed_identifier(
                            "VPC",
                            id,
                            "egress subnets need at least one NAT gateway",
                        )
                    })?;
                template.add_resource(
                    logical_id(&[id, &segment, "DefaultRoute"]),
                    Resource::new(
                        "AWS::EC2::Route",
                        json!({
                            "DestinationCidrBlock": "0.0.0.0/0",
                            "NatGatewayId": reference(nat_id),
                            "RouteTableId": reference(&table_id),
                        }),
                    ),
                )?;
            }
            SubnetKind::Isolated => {}
        }

        emitted.push(EmittedSubnet {
            kind: placement.kind,
            az_index: placement.az_index,
            logical_id: subnet_id,
        });
    }

    Ok(emitted)
}

fn emit_instance(
    template: &mut Template,
    stack: &str,
    id: &str,
    instance: &Instance,
    subnets: &[EmittedSubnet],
) -> Result<(), PipelineValidationError> {
    let preference = instance.subnet_kind.map_or_else(
        || vec![SubnetKind::PrivateWithEgress, SubnetKind::Isolated, SubnetKind::Public],
        |kind| vec![kind],
    );
    let subnet = preference
        .iter()
        .find_map(|kind| {
            subnets
                .iter()
                .filter(|s| s.kind == *kind)
                .min_by_key(|s| s.az_index)
        })
        .ok_or_else(|| {
            PipelineValidationError::malformed_identifier(
                "instance",
                id,
                &format!("VPC '{}' has no subnet to place it in", instance.vpc),
            )
        })?;

    let vpc_id = primary_logical_id(&instance.vpc);
    let group_id = logical_id(&[id, "InstanceSecurityGroup"]);
    let role_id = logical_id(&[id, "InstanceRole"]);
    let profile_id = logical_id(&[id, "InstanceProfile"]);
    let image_path = instance.machine_image.parameter_path();
    let image_parameter = logical_id(&["SsmParameterValue", image_path, "Parameter"]);

    template.add_parameter(
        &image_parameter,
        Parameter {
            parameter_type: IMAGE_PARAMETER_TYPE.to_string(),
            default: Some(image_path.to_string()),
            description: None,
        },
    );

    template.add_resource(
        &group_id,
        Resource::new(
            "AWS::EC2::SecurityGroup",
            json!({
                "GroupDescription": format!("{stack}/{id}/InstanceSecurityGroup"),
                "SecurityGroupEgress": [{
                    "CidrIp": "0.0.0.0/0",
                    "Description": "Allow all outbound traffic by default",
                    "IpProtocol": "-1",
                }],
                "Tags": name_tag(stack, id),
                "VpcId": reference(&vpc_id),
            }),
        ),
    )?;
    template.add_resource(&role_id, role("ec2.amazonaws.com"))?;
    template.add_resource(
        &profile_id,
        Resource::new(
            "AWS::IAM::InstanceProfile",
            json!({ "Roles": [reference(&role_id)] }),
        ),
    )?;
    template.add_resource(
        primary_logical_id(id),
        Resource::new(
            "AWS::EC2::Instance",
            json!({
                "AvailabilityZone": availability_zone(subnet.az_index),
                "IamInstanceProfile": reference(&profile_id),
                "ImageId": reference(&image_parameter),
                "InstanceType": instance.instance_type,
                "SecurityGroupIds": [get_att(&group_id, "GroupId")],
                "SubnetId": reference(&subnet.logical_id),
                "Tags": name_tag(stack, id),
            }),
        )
        .depends_on(&role_id),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{MachineImage, RemovalPolicy, SubnetConfig, AL2023_IMAGE_PARAMETER};
    use crate::template::auto_delete::{custom_resource_id, AUTO_DELETE_RESOURCE_TYPE};
    use pretty_assertions::assert_eq;

    fn stack() -> StackDefinition {
        let mut stack = StackDefinition::new("Resources").unwrap();
        stack.add_bucket("Data", Bucket::disposable()).unwrap();
        stack.add_vpc("Net", Vpc::default().with_max_azs(1)).unwrap();
        stack
            .add_instance(
                "Box",
                Instance::new("Net", "t2.micro", MachineImage::latest_al2023()),
            )
            .unwrap();
        stack
            .add_output("DataName", ResourceRef::Id("Data".into()), None)
            .unwrap();
        stack
    }

    fn count(template: &Template, resource_type: &str) -> usize {
        template.resources_of_type(resource_type).len()
    }

    #[test]
    fn test_bucket_policy_and_tag() {
        let template = synthesize_stack(&stack()).unwrap();
        let bucket = template.resource(&primary_logical_id("Data")).unwrap();
        assert_eq!(bucket.deletion_policy.as_deref(), Some("Delete"));
        assert_eq!(bucket.properties["Tags"][0]["Key"], AUTO_DELETE_TAG);
        let emptier = template.resource(&custom_resource_id("Data")).unwrap();
        assert_eq!(emptier.properties["BucketName"], reference(&primary_logical_id("Data")));

        let mut retained = StackDefinition::new("Keep").unwrap();
        retained
            .add_bucket("Logs", Bucket::default().with_removal_policy(RemovalPolicy::Retain))
            .unwrap();
        let template = synthesize_stack(&retained).unwrap();
        let bucket = template.resource(&primary_logical_id("Logs")).unwrap();
        assert_eq!(bucket.deletion_policy.as_deref(), Some("Retain"));
        assert!(bucket.properties.get("Tags").is_none());
        assert!(template.resources_of_type(AUTO_DELETE_RESOURCE_TYPE).is_empty());
    }

    #[test]
    fn test_public_single_az_network() {
        let template = synthesize_stack(&stack()).unwrap();
        assert_eq!(count(&template, "AWS::EC2::VPC"), 1);
        assert_eq!(count(&template, "AWS::EC2::Subnet"), 1);
        assert_eq!(count(&template, "AWS::EC2::InternetGateway"), 1);
        assert_eq!(count(&template, "AWS::EC2::Route"), 1);
        assert_eq!(count(&template, "AWS::EC2::NatGateway"), 0);

        let subnet = template.resource(template.resources_of_type("AWS::EC2::Subnet")[0]).unwrap();
        assert_eq!(subnet.properties["CidrBlock"], "10.0.0.0/24");
        assert_eq!(subnet.properties["MapPublicIpOnLaunch"], true);
    }

    #[test]
    fn test_egress_subnets_route_through_nat() {
        let mut stack = StackDefinition::new("Private").unwrap();
        stack
            .add_vpc(
                "Net",
                Vpc::default().with_nat_gateways(1).with_subnets(vec![
                    SubnetConfig::new("Public", SubnetKind::Public, 24),
                    SubnetConfig::new("App", SubnetKind::PrivateWithEgress, 24),
                ]),
            )
            .unwrap();
        stack
            .add_instance("Box", Instance::new("Net", "t3.small", MachineImage::AmazonLinux2))
            .unwrap();

        let template = synthesize_stack(&stack).unwrap();
        assert_eq!(count(&template, "AWS::EC2::NatGateway"), 1);
        assert_eq!(count(&template, "AWS::EC2::Subnet"), 4);

        let nat = template.resources_of_type("AWS::EC2::NatGateway")[0];
        let nat_routes = template
            .resources
            .values()
            .filter(|r| r.properties.get("NatGatewayId") == Some(&reference(nat)))
            .count();
        assert_eq!(nat_routes, 2);

        // Instances default to the egress subnets.
        let instance = template.resource(&primary_logical_id("Box")).unwrap();
        let subnet_ref = instance.properties["SubnetId"]["Ref"].as_str().unwrap();
        assert!(subnet_ref.starts_with("NetAppSubnet1"));
    }

    #[test]
    fn test_instance_image_from_parameter() {
        let template = synthesize_stack(&stack()).unwrap();
        let (name, parameter) = template.parameters.iter().next().unwrap();
        assert_eq!(parameter.parameter_type, IMAGE_PARAMETER_TYPE);
        assert_eq!(parameter.default.as_deref(), Some(AL2023_IMAGE_PARAMETER));

        let instance = template.resource(&primary_logical_id("Box")).unwrap();
        assert_eq!(instance.properties["ImageId"], reference(name));
        assert_eq!(instance.properties["InstanceType"], "t2.micro");
    }

    #[test]
    fn test_outputs() {
        let template = synthesize_stack(&stack()).unwrap();
        assert_eq!(
            template.outputs["DataName"].value,
            reference(&primary_logical_id("Data"))
        );
    }

    #[test]
    fn test_deterministic() {
        let first = synthesize_stack(&stack()).unwrap().to_json_string().unwrap();
        let second = synthesize_stack(&stack()).unwrap().to_json_string().unwrap();
        assert_eq!(first, second);
    }
}
