//! Compute instances and the images they boot from.

use super::network::SubnetKind;
use serde::{Deserialize, Serialize};

/// Public parameter tracking the latest Amazon Linux 2023 image.
pub const AL2023_IMAGE_PARAMETER: &str =
    "/aws/service/ami-amazon-linux-latest/al2023-ami-kernel-6.1-x86_64";

/// Public parameter tracking the latest Amazon Linux 2 image.
pub const AL2_IMAGE_PARAMETER: &str = "/aws/service/ami-amazon-linux-latest/amzn2-ami-hvm-x86_64-gp2";

/// Type of the parameter that resolves an image id at deploy time.
pub const IMAGE_PARAMETER_TYPE: &str = "AWS::SSM::Parameter::Value<AWS::EC2::Image::Id>";

/// Where an instance's image id comes from. Never a literal id: the image
/// is resolved from a parameter store path when the stack deploys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum MachineImage {
    /// Any image-id parameter path.
    SsmParameter {
        /// Parameter path.
        path: String,
    },
    /// Latest Amazon Linux 2.
    AmazonLinux2,
}

impl MachineImage {
    /// Latest Amazon Linux 2023.
    #[must_use]
    pub fn latest_al2023() -> Self {
        Self::from_ssm_parameter(AL2023_IMAGE_PARAMETER)
    }

    /// An image resolved from the given parameter path.
    #[must_use]
    pub fn from_ssm_parameter(path: impl Into<String>) -> Self {
        Self::SsmParameter { path: path.into() }
    }

    /// The parameter path to resolve.
    #[must_use]
    pub fn parameter_path(&self) -> &str {
        match self {
            Self::SsmParameter { path } => path,
            Self::AmazonLinux2 => AL2_IMAGE_PARAMETER,
        }
    }
}

/// A virtual machine placed in a VPC declared in the same stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Id of the VPC resource.
    pub vpc: String,
    /// Instance type, e.g. `t2.micro`.
    pub instance_type: String,
    /// Boot image.
    pub machine_image: MachineImage,
    /// Subnet kind to place into; by default the most private one available.
    #[serde(default)]
    pub subnet_kind: Option<SubnetKind>,
}

impl Instance {
    /// Creates an instance in `vpc`.
    #[must_use]
    pub fn new(vpc: impl Into<String>, instance_type: impl Into<String>, machine_image: MachineImage) -> Self {
        Self {
            vpc: vpc.into(),
            instance_type: instance_type.into(),
            machine_image,
            subnet_kind: None,
        }
    }

    /// Places the instance in a subnet of the given kind.
    #[must_use]
    pub fn in_subnets(mut self, kind: SubnetKind) -> Self {
        self.subnet_kind = Some(kind);
        self
    }
}
