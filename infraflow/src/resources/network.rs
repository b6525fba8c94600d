//! Virtual networks and subnet layout.

use crate::errors::PipelineValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// Address range used when a VPC does not name one.
pub const DEFAULT_VPC_CIDR: &str = "10.0.0.0/16";

const MIN_CIDR_MASK: u8 = 16;
const MAX_CIDR_MASK: u8 = 28;

/// How a subnet reaches the internet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubnetKind {
    /// Routed through an internet gateway.
    Public,
    /// Outbound only, through a NAT gateway.
    PrivateWithEgress,
    /// No route out.
    Isolated,
}

impl fmt::Display for SubnetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Public => "Public",
            Self::PrivateWithEgress => "Private",
            Self::Isolated => "Isolated",
        })
    }
}

/// One subnet group, instantiated once per availability zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetConfig {
    /// Group name, used in logical ids.
    pub name: String,
    /// Routing kind.
    pub kind: SubnetKind,
    /// Prefix length of each subnet.
    pub cidr_mask: u8,
}

impl SubnetConfig {
    /// Creates a subnet group.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: SubnetKind, cidr_mask: u8) -> Self {
        Self {
            name: name.into(),
            kind,
            cidr_mask,
        }
    }
}

/// A concrete subnet: one group in one availability zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetPlacement {
    /// Group name.
    pub group: String,
    /// Routing kind.
    pub kind: SubnetKind,
    /// Zero-based availability zone index.
    pub az_index: usize,
    /// Allocated address range.
    pub cidr: String,
}

impl SubnetPlacement {
    /// Construct-path segment, e.g. `PublicSubnet1`.
    #[must_use]
    pub fn segment(&self) -> String {
        format!("{}Subnet{}", self.group, self.az_index + 1)
    }
}

/// A virtual network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vpc {
    /// Address range of the whole network.
    pub cidr: String,
    /// Number of availability zones to span.
    pub max_azs: usize,
    /// Number of NAT gateways, placed in public subnets.
    pub nat_gateways: usize,
    /// Subnet groups.
    pub subnets: Vec<SubnetConfig>,
}

impl Default for Vpc {
    fn default() -> Self {
        Self {
            cidr: DEFAULT_VPC_CIDR.to_string(),
            max_azs: 2,
            nat_gateways: 0,
            subnets: vec![SubnetConfig::new("Public", SubnetKind::Public, 24)],
        }
    }
}

impl Vpc {
    /// Sets the address range.
    #[must_use]
    pub fn with_cidr(mut self, cidr: impl Into<String>) -> Self {
        self.cidr = cidr.into();
        self
    }

    /// Sets the number of availability zones.
    #[must_use]
    pub fn with_max_azs(mut self, max_azs: usize) -> Self {
        self.max_azs = max_azs;
        self
    }

    /// Sets the number of NAT gateways.
    #[must_use]
    pub fn with_nat_gateways(mut self, count: usize) -> Self {
        self.nat_gateways = count;
        self
    }

    /// Replaces the subnet groups.
    #[must_use]
    pub fn with_subnets(mut self, subnets: Vec<SubnetConfig>) -> Self {
        self.subnets = subnets;
        self
    }

    /// Whether any subnet group is of the given kind.
    #[must_use]
    pub fn has_kind(&self, kind: SubnetKind) -> bool {
        self.subnets.iter().any(|s| s.kind == kind)
    }

    /// Number of NAT gateways actually placed: one per public subnet at most.
    #[must_use]
    pub fn effective_nat_gateways(&self) -> usize {
        if self.has_kind(SubnetKind::Public) {
            self.nat_gateways.min(self.max_azs)
        } else {
            0
        }
    }

    /// Checks the layout and carves the address range into subnets.
    ///
    /// Subnets are allocated group by group, zone by zone, each aligned to
    /// its own size, starting at the bottom of the VPC range.
    ///
    /// # Errors
    ///
    /// Fails on a malformed range, a mask outside 16..=28, an empty layout,
    /// egress subnets without NAT, or when the subnets do not fit.
    pub fn layout(&self, id: &str) -> Result<Vec<SubnetPlacement>, PipelineValidationError> {
        let (base, prefix) = parse_cidr(&self.cidr).ok_or_else(|| {
            PipelineValidationError::malformed_identifier("VPC CIDR", &self.cidr, "expected a.b.c.d/n")
        })?;

        if self.max_azs == 0 {
            return Err(PipelineValidationError::malformed_identifier(
                "VPC",
                id,
                "must span at least one availability zone",
            ));
        }
        if self.subnets.is_empty() {
            return Err(PipelineValidationError::malformed_identifier(
                "VPC",
                id,
                "has no subnet groups",
            ));
        }
        if self.has_kind(SubnetKind::PrivateWithEgress) && self.effective_nat_gateways() == 0 {
            return Err(PipelineValidationError::malformed_identifier(
                "VPC",
                id,
                "egress subnets need a public subnet group and at least one NAT gateway",
            ));
        }

        let end = u64::from(base) + (1u64 << (32 - u32::from(prefix)));
        let mut cursor = u64::from(base);
        let mut placements = Vec::with_capacity(self.subnets.len() * self.max_azs);

        for group in &self.subnets {
            if !(MIN_CIDR_MASK..=MAX_CIDR_MASK).contains(&group.cidr_mask) || group.cidr_mask < prefix {
                return Err(PipelineValidationError::malformed_identifier(
                    "subnet mask",
                    &format!("{}/{}", group.name, group.cidr_mask),
                    "must lie in 16..=28 and not exceed the VPC range",
                ));
            }

            let size = 1u64 << (32 - u32::from(group.cidr_mask));
            for az_index in 0..self.max_azs {
                cursor = cursor.div_ceil(size) * size;
                let address = u32::try_from(cursor)
                    .ok()
                    .filter(|_| cursor + size <= end)
                    .map(Ipv4Addr::from)
                    .ok_or_else(|| {
                        PipelineValidationError::malformed_identifier(
                            "VPC CIDR",
                            &self.cidr,
                            "too small for the requested subnets",
                        )
                    })?;
                placements.push(SubnetPlacement {
                    group: group.name.clone(),
                    kind: group.kind,
                    az_index,
                    cidr: format!("{address}/{}", group.cidr_mask),
                });
                cursor += size;
            }
        }

        Ok(placements)
    }
}

fn parse_cidr(cidr: &str) -> Option<(u32, u8)> {
    let (address, prefix) = cidr.split_once('/')?;
    let address: Ipv4Addr = address.parse().ok()?;
    let prefix: u8 = prefix.parse().ok()?;
    if !(MIN_CIDR_MASK..=MAX_CIDR_MASK).contains(&prefix) {
        return None;
    }
    let base = u32::from(address);
    let host_mask = u32::MAX >> prefix;
    (base & host_mask == 0).then_some((base, prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MALFORMED_ID;
    use pretty_assertions::assert_eq;

    fn cidrs(vpc: &Vpc) -> Vec<String> {
        vpc.layout("Net").unwrap().into_iter().map(|p| p.cidr).collect()
    }

    #[test]
    fn test_single_public_subnet() {
        let vpc = Vpc::default().with_max_azs(1);
        let layout = vpc.layout("Net").unwrap();
        assert_eq!(layout.len(), 1);
        assert_eq!(layout[0].cidr, "10.0.0.0/24");
        assert_eq!(layout[0].segment(), "PublicSubnet1");
    }

    #[test]
    fn test_groups_then_zones() {
        let vpc = Vpc::default()
            .with_nat_gateways(1)
            .with_subnets(vec![
                SubnetConfig::new("Public", SubnetKind::Public, 24),
                SubnetConfig::new("App", SubnetKind::PrivateWithEgress, 20),
            ]);
        assert_eq!(
            cidrs(&vpc),
            vec!["10.0.0.0/24", "10.0.1.0/24", "10.0.16.0/20", "10.0.32.0/20"]
        );
    }

    #[test]
    fn test_egress_requires_nat() {
        let vpc = Vpc::default().with_subnets(vec![
            SubnetConfig::new("Public", SubnetKind::Public, 24),
            SubnetConfig::new("App", SubnetKind::PrivateWithEgress, 24),
        ]);
        let err = vpc.layout("Net").unwrap_err();
        assert_eq!(err.code(), Some(MALFORMED_ID));
    }

    #[test]
    fn test_nat_capped_by_zones() {
        let vpc = Vpc::default().with_max_azs(1).with_nat_gateways(3);
        assert_eq!(vpc.effective_nat_gateways(), 1);
    }

    #[test]
    fn test_range_exhausted() {
        let vpc = Vpc::default()
            .with_cidr("10.0.0.0/24")
            .with_subnets(vec![SubnetConfig::new("Public", SubnetKind::Public, 25)])
            .with_max_azs(3);
        assert!(vpc.layout("Net").is_err());
    }

    #[test]
    fn test_malformed_cidr() {
        for cidr in ["10.0.0.0", "10.0.0.1/16", "10.0.0.0/8", "nope/16"] {
            assert!(Vpc::default().with_cidr(cidr).layout("Net").is_err(), "{cidr}");
        }
    }
}
