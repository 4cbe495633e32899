//! Network boundary domain types
//!
//! One isolated virtual network split into two subnet groups:
//! - `Endpoint`: private subnets hosting platform-service endpoints
//! - `GameServers`: public subnets carrying game traffic
//!
//! The network also provisions shared storage volumes whose access is
//! restricted to file-system traffic originating inside the network.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

use super::platform::{short_hash, PlatformContext, RemovalPolicy};
use super::security::{Peer, PortRange, SecurityPolicy, FILE_SYSTEM_PORT, HTTPS_PORT};
use super::traffic::Protocol;
use super::volume::{AccessPoint, FileSystemVolume, INFREQUENT_ACCESS_AFTER_DAYS};
use crate::error::NetworkError;

/// Private subnet group for platform-service endpoints
pub const ENDPOINT_GROUP: &str = "Endpoint";

/// Public subnet group for game traffic
pub const GAME_SERVERS_GROUP: &str = "GameServers";

/// Upper bound on availability zones
pub const MAX_AVAILABILITY_ZONES: u8 = 6;

/// Smallest subnet the platform accepts
const SMALLEST_SUBNET_MASK: u8 = 28;

/// Platform services reachable through private interface endpoints
const INTERFACE_ENDPOINTS: &[&str] = &[
    "monitoring",
    "logs",
    "ecr.api",
    "ecr.dkr",
    "secretsmanager",
    "ssm",
];

/// Platform services reachable through gateway endpoints
const GATEWAY_ENDPOINTS: &[&str] = &["s3"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubnetKind {
    Private,
    Public,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    pub id: String,
    pub cidr: String,
    pub availability_zone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetGroup {
    pub name: String,
    pub kind: SubnetKind,
    pub cidr_mask: u8,
    pub subnets: Vec<Subnet>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKind {
    Interface,
    Gateway,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub service: String,
    pub kind: EndpointKind,
    /// Subnet group the endpoint is placed in
    pub subnet_group: String,
}

/// Subnets picked for a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetSelection {
    pub group: String,
    pub subnet_ids: Vec<String>,
}

/// Address layout of the network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkLayout {
    pub cidr: String,
    pub max_azs: u8,
    pub subnet_mask: u8,
}

impl Default for NetworkLayout {
    fn default() -> Self {
        Self {
            cidr: "10.0.1.0/24".to_string(),
            max_azs: 1,
            subnet_mask: SMALLEST_SUBNET_MASK,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub name: String,
    pub cidr: String,
    pub max_azs: u8,
    pub dns_support: bool,
    pub dns_hostnames: bool,
    pub subnet_groups: Vec<SubnetGroup>,
    pub endpoints: Vec<ServiceEndpoint>,
    /// Guards the interface endpoints: HTTPS from inside the network only
    pub endpoint_policy: SecurityPolicy,
}

impl Network {
    /// Build the network boundary
    pub fn build(
        name: &str,
        layout: &NetworkLayout,
        ctx: &PlatformContext,
    ) -> Result<Self, NetworkError> {
        if layout.max_azs == 0 || layout.max_azs > MAX_AVAILABILITY_ZONES {
            return Err(NetworkError::InvalidZoneCount {
                count: layout.max_azs,
                max: MAX_AVAILABILITY_ZONES,
            });
        }

        let (base, prefix) = parse_cidr(&layout.cidr)?;
        if layout.subnet_mask < prefix || layout.subnet_mask > SMALLEST_SUBNET_MASK {
            return Err(NetworkError::MaskOutOfRange {
                cidr: layout.cidr.clone(),
                mask: layout.subnet_mask,
            });
        }

        let groups = [
            (ENDPOINT_GROUP, SubnetKind::Private),
            (GAME_SERVERS_GROUP, SubnetKind::Public),
        ];
        let needed = groups.len() as u32 * layout.max_azs as u32;
        let block = 1u64 << (32 - layout.subnet_mask);
        let capacity = 1u64 << (32 - prefix);
        if needed as u64 * block > capacity {
            return Err(NetworkError::AddressSpaceExhausted {
                cidr: layout.cidr.clone(),
                mask: layout.subnet_mask,
                needed,
            });
        }

        let mut offset = 0u64;
        let mut subnet_groups = Vec::with_capacity(groups.len());
        for (group, kind) in groups {
            let mut subnets = Vec::with_capacity(layout.max_azs as usize);
            for zone in 0..layout.max_azs {
                let start = Ipv4Addr::from(base + offset as u32);
                subnets.push(Subnet {
                    id: format!("{}-{}-subnet{}", name, group, zone + 1).to_lowercase(),
                    cidr: format!("{}/{}", start, layout.subnet_mask),
                    availability_zone: ctx.availability_zone(zone),
                });
                offset += block;
            }
            subnet_groups.push(SubnetGroup {
                name: group.to_string(),
                kind,
                cidr_mask: layout.subnet_mask,
                subnets,
            });
        }

        let endpoints = INTERFACE_ENDPOINTS
            .iter()
            .map(|service| (service, EndpointKind::Interface))
            .chain(
                GATEWAY_ENDPOINTS
                    .iter()
                    .map(|service| (service, EndpointKind::Gateway)),
            )
            .map(|(service, kind)| ServiceEndpoint {
                service: service.to_string(),
                kind,
                subnet_group: ENDPOINT_GROUP.to_string(),
            })
            .collect();

        let endpoint_policy = SecurityPolicy::new(
            format!("{}Endpoints", name),
            "Allow HTTPS to the endpoint subnet",
            name,
        )
        .with_ingress(
            Peer::Cidr(layout.cidr.clone()),
            Protocol::Tcp,
            PortRange::single(HTTPS_PORT),
            "HTTPS from inside the network",
        );

        Ok(Self {
            name: name.to_string(),
            cidr: layout.cidr.clone(),
            max_azs: layout.max_azs,
            dns_support: true,
            dns_hostnames: true,
            subnet_groups,
            endpoints,
            endpoint_policy,
        })
    }

    pub fn subnet_group(&self, group: &str) -> Option<&SubnetGroup> {
        self.subnet_groups.iter().find(|g| g.name == group)
    }

    /// Select every subnet of a group
    pub fn select_subnets(&self, group: &str) -> Result<SubnetSelection, NetworkError> {
        let found = self
            .subnet_group(group)
            .ok_or_else(|| NetworkError::SubnetGroupNotFound {
                network: self.name.clone(),
                group: group.to_string(),
            })?;

        Ok(SubnetSelection {
            group: found.name.clone(),
            subnet_ids: found.subnets.iter().map(|s| s.id.clone()).collect(),
        })
    }

    /// Provision a named shared storage volume inside this network.
    ///
    /// The volume gets its own policy admitting only file-system traffic
    /// from the network CIDR.
    pub fn provision_volume(&self, name: &str) -> Result<FileSystemVolume, NetworkError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(NetworkError::EmptyVolumeName);
        }

        let security_policy = SecurityPolicy::new(
            format!("{}FileSystem", name),
            format!("{} file system access", name),
            &self.name,
        )
        .with_ingress(
            Peer::Cidr(self.cidr.clone()),
            Protocol::Tcp,
            PortRange::single(FILE_SYSTEM_PORT),
            format!("File system traffic from {}", self.name),
        );

        Ok(FileSystemVolume {
            name: name.to_string(),
            file_system_id: format!("fs-{}", short_hash(&format!("{}/{}", self.name, name)))
                .to_lowercase(),
            network: self.name.clone(),
            automatic_backups: true,
            infrequent_access_after_days: INFREQUENT_ACCESS_AFTER_DAYS,
            removal: RemovalPolicy::Retain,
            access_points: vec![AccessPoint {
                name: format!("{}AccessPoint", name),
            }],
            security_policy,
        })
    }
}

fn parse_cidr(cidr: &str) -> Result<(u32, u8), NetworkError> {
    let invalid = || NetworkError::InvalidCidr {
        cidr: cidr.to_string(),
    };

    let (addr, prefix) = cidr.split_once('/').ok_or_else(invalid)?;
    let addr: Ipv4Addr = addr.parse().map_err(|_| invalid())?;
    let prefix: u8 = prefix.parse().map_err(|_| invalid())?;
    if prefix > 32 {
        return Err(invalid());
    }

    let base = u32::from(addr);
    let host_bits = u32::MAX.checked_shr(prefix as u32).unwrap_or(0);
    if base & host_bits != 0 {
        return Err(invalid());
    }

    Ok((base, prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::traffic::PortBinding;

    fn ctx() -> PlatformContext {
        PlatformContext::new("123456789012", "us-east-1")
    }

    #[test]
    fn test_default_layout() {
        let network = Network::build("GameNetwork", &NetworkLayout::default(), &ctx()).unwrap();

        let endpoint = network.subnet_group(ENDPOINT_GROUP).unwrap();
        assert_eq!(endpoint.kind, SubnetKind::Private);
        assert_eq!(endpoint.subnets[0].cidr, "10.0.1.0/28");

        let game = network.subnet_group(GAME_SERVERS_GROUP).unwrap();
        assert_eq!(game.kind, SubnetKind::Public);
        assert_eq!(game.subnets[0].cidr, "10.0.1.16/28");
        assert_eq!(game.subnets[0].availability_zone, "us-east-1a");
    }

    #[test]
    fn test_multiple_zones() {
        let layout = NetworkLayout {
            cidr: "10.0.0.0/24".to_string(),
            max_azs: 2,
            subnet_mask: 28,
        };
        let network = Network::build("Net", &layout, &ctx()).unwrap();
        let game = network.select_subnets(GAME_SERVERS_GROUP).unwrap();
        assert_eq!(game.subnet_ids, vec!["net-gameservers-subnet1", "net-gameservers-subnet2"]);
        assert_eq!(
            network.subnet_group(GAME_SERVERS_GROUP).unwrap().subnets[1].cidr,
            "10.0.0.48/28"
        );
    }

    #[test]
    fn test_address_space_exhausted() {
        let layout = NetworkLayout {
            cidr: "10.0.1.0/27".to_string(),
            max_azs: 2,
            subnet_mask: 28,
        };
        assert!(matches!(
            Network::build("Net", &layout, &ctx()),
            Err(NetworkError::AddressSpaceExhausted { needed: 4, .. })
        ));
    }

    #[test]
    fn test_invalid_cidr() {
        for cidr in ["10.0.1.0", "10.0.1.0/33", "banana/24", "10.0.1.5/24"] {
            let layout = NetworkLayout {
                cidr: cidr.to_string(),
                ..NetworkLayout::default()
            };
            assert!(
                matches!(Network::build("Net", &layout, &ctx()), Err(NetworkError::InvalidCidr { .. })),
                "{} should be rejected",
                cidr
            );
        }
    }

    #[test]
    fn test_invalid_zone_count() {
        let layout = NetworkLayout {
            max_azs: 0,
            ..NetworkLayout::default()
        };
        assert!(Network::build("Net", &layout, &ctx()).is_err());
    }

    #[test]
    fn test_missing_subnet_group() {
        let network = Network::build("Net", &NetworkLayout::default(), &ctx()).unwrap();
        assert!(matches!(
            network.select_subnets("Database"),
            Err(NetworkError::SubnetGroupNotFound { .. })
        ));
    }

    #[test]
    fn test_endpoints_are_private() {
        let network = Network::build("Net", &NetworkLayout::default(), &ctx()).unwrap();
        assert_eq!(network.endpoints.len(), 7);
        assert!(network
            .endpoints
            .iter()
            .all(|e| e.subnet_group == ENDPOINT_GROUP));
        assert!(network.endpoint_policy.allows_ingress(PortBinding::tcp(HTTPS_PORT)));
        assert!(!network.endpoint_policy.allow_all_outbound);
    }

    #[test]
    fn test_provision_volume() {
        let network = Network::build("Net", &NetworkLayout::default(), &ctx()).unwrap();
        let volume = network.provision_volume("Minecraft").unwrap();

        assert!(volume.file_system_id.starts_with("fs-"));
        assert_eq!(volume.removal, RemovalPolicy::Retain);
        assert_eq!(volume.access_points[0].name, "MinecraftAccessPoint");

        let rules = volume.security_policy.rules();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].peer, Peer::Cidr("10.0.1.0/24".to_string()));
        assert!(volume
            .security_policy
            .allows_ingress(PortBinding::tcp(FILE_SYSTEM_PORT)));

        assert_eq!(volume.reference().security_scope, "MinecraftFileSystem");
    }

    #[test]
    fn test_provision_volume_rejects_empty_name() {
        let network = Network::build("Net", &NetworkLayout::default(), &ctx()).unwrap();
        assert_eq!(network.provision_volume("  "), Err(NetworkError::EmptyVolumeName));
    }
}
