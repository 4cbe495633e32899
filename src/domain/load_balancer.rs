//! Public network load balancer fronting a single service

use serde::{Deserialize, Serialize};

use super::network::SubnetSelection;
use super::traffic::{PortBinding, Protocol, ResolvedTraffic};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroup {
    pub name: String,
    pub port: u16,
    pub protocol: Protocol,
    /// Services registered as targets
    pub targets: Vec<String>,
    /// Port/protocol probed by the balancer
    pub health_check: PortBinding,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listener {
    pub port: u16,
    pub protocol: Protocol,
    pub target_group: String,
}

/// Endpoint a player connects to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerEndpoint {
    pub port: u16,
    pub protocol: Protocol,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancer {
    pub name: String,
    pub internet_facing: bool,
    pub subnets: SubnetSelection,
    pub listeners: Vec<Listener>,
    pub target_groups: Vec<TargetGroup>,
}

impl LoadBalancer {
    /// One listener on the primary port forwarding to one target group
    /// that holds exactly `service`
    pub fn for_service(
        name: &str,
        service: &str,
        subnets: SubnetSelection,
        traffic: &ResolvedTraffic,
    ) -> Self {
        let target_group = TargetGroup {
            name: format!("{}Targets", name),
            port: traffic.primary.port,
            protocol: traffic.primary.protocol,
            targets: vec![service.to_string()],
            health_check: PortBinding::new(
                traffic.health_check_port(),
                traffic.health_check_protocol(),
            ),
        };

        Self {
            name: format!("{}LoadBalancer", name),
            internet_facing: true,
            subnets,
            listeners: vec![Listener {
                port: traffic.primary.port,
                protocol: traffic.primary.protocol,
                target_group: target_group.name.clone(),
            }],
            target_groups: vec![target_group],
        }
    }

    pub fn endpoint(&self) -> Option<LoadBalancerEndpoint> {
        self.listeners.first().map(|listener| LoadBalancerEndpoint {
            port: listener.port,
            protocol: listener.protocol,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::traffic::TrafficProfile;

    fn subnets() -> SubnetSelection {
        SubnetSelection {
            group: "GameServers".to_string(),
            subnet_ids: vec!["net-gameservers-subnet1".to_string()],
        }
    }

    #[test]
    fn test_udp_primary_with_tcp_health() {
        let traffic = TrafficProfile::new(25565, Protocol::Udp)
            .with_health_check(8443, Protocol::Tcp)
            .with_load_balancer(true)
            .resolve()
            .unwrap();

        let lb = LoadBalancer::for_service("Minecraft", "MinecraftService", subnets(), &traffic);
        assert!(lb.internet_facing);
        assert_eq!(lb.listeners.len(), 1);
        assert_eq!(lb.listeners[0].port, 25565);
        assert_eq!(lb.listeners[0].protocol, Protocol::Udp);
        assert_eq!(lb.target_groups.len(), 1);
        assert_eq!(lb.target_groups[0].targets, vec!["MinecraftService".to_string()]);
        assert_eq!(lb.target_groups[0].health_check, PortBinding::tcp(8443));
        assert_eq!(lb.listeners[0].target_group, lb.target_groups[0].name);
    }

    #[test]
    fn test_endpoint() {
        let traffic = TrafficProfile::new(9736, Protocol::Tcp).resolve().unwrap();
        let lb = LoadBalancer::for_service("CrewLink", "CrewLinkService", subnets(), &traffic);
        assert_eq!(
            lb.endpoint(),
            Some(LoadBalancerEndpoint {
                port: 9736,
                protocol: Protocol::Tcp
            })
        );
        assert_eq!(lb.target_groups[0].health_check, PortBinding::tcp(9736));
    }
}
