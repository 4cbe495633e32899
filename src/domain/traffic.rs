//! Traffic profile domain types
//!
//! The port/protocol contract a game server exposes: one primary port,
//! an optional health-check port and whether a public load balancer
//! fronts the service.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SpecError;

/// Transport protocol for a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "tcp" => Some(Self::Tcp),
            "udp" => Some(Self::Udp),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "TCP",
            Self::Udp => "UDP",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A health check as declared by the caller. The protocol is optional here
/// so that an incomplete declaration can be rejected with a precise error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckDecl {
    pub port: u16,

    #[serde(default)]
    pub protocol: Option<Protocol>,
}

/// Declared traffic profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficProfile {
    /// Primary game port
    pub port: u16,

    /// Primary game protocol
    pub protocol: Protocol,

    /// Optional separate health-check port
    #[serde(default)]
    pub health_check: Option<HealthCheckDecl>,

    /// Front the service with a public network load balancer
    #[serde(default)]
    pub create_load_balancer: bool,
}

impl TrafficProfile {
    pub fn new(port: u16, protocol: Protocol) -> Self {
        Self {
            port,
            protocol,
            health_check: None,
            create_load_balancer: false,
        }
    }

    /// Builder: declare a health-check port with its protocol
    pub fn with_health_check(mut self, port: u16, protocol: Protocol) -> Self {
        self.health_check = Some(HealthCheckDecl {
            port,
            protocol: Some(protocol),
        });
        self
    }

    /// Builder: request a public load balancer
    pub fn with_load_balancer(mut self, enabled: bool) -> Self {
        self.create_load_balancer = enabled;
        self
    }

    /// Resolve into a fully specified profile.
    ///
    /// A health check must name its protocol. It may reuse the primary port
    /// only with a different protocol (e.g. UDP game traffic with a TCP probe).
    /// A health check identical to the primary binding is rejected as
    /// `RedundantHealthCheck` rather than collapsed: it would declare the same
    /// port mapping twice. Omit the health check to probe the primary port.
    pub fn resolve(&self) -> Result<ResolvedTraffic, SpecError> {
        if self.port == 0 {
            return Err(SpecError::InvalidPort {
                field: "primary port".to_string(),
                port: self.port,
            });
        }

        let primary = PortBinding::new(self.port, self.protocol);

        let health_check = match &self.health_check {
            None => None,
            Some(decl) => {
                if decl.port == 0 {
                    return Err(SpecError::InvalidPort {
                        field: "health-check port".to_string(),
                        port: decl.port,
                    });
                }
                let protocol = decl
                    .protocol
                    .ok_or(SpecError::HealthCheckProtocolMissing { port: decl.port })?;
                let binding = PortBinding::new(decl.port, protocol);
                if binding == primary {
                    return Err(SpecError::RedundantHealthCheck {
                        port: decl.port,
                        protocol: protocol.to_string(),
                    });
                }
                Some(binding)
            }
        };

        Ok(ResolvedTraffic {
            primary,
            health_check,
            create_load_balancer: self.create_load_balancer,
        })
    }
}

/// A concrete (port, protocol) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortBinding {
    pub port: u16,
    pub protocol: Protocol,
}

impl PortBinding {
    pub fn new(port: u16, protocol: Protocol) -> Self {
        Self { port, protocol }
    }

    pub fn tcp(port: u16) -> Self {
        Self::new(port, Protocol::Tcp)
    }

    pub fn udp(port: u16) -> Self {
        Self::new(port, Protocol::Udp)
    }
}

impl fmt::Display for PortBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.port, self.protocol)
    }
}

/// Validated traffic profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedTraffic {
    pub primary: PortBinding,
    pub health_check: Option<PortBinding>,
    pub create_load_balancer: bool,
}

impl ResolvedTraffic {
    /// Port the container health probe targets. Defaults to the primary port
    /// when no separate health check is declared.
    pub fn health_check_port(&self) -> u16 {
        self.health_check
            .map(|binding| binding.port)
            .unwrap_or(self.primary.port)
    }

    /// Protocol of the health-check port (primary protocol by default)
    pub fn health_check_protocol(&self) -> Protocol {
        self.health_check
            .map(|binding| binding.protocol)
            .unwrap_or(self.primary.protocol)
    }

    /// Every binding the container exposes, primary first
    pub fn bindings(&self) -> Vec<PortBinding> {
        let mut bindings = vec![self.primary];
        bindings.extend(self.health_check);
        bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_from_str() {
        assert_eq!(Protocol::from_str("udp"), Some(Protocol::Udp));
        assert_eq!(Protocol::from_str("TCP"), Some(Protocol::Tcp));
        assert_eq!(Protocol::from_str("sctp"), None);
    }

    #[test]
    fn test_health_check_defaults_to_primary_port() {
        let traffic = TrafficProfile::new(9736, Protocol::Tcp).resolve().unwrap();
        assert_eq!(traffic.health_check_port(), 9736);
        assert_eq!(traffic.bindings(), vec![PortBinding::tcp(9736)]);
    }

    #[test]
    fn test_udp_primary_with_tcp_health_port() {
        let traffic = TrafficProfile::new(2456, Protocol::Udp)
            .with_health_check(80, Protocol::Tcp)
            .resolve()
            .unwrap();
        assert_eq!(traffic.health_check_port(), 80);
        assert_eq!(traffic.health_check_protocol(), Protocol::Tcp);
        assert_eq!(traffic.bindings().len(), 2);
    }

    #[test]
    fn test_same_port_different_protocol_is_allowed() {
        let traffic = TrafficProfile::new(2456, Protocol::Udp)
            .with_health_check(2456, Protocol::Tcp)
            .resolve()
            .unwrap();
        assert_eq!(
            traffic.bindings(),
            vec![PortBinding::udp(2456), PortBinding::tcp(2456)]
        );
    }

    #[test]
    fn test_health_check_without_protocol_is_rejected() {
        let mut traffic = TrafficProfile::new(25565, Protocol::Udp);
        traffic.health_check = Some(HealthCheckDecl {
            port: 8443,
            protocol: None,
        });
        assert_eq!(
            traffic.resolve(),
            Err(SpecError::HealthCheckProtocolMissing { port: 8443 })
        );
    }

    #[test]
    fn test_redundant_health_check_is_rejected() {
        let result = TrafficProfile::new(9736, Protocol::Tcp)
            .with_health_check(9736, Protocol::Tcp)
            .resolve();
        assert!(matches!(
            result,
            Err(SpecError::RedundantHealthCheck { port: 9736, .. })
        ));
    }

    #[test]
    fn test_zero_port_is_rejected() {
        assert!(TrafficProfile::new(0, Protocol::Tcp).resolve().is_err());
    }

    #[test]
    fn test_traffic_profile_from_yaml() {
        let yaml = "port: 25565\nprotocol: UDP\nhealth_check:\n  port: 8443\n";
        let traffic: TrafficProfile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(traffic.protocol, Protocol::Udp);
        assert!(!traffic.create_load_balancer);
        assert!(traffic.resolve().is_err());
    }
}
