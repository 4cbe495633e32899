//! Security policy domain types
//!
//! A policy is default-deny: traffic is allowed only when a rule matches.
//! Policies are values. Adding a rule consumes the policy and returns the
//! augmented one, so the pipeline can thread them through pure functions.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::traffic::{PortBinding, Protocol};

/// HTTPS, used for telemetry, logging and platform endpoints
pub const HTTPS_PORT: u16 = 443;

/// Network file-system protocol port
pub const FILE_SYSTEM_PORT: u16 = 2049;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ingress,
    Egress,
}

/// Inclusive port range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRange {
    pub from: u16,
    pub to: u16,
}

impl PortRange {
    pub fn single(port: u16) -> Self {
        Self { from: port, to: port }
    }

    pub fn range(from: u16, to: u16) -> Self {
        Self {
            from: from.min(to),
            to: from.max(to),
        }
    }

    pub fn contains(&self, port: u16) -> bool {
        (self.from..=self.to).contains(&port)
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.from == self.to {
            write!(f, "{}", self.from)
        } else {
            write!(f, "{}-{}", self.from, self.to)
        }
    }
}

/// Source (ingress) or destination (egress) of a rule
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Peer {
    /// 0.0.0.0/0
    AnyIpv4,
    /// A specific CIDR block
    Cidr(String),
    /// Members of another security policy
    Policy(String),
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AnyIpv4 => f.write_str("0.0.0.0/0"),
            Self::Cidr(cidr) => f.write_str(cidr),
            Self::Policy(name) => write!(f, "policy:{}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecurityRule {
    pub direction: Direction,
    pub protocol: Protocol,
    pub ports: PortRange,
    pub peer: Peer,
    pub description: String,
}

impl SecurityRule {
    pub fn ingress(
        peer: Peer,
        protocol: Protocol,
        ports: PortRange,
        description: impl Into<String>,
    ) -> Self {
        Self {
            direction: Direction::Ingress,
            protocol,
            ports,
            peer,
            description: description.into(),
        }
    }

    pub fn egress(
        peer: Peer,
        protocol: Protocol,
        ports: PortRange,
        description: impl Into<String>,
    ) -> Self {
        Self {
            direction: Direction::Egress,
            protocol,
            ports,
            peer,
            description: description.into(),
        }
    }

    pub fn matches(&self, direction: Direction, protocol: Protocol, port: u16) -> bool {
        self.direction == direction && self.protocol == protocol && self.ports.contains(port)
    }

    /// Same traffic, ignoring the description
    fn same_traffic(&self, other: &SecurityRule) -> bool {
        self.direction == other.direction
            && self.protocol == other.protocol
            && self.ports == other.ports
            && self.peer == other.peer
    }
}

/// A named set of directional allow rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityPolicy {
    pub name: String,
    pub description: String,
    /// Network the policy belongs to
    pub network: String,
    /// Allow every outbound connection regardless of egress rules
    pub allow_all_outbound: bool,
    rules: Vec<SecurityRule>,
}

impl SecurityPolicy {
    /// Create an empty deny-all policy
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        network: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            network: network.into(),
            allow_all_outbound: false,
            rules: Vec::new(),
        }
    }

    /// Builder: allow every outbound connection
    pub fn with_all_outbound(mut self) -> Self {
        self.allow_all_outbound = true;
        self
    }

    /// Append a rule. A rule for traffic that is already allowed is dropped,
    /// so order of first declaration is preserved.
    pub fn with_rule(mut self, rule: SecurityRule) -> Self {
        if !self.rules.iter().any(|existing| existing.same_traffic(&rule)) {
            self.rules.push(rule);
        }
        self
    }

    pub fn with_ingress(
        self,
        peer: Peer,
        protocol: Protocol,
        ports: PortRange,
        description: impl Into<String>,
    ) -> Self {
        self.with_rule(SecurityRule::ingress(peer, protocol, ports, description))
    }

    pub fn with_egress(
        self,
        peer: Peer,
        protocol: Protocol,
        ports: PortRange,
        description: impl Into<String>,
    ) -> Self {
        self.with_rule(SecurityRule::egress(peer, protocol, ports, description))
    }

    /// Allow traffic both ways between this policy's members and `peer`
    pub fn with_bidirectional(
        self,
        peer: Peer,
        protocol: Protocol,
        port: u16,
        description: impl Into<String>,
    ) -> Self {
        let description = description.into();
        self.with_ingress(peer.clone(), protocol, PortRange::single(port), &description)
            .with_egress(peer, protocol, PortRange::single(port), description)
    }

    pub fn rules(&self) -> &[SecurityRule] {
        &self.rules
    }

    pub fn ingress_rules(&self) -> impl Iterator<Item = &SecurityRule> {
        self.rules
            .iter()
            .filter(|rule| rule.direction == Direction::Ingress)
    }

    pub fn egress_rules(&self) -> impl Iterator<Item = &SecurityRule> {
        self.rules
            .iter()
            .filter(|rule| rule.direction == Direction::Egress)
    }

    pub fn allows_ingress(&self, binding: PortBinding) -> bool {
        self.rules
            .iter()
            .any(|rule| rule.matches(Direction::Ingress, binding.protocol, binding.port))
    }

    pub fn allows_egress(&self, binding: PortBinding) -> bool {
        self.allow_all_outbound
            || self
                .rules
                .iter()
                .any(|rule| rule.matches(Direction::Egress, binding.protocol, binding.port))
    }

    /// Whether traffic on `binding` is allowed in both directions with `peer`
    pub fn allows_bidirectional(&self, peer: &Peer, binding: PortBinding) -> bool {
        let has = |direction: Direction| {
            self.rules.iter().any(|rule| {
                &rule.peer == peer && rule.matches(direction, binding.protocol, binding.port)
            })
        };
        has(Direction::Ingress) && has(Direction::Egress)
    }

    /// Whether every rule of `base` is still present, in order, in `self`
    pub fn extends(&self, base: &SecurityPolicy) -> bool {
        self.name == base.name
            && self.rules.len() >= base.rules.len()
            && base
                .rules
                .iter()
                .zip(self.rules.iter())
                .all(|(expected, actual)| expected.same_traffic(actual))
    }
}
