//! Resource graph
//!
//! Flattens a base stack and its server compositions into an ordered list of
//! declared resources. Every resource gets a logical id that is stable across
//! runs, and lists the logical ids it depends on. Dependencies always point
//! at resources declared earlier in the list.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use crate::composition::Composition;
use crate::domain::platform::short_hash;
use crate::domain::stack::BaseStack;
use crate::error::PlatformError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Network,
    SubnetGroup,
    Endpoint,
    SecurityPolicy,
    Repository,
    FileSystem,
    LogDestination,
    Role,
    Cluster,
    TaskTemplate,
    Service,
    LoadBalancer,
    Dashboard,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "Network",
            Self::SubnetGroup => "SubnetGroup",
            Self::Endpoint => "Endpoint",
            Self::SecurityPolicy => "SecurityPolicy",
            Self::Repository => "Repository",
            Self::FileSystem => "FileSystem",
            Self::LogDestination => "LogDestination",
            Self::Role => "Role",
            Self::Cluster => "Cluster",
            Self::TaskTemplate => "TaskTemplate",
            Self::Service => "Service",
            Self::LoadBalancer => "LoadBalancer",
            Self::Dashboard => "Dashboard",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclaredResource {
    pub logical_id: String,
    pub kind: ResourceKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    pub properties: serde_json::Value,
}

/// `{Scope}{Kind}{HASH8}`, hashed over the construct path
pub fn logical_id(stack: &str, scope: &str, kind: ResourceKind, name: &str) -> String {
    let path = format!("{}/{}/{}/{}", stack, scope, kind, name);
    let scope: String = scope.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    format!("{}{}{}", scope, kind, short_hash(&path))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceGraph {
    pub stack: String,
    resources: Vec<DeclaredResource>,
    /// (kind, resource name) -> logical id
    #[serde(skip)]
    index: BTreeMap<(ResourceKind, String), String>,
}

impl ResourceGraph {
    pub fn new(stack: impl Into<String>) -> Self {
        Self {
            stack: stack.into(),
            ..Self::default()
        }
    }

    /// Graph for a base stack followed by each composition
    pub fn build(stack: &BaseStack, compositions: &[Composition]) -> Result<Self, PlatformError> {
        let mut graph = Self::new(&stack.name);
        graph.add_base_stack(stack)?;
        for composition in compositions {
            graph.add_composition(composition)?;
        }
        Ok(graph)
    }

    pub fn resources(&self) -> &[DeclaredResource] {
        &self.resources
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn get(&self, logical_id: &str) -> Option<&DeclaredResource> {
        self.resources.iter().find(|r| r.logical_id == logical_id)
    }

    /// Logical id of a named resource already in the graph
    pub fn lookup(&self, kind: ResourceKind, name: &str) -> Option<&str> {
        self.index.get(&(kind, name.to_string())).map(String::as_str)
    }

    pub fn of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &DeclaredResource> {
        self.resources.iter().filter(move |r| r.kind == kind)
    }

    fn declare<T: Serialize>(
        &mut self,
        scope: &str,
        kind: ResourceKind,
        name: &str,
        value: &T,
        depends_on: Vec<String>,
    ) -> Result<String, PlatformError> {
        let properties = serde_json::to_value(value).map_err(|source| PlatformError::Serialize {
            stack: self.stack.clone(),
            source,
        })?;
        let id = logical_id(&self.stack, scope, kind, name);
        debug!("Declared {} {} as {}", kind, name, id);

        self.index.insert((kind, name.to_string()), id.clone());
        self.resources.push(DeclaredResource {
            logical_id: id.clone(),
            kind,
            depends_on,
            properties,
        });
        Ok(id)
    }

    fn deps(&self, wanted: &[(ResourceKind, &str)]) -> Vec<String> {
        wanted
            .iter()
            .filter_map(|(kind, name)| self.lookup(*kind, name).map(str::to_string))
            .collect()
    }

    pub fn add_base_stack(&mut self, stack: &BaseStack) -> Result<(), PlatformError> {
        let network = &stack.network;
        let network_id = self.declare(
            &network.name,
            ResourceKind::Network,
            &network.name,
            &serde_json::json!({
                "name": network.name,
                "cidr": network.cidr,
                "max_azs": network.max_azs,
                "dns_support": network.dns_support,
                "dns_hostnames": network.dns_hostnames,
            }),
            Vec::new(),
        )?;

        for group in &network.subnet_groups {
            self.declare(
                &network.name,
                ResourceKind::SubnetGroup,
                &group.name,
                group,
                vec![network_id.clone()],
            )?;
        }

        let endpoint_policy = &network.endpoint_policy;
        let endpoint_policy_id = self.declare(
            &network.name,
            ResourceKind::SecurityPolicy,
            &endpoint_policy.name,
            endpoint_policy,
            vec![network_id.clone()],
        )?;

        for endpoint in &network.endpoints {
            let mut depends_on = vec![network_id.clone(), endpoint_policy_id.clone()];
            depends_on.extend(self.deps(&[(ResourceKind::SubnetGroup, &endpoint.subnet_group)]));
            self.declare(
                &network.name,
                ResourceKind::Endpoint,
                &endpoint.service,
                endpoint,
                depends_on,
            )?;
        }

        self.declare(
            &stack.name,
            ResourceKind::Repository,
            &stack.repository.name,
            &stack.repository,
            Vec::new(),
        )?;

        for volume in stack.volumes.values() {
            let policy_id = self.declare(
                &volume.name,
                ResourceKind::SecurityPolicy,
                &volume.security_policy.name,
                &volume.security_policy,
                vec![network_id.clone()],
            )?;
            self.declare(
                &volume.name,
                ResourceKind::FileSystem,
                &volume.file_system_id,
                volume,
                vec![network_id.clone(), policy_id],
            )?;
        }

        Ok(())
    }

    pub fn add_composition(&mut self, composition: &Composition) -> Result<(), PlatformError> {
        let scope = composition.server.as_str();
        let network = composition.cluster.network.as_str();

        let policy_id = self.declare(
            scope,
            ResourceKind::SecurityPolicy,
            &composition.security_policy.name,
            &composition.security_policy,
            self.deps(&[(ResourceKind::Network, network)]),
        )?;

        let log_id = self.declare(
            scope,
            ResourceKind::LogDestination,
            &composition.log_destination.name,
            &composition.log_destination,
            Vec::new(),
        )?;

        let telemetry_id = self.declare(
            scope,
            ResourceKind::Role,
            &composition.roles.telemetry.name,
            &composition.roles.telemetry,
            Vec::new(),
        )?;
        let execution_id = self.declare(
            scope,
            ResourceKind::Role,
            &composition.roles.execution.name,
            &composition.roles.execution,
            vec![log_id.clone()],
        )?;

        let cluster_id = self.declare(
            scope,
            ResourceKind::Cluster,
            &composition.cluster.name,
            &composition.cluster,
            self.deps(&[(ResourceKind::Network, network)]),
        )?;

        let mut task_deps = vec![telemetry_id, execution_id, log_id];
        for volume in &composition.task.volumes {
            task_deps.extend(self.deps(&[(ResourceKind::FileSystem, &volume.file_system_id)]));
        }
        let task_id = self.declare(
            scope,
            ResourceKind::TaskTemplate,
            &composition.task.family,
            &composition.task,
            task_deps,
        )?;

        let service_id = self.declare(
            scope,
            ResourceKind::Service,
            &composition.service.name,
            &composition.service,
            vec![cluster_id, task_id, policy_id],
        )?;

        if let Some(load_balancer) = &composition.load_balancer {
            self.declare(
                scope,
                ResourceKind::LoadBalancer,
                &load_balancer.name,
                load_balancer,
                vec![service_id.clone()],
            )?;
        }

        self.declare(
            scope,
            ResourceKind::Dashboard,
            &composition.dashboard.name,
            &composition.dashboard,
            vec![service_id],
        )?;

        Ok(())
    }

    /// Serialized graph, as written to a manifest
    pub fn to_json(&self) -> Result<Vec<u8>, PlatformError> {
        serde_json::to_vec_pretty(self).map_err(|source| PlatformError::Serialize {
            stack: self.stack.clone(),
            source,
        })
    }

    /// SHA-256 of the serialized graph, hex encoded
    pub fn digest(&self) -> Result<String, PlatformError> {
        Ok(format!("{:x}", Sha256::digest(self.to_json()?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::{Composer, ServerSpec};
    use crate::domain::image::{ImageRef, RepositoryHandle};
    use crate::domain::network::NetworkLayout;
    use crate::domain::platform::PlatformContext;
    use crate::domain::traffic::{Protocol, TrafficProfile};

    fn stack() -> BaseStack {
        let ctx = PlatformContext::new("123456789012", "us-east-1");
        BaseStack::build(
            "Games",
            &ctx,
            &NetworkLayout::default(),
            RepositoryHandle::new("minecraft", &ctx),
            &["Minecraft".to_string()],
        )
        .unwrap()
    }

    fn composition(stack: &BaseStack, with_volume: bool) -> Composition {
        let mut spec = ServerSpec::new(
            "CrewLink",
            stack.network.clone(),
            ImageRef::registry("ottomated/crewlink-server"),
            TrafficProfile::new(9736, Protocol::Tcp).with_load_balancer(true),
        );
        if with_volume {
            spec = spec.with_volume(stack.volume("Minecraft").unwrap());
        }
        Composer::new(&stack.context).compose(&spec).unwrap()
    }

    #[test]
    fn test_logical_ids_are_stable() {
        let a = logical_id("Games", "CrewLink", ResourceKind::Service, "CrewLinkService");
        let b = logical_id("Games", "CrewLink", ResourceKind::Service, "CrewLinkService");
        assert_eq!(a, b);
        assert!(a.starts_with("CrewLinkService"));
        assert_eq!(a.len(), "CrewLinkService".len() + 8);
        assert_ne!(a, logical_id("Other", "CrewLink", ResourceKind::Service, "CrewLinkService"));
    }

    #[test]
    fn test_base_stack_resources() {
        let graph = ResourceGraph::build(&stack(), &[]).unwrap();
        assert_eq!(graph.of_kind(ResourceKind::Network).count(), 1);
        assert_eq!(graph.of_kind(ResourceKind::Repository).count(), 1);
        assert_eq!(graph.of_kind(ResourceKind::FileSystem).count(), 1);
        assert_eq!(graph.of_kind(ResourceKind::Endpoint).count(), 7);
        assert!(graph.lookup(ResourceKind::Network, "GamesNetwork").is_some());
    }

    #[test]
    fn test_dependencies_point_backwards() {
        let stack = stack();
        let graph = ResourceGraph::build(&stack, &[composition(&stack, true)]).unwrap();

        for (index, resource) in graph.resources().iter().enumerate() {
            for dep in &resource.depends_on {
                let position = graph
                    .resources()
                    .iter()
                    .position(|r| &r.logical_id == dep)
                    .unwrap();
                assert!(position < index, "{} depends on later {}", resource.logical_id, dep);
            }
        }

        let task = graph.of_kind(ResourceKind::TaskTemplate).next().unwrap();
        let fs = graph.of_kind(ResourceKind::FileSystem).next().unwrap();
        assert!(task.depends_on.contains(&fs.logical_id));
    }

    #[test]
    fn test_composition_resources() {
        let stack = stack();
        let graph = ResourceGraph::build(&stack, &[composition(&stack, false)]).unwrap();
        assert_eq!(graph.of_kind(ResourceKind::Role).count(), 2);
        assert_eq!(graph.of_kind(ResourceKind::LoadBalancer).count(), 1);

        let service = graph.of_kind(ResourceKind::Service).next().unwrap();
        assert_eq!(service.depends_on.len(), 3);
        assert_eq!(service.properties["replica_count"], 1);
    }

    #[test]
    fn test_digest_is_deterministic() {
        let stack = stack();
        let a = ResourceGraph::build(&stack, &[composition(&stack, false)]).unwrap();
        let b = ResourceGraph::build(&stack, &[composition(&stack, false)]).unwrap();
        assert_eq!(a.digest().unwrap(), b.digest().unwrap());

        let c = ResourceGraph::build(&stack, &[composition(&stack, true)]).unwrap();
        assert_ne!(a.digest().unwrap(), c.digest().unwrap());
    }
}
