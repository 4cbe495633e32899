//! Service domain types
//!
//! Log destination, scheduling cluster, task template and the running
//! service descriptor. A service always runs exactly one replica: game
//! servers are stateful single-instance workloads, and rollouts may never
//! start a second copy next to the first.

use serde::{Deserialize, Serialize};

use super::container::ContainerDefinition;
use super::network::SubnetSelection;
use super::platform::RemovalPolicy;
use crate::error::SizingError;

/// Log retention for every deployment
pub const LOG_RETENTION_DAYS: u32 = 30;

/// Container platform version services are pinned to
pub const PLATFORM_VERSION: &str = "1.4.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogDestination {
    pub name: String,
    pub arn: String,
    pub retention_days: u32,
    pub removal: RemovalPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub name: String,
    pub network: String,
}

/// Optional CPU/memory request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizingOverride {
    #[serde(default)]
    pub cpu: Option<u32>,

    #[serde(default)]
    pub memory_mib: Option<u32>,
}

impl SizingOverride {
    pub fn new(cpu: u32, memory_mib: u32) -> Self {
        Self {
            cpu: Some(cpu),
            memory_mib: Some(memory_mib),
        }
    }

    /// Layer `other` on top of `self`
    pub fn merge(self, other: SizingOverride) -> Self {
        Self {
            cpu: other.cpu.or(self.cpu),
            memory_mib: other.memory_mib.or(self.memory_mib),
        }
    }

    /// Fill gaps from the platform defaults and validate the combination
    pub fn resolve(&self) -> Result<Sizing, SizingError> {
        let sizing = Sizing {
            cpu: self.cpu.unwrap_or(Sizing::DEFAULT_CPU),
            memory_mib: self
                .memory_mib
                .unwrap_or_else(|| Sizing::min_memory_for(self.cpu.unwrap_or(Sizing::DEFAULT_CPU))),
        };
        sizing.validate()?;
        Ok(sizing)
    }
}

/// Task CPU units and memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sizing {
    pub cpu: u32,
    pub memory_mib: u32,
}

impl Sizing {
    pub const DEFAULT_CPU: u32 = 256;
    pub const DEFAULT_MEMORY_MIB: u32 = 512;

    /// Smallest memory accepted for a CPU value
    fn min_memory_for(cpu: u32) -> u32 {
        match cpu {
            256 => 512,
            512 => 1024,
            1024 => 2048,
            2048 => 4096,
            4096 => 8192,
            _ => Self::DEFAULT_MEMORY_MIB,
        }
    }

    /// Check the CPU/memory pair against what the container platform accepts
    pub fn validate(&self) -> Result<(), SizingError> {
        let unsupported = || SizingError::UnsupportedMemory {
            cpu: self.cpu,
            memory_mib: self.memory_mib,
        };

        let (min, max) = match self.cpu {
            256 => {
                return if [512, 1024, 2048].contains(&self.memory_mib) {
                    Ok(())
                } else {
                    Err(unsupported())
                };
            }
            512 => (1024, 4096),
            1024 => (2048, 8192),
            2048 => (4096, 16384),
            4096 => (8192, 30720),
            cpu => return Err(SizingError::UnsupportedCpu { cpu }),
        };

        if self.memory_mib < min || self.memory_mib > max || self.memory_mib % 1024 != 0 {
            return Err(unsupported());
        }
        Ok(())
    }
}

impl Default for Sizing {
    fn default() -> Self {
        Self {
            cpu: Self::DEFAULT_CPU,
            memory_mib: Self::DEFAULT_MEMORY_MIB,
        }
    }
}

/// Task-level volume bound to an external file system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskVolume {
    pub name: String,
    pub file_system_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTemplate {
    pub family: String,
    pub sizing: Sizing,
    /// Principal assumed by the running container
    pub task_role: String,
    /// Principal used to pull the image and ship logs
    pub execution_role: String,
    pub volumes: Vec<TaskVolume>,
    pub containers: Vec<ContainerDefinition>,
}

impl TaskTemplate {
    pub fn new(
        family: impl Into<String>,
        sizing: Sizing,
        task_role: impl Into<String>,
        execution_role: impl Into<String>,
    ) -> Self {
        Self {
            family: family.into(),
            sizing,
            task_role: task_role.into(),
            execution_role: execution_role.into(),
            volumes: Vec::new(),
            containers: Vec::new(),
        }
    }

    pub fn with_container(mut self, container: ContainerDefinition) -> Self {
        self.containers.push(container);
        self
    }

    pub fn with_volume(mut self, volume: TaskVolume) -> Self {
        if !self.volumes.iter().any(|v| v.name == volume.name) {
            self.volumes.push(volume);
        }
        self
    }

    /// The game container
    pub fn container(&self) -> Option<&ContainerDefinition> {
        self.containers.first()
    }

    /// Replace the game container with the result of `f`
    pub fn map_container(
        mut self,
        f: impl FnOnce(ContainerDefinition) -> ContainerDefinition,
    ) -> Self {
        if !self.containers.is_empty() {
            let container = self.containers.remove(0);
            self.containers.insert(0, f(container));
        }
        self
    }
}

/// Rollout rules of a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentPolicy {
    pub min_healthy_percent: u32,
    pub max_healthy_percent: u32,
    pub rollback_on_failure: bool,
}

impl DeploymentPolicy {
    /// Never run more than the desired count; roll back failed deployments
    fn single_instance() -> Self {
        Self {
            min_healthy_percent: 0,
            max_healthy_percent: 100,
            rollback_on_failure: true,
        }
    }
}

/// Whether the single replica starts with the stack or waits for a trigger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartMode {
    #[default]
    Running,
    /// Declared with its task parked (desired count 0) until an external
    /// trigger starts it
    Parked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub name: String,
    pub cluster: String,
    pub task_family: String,
    pub subnets: SubnetSelection,
    pub security_policy: String,
    pub assign_public_ip: bool,
    pub platform_version: String,
    pub start_mode: StartMode,
    replica_count: u32,
    deployment: DeploymentPolicy,
}

impl ServiceDescriptor {
    /// The only replica count a service can have
    pub const REPLICAS: u32 = 1;

    pub fn new(
        name: impl Into<String>,
        cluster: &Cluster,
        task: &TaskTemplate,
        subnets: SubnetSelection,
        security_policy: impl Into<String>,
        start_mode: StartMode,
    ) -> Self {
        Self {
            name: name.into(),
            cluster: cluster.name.clone(),
            task_family: task.family.clone(),
            subnets,
            security_policy: security_policy.into(),
            assign_public_ip: true,
            platform_version: PLATFORM_VERSION.to_string(),
            start_mode,
            replica_count: Self::REPLICAS,
            deployment: DeploymentPolicy::single_instance(),
        }
    }

    pub fn replica_count(&self) -> u32 {
        self.replica_count
    }

    /// Desired count declared to the platform at creation
    pub fn initial_desired_count(&self) -> u32 {
        match self.start_mode {
            StartMode::Running => self.replica_count,
            StartMode::Parked => 0,
        }
    }

    pub fn deployment_policy(&self) -> &DeploymentPolicy {
        &self.deployment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sizing() {
        let sizing = SizingOverride::default().resolve().unwrap();
        assert_eq!(sizing, Sizing::default());
    }

    #[test]
    fn test_cpu_only_gets_minimum_memory() {
        let sizing = SizingOverride {
            cpu: Some(4096),
            memory_mib: None,
        }
        .resolve()
        .unwrap();
        assert_eq!(sizing.memory_mib, 8192);
    }

    #[test]
    fn test_valid_combinations() {
        for (cpu, memory) in [(256, 512), (256, 2048), (512, 4096), (1024, 2048), (4096, 10240), (4096, 30720)] {
            assert!(Sizing { cpu, memory_mib: memory }.validate().is_ok(), "{}/{}", cpu, memory);
        }
    }

    #[test]
    fn test_invalid_combinations() {
        assert_eq!(
            Sizing { cpu: 300, memory_mib: 512 }.validate(),
            Err(SizingError::UnsupportedCpu { cpu: 300 })
        );
        assert!(Sizing { cpu: 256, memory_mib: 4096 }.validate().is_err());
        assert!(Sizing { cpu: 1024, memory_mib: 1024 }.validate().is_err());
        assert!(Sizing { cpu: 4096, memory_mib: 10000 }.validate().is_err());
    }

    #[test]
    fn test_sizing_merge() {
        let merged = SizingOverride::new(4096, 10240).merge(SizingOverride {
            cpu: None,
            memory_mib: Some(16384),
        });
        assert_eq!(merged, SizingOverride::new(4096, 16384));
    }

    fn service(start_mode: StartMode) -> ServiceDescriptor {
        let cluster = Cluster {
            name: "Minecraft".to_string(),
            network: "GameNetwork".to_string(),
        };
        let task = TaskTemplate::new("Minecraft", Sizing::default(), "task", "exec");
        let subnets = SubnetSelection {
            group: "GameServers".to_string(),
            subnet_ids: vec!["subnet-1".to_string()],
        };
        ServiceDescriptor::new("Minecraft", &cluster, &task, subnets, "Minecraft", start_mode)
    }

    #[test]
    fn test_single_replica_policy() {
        let service = service(StartMode::Running);
        assert_eq!(service.replica_count(), 1);
        assert_eq!(service.initial_desired_count(), 1);
        assert_eq!(service.deployment_policy().max_healthy_percent, 100);
        assert!(service.deployment_policy().rollback_on_failure);
        assert!(service.assign_public_ip);
    }

    #[test]
    fn test_parked_service_keeps_one_replica() {
        let service = service(StartMode::Parked);
        assert_eq!(service.replica_count(), 1);
        assert_eq!(service.initial_desired_count(), 0);
    }
}
