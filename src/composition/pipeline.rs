//! Composition pipeline
//!
//! Runs the fourteen steps of [`Step::ALL`] in order for one server spec.
//! Each step reads only what earlier steps left in the composition state,
//! and stops the run on the first failure.

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::output::Composition;
use super::overrides::{MetricsScope, StepOverrides};
use super::spec::{ServerSpec, ValidatedSpec};
use super::step::{Step, StepResult};
use crate::domain::container::{
    service_mount_path, ContainerDefinition, HealthProbe, LogBinding, MountPoint,
};
use crate::domain::dashboard::{base_dashboard, Dashboard};
use crate::domain::identity::{Capability, IdentityRoles, ResourceScope, READ_OBJECT};
use crate::domain::load_balancer::LoadBalancer;
use crate::domain::network::{SubnetSelection, GAME_SERVERS_GROUP};
use crate::domain::platform::{PlatformContext, RemovalPolicy};
use crate::domain::security::{Peer, PortRange, SecurityPolicy, FILE_SYSTEM_PORT, HTTPS_PORT};
use crate::domain::service::{
    Cluster, LogDestination, ServiceDescriptor, TaskTemplate, TaskVolume, LOG_RETENTION_DAYS,
};
use crate::domain::traffic::{PortBinding, Protocol};
use crate::error::{CompositionError, PolicyError};
use crate::observability::{CompositionTracker, EventMetadata, StepTimer};

enum StepOutcome {
    Done,
    Skipped(&'static str),
}

/// Values produced so far, one slot per producing step
#[derive(Default)]
struct CompositionState {
    subnets: Option<SubnetSelection>,
    security_policy: Option<SecurityPolicy>,
    log_destination: Option<LogDestination>,
    roles: Option<IdentityRoles>,
    cluster: Option<Cluster>,
    task: Option<TaskTemplate>,
    service: Option<ServiceDescriptor>,
    load_balancer: Option<LoadBalancer>,
    dashboard: Option<Dashboard>,
}

fn out_of_order(server: &str, step: Step, needs: Step) -> CompositionError {
    CompositionError::OutOfOrder {
        server: server.to_string(),
        step,
        needs,
    }
}

fn require<'a, T>(
    slot: &'a Option<T>,
    server: &str,
    step: Step,
    needs: Step,
) -> Result<&'a T, CompositionError> {
    slot.as_ref().ok_or_else(|| out_of_order(server, step, needs))
}

fn take<T>(
    slot: &mut Option<T>,
    server: &str,
    step: Step,
    needs: Step,
) -> Result<T, CompositionError> {
    slot.take().ok_or_else(|| out_of_order(server, step, needs))
}

impl CompositionState {
    fn finish(self, server: &str, steps: Vec<StepResult>) -> Result<Composition, CompositionError> {
        let last = Step::AddMetrics;
        Ok(Composition {
            server: server.to_string(),
            subnets: self
                .subnets
                .ok_or_else(|| out_of_order(server, last, Step::ResolveSubnet))?,
            security_policy: self
                .security_policy
                .ok_or_else(|| out_of_order(server, last, Step::BuildSecurityPolicy))?,
            log_destination: self
                .log_destination
                .ok_or_else(|| out_of_order(server, last, Step::ProvisionLogging))?,
            roles: self
                .roles
                .ok_or_else(|| out_of_order(server, last, Step::DeriveIdentity))?,
            cluster: self
                .cluster
                .ok_or_else(|| out_of_order(server, last, Step::CreateCluster))?,
            task: self
                .task
                .ok_or_else(|| out_of_order(server, last, Step::CreateTaskTemplate))?,
            service: self
                .service
                .ok_or_else(|| out_of_order(server, last, Step::CreateService))?,
            load_balancer: self.load_balancer,
            dashboard: self
                .dashboard
                .ok_or_else(|| out_of_order(server, last, Step::CreateDashboard))?,
            steps,
        })
    }
}

/// Drives server specs through the pipeline
#[derive(Debug, Clone)]
pub struct Composer {
    ctx: PlatformContext,
    overrides: StepOverrides,
    events: Option<EventMetadata>,
    emit_events: bool,
}

impl Composer {
    pub fn new(ctx: &PlatformContext) -> Self {
        Self {
            ctx: ctx.clone(),
            overrides: StepOverrides::default(),
            events: None,
            emit_events: true,
        }
    }

    /// Builder: specialization hooks
    pub fn with_overrides(mut self, overrides: StepOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Builder: attach run metadata so events of several compositions share
    /// one run id
    pub fn with_events(mut self, metadata: EventMetadata) -> Self {
        self.events = Some(metadata);
        self
    }

    /// Builder: compose without writing `GAMESTACK_EVENT` lines
    pub fn without_events(mut self) -> Self {
        self.emit_events = false;
        self
    }

    pub fn emits_events(&self) -> bool {
        self.emit_events
    }

    /// Compose one server
    pub fn compose(&self, spec: &ServerSpec) -> Result<Composition, CompositionError> {
        let spec = spec
            .validate()
            .map_err(|source| CompositionError::InvalidSpec {
                server: spec.name.clone(),
                source,
            })?;

        let metadata = self
            .events
            .clone()
            .unwrap_or_else(|| {
                EventMetadata::new(
                    Uuid::new_v4(),
                    &spec.name,
                    &self.ctx.account,
                    &self.ctx.region,
                )
            })
            .for_server(&spec.name);
        let mut tracker = CompositionTracker::new(metadata);
        if !self.emit_events {
            tracker = tracker.silenced();
        }
        tracker.emit_started(&Step::ALL);

        info!("Composing {} ({})", spec.name, spec.image.image_uri());

        let mut state = CompositionState::default();
        let mut results = Vec::with_capacity(Step::ALL.len());

        for step in Step::ALL {
            debug!("[{}/{}] {}", step.number(), Step::ALL.len(), step);

            let timer = StepTimer::start(step);
            let result = match self.execute_step(step, &spec, &mut state) {
                Ok(StepOutcome::Done) => timer.finish(),
                Ok(StepOutcome::Skipped(reason)) => {
                    debug!("{} skipped: {}", step, reason);
                    timer.finish_skipped(reason)
                }
                Err(e) => {
                    warn!("{} failed at {}: {}", spec.name, step, e);
                    tracker.record(&timer.finish_failed(e.to_string()));
                    tracker.emit_failed(Some(step), e.to_string());
                    return Err(e);
                }
            };
            tracker.record(&result);
            results.push(result);
        }

        let composition = state.finish(&spec.name, results)?;
        tracker.emit_completed();

        info!(
            "Composed {}: {} port mapping(s), load balancer: {}",
            composition.server,
            composition
                .container()
                .map(|c| c.port_mappings.len())
                .unwrap_or(0),
            composition.load_balancer.is_some()
        );

        Ok(composition)
    }

    /// Execute a single pipeline step
    fn execute_step(
        &self,
        step: Step,
        spec: &ValidatedSpec,
        state: &mut CompositionState,
    ) -> Result<StepOutcome, CompositionError> {
        let server = spec.name.as_str();

        match step {
            Step::ResolveSubnet => {
                let subnets = spec
                    .network
                    .select_subnets(GAME_SERVERS_GROUP)
                    .map_err(|source| CompositionError::Network {
                        server: server.to_string(),
                        step,
                        source,
                    })?;
                state.subnets = Some(subnets);
            }

            Step::BuildSecurityPolicy => {
                let base = base_security_policy(spec);
                let policy = match &self.overrides.security_policy {
                    Some(hook) => {
                        let extended = hook(base.clone());
                        if !extended.extends(&base) {
                            return Err(CompositionError::Policy {
                                server: server.to_string(),
                                step,
                                source: PolicyError::RulesRemoved { policy: base.name },
                            });
                        }
                        extended
                    }
                    None => base,
                };
                state.security_policy = Some(policy);
            }

            Step::ProvisionLogging => {
                state.log_destination = Some(LogDestination {
                    name: server.to_string(),
                    arn: self.ctx.log_destination_arn(server),
                    retention_days: LOG_RETENTION_DAYS,
                    removal: RemovalPolicy::Destroy,
                });
            }

            Step::DeriveIdentity => {
                let log = require(&state.log_destination, server, step, Step::ProvisionLogging)?;
                let mut roles = IdentityRoles::derive(server, &log.arn, spec.image.repository_arn());
                for capability in &self.overrides.task_capabilities {
                    roles.telemetry = roles.telemetry.grant(capability.clone());
                }
                state.roles = Some(roles);
            }

            Step::CreateCluster => {
                state.cluster = Some(Cluster {
                    name: server.to_string(),
                    network: spec.network.name.clone(),
                });
            }

            Step::CreateTaskTemplate => {
                let roles = require(&state.roles, server, step, Step::DeriveIdentity)?;
                let sizing = spec
                    .sizing
                    .resolve()
                    .map_err(|source| CompositionError::Sizing {
                        server: server.to_string(),
                        step,
                        source,
                    })?;
                state.task = Some(TaskTemplate::new(
                    server,
                    sizing,
                    &roles.telemetry.name,
                    &roles.execution.name,
                ));
            }

            Step::AttachContainer => {
                let log = require(&state.log_destination, server, step, Step::ProvisionLogging)?;
                let container = self.container_definition(spec, log);
                let task = take(&mut state.task, server, step, Step::CreateTaskTemplate)?;
                state.task = Some(task.with_container(container));
            }

            Step::BindPorts => {
                let task = take(&mut state.task, server, step, Step::AttachContainer)?;
                let bindings = spec.traffic.bindings();
                state.task = Some(task.map_container(|container| {
                    bindings
                        .into_iter()
                        .fold(container, |c, binding| c.with_port_mapping(binding.into()))
                }));
            }

            Step::AttachVolume => {
                let Some(volume) = &spec.volume else {
                    return Ok(StepOutcome::Skipped("no persistent volume"));
                };

                let mut paths = vec![service_mount_path(server)];
                paths.extend(spec.mount_paths.iter().cloned());

                let task = take(&mut state.task, server, step, Step::CreateTaskTemplate)?
                    .with_volume(TaskVolume {
                        name: volume.name.clone(),
                        file_system_id: volume.file_system_id.clone(),
                    })
                    .map_container(|container| {
                        paths.into_iter().fold(container, |c, container_path| {
                            c.with_mount_point(MountPoint {
                                source_volume: volume.name.clone(),
                                container_path,
                                read_only: false,
                            })
                        })
                    });
                state.task = Some(task);
            }

            Step::AttachEnvironmentFile => {
                let task = require(&state.task, server, step, Step::AttachContainer)?;
                let sources = task
                    .container()
                    .map(|c| c.environment_files.clone())
                    .unwrap_or_default();
                if sources.is_empty() {
                    return Ok(StepOutcome::Skipped("container reads no environment file"));
                }

                let mut roles = take(&mut state.roles, server, step, Step::DeriveIdentity)?;
                for source in &sources {
                    roles.execution = roles.execution.grant(Capability::new(
                        &[READ_OBJECT],
                        ResourceScope::arn(source.object_arn()),
                    ));
                }
                state.roles = Some(roles);
            }

            Step::CreateService => {
                let policy =
                    require(&state.security_policy, server, step, Step::BuildSecurityPolicy)?;
                verify_required_paths(policy, spec).map_err(|source| CompositionError::Policy {
                    server: server.to_string(),
                    step,
                    source,
                })?;
                let cluster = require(&state.cluster, server, step, Step::CreateCluster)?;
                let task = require(&state.task, server, step, Step::CreateTaskTemplate)?;
                let subnets = require(&state.subnets, server, step, Step::ResolveSubnet)?;

                state.service = Some(ServiceDescriptor::new(
                    server,
                    cluster,
                    task,
                    subnets.clone(),
                    &policy.name,
                    spec.start_mode,
                ));
            }

            Step::CreateLoadBalancer => {
                if !spec.traffic.create_load_balancer {
                    return Ok(StepOutcome::Skipped("load balancer not requested"));
                }
                let service = require(&state.service, server, step, Step::CreateService)?;
                let subnets = require(&state.subnets, server, step, Step::ResolveSubnet)?;
                state.load_balancer = Some(LoadBalancer::for_service(
                    server,
                    &service.name,
                    subnets.clone(),
                    &spec.traffic,
                ));
            }

            Step::CreateDashboard => {
                let service = require(&state.service, server, step, Step::CreateService)?;
                let cluster = require(&state.cluster, server, step, Step::CreateCluster)?;
                state.dashboard = Some(base_dashboard(server, &service.name, &cluster.name));
            }

            Step::AddMetrics => {
                let Some(hook) = &self.overrides.metrics else {
                    return Ok(StepOutcome::Skipped("no extra panels"));
                };
                let service = require(&state.service, server, step, Step::CreateService)?;
                let cluster = require(&state.cluster, server, step, Step::CreateCluster)?;
                let scope = MetricsScope {
                    server: server.to_string(),
                    service_name: service.name.clone(),
                    cluster_name: cluster.name.clone(),
                };

                let base = take(&mut state.dashboard, server, step, Step::CreateDashboard)?;
                let dashboard = hook(base.clone(), &scope);
                if !dashboard.extends(&base) {
                    return Err(CompositionError::Policy {
                        server: server.to_string(),
                        step,
                        source: PolicyError::PanelsRemoved {
                            dashboard: base.name,
                        },
                    });
                }
                state.dashboard = Some(dashboard);
            }
        }

        Ok(StepOutcome::Done)
    }

    /// Base container plus spec and specialization overrides
    fn container_definition(&self, spec: &ValidatedSpec, log: &LogDestination) -> ContainerDefinition {
        let logging = LogBinding {
            log_destination: log.name.clone(),
            stream_prefix: spec.name.clone(),
        };

        let mut container = ContainerDefinition::new(spec.image.image_uri(), logging);
        if spec.traffic.health_check_protocol() == Protocol::Tcp {
            container.health_check = Some(HealthProbe::http(spec.traffic.health_check_port()));
        }
        if let Some(source) = &spec.environment_file {
            container = container.with_environment_file(source.clone());
        }

        let container = container.apply_overrides(&spec.container);
        match &self.overrides.container {
            Some(hook) => hook(container),
            None => container,
        }
    }
}

/// Default-deny policy with the paths every game server needs
fn base_security_policy(spec: &ValidatedSpec) -> SecurityPolicy {
    let primary = spec.traffic.primary;

    let mut policy = SecurityPolicy::new(
        &spec.name,
        format!("{} game server", spec.name),
        &spec.network.name,
    )
    .with_egress(
        Peer::AnyIpv4,
        Protocol::Tcp,
        PortRange::single(HTTPS_PORT),
        "Telemetry, logs and image pulls",
    )
    .with_ingress(
        Peer::AnyIpv4,
        primary.protocol,
        PortRange::single(primary.port),
        format!("Game traffic on {}", primary),
    );

    if let Some(health) = spec.traffic.health_check {
        policy = policy.with_ingress(
            Peer::AnyIpv4,
            health.protocol,
            PortRange::single(health.port),
            format!("Health checks on {}", health),
        );
    }

    if let Some(volume) = &spec.volume {
        policy = policy.with_bidirectional(
            volume.peer(),
            Protocol::Tcp,
            FILE_SYSTEM_PORT,
            format!("File system {}", volume.name),
        );
    }

    policy
}

/// Every path the service depends on must be open before it is declared
fn verify_required_paths(policy: &SecurityPolicy, spec: &ValidatedSpec) -> Result<(), PolicyError> {
    let missing = |path: String| PolicyError::MissingRequiredPath {
        policy: policy.name.clone(),
        path,
    };

    let https = PortBinding::tcp(HTTPS_PORT);
    if !policy.allows_egress(https) {
        return Err(missing(format!("egress {}", https)));
    }

    for binding in spec.traffic.bindings() {
        if !policy.allows_ingress(binding) {
            return Err(missing(format!("ingress {}", binding)));
        }
    }

    if let Some(volume) = &spec.volume {
        let nfs = PortBinding::tcp(FILE_SYSTEM_PORT);
        if !policy.allows_bidirectional(&volume.peer(), nfs) {
            return Err(missing(format!("{} with {}", nfs, volume.security_scope)));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::StepStatus;
    use crate::domain::container::{ContainerOverrides, EnvironmentSource};
    use crate::domain::dashboard::{GraphPanel, Metric};
    use crate::domain::identity::IMAGE_READ_ACTIONS;
    use crate::domain::image::{ImageRef, RepositoryHandle};
    use crate::domain::network::{Network, NetworkLayout};
    use crate::domain::security::Direction;
    use crate::domain::service::{SizingOverride, StartMode};
    use crate::domain::traffic::TrafficProfile;
    use crate::domain::volume::VolumeRef;
    use std::sync::Arc;

    fn ctx() -> PlatformContext {
        PlatformContext::new("123456789012", "us-east-1")
    }

    fn network() -> Arc<Network> {
        Arc::new(Network::build("GamesNetwork", &NetworkLayout::default(), &ctx()).unwrap())
    }

    fn minecraft_spec() -> ServerSpec {
        let network = network();
        let volume = network.provision_volume("Minecraft").unwrap().reference();
        ServerSpec::new(
            "Minecraft",
            network,
            ImageRef::repository(RepositoryHandle::new("minecraft", &ctx()), None),
            TrafficProfile::new(25565, Protocol::Udp)
                .with_health_check(8443, Protocol::Tcp)
                .with_load_balancer(true),
        )
        .with_sizing(SizingOverride::new(4096, 10240))
        .with_volume(volume)
    }

    fn crewlink_spec() -> ServerSpec {
        ServerSpec::new(
            "CrewLink",
            network(),
            ImageRef::registry("ottomated/crewlink-server"),
            TrafficProfile::new(9736, Protocol::Tcp),
        )
    }

    fn compose(spec: &ServerSpec) -> Composition {
        Composer::new(&ctx()).compose(spec).unwrap()
    }

    #[test]
    fn test_udp_server_with_health_port_volume_and_load_balancer() {
        let composition = compose(&minecraft_spec());
        let container = composition.container().unwrap();

        let mappings: Vec<(u16, Protocol)> = container
            .port_mappings
            .iter()
            .map(|m| (m.container_port, m.protocol))
            .collect();
        assert_eq!(mappings, vec![(25565, Protocol::Udp), (8443, Protocol::Tcp)]);

        let lb = composition.load_balancer.as_ref().unwrap();
        assert_eq!(lb.listeners.len(), 1);
        assert_eq!(lb.listeners[0].port, 25565);
        assert_eq!(lb.listeners[0].protocol, Protocol::Udp);
        assert_eq!(lb.target_groups.len(), 1);
        assert_eq!(lb.target_groups[0].targets, vec![composition.service.name.clone()]);

        assert_eq!(container.mount_points.len(), 1);
        assert_eq!(container.mount_points[0].container_path, "/mnt/minecraft");
        assert_eq!(composition.task.volumes.len(), 1);

        assert!(composition.service.deployment_policy().rollback_on_failure);
    }

    #[test]
    fn test_tcp_server_without_load_balancer() {
        let composition = compose(&crewlink_spec());
        let container = composition.container().unwrap();

        assert_eq!(container.port_mappings.len(), 1);
        assert_eq!(container.port_mappings[0].container_port, 9736);
        assert!(composition.load_balancer.is_none());
        assert_eq!(
            composition.step_status(Step::CreateLoadBalancer),
            Some(StepStatus::Skipped)
        );

        let ingress: Vec<_> = composition.security_policy.ingress_rules().collect();
        assert_eq!(ingress.len(), 1);
        assert_eq!(ingress[0].protocol, Protocol::Tcp);
        assert_eq!(ingress[0].ports, PortRange::single(9736));
    }

    #[test]
    fn test_health_check_defaults_to_primary_port() {
        let composition = compose(&crewlink_spec());
        let container = composition.container().unwrap();
        let probe = container.health_check.as_ref().unwrap();
        assert_eq!(probe.command[1], "curl -f http://localhost:9736");
        assert_eq!(container.port_mappings[0].container_port, 9736);
    }

    #[test]
    fn test_volume_traffic_is_bidirectional() {
        let spec = minecraft_spec();
        let volume = spec.volume.clone().unwrap();
        let composition = compose(&spec);
        assert!(composition
            .security_policy
            .allows_bidirectional(&volume.peer(), PortBinding::tcp(FILE_SYSTEM_PORT)));
    }

    #[test]
    fn test_image_read_scoping() {
        let internal = compose(&minecraft_spec());
        let repo_arn = "arn:aws:ecr:us-east-1:123456789012:repository/minecraft";
        for action in IMAGE_READ_ACTIONS {
            assert_eq!(
                internal.roles.execution.scopes_for(action),
                vec![&ResourceScope::arn(repo_arn)]
            );
        }

        let external = compose(&crewlink_spec());
        for action in IMAGE_READ_ACTIONS {
            assert_eq!(
                external.roles.execution.scopes_for(action),
                vec![&ResourceScope::Any]
            );
        }
    }

    #[test]
    fn test_single_replica_regardless_of_spec() {
        for spec in [
            minecraft_spec(),
            crewlink_spec(),
            crewlink_spec().with_start_mode(StartMode::Parked),
        ] {
            let composition = compose(&spec);
            assert_eq!(composition.service.replica_count(), 1);
            assert_eq!(composition.service.deployment_policy().max_healthy_percent, 100);
        }
    }

    #[test]
    fn test_all_steps_recorded_in_order() {
        let composition = compose(&crewlink_spec());
        let steps: Vec<Step> = composition.steps.iter().map(|r| r.step).collect();
        assert_eq!(steps, Step::ALL.to_vec());

        let skipped: Vec<Step> = composition.skipped_steps().collect();
        assert_eq!(
            skipped,
            vec![
                Step::AttachVolume,
                Step::AttachEnvironmentFile,
                Step::CreateLoadBalancer,
                Step::AddMetrics
            ]
        );
    }

    #[test]
    fn test_invalid_spec_fails_before_pipeline() {
        let mut spec = crewlink_spec();
        spec.traffic = TrafficProfile::new(9736, Protocol::Tcp).with_health_check(9736, Protocol::Tcp);
        let err = Composer::new(&ctx()).compose(&spec).unwrap_err();
        assert!(matches!(err, CompositionError::InvalidSpec { .. }));
        assert_eq!(err.step(), None);
    }

    #[test]
    fn test_silent_composer_produces_same_composition() {
        let composer = Composer::new(&ctx()).without_events();
        assert!(!composer.emits_events());
        assert!(Composer::new(&ctx()).emits_events());

        let silent = composer.compose(&crewlink_spec()).unwrap();
        let loud = compose(&crewlink_spec());
        assert_eq!(silent.steps.len(), Step::ALL.len());
        assert_eq!(silent.service.name, loud.service.name);
        assert_eq!(silent.container().unwrap(), loud.container().unwrap());
    }

    #[test]
    fn test_unsupported_sizing_fails_task_template_step() {
        let spec = crewlink_spec().with_sizing(SizingOverride::new(256, 4096));
        let err = Composer::new(&ctx()).compose(&spec).unwrap_err();
        assert_eq!(err.step(), Some(Step::CreateTaskTemplate));
        assert!(err.to_string().contains("Create task template"));
    }

    #[test]
    fn test_policy_hook_appends_rules() {
        let overrides = StepOverrides::new().with_security_policy(|policy| {
            policy.with_ingress(
                Peer::AnyIpv4,
                Protocol::Udp,
                PortRange::range(2456, 2457),
                "Extra game ports",
            )
        });
        let composition = Composer::new(&ctx())
            .with_overrides(overrides)
            .compose(&crewlink_spec())
            .unwrap();

        let rules = composition.security_policy.rules();
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[2].ports, PortRange::range(2456, 2457));
        assert_eq!(rules[2].direction, Direction::Ingress);
    }

    #[test]
    fn test_policy_hook_cannot_remove_rules() {
        let overrides = StepOverrides::new().with_security_policy(|policy| {
            SecurityPolicy::new(policy.name.clone(), policy.description.clone(), policy.network.clone())
        });
        let err = Composer::new(&ctx())
            .with_overrides(overrides)
            .compose(&crewlink_spec())
            .unwrap_err();
        assert_eq!(err.step(), Some(Step::BuildSecurityPolicy));
    }

    #[test]
    fn test_environment_file_grant_is_object_scoped() {
        let spec = crewlink_spec()
            .with_environment_file(EnvironmentSource::new("game-config", "crewlink/env"));
        let composition = compose(&spec);

        assert!(composition.container().unwrap().references_environment_file());
        assert_eq!(
            composition.roles.execution.scopes_for(READ_OBJECT),
            vec![&ResourceScope::arn("arn:aws:s3:::game-config/crewlink/env")]
        );
        assert!(!composition
            .roles
            .execution
            .can(READ_OBJECT, "arn:aws:s3:::game-config/other"));
    }

    #[test]
    fn test_container_overrides_win() {
        let spec = crewlink_spec().with_container(
            ContainerOverrides::default()
                .with_env("ADDRESS", "0.0.0.0")
                .with_health_check(HealthProbe::shell("curl --fail http://localhost:9736")),
        );
        let composition = compose(&spec);
        let container = composition.container().unwrap();
        assert_eq!(container.environment["ADDRESS"], "0.0.0.0");
        assert_eq!(
            container.health_check.as_ref().unwrap().command[1],
            "curl --fail http://localhost:9736"
        );
        assert_eq!(container.logging.stream_prefix, "CrewLink");
    }

    #[test]
    fn test_metrics_hook_appends_panels() {
        let overrides = StepOverrides::new().with_metrics(|dashboard, scope| {
            dashboard.with_panel(
                GraphPanel::new("Players")
                    .with_left(Metric::new("CrewLink", "Players").with_dimension("Service", &scope.service_name)),
            )
        });
        let composition = Composer::new(&ctx())
            .with_overrides(overrides)
            .compose(&crewlink_spec())
            .unwrap();

        let titles: Vec<&str> = composition
            .dashboard
            .panels()
            .iter()
            .map(|p| p.title.as_str())
            .collect();
        assert_eq!(titles, vec!["CPU Utilization", "Memory Utilization", "Players"]);
    }

    #[test]
    fn test_metrics_hook_cannot_drop_base_panels() {
        let overrides =
            StepOverrides::new().with_metrics(|dashboard, _| Dashboard::new(dashboard.name));
        let err = Composer::new(&ctx())
            .with_overrides(overrides)
            .compose(&crewlink_spec())
            .unwrap_err();
        assert_eq!(err.step(), Some(Step::AddMetrics));
    }

    #[test]
    fn test_outputs() {
        let composition = compose(&minecraft_spec());
        let outputs = composition.outputs();
        assert_eq!(outputs.service.name, "Minecraft");
        assert_eq!(outputs.security_policy.name, "Minecraft");
        let endpoint = outputs.endpoint.unwrap();
        assert_eq!((endpoint.port, endpoint.protocol), (25565, Protocol::Udp));

        assert!(compose(&crewlink_spec()).outputs().endpoint.is_none());
    }

    #[test]
    fn test_task_capabilities_extend_telemetry_principal() {
        let overrides = StepOverrides::new()
            .with_task_capability(Capability::new(&["ecs:DescribeTasks"], ResourceScope::Any));
        let composition = Composer::new(&ctx())
            .with_overrides(overrides)
            .compose(&crewlink_spec())
            .unwrap();
        assert!(composition.roles.telemetry.can("ecs:DescribeTasks", "*"));
        assert!(composition.roles.telemetry.can("cloudwatch:PutMetricData", "*"));
    }
}
