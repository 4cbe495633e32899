//! Synth service - turns a deployment file into provisioned resources
//!
//! Builds the base stack, picks a game specialization for every server,
//! layers the server's configuration over it, composes each server through
//! the pipeline and hands the resulting graph to a provisioning platform.

use colored::Colorize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::composition::{Composer, Composition, CompositionPhase, ServerSpec, StepStatus};
use crate::config::{DeploymentConfig, ImageConfig, ServerConfig};
use crate::domain::image::{ImageRef, RepositoryHandle};
use crate::domain::platform::PlatformContext;
use crate::domain::stack::BaseStack;
use crate::error::{ConfigError, GamestackError};
use crate::games::{self, GameKind, Specialization};
use crate::infrastructure::{ApplyReport, ProvisioningPlatform, ResourceGraph};
use crate::observability::{emit_event, ApplyCompletedEvent, CompositionEvent, EventMetadata};
use crate::ui;

/// Base stack plus every composed server
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub stack: BaseStack,
    pub compositions: Vec<Composition>,
    pub graph: ResourceGraph,
}

/// Where a server got to in the run
#[derive(Debug, Clone)]
pub struct ServerOutcome {
    pub server: String,
    pub phase: CompositionPhase,
}

pub struct SynthService {
    config: DeploymentConfig,
    ctx: PlatformContext,
    run_id: Uuid,
    quiet: bool,
}

impl SynthService {
    pub fn new(config: DeploymentConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let ctx = config.platform_context()?;
        Ok(Self {
            config,
            ctx,
            run_id: Uuid::new_v4(),
            quiet: false,
        })
    }

    /// Builder: no banner, summary or events on stdout
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn config(&self) -> &DeploymentConfig {
        &self.config
    }

    fn metadata(&self) -> EventMetadata {
        EventMetadata::new(
            self.run_id,
            &self.config.name,
            &self.ctx.account,
            &self.ctx.region,
        )
    }

    fn composer(&self, specialization: &Specialization) -> Composer {
        let composer = specialization.composer(&self.ctx);
        if self.quiet {
            composer.without_events()
        } else {
            composer.with_events(self.metadata())
        }
    }

    pub fn base_stack(&self) -> Result<BaseStack, GamestackError> {
        let repository = RepositoryHandle::new(&self.config.repository.name, &self.ctx)
            .with_scan_on_push(self.config.repository.scan_on_push);
        let stack = BaseStack::build(
            &self.config.name,
            &self.ctx,
            &self.config.network.layout(),
            repository,
            &self.config.volumes,
        )?;
        info!(
            "Base stack {}: network {}, {} volume(s)",
            stack.name,
            stack.network.cidr,
            stack.volumes.len()
        );
        Ok(stack)
    }

    /// Game defaults with the server's configuration layered on top
    pub fn specialization(
        &self,
        server: &ServerConfig,
        stack: &BaseStack,
    ) -> Result<Specialization, GamestackError> {
        let mut specialization = match server.game {
            GameKind::Minecraft => games::minecraft::specialization(&stack.repository),
            GameKind::CrewLink => games::crewlink::specialization(),
            GameKind::Valheim => {
                let settings = server.valheim.as_ref().ok_or_else(|| ConfigError::MissingField {
                    field: format!("servers.{}.valheim", server.name),
                })?;
                games::valheim::specialization(settings)?
            }
        };

        if let Some(image) = &server.image {
            specialization = specialization.with_image(match image {
                ImageConfig::Registry(name) => ImageRef::registry(name),
                ImageConfig::Repository { tag } => {
                    ImageRef::repository(stack.repository.clone(), tag.clone())
                }
            });
        }
        if let Some(sizing) = server.sizing {
            specialization = specialization.with_sizing(sizing);
        }
        if let Some(enabled) = server.create_load_balancer {
            specialization = specialization.with_load_balancer(enabled);
        }
        if let Some(grace) = server.health_check_grace()? {
            specialization = specialization.with_probe_grace(grace);
        }

        Ok(specialization.with_container(server.container_overrides()?))
    }

    pub fn server_spec(
        &self,
        server: &ServerConfig,
        specialization: &Specialization,
        stack: &BaseStack,
    ) -> Result<ServerSpec, GamestackError> {
        let mut spec = specialization
            .server_spec(&server.name, stack.network.clone())
            .with_start_mode(server.start_mode);

        if let Some(volume_name) = &server.volume {
            let volume = stack
                .volume(volume_name)
                .ok_or_else(|| ConfigError::InvalidValue {
                    field: format!("servers.{}.volume", server.name),
                    value: volume_name.clone(),
                })?;
            spec = spec.with_volume(volume);
        }
        if let Some(source) = server.environment_source()? {
            spec = spec.with_environment_file(source);
        }

        Ok(spec)
    }

    /// Compose every server; stops at the first failure
    pub fn synthesize(&self) -> Result<Synthesis, GamestackError> {
        if !self.quiet {
            ui::print_header(&format!("Synthesizing {}", self.config.name));
        }
        info!("Run {} for {} server(s)", self.run_id, self.config.servers.len());

        let stack = self.base_stack()?;
        let mut compositions = Vec::with_capacity(self.config.servers.len());
        let mut outcomes = Vec::with_capacity(self.config.servers.len());

        for server in &self.config.servers {
            let result = self.specialization(server, &stack).and_then(|specialization| {
                let spec = self.server_spec(server, &specialization, &stack)?;
                let composition = self.composer(&specialization).compose(&spec)?;
                Ok(composition)
            });

            match result {
                Ok(composition) => {
                    outcomes.push(ServerOutcome {
                        server: server.name.clone(),
                        phase: CompositionPhase::Completed,
                    });
                    compositions.push(composition);
                }
                Err(e) => {
                    let phase = match &e {
                        GamestackError::Composition(err) => err
                            .step()
                            .map(CompositionPhase::Failed)
                            .unwrap_or(CompositionPhase::Pending),
                        _ => CompositionPhase::Pending,
                    };
                    warn!("{} failed: {}", server.name, e);
                    outcomes.push(ServerOutcome {
                        server: server.name.clone(),
                        phase,
                    });
                    self.print_summary(&compositions, &outcomes);
                    return Err(e);
                }
            }
        }

        self.print_summary(&compositions, &outcomes);

        let graph = ResourceGraph::build(&stack, &compositions)?;
        Ok(Synthesis {
            stack,
            compositions,
            graph,
        })
    }

    /// Synthesize and apply the graph to `platform`
    pub async fn execute<P: ProvisioningPlatform>(
        &self,
        platform: &P,
    ) -> Result<(Synthesis, ApplyReport), GamestackError> {
        let synthesis = self.synthesize()?;
        let report = platform.apply(&synthesis.graph).await?;

        if !self.quiet {
            emit_event(CompositionEvent::ApplyCompleted(ApplyCompletedEvent {
                metadata: self.metadata(),
                resources: report.resources,
                status: report.status.to_string(),
                digest: report.digest.clone(),
            }));
        }

        Ok((synthesis, report))
    }

    fn print_summary(&self, compositions: &[Composition], outcomes: &[ServerOutcome]) {
        if self.quiet {
            return;
        }
        println!();
        println!("{}", "═".repeat(60).bright_blue());

        for outcome in outcomes {
            let line = match outcome.phase {
                CompositionPhase::Completed => {
                    let skipped = compositions
                        .iter()
                        .find(|c| c.server == outcome.server)
                        .map(|c| c.skipped_steps().count())
                        .unwrap_or(0);
                    format!("✅ {} composed ({} step(s) skipped)", outcome.server, skipped)
                        .green()
                }
                CompositionPhase::Failed(step) => {
                    format!("❌ {} failed at step {} ({})", outcome.server, step.number(), step)
                        .red()
                }
                CompositionPhase::InProgress(step) => {
                    format!("⏳ {} stopped during {}", outcome.server, step).yellow()
                }
                CompositionPhase::Pending => {
                    format!("❌ {} rejected before composing", outcome.server).red()
                }
            };
            println!("  {}", line);
        }

        let failed_steps = compositions
            .iter()
            .flat_map(|c| c.steps.iter())
            .filter(|s| s.status == StepStatus::Failed)
            .count();
        if failed_steps > 0 {
            ui::print_warning(&format!("{} step(s) reported failures", failed_steps));
        }

        println!("{}", "═".repeat(60).bright_blue());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::Step;
    use crate::domain::service::StartMode;
    use crate::error::CompositionError;
    use crate::infrastructure::{ApplyStatus, ManifestPlatform, ResourceKind};

    const DEPLOYMENT: &str = r#"
name: Games
account: "123456789012"
volumes: [Minecraft, Valheim]
servers:
  - name: Minecraft
    game: minecraft
    volume: Minecraft
  - name: Valheim
    game: valheim
    volume: Valheim
    start_mode: parked
    valheim:
      server_name: Vikings
      world_name: Midgard
      server_pass: secret123
  - name: CrewLink
    game: crewlink
    environment_file: s3://config/crewlink.env
    environment:
      LOG_LEVEL: debug
"#;

    fn service(yaml: &str) -> SynthService {
        SynthService::new(DeploymentConfig::from_yaml(yaml).unwrap()).unwrap()
    }

    #[test]
    fn test_synthesize_all_servers() {
        let synthesis = service(DEPLOYMENT).synthesize().unwrap();
        assert_eq!(synthesis.compositions.len(), 3);
        assert_eq!(synthesis.graph.of_kind(ResourceKind::Service).count(), 3);
        assert_eq!(synthesis.graph.of_kind(ResourceKind::FileSystem).count(), 2);

        let valheim = &synthesis.compositions[1];
        assert_eq!(valheim.service.start_mode, StartMode::Parked);
        assert_eq!(valheim.service.initial_desired_count(), 0);
        assert_eq!(valheim.task.volumes.len(), 1);

        let crewlink = synthesis.compositions[2].container().unwrap();
        assert_eq!(crewlink.environment["LOG_LEVEL"], "debug");
        assert_eq!(crewlink.environment["ADDRESS"], "0.0.0.0");
        assert_eq!(crewlink.environment_files.len(), 1);
    }

    #[test]
    fn test_server_config_overrides_game_defaults() {
        let yaml = r#"
name: Games
account: "123456789012"
servers:
  - name: CrewLink
    game: crewlink
    image:
      repository:
        tag: v2
    sizing:
      cpu: 512
    create_load_balancer: true
    health_check_grace: 2m
"#;
        let service = service(yaml);
        let stack = service.base_stack().unwrap();
        let specialization = service
            .specialization(&service.config().servers[0], &stack)
            .unwrap();
        assert!(specialization.image.is_internal());
        assert!(specialization.traffic.create_load_balancer);

        let synthesis = service.synthesize().unwrap();
        let composition = &synthesis.compositions[0];
        assert_eq!(composition.task.sizing.cpu, 512);
        assert_eq!(composition.task.sizing.memory_mib, 1024);
        assert!(composition.load_balancer.is_some());
        assert!(composition.container().unwrap().image.ends_with("minecraft:v2"));
        assert_eq!(
            composition.container().unwrap().health_check.as_ref().unwrap().start_period,
            std::time::Duration::from_secs(120)
        );
    }

    #[test]
    fn test_unsupported_sizing_stops_run() {
        let yaml = r#"
name: Games
account: "123456789012"
servers:
  - name: CrewLink
    game: crewlink
    sizing: {cpu: 256, memory_mib: 4096}
"#;
        // Caught by config validation before any composition
        let config = DeploymentConfig::from_yaml(yaml).unwrap();
        assert!(SynthService::new(config).is_err());

        let mut config = DeploymentConfig::from_yaml(yaml).unwrap();
        config.servers[0].sizing = None;
        let service = SynthService::new(config).unwrap();
        let stack = service.base_stack().unwrap();
        let mut server = service.config().servers[0].clone();
        server.sizing = Some(crate::domain::service::SizingOverride::new(256, 4096));
        let specialization = service.specialization(&server, &stack).unwrap();
        let spec = service.server_spec(&server, &specialization, &stack).unwrap();
        let err = specialization.composer(&stack.context).compose(&spec).unwrap_err();
        assert_eq!(err.step(), Some(Step::CreateTaskTemplate));
        assert!(matches!(err, CompositionError::Sizing { .. }));
    }

    #[test]
    fn test_quiet_service_composes_without_events() {
        let service = service(DEPLOYMENT).quiet();
        assert!(service.is_quiet());

        let stack = service.base_stack().unwrap();
        let server = service.config().server("CrewLink").unwrap();
        let specialization = service.specialization(server, &stack).unwrap();
        assert!(!service.composer(&specialization).emits_events());
        assert!(SynthService::new(service.config().clone())
            .unwrap()
            .composer(&specialization)
            .emits_events());

        let synthesis = service.synthesize().unwrap();
        assert_eq!(synthesis.compositions.len(), 3);
    }

    #[tokio::test]
    async fn test_execute_writes_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let platform = ManifestPlatform::new(dir.path());
        let service = service(DEPLOYMENT);

        let (synthesis, report) = service.execute(&platform).await.unwrap();
        assert_eq!(report.status, ApplyStatus::Created);
        assert_eq!(report.resources, synthesis.graph.len());
        assert!(dir.path().join("Games.json").exists());

        let (_, again) = service.execute(&platform).await.unwrap();
        assert_eq!(again.status, ApplyStatus::Unchanged);
    }
}
