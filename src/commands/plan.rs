//! Plan command: compose without applying and show the result per server

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;

use gamestack::composition::{Composition, StepStatus};
use gamestack::config::load_config;
use gamestack::domain::security::Direction;
use gamestack::services::SynthService;
use gamestack::ui;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

pub fn execute(config_path: &Path, server: Option<&str>, format: OutputFormat) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(name) = server {
        config.servers.retain(|s| s.name == name);
        if config.servers.is_empty() {
            anyhow::bail!("Server {} not found in {}", name, config_path.display());
        }
    }

    let mut service = SynthService::new(config).context("Invalid deployment")?;
    if format == OutputFormat::Json {
        // stdout carries only the document
        service = service.quiet();
    }
    let synthesis = service
        .synthesize()
        .with_context(|| format!("Failed to compose {}", service.config().name))?;

    match format {
        OutputFormat::Json => {
            println!("{}", render_json(&synthesis.compositions)?);
        }
        OutputFormat::Text => {
            for composition in &synthesis.compositions {
                print_composition(composition);
            }
            ui::print_info(&format!(
                "{} resources in {}",
                synthesis.graph.len(),
                synthesis.stack.name
            ));
        }
    }

    Ok(())
}

fn render_json(compositions: &[Composition]) -> Result<String> {
    serde_json::to_string_pretty(compositions).context("Failed to serialize compositions")
}

fn print_composition(composition: &Composition) {
    println!();
    ui::print_section(&composition.server);

    for step in &composition.steps {
        let marker = match step.status {
            StepStatus::Success => "✓".green(),
            StepStatus::Skipped => "-".dimmed(),
            StepStatus::Failed => "✗".red(),
        };
        let detail = step
            .message
            .as_deref()
            .map(|m| format!(" ({})", m).dimmed().to_string())
            .unwrap_or_default();
        println!("  {} {:>2}. {}{}", marker, step.step.number(), step.step, detail);
    }

    let outputs = composition.outputs();
    ui::print_field("service", &outputs.service.name);
    let sizing = composition.task.sizing;
    ui::print_field("sizing", format!("{} cpu / {} MiB", sizing.cpu, sizing.memory_mib));
    ui::print_field("desired count", outputs.service.initial_desired_count());

    if let Some(container) = composition.container() {
        ui::print_field("image", &container.image);
        for mapping in &container.port_mappings {
            let port = format!("{}/{}", mapping.container_port, mapping.protocol);
            ui::print_field("port", port);
        }
        for mount in &container.mount_points {
            let target = format!("{} -> {}", mount.source_volume, mount.container_path);
            ui::print_field("mount", target);
        }
    }

    for rule in outputs.security_policy.rules() {
        let direction = match rule.direction {
            Direction::Ingress => "in ",
            Direction::Egress => "out",
        };
        ui::print_field(
            "rule",
            format!(
                "{} {}/{} {} ({})",
                direction, rule.ports, rule.protocol, rule.peer, rule.description
            ),
        );
    }

    match outputs.endpoint {
        Some(endpoint) => {
            ui::print_field("endpoint", format!("{}/{}", endpoint.port, endpoint.protocol))
        }
        None => ui::print_field("endpoint", "none"),
    }

    let dashboard = outputs.dashboard;
    let panels = format!("{} ({} panels)", dashboard.name, dashboard.panels().len());
    ui::print_field("dashboard", panels);
}
