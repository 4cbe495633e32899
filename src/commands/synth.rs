//! Synth command: compose every server and write the manifest

use anyhow::{Context, Result};
use std::path::Path;

use gamestack::config::load_config;
use gamestack::infrastructure::{ApplyStatus, ManifestPlatform};
use gamestack::services::SynthService;
use gamestack::ui;

pub async fn execute(config_path: &Path, out_dir: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let service = SynthService::new(config).context("Invalid deployment")?;
    let platform = ManifestPlatform::new(out_dir);

    let (synthesis, report) = match service.execute(&platform).await {
        Ok(result) => result,
        Err(e) => {
            ui::print_error(&format!("Synthesis failed: {}", e));
            return Err(e).context(format!("Failed to synthesize {}", service.config().name));
        }
    };

    for (name, value) in synthesis.stack.outputs() {
        ui::print_field(&name, value);
    }
    for composition in &synthesis.compositions {
        if let Some(endpoint) = composition.outputs().endpoint {
            ui::print_field(
                &format!("{}Endpoint", composition.server),
                format!("{}/{}", endpoint.port, endpoint.protocol),
            );
        }
    }
    println!();

    let message = format!(
        "{} {} ({} resources, digest {})",
        report.location.display(),
        report.status,
        report.resources,
        &report.digest[..12]
    );
    match report.status {
        ApplyStatus::Unchanged => ui::print_info(&message),
        ApplyStatus::Created | ApplyStatus::Updated => ui::print_success(&message),
    }

    Ok(())
}
