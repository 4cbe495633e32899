use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::{plan, synth};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // GAMESTACK_LOG wins over RUST_LOG; both accept EnvFilter directives
    let log_level = std::env::var("GAMESTACK_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| {
            if cli.verbose {
                "debug".to_string()
            } else {
                "info".to_string()
            }
        });

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(log_level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Synth { config, out } => {
            synth::execute(&config, &out).await?;
        }
        Commands::Plan {
            config,
            server,
            format,
        } => {
            let output_format = plan::OutputFormat::from_str(&format);
            plan::execute(&config, server.as_deref(), output_format)?;
        }
    }

    Ok(())
}
