//! CLI definitions for gamestack

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "gamestack",
    version,
    about = "Compose game server container stacks",
    long_about = "Builds the shared network, repository and volumes, composes every\nconfigured game server and writes the resulting resource graph."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compose every server and write the resource manifest
    Synth {
        /// Deployment file
        #[arg(short, long, env = "GAMESTACK_CONFIG", default_value = "deploy.yaml")]
        config: PathBuf,

        /// Output directory for the manifest
        #[arg(short, long, default_value = "cdk.out")]
        out: PathBuf,
    },

    /// Compose without applying and show what each server gets
    Plan {
        /// Deployment file
        #[arg(short, long, env = "GAMESTACK_CONFIG", default_value = "deploy.yaml")]
        config: PathBuf,

        /// Only show this server
        #[arg(long)]
        server: Option<String>,

        /// Output format: text or json
        #[arg(long, default_value = "text")]
        format: String,
    },
}
