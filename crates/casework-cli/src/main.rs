//! Casework CLI application
//!
//! Command-line interface for deploying case definitions and driving case
//! instances through the plan item engine.

mod args;
mod cli;
mod handlers;
mod renderer;

use anyhow::{Context, Result};
use args::{Args, Commands};
use casework_core::{params::ListCases, EngineBuilder};
use clap::Parser;
use handlers::Cli;
use log::info;
use renderer::TerminalRenderer;
use Commands::*;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let Args {
        database_file,
        no_color,
        command,
    } = Args::parse();

    let engine = EngineBuilder::new()
        .with_database_path(database_file)
        .build()
        .await
        .context("Failed to initialize engine")?;

    info!("Casework started on {}", engine.database_path().display());

    let cli = Cli::new(engine, TerminalRenderer::new(!no_color));
    match command {
        Some(Definition { command }) => cli.handle_definition_command(command).await,
        Some(Case { command }) => cli.handle_case_command(command).await,
        Some(Item { command }) => cli.handle_item_command(command).await,
        Some(Task { command }) => cli.handle_task_command(command).await,
        None => cli.list_cases(&ListCases::default()).await,
    }
}
