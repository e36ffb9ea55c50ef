//! magmap - Magnetic survey gridding and display
//!
//! Grids scattered survey readings, renders shaded color maps, samples
//! profiles and generates synthetic surveys over a magnetized prism.

mod commands;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use commands::{GridArgs, ProfileArgs, RenderArgs, SimulateArgs};
use magmap_core::MagmapConfig;

#[derive(Parser, Debug)]
#[command(name = "magmap", version, about = "Magnetic survey gridding and display")]
struct Cli {
    /// Configuration file (TOML, or JSON by extension)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Grid a survey and write a GeoTIFF (or the configured format)
    Grid(GridArgs),
    /// Grid a survey and write a shaded color image
    Render(RenderArgs),
    /// Sample a survey along a line
    Profile(ProfileArgs),
    /// Compute a synthetic survey over a prism
    Simulate(SimulateArgs),
}

/// Initialize logging; `RUST_LOG` overrides the default `info` filter
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(false).init();
}

/// `--config`, else `<config dir>/magmap/config.toml` when present, else defaults
fn load_config(path: Option<&Path>) -> Result<MagmapConfig, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        return Ok(MagmapConfig::load(path)?);
    }
    let user_config = dirs::config_dir().map(|dir| dir.join("magmap").join("config.toml"));
    match user_config {
        Some(path) if path.exists() => Ok(MagmapConfig::load(&path)?),
        _ => Ok(MagmapConfig::default()),
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Grid(args) => commands::grid(&args, config),
        Commands::Render(args) => commands::render(&args, config),
        Commands::Profile(args) => commands::profile(&args, config),
        Commands::Simulate(args) => commands::simulate(&args),
    }
}

fn main() {
    init_logging();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
