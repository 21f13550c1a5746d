//! Canopy CLI
//!
//! Command-line tools for exercising the Canopy sync engine.
//!
//! # Commands
//!
//! - `replay` - Run a JSON-lines script through a client and print the events
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Canopy command-line tools.
#[derive(Parser)]
#[command(name = "canopy")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a script of listens, writes and server operations
    Replay {
        /// Script file, one JSON step per line
        script: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Print engine counters after the replay
        #[arg(short, long)]
        stats: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Replay {
            script,
            format,
            stats,
        } => {
            commands::replay::run(&script, &format, stats)?;
        }
        Commands::Version => {
            println!("Canopy CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Canopy Core v{}", canopy_core::VERSION);
        }
    }

    Ok(())
}
