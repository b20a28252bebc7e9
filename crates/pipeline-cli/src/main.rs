//! Frame Pipeline CLI
//!
//! Assembles a pipeline from a topology document and a settings document and
//! feeds it a sequence of image files as frames.

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod commands;

use commands::run::RunCommand;

#[derive(Parser)]
#[command(
    name = "frame-pipeline",
    version,
    about = "Configurable frame-processing pipeline",
    after_help = "EXAMPLES:\n  \
                  # List the stage names a topology document may use\n  \
                  frame-pipeline stages\n\n  \
                  # Run the sample pipeline over a directory of frames\n  \
                  frame-pipeline run --topology config/topology.yaml \\\n    \
                  --settings config/settings.json frames/*.png"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline over image files, in the order given
    Run(RunCommand),

    /// List registered stage names
    Stages,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match &cli.command {
        Commands::Stages => Level::WARN,
        _ if cli.verbose => Level::DEBUG,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    match cli.command {
        Commands::Run(cmd) => cmd.execute(),
        Commands::Stages => commands::stages::list_stages(),
    }
}
