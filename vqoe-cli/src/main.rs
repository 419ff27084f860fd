//! vqoe CLI - Command-line interface
//!
//! Runs single traces or whole JSON Lines tables through the ABR simulator.

mod commands;
mod table;
mod tracing_setup;

use std::path::PathBuf;

use clap::Parser;
use vqoe_core::VqoeError;

use crate::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "vqoe")]
#[command(about = "Adaptive-bitrate playback simulator for edge-cache latency traces")]
struct Cli {
    /// Console log level (RUST_LOG overrides)
    #[arg(long, global = true, default_value_t = CliLogLevel::Warn)]
    log_level: CliLogLevel,

    /// Also write a full trace-level log to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_tracing_level(), cli.log_file.as_deref())?;

    if let Err(error) = commands::execute_command(cli.command).await {
        if let Some(vqoe_error) = error.downcast_ref::<VqoeError>()
            && vqoe_error.is_user_error()
        {
            eprintln!("Error: {}", vqoe_error.user_message());
            std::process::exit(2);
        }
        return Err(error);
    }

    Ok(())
}
