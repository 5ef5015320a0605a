// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Entry point for the gateway daemon: loads configuration, builds the
//! shared runtime, and runs the Process Supervisor (C1, spec §4.1) until a
//! shutdown signal arrives.

mod cli;
mod supervisor;

use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};
use supervisor::Supervisor;

/// Deadline `stop()` waits for every worker to exit cleanly before aborting
/// whatever is left (spec §4.1 "await each within a grace deadline").
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cfg = pneuma_config::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Completions { shell } => {
            cli::print_completions(shell);
            Ok(())
        }
        Commands::ShowConfig => {
            println!("{}", serde_yaml::to_string(&cfg)?);
            Ok(())
        }
        Commands::Run => run_gateway(cfg).await,
    }
}

async fn run_gateway(cfg: pneuma_config::Config) -> anyhow::Result<()> {
    let gateway_runtime = pneuma_bootstrap::build_runtime(&cfg)?;
    let mut supervisor = Supervisor::new(cfg, gateway_runtime);
    supervisor.start().await?;

    tracing::info!("gateway started; awaiting shutdown signal");
    pneuma_runtime::shutdown_signal().await;
    tracing::info!("shutdown signal received; stopping workers");

    supervisor.stop(SHUTDOWN_GRACE).await;
    tracing::info!("gateway stopped");
    Ok(())
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
