// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod commands;
mod context;
mod plan;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use console::style;
use tether_config::{LogFormat, LoggingConfig, TetherConfig};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use commands::Commands;
use context::CliContext;

#[derive(Debug, Parser)]
#[command(name = "tether", version, about = "Local containers and cluster tunnels for development")]
struct Cli {
	/// Config file; defaults to $XDG_CONFIG_HOME/tether/config.toml
	#[arg(long, global = true)]
	config: Option<PathBuf>,

	/// Tracing filter, e.g. "debug" or "tether_cluster=trace"
	#[arg(long, global = true)]
	log_level: Option<String>,

	#[command(subcommand)]
	command: Commands,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<TetherConfig> {
	let config = match path {
		Some(path) => tether_config::load_config_with_file(path)?,
		None => tether_config::load_config()?,
	};
	Ok(config)
}

/// `--log-level` wins, then `RUST_LOG`, then the configured level.
fn env_filter(cli_level: Option<&str>, logging: &LoggingConfig) -> EnvFilter {
	if let Some(level) = cli_level {
		return EnvFilter::new(level);
	}
	EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level))
}

fn init_tracing(cli_level: Option<&str>, logging: &LoggingConfig) {
	let filter = env_filter(cli_level, logging);
	let builder = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr);
	match logging.format {
		LogFormat::Json => builder.json().init(),
		LogFormat::Pretty => builder.init(),
	}
}

async fn run(cli: Cli, ctx: CliContext) -> anyhow::Result<ExitCode> {
	match cli.command {
		Commands::Up(args) => commands::up::handle_up(args, &ctx).await?,
		Commands::Exec(args) => return commands::exec::handle_exec(args, &ctx).await,
		Commands::Forward(args) => commands::forward::handle_forward(args, &ctx).await?,
		Commands::Delete(command) => commands::delete::handle_delete(command, &ctx).await?,
		Commands::Expose(args) => commands::expose::handle_expose(args, &ctx).await?,
	}
	Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
	let cli = Cli::parse();

	let config = match load_config(cli.config.as_ref()) {
		Ok(config) => config,
		Err(e) => {
			eprintln!("{} {:#}", style("error:").red().bold(), e);
			return ExitCode::FAILURE;
		}
	};
	init_tracing(cli.log_level.as_deref(), &config.logging);
	debug!(?config, "Resolved configuration");

	match run(cli, CliContext::new(config)).await {
		Ok(code) => code,
		Err(e) => {
			eprintln!("{} {:#}", style("error:").red().bold(), e);
			ExitCode::FAILURE
		}
	}
}
