// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use clap::Args;
use console::style;
use tracing::{instrument, warn};

use super::{resolve_pod, TargetArgs};
use crate::context::CliContext;
use crate::plan::parse_port_pair;

#[derive(Debug, Clone, Args)]
pub struct ForwardArgs {
	#[command(flatten)]
	pub target: TargetArgs,

	/// LOCAL:REMOTE, or a single port used on both sides
	#[arg(value_parser = port_mapping)]
	pub ports: (u16, u16),
}

fn port_mapping(value: &str) -> Result<(u16, u16), String> {
	parse_port_pair(value).map_err(|e| e.to_string())
}

#[instrument(skip(ctx))]
pub async fn handle_forward(args: ForwardArgs, ctx: &CliContext) -> anyhow::Result<()> {
	let manager = ctx.cluster_manager().await?;
	let pod = resolve_pod(&manager, &args.target.target()?).await?;
	let (local, remote) = args.ports;

	let handle = manager.open_tunnel(&pod, local, remote).await?;
	println!(
		"{} Forwarding {} -> {}:{}",
		style("✓").green().bold(),
		style(handle.local_addr).cyan(),
		pod,
		remote
	);
	println!("\nPress Ctrl+C to stop...");

	if let Err(e) = tokio::signal::ctrl_c().await {
		warn!(error = %e, "Failed to listen for Ctrl+C");
	}
	println!("\n{} Shutting down...", style("→").yellow());

	manager.stop_tunnel(&pod, local).await?;
	println!("{} Tunnel stopped", style("✓").green().bold());
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use clap::Parser;

	#[derive(Parser)]
	struct TestCli {
		#[command(flatten)]
		args: ForwardArgs,
	}

	#[test]
	fn test_forward_args_parse() {
		let cli = TestCli::parse_from(["test", "--pod", "kafka-0", "19092:9092"]);
		assert_eq!(cli.args.ports, (19092, 9092));
		assert_eq!(cli.args.target.pod.as_deref(), Some("kafka-0"));
	}

	#[test]
	fn test_forward_single_port() {
		let cli = TestCli::parse_from(["test", "-l", "app=db", "5432"]);
		assert_eq!(cli.args.ports, (5432, 5432));
	}

	#[test]
	fn test_forward_rejects_bad_mapping() {
		assert!(TestCli::try_parse_from(["test", "--pod", "a", "80:http"]).is_err());
	}
}
