// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use clap::Args;
use console::style;
use tracing::instrument;

use crate::context::CliContext;

#[derive(Debug, Clone, Args)]
pub struct ExposeArgs {
	/// Service name
	pub service: String,

	/// Service port to expose
	#[arg(long)]
	pub port: u16,

	/// Container port behind it; defaults to --port
	#[arg(long)]
	pub target_port: Option<u16>,

	/// NodePort to allocate
	#[arg(long)]
	pub node_port: u16,
}

#[instrument(skip(ctx))]
pub async fn handle_expose(args: ExposeArgs, ctx: &CliContext) -> anyhow::Result<()> {
	let manager = ctx.cluster_manager().await?;
	let target_port = args.target_port.unwrap_or(args.port);
	let resource = manager
		.expose_service_node_port(&args.service, args.port, target_port, args.node_port)
		.await?;

	println!(
		"{} {} port {} exposed on NodePort {}",
		style("✓").green().bold(),
		resource,
		args.port,
		style(args.node_port).cyan()
	);
	Ok(())
}
