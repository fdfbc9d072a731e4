// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use clap::Subcommand;
use console::style;
use tether_cluster::DeleteOutcome;
use tracing::instrument;

use crate::context::CliContext;

#[derive(Debug, Subcommand)]
pub enum DeleteCommands {
	/// Delete a deployment and, in the foreground, its pods
	Deployment { name: String },
	/// Delete a service
	Service { name: String },
}

#[instrument(skip(ctx))]
pub async fn handle_delete(command: DeleteCommands, ctx: &CliContext) -> anyhow::Result<()> {
	let manager = ctx.cluster_manager().await?;
	let (kind, name, outcome) = match command {
		DeleteCommands::Deployment { name } => {
			let outcome = manager.delete_deployment(&name).await?;
			("Deployment", name, outcome)
		}
		DeleteCommands::Service { name } => {
			let outcome = manager.delete_service(&name).await?;
			("Service", name, outcome)
		}
	};

	match outcome {
		DeleteOutcome::Deleted => {
			println!("{} {} {} deleted", style("✓").green().bold(), kind, name)
		}
		DeleteOutcome::NotFound => println!(
			"{} {} {} was already gone",
			style("!").yellow().bold(),
			kind,
			name
		),
	}
	Ok(())
}
