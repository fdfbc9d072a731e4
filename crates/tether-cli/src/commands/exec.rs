// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::process::ExitCode;

use clap::Args;
use console::style;
use tracing::instrument;

use super::{resolve_pod, TargetArgs};
use crate::context::CliContext;

#[derive(Debug, Clone, Args)]
pub struct ExecArgs {
	#[command(flatten)]
	pub target: TargetArgs,

	/// Command and arguments to run
	#[arg(last = true, required = true)]
	pub command: Vec<String>,
}

#[instrument(skip(ctx))]
pub async fn handle_exec(args: ExecArgs, ctx: &CliContext) -> anyhow::Result<ExitCode> {
	let manager = ctx.cluster_manager().await?;
	let pod = resolve_pod(&manager, &args.target.target()?).await?;

	let result = manager.exec_command_in_pod(&pod, &args.command).await?;
	print!("{}", result.stdout);
	eprint!("{}", result.stderr);

	match result.exit_code {
		Some(code) => Ok(ExitCode::from(exit_status(code))),
		None => {
			eprintln!(
				"{} no exit status reported by {}",
				style("!").yellow().bold(),
				pod
			);
			Ok(ExitCode::FAILURE)
		}
	}
}

/// Remote exit codes outside 0..=255 are reported as 1.
pub fn exit_status(code: i32) -> u8 {
	u8::try_from(code).unwrap_or(1)
}
