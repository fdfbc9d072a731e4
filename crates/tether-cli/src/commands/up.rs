// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use clap::Args;
use console::style;
use tether_cluster::{ClusterResourceManager, ManifestSource, ResourceRef};
use tether_docker::LocalContainerManager;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use super::resolve_pod;
use crate::context::CliContext;
use crate::plan::{Plan, PodTarget};

#[derive(Debug, Clone, Args)]
pub struct UpArgs {
	/// Plan file describing containers, manifests, tunnels and commands
	pub plan: PathBuf,

	/// Tear down as soon as everything is up instead of waiting for Ctrl+C
	#[arg(long)]
	pub once: bool,
}

/// Everything `up` created, in creation order.
#[derive(Default)]
struct Created {
	resources: Vec<ResourceRef>,
}

#[instrument(skip(ctx))]
pub async fn handle_up(args: UpArgs, ctx: &CliContext) -> anyhow::Result<()> {
	let plan = Plan::load(&args.plan)?;

	let containers = if plan.containers.is_empty() {
		None
	} else {
		Some(ctx.container_manager()?)
	};
	let cluster = if needs_cluster(&plan) {
		Some(ctx.cluster_manager().await?)
	} else {
		None
	};

	let cancel = CancellationToken::new();
	let interrupt = tokio::spawn({
		let cancel = cancel.clone();
		async move {
			if let Err(e) = tokio::signal::ctrl_c().await {
				warn!(error = %e, "Failed to listen for Ctrl+C");
			}
			cancel.cancel();
		}
	});

	let mut created = Created::default();
	let outcome = bring_up(
		&plan,
		ctx,
		cluster.as_ref(),
		containers.as_ref(),
		&mut created,
		&cancel,
	)
	.await;

	if outcome.is_ok() && !args.once {
		println!("\nPress Ctrl+C to stop...");
		cancel.cancelled().await;
		println!("\n{} Shutting down...", style("→").yellow());
	}
	interrupt.abort();

	let clean = tear_down(cluster.as_ref(), containers.as_ref(), &created).await;

	outcome?;
	if !clean {
		bail!("teardown finished with errors");
	}
	Ok(())
}

fn needs_cluster(plan: &Plan) -> bool {
	!(plan.deployments.is_empty()
		&& plan.services.is_empty()
		&& plan.node_ports.is_empty()
		&& plan.tunnels.is_empty()
		&& plan.exec.is_empty())
}

fn require<'a, T>(manager: Option<&'a T>) -> anyhow::Result<&'a T> {
	manager.ok_or_else(|| anyhow!("plan step needs a manager that was not started"))
}

/// Fail if Ctrl+C was pressed.
fn check_interrupt(cancel: &CancellationToken) -> anyhow::Result<()> {
	if cancel.is_cancelled() {
		bail!("interrupted during start-up");
	}
	Ok(())
}

/// Race a wait against Ctrl+C. Only for steps that create nothing.
async fn interruptible<T>(
	cancel: &CancellationToken,
	wait: impl Future<Output = anyhow::Result<T>>,
) -> anyhow::Result<T> {
	tokio::select! {
		result = wait => result,
		_ = cancel.cancelled() => Err(anyhow!("interrupted during start-up")),
	}
}

/// Run the plan step by step. Ctrl+C is honoured between steps and during
/// waits, never while something is being created.
async fn bring_up(
	plan: &Plan,
	ctx: &CliContext,
	cluster: Option<&ClusterResourceManager>,
	containers: Option<&LocalContainerManager>,
	created: &mut Created,
	cancel: &CancellationToken,
) -> anyhow::Result<()> {
	for entry in &plan.containers {
		check_interrupt(cancel)?;
		let manager = require(containers)?;
		let handle = manager.start_container(entry.to_spec()?).await?;
		println!(
			"{} Container {} ({})",
			style("✓").green().bold(),
			style(&handle.name).cyan(),
			handle.image
		);
		for (container_port, host_port) in &handle.ports {
			println!("    localhost:{host_port} -> {container_port}");
		}

		if let Some(pattern) = &entry.wait_for_log {
			let timeout = entry
				.wait_timeout_secs
				.map(Duration::from_secs)
				.unwrap_or_else(|| ctx.log_wait_timeout());
			println!("    waiting for /{pattern}/ in logs...");
			interruptible(cancel, async {
				manager
					.require_container_log(&handle.name, pattern, timeout)
					.await
					.map_err(anyhow::Error::from)
			})
			.await?;
		}
	}

	for entry in &plan.deployments {
		check_interrupt(cancel)?;
		let manager = require(cluster)?;
		let resource = manager
			.create_deployment(&ManifestSource::path(&entry.manifest))
			.await?;
		println!("{} {}", style("✓").green().bold(), resource);
		created.resources.push(resource);
		if let Some(selector) = &entry.wait_for {
			interruptible(cancel, wait_ready(manager, selector)).await?;
		}
	}

	for entry in &plan.services {
		check_interrupt(cancel)?;
		let manager = require(cluster)?;
		let resource = manager
			.create_service(&ManifestSource::path(&entry.manifest))
			.await?;
		println!("{} {}", style("✓").green().bold(), resource);
		created.resources.push(resource);
		if let Some(selector) = &entry.wait_for {
			interruptible(cancel, wait_ready(manager, selector)).await?;
		}
	}

	for entry in &plan.node_ports {
		check_interrupt(cancel)?;
		let manager = require(cluster)?;
		let target_port = entry.target_port.unwrap_or(entry.port);
		manager
			.expose_service_node_port(&entry.service, entry.port, target_port, entry.node_port)
			.await?;
		println!(
			"{} Service {} port {} on NodePort {}",
			style("✓").green().bold(),
			entry.service,
			entry.port,
			style(entry.node_port).cyan()
		);
	}

	for entry in &plan.tunnels {
		check_interrupt(cancel)?;
		let manager = require(cluster)?;
		let target = entry.target()?;
		if let PodTarget::Selector(selector) = &target {
			println!("    waiting for pods matching {selector}...");
		}
		let pod = interruptible(cancel, resolve_pod(manager, &target)).await?;
		let handle = manager.open_tunnel(&pod, entry.local, entry.remote).await?;
		println!(
			"{} Tunnel {} -> {}:{}",
			style("✓").green().bold(),
			style(handle.local_addr).cyan(),
			handle.pod_name,
			handle.pod_port
		);
	}

	for entry in &plan.exec {
		check_interrupt(cancel)?;
		let manager = require(cluster)?;
		let target = entry.target()?;
		let pod = interruptible(cancel, resolve_pod(manager, &target)).await?;
		let result = manager.exec_command_in_pod(&pod, &entry.command).await?;

		let marker = if result.success() {
			style("✓").green().bold()
		} else {
			style("!").yellow().bold()
		};
		println!(
			"{} {} $ {} (exit {})",
			marker,
			pod,
			entry.command.join(" "),
			result
				.exit_code
				.map_or_else(|| "unknown".to_string(), |c| c.to_string())
		);
		for line in result.stdout.lines() {
			println!("    {line}");
		}
		for line in result.stderr.lines() {
			println!("    {}", style(line).dim());
		}
	}

	info!("Plan is up");
	Ok(())
}

async fn wait_ready(manager: &ClusterResourceManager, selector: &str) -> anyhow::Result<()> {
	let timeout = manager.config().pod_ready_timeout;
	println!("    waiting for pods matching {selector}...");
	let ready = manager
		.wait_for_pod_ready(selector, timeout)
		.await
		.with_context(|| format!("waiting for {selector}"))?;
	if !ready {
		bail!(
			"no pod matching {selector} became ready within {}s",
			timeout.as_secs()
		);
	}
	Ok(())
}

/// Release everything, whatever happened before. Returns `true` when every
/// step succeeded.
async fn tear_down(
	cluster: Option<&ClusterResourceManager>,
	containers: Option<&LocalContainerManager>,
	created: &Created,
) -> bool {
	let mut clean = true;

	if let Some(manager) = cluster {
		let report = manager.cleanup_all().await;
		if report.total() > 0 {
			println!(
				"{} Stopped {} tunnel(s)",
				style("✓").green().bold(),
				report.stopped.len() + report.withdrawn.len()
			);
		}
		for failure in &report.failures {
			clean = false;
			println!(
				"{} Tunnel {}: {}",
				style("✗").red().bold(),
				failure.key,
				failure.message
			);
		}

		for resource in created.resources.iter().rev() {
			match manager.delete(resource).await {
				Ok(_) => println!("{} Deleted {}", style("✓").green().bold(), resource),
				Err(e) => {
					clean = false;
					println!("{} {}: {}", style("✗").red().bold(), resource, e);
				}
			}
		}
	}

	if let Some(manager) = containers {
		let report = manager.cleanup().await;
		for name in &report.stopped {
			println!("{} Stopped container {}", style("✓").green().bold(), name);
		}
		for failure in &report.failures {
			clean = false;
			println!(
				"{} Container {}: {}",
				style("✗").red().bold(),
				failure.name,
				failure.message
			);
		}
	}

	clean
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_needs_cluster() {
		assert!(!needs_cluster(&Plan::default()));

		let plan = Plan::parse("[[exec]]\npod = \"a\"\ncommand = [\"true\"]\n").unwrap();
		assert!(needs_cluster(&plan));

		let plan = Plan::parse("[[containers]]\nname = \"db\"\nimage = \"postgres:16\"\n").unwrap();
		assert!(!needs_cluster(&plan));
	}

	#[test]
	fn test_up_args_parse() {
		use clap::Parser;

		#[derive(Parser)]
		struct TestCli {
			#[command(flatten)]
			args: UpArgs,
		}

		let cli = TestCli::parse_from(["test", "stack.toml", "--once"]);
		assert_eq!(cli.args.plan, PathBuf::from("stack.toml"));
		assert!(cli.args.once);
	}

	#[tokio::test]
	async fn test_interrupt_stops_before_next_step() {
		let plan = Plan::parse("[[deployments]]\nmanifest = \"web.yaml\"\n").unwrap();
		let ctx = CliContext::new(Default::default());
		let cancel = CancellationToken::new();
		cancel.cancel();

		let mut created = Created::default();
		let err = bring_up(&plan, &ctx, None, None, &mut created, &cancel)
			.await
			.unwrap_err();
		assert_eq!(err.to_string(), "interrupted during start-up");
		assert!(created.resources.is_empty());
	}

	#[tokio::test]
	async fn test_interrupt_ends_pending_wait() {
		let cancel = CancellationToken::new();
		let waiting = interruptible(&cancel, std::future::pending::<anyhow::Result<()>>());
		cancel.cancel();
		assert!(waiting.await.is_err());
	}

	#[tokio::test]
	async fn test_finished_wait_is_not_interrupted() {
		let cancel = CancellationToken::new();
		let value = interruptible(&cancel, async { Ok(7) }).await.unwrap();
		assert_eq!(value, 7);
	}
}
