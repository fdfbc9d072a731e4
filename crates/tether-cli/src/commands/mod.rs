// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

pub mod delete;
pub mod exec;
pub mod expose;
pub mod forward;
pub mod up;

use anyhow::anyhow;
use clap::{ArgGroup, Args, Subcommand};
use tether_cluster::ClusterResourceManager;

use crate::plan::PodTarget;

#[derive(Debug, Subcommand)]
pub enum Commands {
	/// Bring up everything a plan file describes, hold until Ctrl+C, tear it all down
	Up(up::UpArgs),
	/// Run a command in a pod
	Exec(exec::ExecArgs),
	/// Forward a local port to a pod
	Forward(forward::ForwardArgs),
	/// Delete a deployment or service
	#[command(subcommand)]
	Delete(delete::DeleteCommands),
	/// Expose a service port on a NodePort
	Expose(expose::ExposeArgs),
}

/// `--pod` / `--selector`, exactly one required.
#[derive(Debug, Clone, Args)]
#[command(group(ArgGroup::new("target").required(true).args(["pod", "selector"])))]
pub struct TargetArgs {
	/// Pod name
	#[arg(long)]
	pub pod: Option<String>,

	/// Label selector, e.g. app=kafka
	#[arg(long, short = 'l')]
	pub selector: Option<String>,
}

impl TargetArgs {
	pub fn target(&self) -> anyhow::Result<PodTarget> {
		PodTarget::from_parts(self.pod.clone(), self.selector.clone())
	}
}

/// Resolve a target to a pod name, waiting for readiness when given a selector.
pub async fn resolve_pod(
	manager: &ClusterResourceManager,
	target: &PodTarget,
) -> anyhow::Result<String> {
	match target {
		PodTarget::Name(name) => Ok(name.clone()),
		PodTarget::Selector(selector) => {
			let timeout = manager.config().pod_ready_timeout;
			if !manager.wait_for_pod_ready(selector, timeout).await? {
				return Err(anyhow!(
					"no pod matching {selector} became ready within {}s",
					timeout.as_secs()
				));
			}
			manager
				.get_pod_name_by_label(selector)
				.await?
				.ok_or_else(|| anyhow!("no pod matches {selector}"))
		}
	}
}
