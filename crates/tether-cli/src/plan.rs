// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `tether up` plan files.
//!
//! ```toml
//! [[containers]]
//! name = "zookeeper"
//! image = "confluentinc/cp-zookeeper:latest"
//! ports = ["2181:2181"]
//! env = { ZOOKEEPER_CLIENT_PORT = "2181" }
//! wait_for_log = "binding to port"
//!
//! [[deployments]]
//! manifest = "deployment.yaml"
//! wait_for = "app=kafka"
//!
//! [[tunnels]]
//! selector = "app=kafka"
//! local = 19092
//! remote = 9092
//!
//! [[exec]]
//! selector = "app=kafka"
//! command = ["kafka-topics.sh", "--list", "--bootstrap-server", "localhost:9092"]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::Deserialize;
use tether_docker::ContainerSpec;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Plan {
	#[serde(default)]
	pub containers: Vec<ContainerPlan>,
	#[serde(default)]
	pub deployments: Vec<ManifestPlan>,
	#[serde(default)]
	pub services: Vec<ManifestPlan>,
	#[serde(default)]
	pub node_ports: Vec<NodePortPlan>,
	#[serde(default)]
	pub tunnels: Vec<TunnelPlan>,
	#[serde(default)]
	pub exec: Vec<ExecPlan>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContainerPlan {
	pub name: String,
	pub image: String,
	/// `"HOST:CONTAINER"` or a bare port published on the same host port.
	#[serde(default)]
	pub ports: Vec<String>,
	#[serde(default)]
	pub env: BTreeMap<String, String>,
	pub command: Option<Vec<String>>,
	pub network_mode: Option<String>,
	/// Regex that must appear in the container's logs before continuing.
	pub wait_for_log: Option<String>,
	pub wait_timeout_secs: Option<u64>,
}

impl ContainerPlan {
	pub fn to_spec(&self) -> anyhow::Result<ContainerSpec> {
		let mut spec = ContainerSpec::new(&self.name, &self.image);
		for mapping in &self.ports {
			let (host, container) = parse_port_pair(mapping)
				.with_context(|| format!("container '{}': bad port mapping", self.name))?;
			spec = spec.with_port(container, host);
		}
		for (key, value) in &self.env {
			spec = spec.with_env(key, value);
		}
		if let Some(command) = &self.command {
			spec = spec.with_command(command.clone());
		}
		if let Some(mode) = &self.network_mode {
			spec = spec.with_network_mode(mode);
		}
		Ok(spec)
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestPlan {
	/// Relative paths resolve against the plan file's directory.
	pub manifest: PathBuf,
	/// Label selector to wait on until a matching pod is ready.
	pub wait_for: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodePortPlan {
	pub service: String,
	pub port: u16,
	pub target_port: Option<u16>,
	pub node_port: u16,
}

/// Which pod an operation targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PodTarget {
	Name(String),
	Selector(String),
}

impl PodTarget {
	pub fn from_parts(pod: Option<String>, selector: Option<String>) -> anyhow::Result<Self> {
		match (pod, selector) {
			(Some(pod), None) => Ok(Self::Name(pod)),
			(None, Some(selector)) => Ok(Self::Selector(selector)),
			(Some(_), Some(_)) => bail!("give either a pod or a selector, not both"),
			(None, None) => bail!("a pod or a selector is required"),
		}
	}
}

impl std::fmt::Display for PodTarget {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Name(name) => write!(f, "pod {name}"),
			Self::Selector(selector) => write!(f, "pods matching {selector}"),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TunnelPlan {
	pub pod: Option<String>,
	pub selector: Option<String>,
	pub local: u16,
	pub remote: u16,
}

impl TunnelPlan {
	pub fn target(&self) -> anyhow::Result<PodTarget> {
		PodTarget::from_parts(self.pod.clone(), self.selector.clone())
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecPlan {
	pub pod: Option<String>,
	pub selector: Option<String>,
	pub command: Vec<String>,
}

impl ExecPlan {
	pub fn target(&self) -> anyhow::Result<PodTarget> {
		PodTarget::from_parts(self.pod.clone(), self.selector.clone())
	}
}

impl Plan {
	/// Read and validate a plan. Manifest paths are made relative to the
	/// plan's directory.
	pub fn load(path: &Path) -> anyhow::Result<Self> {
		let content = std::fs::read_to_string(path)
			.with_context(|| format!("failed to read plan {}", path.display()))?;
		let mut plan = Self::parse(&content)
			.with_context(|| format!("invalid plan {}", path.display()))?;

		if let Some(base) = path.parent() {
			for entry in plan.deployments.iter_mut().chain(plan.services.iter_mut()) {
				if entry.manifest.is_relative() {
					entry.manifest = base.join(&entry.manifest);
				}
			}
		}
		Ok(plan)
	}

	pub fn parse(content: &str) -> anyhow::Result<Self> {
		let plan: Plan = toml::from_str(content)?;
		plan.validate()?;
		Ok(plan)
	}

	fn validate(&self) -> anyhow::Result<()> {
		let mut names = std::collections::HashSet::new();
		for container in &self.containers {
			if !names.insert(container.name.as_str()) {
				bail!("container '{}' is declared twice", container.name);
			}
			container.to_spec()?;
		}
		for tunnel in &self.tunnels {
			tunnel.target()?;
		}
		for exec in &self.exec {
			exec.target()?;
			if exec.command.is_empty() {
				bail!("exec entry has an empty command");
			}
		}
		Ok(())
	}
}

/// Parse `"A:B"` into `(A, B)`; a bare `"A"` means `(A, A)`.
pub fn parse_port_pair(value: &str) -> anyhow::Result<(u16, u16)> {
	let parse = |s: &str| -> anyhow::Result<u16> {
		s.trim()
			.parse::<u16>()
			.with_context(|| format!("invalid port '{s}'"))
	};
	match value.split_once(':') {
		Some((left, right)) => Ok((parse(left)?, parse(right)?)),
		None => {
			let port = parse(value)?;
			Ok((port, port))
		}
	}
}
