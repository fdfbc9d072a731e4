// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// What to run for an auxiliary container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
	/// Unique name; also the runtime container name.
	pub name: String,
	pub image: String,
	/// Container port to host port.
	pub ports: BTreeMap<u16, u16>,
	pub env: BTreeMap<String, String>,
	pub command: Option<Vec<String>>,
	/// Runtime network mode; `bridge` when unset.
	pub network_mode: Option<String>,
}

impl ContainerSpec {
	pub const DEFAULT_NETWORK_MODE: &'static str = "bridge";

	pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			image: image.into(),
			ports: BTreeMap::new(),
			env: BTreeMap::new(),
			command: None,
			network_mode: None,
		}
	}

	pub fn with_port(mut self, container_port: u16, host_port: u16) -> Self {
		self.ports.insert(container_port, host_port);
		self
	}

	pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.env.insert(key.into(), value.into());
		self
	}

	pub fn with_command(mut self, command: Vec<String>) -> Self {
		self.command = Some(command);
		self
	}

	pub fn with_network_mode(mut self, mode: impl Into<String>) -> Self {
		self.network_mode = Some(mode.into());
		self
	}

	pub fn network_mode(&self) -> &str {
		self
			.network_mode
			.as_deref()
			.unwrap_or(Self::DEFAULT_NETWORK_MODE)
	}
}

/// A container started and tracked by the manager.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerHandle {
	pub name: String,
	/// Runtime-assigned container id.
	pub id: String,
	pub image: String,
	pub ports: BTreeMap<u16, u16>,
	pub env: BTreeMap<String, String>,
	pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerFailure {
	pub name: String,
	pub message: String,
}

#[derive(Debug, Default)]
pub struct ContainerCleanupReport {
	pub stopped: Vec<String>,
	/// Containers that were still starting; their starter removes them.
	pub withdrawn: Vec<String>,
	pub failures: Vec<ContainerFailure>,
}

impl ContainerCleanupReport {
	pub fn is_clean(&self) -> bool {
		self.failures.is_empty()
	}
}
