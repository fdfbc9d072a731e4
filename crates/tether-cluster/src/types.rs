// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::fmt;
use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Identity of a tunnel: the pod it forwards to and the local port it owns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TunnelKey {
	pub pod_name: String,
	pub local_port: u16,
}

impl TunnelKey {
	pub fn new(pod_name: impl Into<String>, local_port: u16) -> Self {
		Self {
			pod_name: pod_name.into(),
			local_port,
		}
	}
}

impl fmt::Display for TunnelKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.pod_name, self.local_port)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TunnelStatus {
	Requested,
	Active,
	Stopped,
}

impl fmt::Display for TunnelStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TunnelStatus::Requested => write!(f, "requested"),
			TunnelStatus::Active => write!(f, "active"),
			TunnelStatus::Stopped => write!(f, "stopped"),
		}
	}
}

/// Snapshot of a tracked tunnel.
///
/// The forwarding channel itself stays inside the registry; a handle is only
/// a description of it and can be cloned freely.
#[derive(Debug, Clone, Serialize)]
pub struct TunnelHandle {
	pub pod_name: String,
	pub namespace: String,
	pub local_port: u16,
	pub pod_port: u16,
	pub local_addr: SocketAddr,
	pub opened_at: DateTime<Utc>,
	pub status: TunnelStatus,
}

impl TunnelHandle {
	pub fn key(&self) -> TunnelKey {
		TunnelKey::new(self.pod_name.clone(), self.local_port)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResourceKind {
	Deployment,
	Service,
}

impl fmt::Display for ResourceKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ResourceKind::Deployment => write!(f, "Deployment"),
			ResourceKind::Service => write!(f, "Service"),
		}
	}
}

/// Reference to a cluster object this process created or touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceRef {
	pub kind: ResourceKind,
	pub name: String,
	pub namespace: String,
}

impl ResourceRef {
	pub fn deployment(name: impl Into<String>, namespace: impl Into<String>) -> Self {
		Self {
			kind: ResourceKind::Deployment,
			name: name.into(),
			namespace: namespace.into(),
		}
	}

	pub fn service(name: impl Into<String>, namespace: impl Into<String>) -> Self {
		Self {
			kind: ResourceKind::Service,
			name: name.into(),
			namespace: namespace.into(),
		}
	}
}

impl fmt::Display for ResourceRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
	Deleted,
	NotFound,
}

/// Output of a command run inside a pod.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
	pub stdout: String,
	pub stderr: String,
	pub exit_code: Option<i32>,
}

impl CommandResult {
	pub fn success(&self) -> bool {
		self.exit_code == Some(0)
	}
}

impl From<tether_k8s::ExecOutput> for CommandResult {
	fn from(output: tether_k8s::ExecOutput) -> Self {
		Self {
			stdout: output.stdout,
			stderr: output.stderr,
			exit_code: output.exit_code,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelFailure {
	pub key: TunnelKey,
	pub message: String,
}

/// Result of tearing down every tracked tunnel.
#[derive(Debug, Default)]
pub struct TunnelCleanupReport {
	/// Tunnels whose channel closed cleanly.
	pub stopped: Vec<TunnelHandle>,
	/// Reservations cancelled before their channel was registered.
	pub withdrawn: Vec<TunnelKey>,
	pub failures: Vec<TunnelFailure>,
}

impl TunnelCleanupReport {
	pub fn is_clean(&self) -> bool {
		self.failures.is_empty()
	}

	pub fn total(&self) -> usize {
		self.stopped.len() + self.withdrawn.len() + self.failures.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_tunnel_key_display() {
		assert_eq!(TunnelKey::new("web-0", 8080).to_string(), "web-0:8080");
	}

	#[test]
	fn test_resource_ref_display() {
		let r = ResourceRef::service("api", "staging");
		assert_eq!(r.to_string(), "Service staging/api");
	}

	#[test]
	fn test_command_result_success_requires_zero() {
		let mut result = CommandResult::default();
		assert!(!result.success());
		result.exit_code = Some(0);
		assert!(result.success());
		result.exit_code = Some(2);
		assert!(!result.success());
	}
}
