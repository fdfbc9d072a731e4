// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cluster configuration section.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_NODE_PORT_MIN: u16 = 30000;
pub const DEFAULT_NODE_PORT_MAX: u16 = 32767;
pub const DEFAULT_DELETE_GRACE_PERIOD_SECS: u64 = 5;
pub const DEFAULT_POD_READY_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_POD_POLL_INTERVAL_MS: u64 = 2000;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClusterConfigLayer {
	pub kubeconfig: Option<PathBuf>,
	pub context: Option<String>,
	pub namespace: Option<String>,
	pub node_port_min: Option<u16>,
	pub node_port_max: Option<u16>,
	pub delete_grace_period_secs: Option<u64>,
	pub pod_ready_timeout_secs: Option<u64>,
	pub pod_poll_interval_ms: Option<u64>,
}

impl ClusterConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.kubeconfig.is_some() {
			self.kubeconfig = other.kubeconfig;
		}
		if other.context.is_some() {
			self.context = other.context;
		}
		if other.namespace.is_some() {
			self.namespace = other.namespace;
		}
		if other.node_port_min.is_some() {
			self.node_port_min = other.node_port_min;
		}
		if other.node_port_max.is_some() {
			self.node_port_max = other.node_port_max;
		}
		if other.delete_grace_period_secs.is_some() {
			self.delete_grace_period_secs = other.delete_grace_period_secs;
		}
		if other.pod_ready_timeout_secs.is_some() {
			self.pod_ready_timeout_secs = other.pod_ready_timeout_secs;
		}
		if other.pod_poll_interval_ms.is_some() {
			self.pod_poll_interval_ms = other.pod_poll_interval_ms;
		}
	}

	pub fn finalize(self) -> ClusterConfig {
		ClusterConfig {
			kubeconfig: self.kubeconfig,
			context: self.context,
			namespace: self
				.namespace
				.unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
			node_port_min: self.node_port_min.unwrap_or(DEFAULT_NODE_PORT_MIN),
			node_port_max: self.node_port_max.unwrap_or(DEFAULT_NODE_PORT_MAX),
			delete_grace_period_secs: self
				.delete_grace_period_secs
				.unwrap_or(DEFAULT_DELETE_GRACE_PERIOD_SECS),
			pod_ready_timeout_secs: self
				.pod_ready_timeout_secs
				.unwrap_or(DEFAULT_POD_READY_TIMEOUT_SECS),
			pod_poll_interval_ms: self
				.pod_poll_interval_ms
				.unwrap_or(DEFAULT_POD_POLL_INTERVAL_MS),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterConfig {
	/// Explicit kubeconfig; `KUBECONFIG` and `~/.kube/config` otherwise.
	pub kubeconfig: Option<PathBuf>,
	pub context: Option<String>,
	pub namespace: String,
	pub node_port_min: u16,
	pub node_port_max: u16,
	pub delete_grace_period_secs: u64,
	pub pod_ready_timeout_secs: u64,
	pub pod_poll_interval_ms: u64,
}

impl Default for ClusterConfig {
	fn default() -> Self {
		ClusterConfigLayer::default().finalize()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = ClusterConfig::default();
		assert_eq!(config.namespace, "default");
		assert_eq!(config.node_port_min, 30000);
		assert_eq!(config.node_port_max, 32767);
		assert_eq!(config.delete_grace_period_secs, 5);
		assert_eq!(config.pod_ready_timeout_secs, 60);
		assert_eq!(config.pod_poll_interval_ms, 2000);
		assert!(config.kubeconfig.is_none());
	}

	#[test]
	fn test_merge_overwrites_only_set_fields() {
		let mut base = ClusterConfigLayer {
			namespace: Some("staging".into()),
			context: Some("kind-dev".into()),
			..Default::default()
		};
		base.merge(ClusterConfigLayer {
			namespace: Some("ci".into()),
			..Default::default()
		});
		assert_eq!(base.namespace.as_deref(), Some("ci"));
		assert_eq!(base.context.as_deref(), Some("kind-dev"));
	}

	#[test]
	fn test_deserialize_partial() {
		let layer: ClusterConfigLayer = toml::from_str(
			r#"
kubeconfig = "/etc/tether/kubeconfig"
node_port_max = 31000
"#,
		)
		.unwrap();
		let config = layer.finalize();
		assert_eq!(
			config.kubeconfig,
			Some(PathBuf::from("/etc/tether/kubeconfig"))
		);
		assert_eq!(config.node_port_max, 31000);
		assert_eq!(config.node_port_min, 30000);
	}
}
