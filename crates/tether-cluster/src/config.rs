// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::time::Duration;

use crate::node_port::NodePortRange;

/// Settings for [`crate::ClusterResourceManager`].
#[derive(Debug, Clone)]
pub struct ClusterManagerConfig {
	/// Namespace used when a manifest does not name one.
	pub namespace: String,
	pub node_ports: NodePortRange,
	pub delete_grace_period: Duration,
	pub pod_ready_timeout: Duration,
	pub pod_poll_interval: Duration,
}

impl Default for ClusterManagerConfig {
	fn default() -> Self {
		Self {
			namespace: "default".to_string(),
			node_ports: NodePortRange::default(),
			delete_grace_period: Duration::from_secs(5),
			pod_ready_timeout: Duration::from_secs(60),
			pod_poll_interval: Duration::from_secs(2),
		}
	}
}

impl ClusterManagerConfig {
	pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
		self.namespace = namespace.into();
		self
	}
}
