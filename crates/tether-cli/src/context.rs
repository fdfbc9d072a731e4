// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tether_cluster::{ClusterManagerConfig, ClusterResourceManager, NodePortRange};
use tether_config::{ClusterConfig, ContainersConfig, TetherConfig};
use tether_docker::{ContainerManagerConfig, DockerRuntime, LocalContainerManager};
use tether_k8s::KubeClient;
use tracing::debug;

/// Resolved configuration plus constructors for the two managers.
pub struct CliContext {
	pub config: TetherConfig,
}

impl CliContext {
	pub fn new(config: TetherConfig) -> Self {
		Self { config }
	}

	pub async fn cluster_manager(&self) -> anyhow::Result<ClusterResourceManager> {
		let cluster = &self.config.cluster;
		let client = KubeClient::new(cluster.kubeconfig.as_deref(), cluster.context.as_deref())
			.await
			.context("failed to connect to the cluster")?;
		debug!(namespace = %cluster.namespace, "Cluster client ready");
		Ok(ClusterResourceManager::new(
			Arc::new(client),
			cluster_manager_config(cluster),
		))
	}

	pub fn container_manager(&self) -> anyhow::Result<LocalContainerManager> {
		let containers = &self.config.containers;
		let runtime = DockerRuntime::connect(containers.docker_host.as_deref())
			.context("failed to connect to the container runtime")?;
		Ok(LocalContainerManager::new(
			Arc::new(runtime),
			container_manager_config(containers),
		))
	}

	pub fn log_wait_timeout(&self) -> Duration {
		Duration::from_secs(self.config.containers.log_wait_timeout_secs)
	}
}

pub fn cluster_manager_config(config: &ClusterConfig) -> ClusterManagerConfig {
	ClusterManagerConfig {
		namespace: config.namespace.clone(),
		node_ports: NodePortRange::new(config.node_port_min, config.node_port_max),
		delete_grace_period: Duration::from_secs(config.delete_grace_period_secs),
		pod_ready_timeout: Duration::from_secs(config.pod_ready_timeout_secs),
		pod_poll_interval: Duration::from_millis(config.pod_poll_interval_ms),
	}
}

pub fn container_manager_config(config: &ContainersConfig) -> ContainerManagerConfig {
	ContainerManagerConfig {
		stop_timeout: Duration::from_secs(config.stop_timeout_secs),
		log_poll_interval: Duration::from_millis(config.log_poll_interval_ms),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_cluster_manager_config_from_defaults() {
		let config = cluster_manager_config(&ClusterConfig::default());
		assert_eq!(config.namespace, "default");
		assert_eq!(config.node_ports, NodePortRange::default());
		assert_eq!(config.delete_grace_period, Duration::from_secs(5));
		assert_eq!(config.pod_poll_interval, Duration::from_secs(2));
	}

	#[test]
	fn test_container_manager_config_units() {
		let config = container_manager_config(&ContainersConfig {
			stop_timeout_secs: 3,
			log_poll_interval_ms: 250,
			..Default::default()
		});
		assert_eq!(config.stop_timeout, Duration::from_secs(3));
		assert_eq!(config.log_poll_interval, Duration::from_millis(250));
	}
}
