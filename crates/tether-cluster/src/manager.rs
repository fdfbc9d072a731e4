// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::{join, join_all};
use tether_k8s::{DeleteOptions, Deployment, K8sClient, K8sError, Pod, Service};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::ClusterManagerConfig;
use crate::error::{ClusterError, ClusterResult};
use crate::manifest::{load_manifest, ManifestSource};
use crate::node_port::apply_node_port;
use crate::tunnels::{Slot, TunnelRegistry};
use crate::types::{
	CommandResult, DeleteOutcome, ResourceKind, ResourceRef, TunnelCleanupReport, TunnelFailure,
	TunnelHandle, TunnelKey, TunnelStatus,
};

/// Coordinates the lifecycle of cluster objects and port-forward tunnels.
///
/// Workload calls are single-attempt pass-throughs to the client. Tunnels are
/// tracked in a registry owned by the manager so that every channel it opened
/// can be released by [`stop_tunnel`](Self::stop_tunnel) or
/// [`cleanup_all`](Self::cleanup_all).
pub struct ClusterResourceManager {
	client: Arc<dyn K8sClient>,
	config: ClusterManagerConfig,
	tunnels: TunnelRegistry,
}

impl ClusterResourceManager {
	pub fn new(client: Arc<dyn K8sClient>, config: ClusterManagerConfig) -> Self {
		Self {
			client,
			config,
			tunnels: TunnelRegistry::new(),
		}
	}

	pub fn config(&self) -> &ClusterManagerConfig {
		&self.config
	}

	/// Create a deployment from a YAML manifest.
	#[instrument(skip(self))]
	pub async fn create_deployment(&self, source: &ManifestSource) -> ClusterResult<ResourceRef> {
		let deployment: Deployment = load_manifest(source)?;
		let name = deployment.metadata.name.clone().unwrap_or_default();
		let namespace = self.namespace_for(deployment.metadata.namespace.as_deref());

		self.client.create_deployment(&namespace, deployment).await?;
		info!(deployment = %name, namespace = %namespace, "Created deployment");
		Ok(ResourceRef::deployment(name, namespace))
	}

	/// Create a service from a YAML manifest.
	#[instrument(skip(self))]
	pub async fn create_service(&self, source: &ManifestSource) -> ClusterResult<ResourceRef> {
		let service: Service = load_manifest(source)?;
		let name = service.metadata.name.clone().unwrap_or_default();
		let namespace = self.namespace_for(service.metadata.namespace.as_deref());

		self.client.create_service(&namespace, service).await?;
		info!(service = %name, namespace = %namespace, "Created service");
		Ok(ResourceRef::service(name, namespace))
	}

	/// Run `command` in `pod` and wait for it to exit.
	///
	/// A non-zero exit status is reported through [`CommandResult::exit_code`],
	/// not as an error.
	#[instrument(skip(self))]
	pub async fn exec_command_in_pod(
		&self,
		pod: &str,
		command: &[String],
	) -> ClusterResult<CommandResult> {
		if command.is_empty() {
			return Err(ClusterError::Exec {
				message: "empty command".into(),
			});
		}

		let output = self
			.client
			.exec(pod, &self.config.namespace, command.to_vec())
			.await?;
		debug!(pod = %pod, exit_code = ?output.exit_code, "Command finished");
		Ok(output.into())
	}

	pub async fn delete_deployment(&self, name: &str) -> ClusterResult<DeleteOutcome> {
		let namespace = self.config.namespace.clone();
		self.delete(&ResourceRef::deployment(name, namespace)).await
	}

	pub async fn delete_service(&self, name: &str) -> ClusterResult<DeleteOutcome> {
		let namespace = self.config.namespace.clone();
		self.delete(&ResourceRef::service(name, namespace)).await
	}

	/// Delete the referenced object. An object that is already gone is
	/// reported as [`DeleteOutcome::NotFound`].
	#[instrument(skip(self), fields(resource = %resource))]
	pub async fn delete(&self, resource: &ResourceRef) -> ClusterResult<DeleteOutcome> {
		let result = match resource.kind {
			ResourceKind::Deployment => {
				let opts = DeleteOptions {
					grace_period_seconds: Some(
						u32::try_from(self.config.delete_grace_period.as_secs()).unwrap_or(u32::MAX),
					),
					foreground: true,
				};
				self
					.client
					.delete_deployment(&resource.name, &resource.namespace, opts)
					.await
			}
			ResourceKind::Service => {
				self
					.client
					.delete_service(&resource.name, &resource.namespace)
					.await
			}
		};

		match result {
			Ok(()) => {
				info!("Deleted");
				Ok(DeleteOutcome::Deleted)
			}
			Err(K8sError::NotFound { .. }) => {
				debug!("Already absent");
				Ok(DeleteOutcome::NotFound)
			}
			Err(e) => Err(e.into()),
		}
	}

	/// Expose `port` of `service` on `node_port`.
	///
	/// The NodePort is validated against the configured range before the
	/// cluster is contacted.
	#[instrument(skip(self))]
	pub async fn expose_service_node_port(
		&self,
		service: &str,
		port: u16,
		target_port: u16,
		node_port: u16,
	) -> ClusterResult<ResourceRef> {
		self.config.node_ports.check(node_port)?;

		let namespace = self.config.namespace.clone();
		let mut object = self.client.get_service(service, &namespace).await?;
		apply_node_port(&mut object, port, target_port, node_port);
		self
			.client
			.replace_service(service, &namespace, object)
			.await?;

		info!(
			service = %service,
			port,
			target_port,
			node_port,
			"Exposed service on NodePort"
		);
		Ok(ResourceRef::service(service, namespace))
	}

	/// Name of a pod matching `selector`, preferring one that is running.
	pub async fn get_pod_name_by_label(&self, selector: &str) -> ClusterResult<Option<String>> {
		let pods = self.client.list_pods(&self.config.namespace, selector).await?;
		let chosen = pods
			.iter()
			.find(|pod| pod_phase(pod) == Some("Running"))
			.or_else(|| pods.first());
		Ok(chosen.and_then(|pod| pod.metadata.name.clone()))
	}

	/// Poll until the first pod matching `selector` is running with all
	/// containers ready. Returns `false` once `timeout` has passed.
	#[instrument(skip(self))]
	pub async fn wait_for_pod_ready(&self, selector: &str, timeout: Duration) -> ClusterResult<bool> {
		let deadline = Instant::now() + timeout;
		loop {
			match self.client.list_pods(&self.config.namespace, selector).await {
				Ok(pods) => {
					if pods.first().is_some_and(pod_is_ready) {
						debug!(selector = %selector, "Pod ready");
						return Ok(true);
					}
				}
				Err(e) => warn!(selector = %selector, error = %e, "Failed to list pods"),
			}

			if Instant::now() >= deadline {
				return Ok(false);
			}
			tokio::time::sleep_until((Instant::now() + self.config.pod_poll_interval).min(deadline))
				.await;
		}
	}

	/// Open a tunnel from `127.0.0.1:local_port` to `pod_port` on `pod`.
	///
	/// The tunnel stays open until [`stop_tunnel`](Self::stop_tunnel) or
	/// [`cleanup_all`](Self::cleanup_all) releases it.
	#[instrument(skip(self))]
	pub async fn open_tunnel(
		&self,
		pod: &str,
		local_port: u16,
		pod_port: u16,
	) -> ClusterResult<TunnelHandle> {
		let reservation = self.tunnels.reserve(TunnelKey::new(pod, local_port))?;
		let namespace = self.config.namespace.clone();

		let channel = self
			.client
			.open_forward(pod, &namespace, local_port, pod_port)
			.await?;

		let handle = TunnelHandle {
			pod_name: pod.to_string(),
			namespace,
			local_port,
			pod_port,
			local_addr: channel.local_addr(),
			opened_at: Utc::now(),
			status: TunnelStatus::Active,
		};

		let key = reservation.key().clone();
		match reservation.activate(handle, channel) {
			Ok(handle) => {
				info!(
					tunnel = %key,
					local_addr = %handle.local_addr,
					pod_port,
					"Tunnel open"
				);
				Ok(handle)
			}
			Err(withdrawn) => {
				if let Err(e) = withdrawn.close().await {
					warn!(tunnel = %key, error = %e, "Failed to close withdrawn tunnel");
				}
				Err(ClusterError::TunnelWithdrawn { key })
			}
		}
	}

	/// Wait for a pod matching `selector` to be ready, then open a tunnel to it.
	#[instrument(skip(self))]
	pub async fn open_tunnel_for_selector(
		&self,
		selector: &str,
		local_port: u16,
		pod_port: u16,
	) -> ClusterResult<TunnelHandle> {
		let timeout = self.config.pod_ready_timeout;
		if !self.wait_for_pod_ready(selector, timeout).await? {
			return Err(ClusterError::Timeout {
				what: format!("pod matching {selector} to become ready"),
				seconds: timeout.as_secs(),
			});
		}

		let pod = self
			.get_pod_name_by_label(selector)
			.await?
			.ok_or_else(|| ClusterError::PodNotFound {
				name: selector.to_string(),
			})?;
		self.open_tunnel(&pod, local_port, pod_port).await
	}

	/// Stop the tunnel for `(pod, local_port)`.
	///
	/// Returns `false` when nothing was tracked. A tunnel that is still being
	/// opened is withdrawn, and this waits until its opener has closed the
	/// channel. The entry is removed even when closing fails.
	#[instrument(skip(self))]
	pub async fn stop_tunnel(&self, pod: &str, local_port: u16) -> ClusterResult<bool> {
		let key = TunnelKey::new(pod, local_port);
		match self.tunnels.take(&key) {
			None => Ok(false),
			Some(Slot::Requested { settled, .. }) => {
				let _ = settled.await;
				info!(tunnel = %key, "Withdrew pending tunnel");
				Ok(true)
			}
			Some(Slot::Active(tunnel)) => {
				let (_, result) = tunnel.close().await;
				result.map_err(|e| ClusterError::TunnelClose {
					key: key.clone(),
					message: e.to_string(),
				})?;
				info!(tunnel = %key, "Tunnel stopped");
				Ok(true)
			}
		}
	}

	/// Close every tracked tunnel.
	///
	/// Never fails: close errors are collected in the report and the registry
	/// is empty afterwards. Tunnels still being opened are withdrawn and waited
	/// for like [`stop_tunnel`](Self::stop_tunnel) does.
	#[instrument(skip(self))]
	pub async fn cleanup_all(&self) -> TunnelCleanupReport {
		let mut report = TunnelCleanupReport::default();
		let mut closing = Vec::new();
		let mut pending = Vec::new();

		for (key, slot) in self.tunnels.drain() {
			match slot {
				Slot::Requested { settled, .. } => {
					report.withdrawn.push(key);
					pending.push(settled);
				}
				Slot::Active(tunnel) => closing.push(tunnel.close()),
			}
		}

		let (closed, _) = join(join_all(closing), join_all(pending)).await;
		for (handle, result) in closed {
			match result {
				Ok(()) => report.stopped.push(handle),
				Err(e) => {
					warn!(tunnel = %handle.key(), error = %e, "Failed to close tunnel");
					report.failures.push(TunnelFailure {
						key: handle.key(),
						message: e.to_string(),
					});
				}
			}
		}

		report.stopped.sort_by_key(|h| h.key());
		report.withdrawn.sort();
		report.failures.sort_by(|a, b| a.key.cmp(&b.key));

		info!(
			stopped = report.stopped.len(),
			withdrawn = report.withdrawn.len(),
			failed = report.failures.len(),
			"Tunnel cleanup complete"
		);
		report
	}

	pub fn list_tunnels(&self) -> Vec<TunnelHandle> {
		self.tunnels.snapshot()
	}

	pub fn tunnel(&self, pod: &str, local_port: u16) -> Option<TunnelHandle> {
		self.tunnels.get(&TunnelKey::new(pod, local_port))
	}

	/// Number of tracked tunnels, including ones still opening.
	pub fn tracked_tunnels(&self) -> usize {
		self.tunnels.len()
	}

	fn namespace_for(&self, declared: Option<&str>) -> String {
		declared
			.filter(|ns| !ns.is_empty())
			.unwrap_or(&self.config.namespace)
			.to_string()
	}
}

fn pod_phase(pod: &Pod) -> Option<&str> {
	pod.status.as_ref().and_then(|s| s.phase.as_deref())
}

fn pod_is_ready(pod: &Pod) -> bool {
	if pod_phase(pod) != Some("Running") {
		return false;
	}
	match pod.status.as_ref().and_then(|s| s.container_statuses.as_ref()) {
		Some(statuses) => !statuses.is_empty() && statuses.iter().all(|c| c.ready),
		None => false,
	}
}
