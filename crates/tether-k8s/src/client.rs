// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::net::SocketAddr;

use async_trait::async_trait;

use crate::error::K8sError;
use crate::types::{DeleteOptions, Deployment, ExecOutput, Pod, Service};

/// Trait for K8s client operations.
///
/// This abstraction allows for easy mocking in tests while providing
/// a clean interface for the K8s operations tether needs.
#[async_trait]
pub trait K8sClient: Send + Sync {
	/// Create a deployment in the specified namespace.
	async fn create_deployment(
		&self,
		namespace: &str,
		deployment: Deployment,
	) -> Result<Deployment, K8sError>;

	/// Delete a deployment by name. Returns `NotFound` if it does not exist.
	async fn delete_deployment(
		&self,
		name: &str,
		namespace: &str,
		opts: DeleteOptions,
	) -> Result<(), K8sError>;

	/// Create a service in the specified namespace.
	async fn create_service(&self, namespace: &str, service: Service) -> Result<Service, K8sError>;

	/// Get a service by name.
	async fn get_service(&self, name: &str, namespace: &str) -> Result<Service, K8sError>;

	/// Replace an existing service with the given object.
	async fn replace_service(
		&self,
		name: &str,
		namespace: &str,
		service: Service,
	) -> Result<Service, K8sError>;

	/// Delete a service by name. Returns `NotFound` if it does not exist.
	async fn delete_service(&self, name: &str, namespace: &str) -> Result<(), K8sError>;

	/// List pods in a namespace matching the given label selector.
	async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<Pod>, K8sError>;

	/// Run a command in a pod and wait for it to finish.
	async fn exec(
		&self,
		name: &str,
		namespace: &str,
		command: Vec<String>,
	) -> Result<ExecOutput, K8sError>;

	/// Open a forwarding channel from `127.0.0.1:local_port` to `pod_port` on the pod.
	///
	/// The channel keeps forwarding on a background task until it is closed
	/// or dropped.
	async fn open_forward(
		&self,
		name: &str,
		namespace: &str,
		local_port: u16,
		pod_port: u16,
	) -> Result<Box<dyn ForwardChannel>, K8sError>;
}

/// A live forwarding channel.
///
/// The channel is the sole owner of its background activity. `close` must
/// not return before the activity has stopped; dropping an unclosed channel
/// cancels it without waiting.
#[async_trait]
pub trait ForwardChannel: Send + Sync {
	/// Address the local listener is bound to.
	fn local_addr(&self) -> SocketAddr;

	/// Stop forwarding and wait for the background activity to finish.
	async fn close(&mut self) -> Result<(), K8sError>;
}
