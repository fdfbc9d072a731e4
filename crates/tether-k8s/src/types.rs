// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

pub use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
pub use k8s_openapi::api::core::v1::{
	ContainerStatus, Pod, PodSpec, PodStatus, Service, ServicePort, ServiceSpec,
};
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
pub use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

/// Captured result of a command run inside a pod.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
	pub stdout: String,
	pub stderr: String,
	/// Exit code reported by the kubelet, when it reported one.
	pub exit_code: Option<i32>,
}

/// Options for deleting a workload.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteOptions {
	pub grace_period_seconds: Option<u32>,
	/// Delete dependents before the owner (foreground cascading).
	pub foreground: bool,
}
