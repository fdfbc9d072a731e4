// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! K8s client abstraction for tether.
//!
//! This crate provides:
//! - A trait-based K8s client abstraction for testability
//! - Production implementation using the kube crate
//! - Port forwarding channels that own their background tasks

mod client;
mod error;
mod forward;
mod kube_client;
mod types;

pub use client::{ForwardChannel, K8sClient};
pub use error::{K8sError, K8sResult};
pub use forward::PortForward;
pub use kube_client::KubeClient;
pub use types::{
	ContainerStatus, DeleteOptions, Deployment, DeploymentSpec, ExecOutput, IntOrString,
	ObjectMeta, Pod, PodSpec, PodStatus, Service, ServicePort, ServiceSpec,
};
