// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::time::Duration;

use async_trait::async_trait;

use crate::error::RuntimeError;
use crate::types::ContainerSpec;

/// Trait for the container runtime operations tether needs.
///
/// Implemented by [`crate::DockerRuntime`]; tests substitute an in-memory
/// runtime.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
	/// Make sure `image` is present locally, pulling it if it is not.
	async fn ensure_image(&self, image: &str) -> Result<(), RuntimeError>;

	/// Create (but do not start) a container. Returns the runtime id.
	async fn create_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError>;

	async fn start_container(&self, id: &str) -> Result<(), RuntimeError>;

	/// Stop a container, killing it after `timeout`. Stopping a container
	/// that is not running succeeds.
	async fn stop_container(&self, id: &str, timeout: Duration) -> Result<(), RuntimeError>;

	/// Force-remove a container and its anonymous volumes.
	async fn remove_container(&self, id: &str) -> Result<(), RuntimeError>;

	/// Everything the container has written to stdout and stderr so far.
	async fn logs(&self, id: &str) -> Result<String, RuntimeError>;
}
