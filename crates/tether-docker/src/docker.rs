// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{
	Config, CreateContainerOptions, LogsOptions, RemoveContainerOptions, StartContainerOptions,
	StopContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::{HostConfig, PortBinding};
use bollard::{Docker, API_DEFAULT_VERSION};
use futures::StreamExt;
use tracing::{debug, info, instrument, warn};

use crate::error::RuntimeError;
use crate::runtime::ContainerRuntime;
use crate::types::ContainerSpec;

const CONNECT_TIMEOUT_SECS: u64 = 120;

/// [`ContainerRuntime`] backed by the Docker Engine API.
pub struct DockerRuntime {
	docker: Docker,
}

impl DockerRuntime {
	/// Connect to the Docker daemon.
	///
	/// `host` accepts `unix://`, `tcp://` and `http://` endpoints; without it
	/// the local defaults apply (`DOCKER_HOST`, then the platform socket).
	pub fn connect(host: Option<&str>) -> Result<Self, RuntimeError> {
		let docker = match host {
			Some(host) if host.starts_with("unix://") => Docker::connect_with_socket(
				host.trim_start_matches("unix://"),
				CONNECT_TIMEOUT_SECS,
				API_DEFAULT_VERSION,
			),
			Some(host) if host.starts_with("tcp://") || host.starts_with("http://") => {
				Docker::connect_with_http(
					&host.replacen("tcp://", "http://", 1),
					CONNECT_TIMEOUT_SECS,
					API_DEFAULT_VERSION,
				)
			}
			Some(host) => {
				return Err(RuntimeError::Connection {
					message: format!("unsupported Docker endpoint: {host}"),
				})
			}
			None => Docker::connect_with_local_defaults(),
		}
		.map_err(|e| RuntimeError::Connection {
			message: e.to_string(),
		})?;

		debug!(host = ?host, "Docker client initialized");
		Ok(Self { docker })
	}
}

fn map_error(err: bollard::errors::Error, id: &str) -> RuntimeError {
	match err {
		bollard::errors::Error::DockerResponseServerError {
			status_code: 404, ..
		} => RuntimeError::NotFound { id: id.to_string() },
		bollard::errors::Error::DockerResponseServerError {
			status_code: 409, ..
		} => RuntimeError::Conflict {
			name: id.to_string(),
		},
		e => RuntimeError::Api {
			message: e.to_string(),
		},
	}
}

/// Translate a spec into the Engine API create body.
fn container_config(spec: &ContainerSpec) -> Config<String> {
	let mut exposed_ports = HashMap::new();
	let mut port_bindings = HashMap::new();
	for (container_port, host_port) in &spec.ports {
		let key = format!("{container_port}/tcp");
		exposed_ports.insert(key.clone(), HashMap::new());
		port_bindings.insert(
			key,
			Some(vec![PortBinding {
				host_ip: None,
				host_port: Some(host_port.to_string()),
			}]),
		);
	}

	let env: Vec<String> = spec.env.iter().map(|(k, v)| format!("{k}={v}")).collect();

	Config {
		image: Some(spec.image.clone()),
		env: Some(env),
		cmd: spec.command.clone(),
		exposed_ports: Some(exposed_ports),
		host_config: Some(HostConfig {
			port_bindings: Some(port_bindings),
			network_mode: Some(spec.network_mode().to_string()),
			..Default::default()
		}),
		..Default::default()
	}
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
	#[instrument(skip(self))]
	async fn ensure_image(&self, image: &str) -> Result<(), RuntimeError> {
		if self.docker.inspect_image(image).await.is_ok() {
			debug!(image = %image, "Image already present");
			return Ok(());
		}

		info!(image = %image, "Pulling image");
		let options = CreateImageOptions {
			from_image: image.to_string(),
			..Default::default()
		};
		let mut pull = self.docker.create_image(Some(options), None, None);
		while let Some(progress) = pull.next().await {
			progress.map_err(|e| RuntimeError::ImagePull {
				image: image.to_string(),
				message: e.to_string(),
			})?;
		}
		Ok(())
	}

	#[instrument(skip(self, spec), fields(name = %spec.name, image = %spec.image))]
	async fn create_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
		let options = CreateContainerOptions {
			name: spec.name.clone(),
			platform: None,
		};
		let response = self
			.docker
			.create_container(Some(options), container_config(spec))
			.await
			.map_err(|e| map_error(e, &spec.name))?;

		for warning in &response.warnings {
			warn!(warning = %warning, "Docker warning on create");
		}
		Ok(response.id)
	}

	async fn start_container(&self, id: &str) -> Result<(), RuntimeError> {
		self
			.docker
			.start_container(id, None::<StartContainerOptions<String>>)
			.await
			.map_err(|e| map_error(e, id))
	}

	#[instrument(skip(self))]
	async fn stop_container(&self, id: &str, timeout: Duration) -> Result<(), RuntimeError> {
		let options = StopContainerOptions {
			t: i64::try_from(timeout.as_secs()).unwrap_or(i64::MAX),
		};
		match self.docker.stop_container(id, Some(options)).await {
			Ok(()) => Ok(()),
			// 304: already stopped
			Err(bollard::errors::Error::DockerResponseServerError {
				status_code: 304, ..
			}) => Ok(()),
			Err(e) => Err(map_error(e, id)),
		}
	}

	#[instrument(skip(self))]
	async fn remove_container(&self, id: &str) -> Result<(), RuntimeError> {
		let options = RemoveContainerOptions {
			force: true,
			v: true,
			..Default::default()
		};
		self
			.docker
			.remove_container(id, Some(options))
			.await
			.map_err(|e| map_error(e, id))
	}

	async fn logs(&self, id: &str) -> Result<String, RuntimeError> {
		let options = LogsOptions::<String> {
			stdout: true,
			stderr: true,
			tail: "all".to_string(),
			follow: false,
			..Default::default()
		};

		let mut stream = self.docker.logs(id, Some(options));
		let mut logs = String::new();
		while let Some(chunk) = stream.next().await {
			let chunk = chunk.map_err(|e| map_error(e, id))?;
			logs.push_str(&chunk.to_string());
		}
		Ok(logs)
	}
}
