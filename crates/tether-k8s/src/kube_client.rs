// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::path::Path;

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use kube::{
	api::{Api, AttachParams, DeleteParams, ListParams, PostParams, PropagationPolicy},
	client::UpgradeConnectionError,
	config::{KubeConfigOptions, Kubeconfig},
	Client, Config,
};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, instrument};

use crate::client::{ForwardChannel, K8sClient};
use crate::error::{classify, K8sError};
use crate::forward::PortForward;
use crate::types::{DeleteOptions, Deployment, ExecOutput, Pod, Service};

/// Production K8s client implementation using the kube crate.
pub struct KubeClient {
	client: Client,
}

impl KubeClient {
	/// Create a new KubeClient.
	///
	/// With an explicit `kubeconfig` path the file is read directly. Otherwise
	/// the usual discovery applies:
	/// 1. KUBECONFIG environment variable
	/// 2. ~/.kube/config
	/// 3. In-cluster service account (when running in K8s)
	///
	/// `context` selects a kubeconfig context other than the current one.
	pub async fn new(kubeconfig: Option<&Path>, context: Option<&str>) -> Result<Self, K8sError> {
		let options = KubeConfigOptions {
			context: context.map(str::to_string),
			..Default::default()
		};

		let config = match (kubeconfig, context) {
			(Some(path), _) => {
				let raw = Kubeconfig::read_from(path).map_err(|e| K8sError::ConfigError {
					message: format!("failed to read {}: {e}", path.display()),
				})?;
				Config::from_custom_kubeconfig(raw, &options)
					.await
					.map_err(|e| K8sError::ConfigError {
						message: e.to_string(),
					})?
			}
			(None, Some(_)) => Config::from_kubeconfig(&options)
				.await
				.map_err(|e| K8sError::ConfigError {
					message: e.to_string(),
				})?,
			(None, None) => Config::infer().await.map_err(|e| K8sError::ConfigError {
				message: e.to_string(),
			})?,
		};

		let client = Client::try_from(config)?;
		debug!(context = ?context, "K8s client initialized");
		Ok(Self { client })
	}

	/// Wrap an already configured kube client.
	pub fn from_client(client: Client) -> Self {
		Self { client }
	}
}

#[async_trait]
impl K8sClient for KubeClient {
	#[instrument(skip(self, deployment))]
	async fn create_deployment(
		&self,
		namespace: &str,
		deployment: Deployment,
	) -> Result<Deployment, K8sError> {
		let name = deployment.metadata.name.clone().unwrap_or_default();
		let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
		deployments
			.create(&PostParams::default(), &deployment)
			.await
			.map_err(|e| classify(e, "Deployment", &name))
	}

	#[instrument(skip(self))]
	async fn delete_deployment(
		&self,
		name: &str,
		namespace: &str,
		opts: DeleteOptions,
	) -> Result<(), K8sError> {
		let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
		let dp = DeleteParams {
			grace_period_seconds: opts.grace_period_seconds,
			propagation_policy: opts.foreground.then_some(PropagationPolicy::Foreground),
			..Default::default()
		};
		deployments
			.delete(name, &dp)
			.await
			.map(|_| ())
			.map_err(|e| classify(e, "Deployment", name))
	}

	#[instrument(skip(self, service))]
	async fn create_service(&self, namespace: &str, service: Service) -> Result<Service, K8sError> {
		let name = service.metadata.name.clone().unwrap_or_default();
		let services: Api<Service> = Api::namespaced(self.client.clone(), namespace);
		services
			.create(&PostParams::default(), &service)
			.await
			.map_err(|e| classify(e, "Service", &name))
	}

	async fn get_service(&self, name: &str, namespace: &str) -> Result<Service, K8sError> {
		let services: Api<Service> = Api::namespaced(self.client.clone(), namespace);
		services
			.get(name)
			.await
			.map_err(|e| classify(e, "Service", name))
	}

	#[instrument(skip(self, service))]
	async fn replace_service(
		&self,
		name: &str,
		namespace: &str,
		service: Service,
	) -> Result<Service, K8sError> {
		let services: Api<Service> = Api::namespaced(self.client.clone(), namespace);
		services
			.replace(name, &PostParams::default(), &service)
			.await
			.map_err(|e| classify(e, "Service", name))
	}

	#[instrument(skip(self))]
	async fn delete_service(&self, name: &str, namespace: &str) -> Result<(), K8sError> {
		let services: Api<Service> = Api::namespaced(self.client.clone(), namespace);
		services
			.delete(name, &DeleteParams::default())
			.await
			.map(|_| ())
			.map_err(|e| classify(e, "Service", name))
	}

	async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<Pod>, K8sError> {
		let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
		let lp = ListParams::default().labels(label_selector);
		let pod_list = pods.list(&lp).await?;
		Ok(pod_list.items)
	}

	#[instrument(skip(self))]
	async fn exec(
		&self,
		name: &str,
		namespace: &str,
		command: Vec<String>,
	) -> Result<ExecOutput, K8sError> {
		if command.is_empty() {
			return Err(K8sError::ExecError {
				message: "empty command".into(),
			});
		}

		let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
		let ap = AttachParams {
			stdin: false,
			stdout: true,
			stderr: true,
			tty: false,
			..Default::default()
		};

		ensure_pod(&pods, name).await?;
		let mut attached = pods
			.exec(name, command, &ap)
			.await
			.map_err(|e| exec_error(&e, name))?;

		let stdout = attached.stdout();
		let stderr = attached.stderr();
		let status = attached.take_status();

		let (stdout, stderr) = tokio::try_join!(read_to_string(stdout), read_to_string(stderr))
			.map_err(|e| K8sError::ExecError {
				message: format!("failed to read command output: {e}"),
			})?;

		let status = match status {
			Some(status) => status.await,
			None => None,
		};

		attached.join().await.map_err(|e| K8sError::ExecError {
			message: e.to_string(),
		})?;

		let exit_code = exit_code_from_status(status.as_ref())?;
		debug!(pod = %name, exit_code = ?exit_code, "Exec finished");

		Ok(ExecOutput {
			stdout,
			stderr,
			exit_code,
		})
	}

	#[instrument(skip(self))]
	async fn open_forward(
		&self,
		name: &str,
		namespace: &str,
		local_port: u16,
		pod_port: u16,
	) -> Result<Box<dyn ForwardChannel>, K8sError> {
		let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
		ensure_pod(&pods, name).await?;

		let forward = PortForward::bind(pods, name, local_port, pod_port).await?;
		Ok(Box::new(forward))
	}
}

/// Exec and port-forward upgrade to a websocket, and a missing pod only
/// shows up as a failed upgrade. Look the pod up first.
async fn ensure_pod(pods: &Api<Pod>, name: &str) -> Result<(), K8sError> {
	match pods.get(name).await {
		Ok(_) => Ok(()),
		Err(kube::Error::Api(err)) if err.code == 404 => Err(K8sError::PodNotFound { name: name.into() }),
		Err(e) => Err(e.into()),
	}
}

fn exec_error(err: &kube::Error, name: &str) -> K8sError {
	match err {
		kube::Error::Api(api) if api.code == 404 => K8sError::PodNotFound { name: name.into() },
		kube::Error::UpgradeConnection(UpgradeConnectionError::ProtocolSwitch(status))
			if status.as_u16() == 404 =>
		{
			K8sError::PodNotFound { name: name.into() }
		}
		_ => K8sError::ExecError {
			message: err.to_string(),
		},
	}
}

async fn read_to_string<R: AsyncRead + Unpin>(reader: Option<R>) -> std::io::Result<String> {
	let mut buf = Vec::new();
	if let Some(mut reader) = reader {
		reader.read_to_end(&mut buf).await?;
	}
	Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Extract the exit code from the status the kubelet sends on the error channel.
///
/// A non-zero exit is not an error here; only failures that carry no exit
/// code (the command could not be started) are.
fn exit_code_from_status(status: Option<&Status>) -> Result<Option<i32>, K8sError> {
	let Some(status) = status else {
		return Ok(None);
	};

	if status.status.as_deref() == Some("Success") {
		return Ok(Some(0));
	}

	let code = status
		.details
		.as_ref()
		.and_then(|d| d.causes.as_ref())
		.and_then(|causes| {
			causes
				.iter()
				.find(|c| c.reason.as_deref() == Some("ExitCode"))
		})
		.and_then(|c| c.message.as_deref())
		.and_then(|m| m.trim().parse::<i32>().ok());

	match code {
		Some(code) => Ok(Some(code)),
		None => Err(K8sError::ExecError {
			message: status
				.message
				.clone()
				.unwrap_or_else(|| "command failed without an exit code".into()),
		}),
	}
}
