// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tether_cluster::{ClusterManagerConfig, ClusterResourceManager};
use tether_k8s::{
	ContainerStatus, DeleteOptions, Deployment, ExecOutput, ForwardChannel, K8sClient, K8sError,
	ObjectMeta, Pod, PodStatus, Service, ServicePort, ServiceSpec,
};
use tokio::net::TcpListener;
use tokio::sync::Notify;

/// Observable state of a channel handed out by [`MockK8sClient`].
#[derive(Debug)]
pub struct ChannelState {
	pub pod: String,
	pub local_port: u16,
	pub closed: AtomicBool,
}

impl ChannelState {
	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}
}

pub struct MockChannel {
	state: Arc<ChannelState>,
	listener: Option<TcpListener>,
	fail_on_close: bool,
}

#[async_trait]
impl ForwardChannel for MockChannel {
	fn local_addr(&self) -> SocketAddr {
		SocketAddr::from(([127, 0, 0, 1], self.state.local_port))
	}

	async fn close(&mut self) -> Result<(), K8sError> {
		self.listener = None;
		self.state.closed.store(true, Ordering::SeqCst);
		if self.fail_on_close {
			return Err(K8sError::ForwardError {
				message: format!("listener on {} would not shut down", self.state.local_port),
			});
		}
		Ok(())
	}
}

/// Pauses `open_forward` until the test releases it.
#[derive(Default)]
pub struct OpenGate {
	pub entered: Notify,
	pub release: Notify,
}

#[derive(Default)]
pub struct MockK8sClient {
	pub deployments: Mutex<HashMap<(String, String), Deployment>>,
	pub services: Mutex<HashMap<(String, String), Service>>,
	pub pods: Mutex<Vec<Pod>>,
	pub exec_results: Mutex<HashMap<String, ExecOutput>>,
	pub channels: Mutex<Vec<Arc<ChannelState>>>,
	pub fail_close_ports: Mutex<HashSet<u16>>,
	pub busy_ports: Mutex<HashSet<u16>>,
	pub bind_ports: AtomicBool,
	pub open_gate: Mutex<Option<Arc<OpenGate>>>,
	pub replace_error: Mutex<Option<String>>,
	pub calls: Mutex<Vec<String>>,
}

impl MockK8sClient {
	pub fn new() -> Self {
		Self::default()
	}

	fn record(&self, call: impl Into<String>) {
		self.calls.lock().unwrap().push(call.into());
	}

	pub fn calls(&self) -> Vec<String> {
		self.calls.lock().unwrap().clone()
	}

	pub fn add_pod(&self, pod: Pod) {
		self.pods.lock().unwrap().push(pod);
	}

	pub fn add_service(&self, namespace: &str, service: Service) {
		let name = service.metadata.name.clone().unwrap_or_default();
		self
			.services
			.lock()
			.unwrap()
			.insert((namespace.to_string(), name), service);
	}

	pub fn service(&self, namespace: &str, name: &str) -> Option<Service> {
		self
			.services
			.lock()
			.unwrap()
			.get(&(namespace.to_string(), name.to_string()))
			.cloned()
	}

	pub fn set_exec_result(&self, pod: &str, output: ExecOutput) {
		self
			.exec_results
			.lock()
			.unwrap()
			.insert(pod.to_string(), output);
	}

	pub fn fail_close_on(&self, local_port: u16) {
		self.fail_close_ports.lock().unwrap().insert(local_port);
	}

	pub fn mark_port_busy(&self, local_port: u16) {
		self.busy_ports.lock().unwrap().insert(local_port);
	}

	pub fn gate_opens(&self) -> Arc<OpenGate> {
		let gate = Arc::new(OpenGate::default());
		*self.open_gate.lock().unwrap() = Some(gate.clone());
		gate
	}

	/// Later opens no longer wait; opens already parked keep their gate.
	pub fn ungate_opens(&self) {
		self.open_gate.lock().unwrap().take();
	}

	/// Make `open_forward` hold a real listener on `127.0.0.1:local_port`
	/// until the channel is closed or dropped.
	pub fn bind_real_ports(&self) {
		self.bind_ports.store(true, Ordering::SeqCst);
	}

	pub fn channels(&self) -> Vec<Arc<ChannelState>> {
		self.channels.lock().unwrap().clone()
	}

	pub fn open_channel_count(&self) -> usize {
		self
			.channels
			.lock()
			.unwrap()
			.iter()
			.filter(|c| !c.is_closed())
			.count()
	}
}

fn matches_selector(pod: &Pod, selector: &str) -> bool {
	let labels = pod.metadata.labels.clone().unwrap_or_default();
	selector
		.split(',')
		.filter(|s| !s.is_empty())
		.all(|term| match term.split_once('=') {
			Some((k, v)) => labels.get(k.trim()).map(String::as_str) == Some(v.trim()),
			None => labels.contains_key(term.trim()),
		})
}

#[async_trait]
impl K8sClient for MockK8sClient {
	async fn create_deployment(
		&self,
		namespace: &str,
		deployment: Deployment,
	) -> Result<Deployment, K8sError> {
		let name = deployment.metadata.name.clone().unwrap_or_default();
		self.record(format!("create_deployment {namespace}/{name}"));
		let mut deployments = self.deployments.lock().unwrap();
		let key = (namespace.to_string(), name.clone());
		if deployments.contains_key(&key) {
			return Err(K8sError::AlreadyExists {
				kind: "Deployment".into(),
				name,
			});
		}
		deployments.insert(key, deployment.clone());
		Ok(deployment)
	}

	async fn delete_deployment(
		&self,
		name: &str,
		namespace: &str,
		opts: DeleteOptions,
	) -> Result<(), K8sError> {
		self.record(format!(
			"delete_deployment {namespace}/{name} grace={:?} foreground={}",
			opts.grace_period_seconds, opts.foreground
		));
		match self
			.deployments
			.lock()
			.unwrap()
			.remove(&(namespace.to_string(), name.to_string()))
		{
			Some(_) => Ok(()),
			None => Err(K8sError::NotFound {
				kind: "Deployment".into(),
				name: name.into(),
			}),
		}
	}

	async fn create_service(&self, namespace: &str, service: Service) -> Result<Service, K8sError> {
		let name = service.metadata.name.clone().unwrap_or_default();
		self.record(format!("create_service {namespace}/{name}"));
		let mut services = self.services.lock().unwrap();
		let key = (namespace.to_string(), name.clone());
		if services.contains_key(&key) {
			return Err(K8sError::AlreadyExists {
				kind: "Service".into(),
				name,
			});
		}
		services.insert(key, service.clone());
		Ok(service)
	}

	async fn get_service(&self, name: &str, namespace: &str) -> Result<Service, K8sError> {
		self.record(format!("get_service {namespace}/{name}"));
		self.service(namespace, name).ok_or_else(|| K8sError::NotFound {
			kind: "Service".into(),
			name: name.into(),
		})
	}

	async fn replace_service(
		&self,
		name: &str,
		namespace: &str,
		service: Service,
	) -> Result<Service, K8sError> {
		self.record(format!("replace_service {namespace}/{name}"));
		if let Some(message) = self.replace_error.lock().unwrap().clone() {
			return Err(K8sError::Invalid {
				kind: "Service".into(),
				name: name.into(),
				message,
			});
		}
		self.add_service(namespace, service.clone());
		Ok(service)
	}

	async fn delete_service(&self, name: &str, namespace: &str) -> Result<(), K8sError> {
		self.record(format!("delete_service {namespace}/{name}"));
		match self
			.services
			.lock()
			.unwrap()
			.remove(&(namespace.to_string(), name.to_string()))
		{
			Some(_) => Ok(()),
			None => Err(K8sError::NotFound {
				kind: "Service".into(),
				name: name.into(),
			}),
		}
	}

	async fn list_pods(&self, _namespace: &str, label_selector: &str) -> Result<Vec<Pod>, K8sError> {
		self.record(format!("list_pods {label_selector}"));
		Ok(self
			.pods
			.lock()
			.unwrap()
			.iter()
			.filter(|p| matches_selector(p, label_selector))
			.cloned()
			.collect())
	}

	async fn exec(
		&self,
		name: &str,
		_namespace: &str,
		command: Vec<String>,
	) -> Result<ExecOutput, K8sError> {
		self.record(format!("exec {name} {}", command.join(" ")));
		let known = self
			.pods
			.lock()
			.unwrap()
			.iter()
			.any(|p| p.metadata.name.as_deref() == Some(name));
		if !known {
			return Err(K8sError::PodNotFound { name: name.into() });
		}
		Ok(self
			.exec_results
			.lock()
			.unwrap()
			.get(name)
			.cloned()
			.unwrap_or(ExecOutput {
				stdout: String::new(),
				stderr: String::new(),
				exit_code: Some(0),
			}))
	}

	async fn open_forward(
		&self,
		name: &str,
		_namespace: &str,
		local_port: u16,
		_pod_port: u16,
	) -> Result<Box<dyn ForwardChannel>, K8sError> {
		self.record(format!("open_forward {name}:{local_port}"));

		let listener = if self.bind_ports.load(Ordering::SeqCst) {
			match TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], local_port))).await {
				Ok(listener) => Some(listener),
				Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
					return Err(K8sError::PortInUse { port: local_port })
				}
				Err(e) => {
					return Err(K8sError::ForwardError {
						message: e.to_string(),
					})
				}
			}
		} else {
			None
		};

		let gate = self.open_gate.lock().unwrap().clone();
		if let Some(gate) = gate {
			gate.entered.notify_one();
			gate.release.notified().await;
		}

		if self.busy_ports.lock().unwrap().contains(&local_port) {
			return Err(K8sError::PortInUse { port: local_port });
		}

		let state = Arc::new(ChannelState {
			pod: name.to_string(),
			local_port,
			closed: AtomicBool::new(false),
		});
		self.channels.lock().unwrap().push(state.clone());
		let fail_on_close = self.fail_close_ports.lock().unwrap().contains(&local_port);
		Ok(Box::new(MockChannel {
			state,
			listener,
			fail_on_close,
		}))
	}
}

pub fn pod(name: &str, labels: &[(&str, &str)], phase: &str, ready: bool) -> Pod {
	let labels: BTreeMap<String, String> = labels
		.iter()
		.map(|(k, v)| (k.to_string(), v.to_string()))
		.collect();
	Pod {
		metadata: ObjectMeta {
			name: Some(name.to_string()),
			labels: Some(labels),
			..Default::default()
		},
		status: Some(PodStatus {
			phase: Some(phase.to_string()),
			container_statuses: Some(vec![ContainerStatus {
				name: "main".into(),
				ready,
				..Default::default()
			}]),
			..Default::default()
		}),
		..Default::default()
	}
}

pub fn cluster_ip_service(name: &str, port: i32) -> Service {
	Service {
		metadata: ObjectMeta {
			name: Some(name.to_string()),
			..Default::default()
		},
		spec: Some(ServiceSpec {
			type_: Some("ClusterIP".into()),
			ports: Some(vec![ServicePort {
				name: Some("http".into()),
				port,
				..Default::default()
			}]),
			..Default::default()
		}),
		..Default::default()
	}
}

/// A local port that was free a moment ago.
pub fn free_port() -> u16 {
	std::net::TcpListener::bind("127.0.0.1:0")
		.and_then(|listener| listener.local_addr())
		.map(|addr| addr.port())
		.unwrap()
}

pub fn manager(client: Arc<MockK8sClient>) -> ClusterResourceManager {
	ClusterResourceManager::new(client, ClusterManagerConfig::default())
}
