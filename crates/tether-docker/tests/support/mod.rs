// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tether_docker::{ContainerRuntime, ContainerSpec, RuntimeError};
use tokio::sync::Notify;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct MockContainer {
	pub name: String,
	pub image: String,
	pub started_at: Option<Instant>,
	pub running: bool,
}

/// Pauses `start_container` until the test releases it.
#[derive(Default)]
pub struct StartGate {
	pub entered: Notify,
	pub release: Notify,
}

/// In-memory runtime. Log lines are scripted per container name and become
/// visible once the container has been running for their offset.
#[derive(Default)]
pub struct MockRuntime {
	pub containers: Mutex<HashMap<String, MockContainer>>,
	pub scripted_logs: Mutex<HashMap<String, Vec<(Duration, String)>>>,
	pub pulled: Mutex<Vec<String>>,
	pub missing_images: Mutex<HashSet<String>>,
	pub failing_starts: Mutex<HashSet<String>>,
	pub failing_stops: Mutex<HashSet<String>>,
	pub failing_log_reads: Mutex<u32>,
	pub hung_log_reads: AtomicBool,
	pub start_gate: Mutex<Option<Arc<StartGate>>>,
	pub removed: Mutex<Vec<String>>,
	next_id: Mutex<u32>,
}

impl MockRuntime {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn script_log(&self, name: &str, after: Duration, line: &str) {
		self
			.scripted_logs
			.lock()
			.unwrap()
			.entry(name.to_string())
			.or_default()
			.push((after, line.to_string()));
	}

	pub fn fail_start_of(&self, name: &str) {
		self.failing_starts.lock().unwrap().insert(name.to_string());
	}

	pub fn fail_stop_of(&self, name: &str) {
		self.failing_stops.lock().unwrap().insert(name.to_string());
	}

	pub fn gate_starts(&self) -> Arc<StartGate> {
		let gate = Arc::new(StartGate::default());
		*self.start_gate.lock().unwrap() = Some(gate.clone());
		gate
	}

	pub fn ungate_starts(&self) {
		self.start_gate.lock().unwrap().take();
	}

	/// Log reads never complete.
	pub fn hang_log_reads(&self) {
		self.hung_log_reads.store(true, Ordering::SeqCst);
	}

	/// Names of the containers the runtime still has, running or not.
	pub fn container_names(&self) -> Vec<String> {
		let mut names: Vec<String> = self
			.containers
			.lock()
			.unwrap()
			.values()
			.map(|c| c.name.clone())
			.collect();
		names.sort();
		names
	}

	pub fn running_count(&self) -> usize {
		self
			.containers
			.lock()
			.unwrap()
			.values()
			.filter(|c| c.running)
			.count()
	}

	pub fn removed(&self) -> Vec<String> {
		self.removed.lock().unwrap().clone()
	}

	/// Drop a container behind the manager's back.
	pub fn vanish(&self, name: &str) {
		self.containers.lock().unwrap().retain(|_, c| c.name != name);
	}

	fn lookup(&self, id: &str) -> Result<MockContainer, RuntimeError> {
		self
			.containers
			.lock()
			.unwrap()
			.get(id)
			.cloned()
			.ok_or_else(|| RuntimeError::NotFound { id: id.to_string() })
	}
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
	async fn ensure_image(&self, image: &str) -> Result<(), RuntimeError> {
		if self.missing_images.lock().unwrap().contains(image) {
			return Err(RuntimeError::ImagePull {
				image: image.to_string(),
				message: "manifest unknown".into(),
			});
		}
		self.pulled.lock().unwrap().push(image.to_string());
		Ok(())
	}

	async fn create_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
		let mut containers = self.containers.lock().unwrap();
		if containers.values().any(|c| c.name == spec.name) {
			return Err(RuntimeError::Conflict {
				name: spec.name.clone(),
			});
		}
		let mut next_id = self.next_id.lock().unwrap();
		*next_id += 1;
		let id = format!("c{:04}", *next_id);
		containers.insert(
			id.clone(),
			MockContainer {
				name: spec.name.clone(),
				image: spec.image.clone(),
				started_at: None,
				running: false,
			},
		);
		Ok(id)
	}

	async fn start_container(&self, id: &str) -> Result<(), RuntimeError> {
		let gate = self.start_gate.lock().unwrap().clone();
		if let Some(gate) = gate {
			gate.entered.notify_one();
			gate.release.notified().await;
		}

		let container = self.lookup(id)?;
		if self.failing_starts.lock().unwrap().contains(&container.name) {
			return Err(RuntimeError::Api {
				message: "port is already allocated".into(),
			});
		}
		if let Some(c) = self.containers.lock().unwrap().get_mut(id) {
			c.running = true;
			c.started_at = Some(Instant::now());
		}
		Ok(())
	}

	async fn stop_container(&self, id: &str, _timeout: Duration) -> Result<(), RuntimeError> {
		let container = self.lookup(id)?;
		if self.failing_stops.lock().unwrap().contains(&container.name) {
			return Err(RuntimeError::Api {
				message: "cannot stop container: permission denied".into(),
			});
		}
		if let Some(c) = self.containers.lock().unwrap().get_mut(id) {
			c.running = false;
		}
		Ok(())
	}

	async fn remove_container(&self, id: &str) -> Result<(), RuntimeError> {
		match self.containers.lock().unwrap().remove(id) {
			Some(c) => {
				self.removed.lock().unwrap().push(c.name);
				Ok(())
			}
			None => Err(RuntimeError::NotFound { id: id.to_string() }),
		}
	}

	async fn logs(&self, id: &str) -> Result<String, RuntimeError> {
		if self.hung_log_reads.load(Ordering::SeqCst) {
			std::future::pending::<()>().await;
		}
		{
			let mut failing = self.failing_log_reads.lock().unwrap();
			if *failing > 0 {
				*failing -= 1;
				return Err(RuntimeError::Api {
					message: "connection reset".into(),
				});
			}
		}

		let container = self.lookup(id)?;
		let Some(started_at) = container.started_at else {
			return Ok(String::new());
		};
		let elapsed = started_at.elapsed();
		let scripted = self.scripted_logs.lock().unwrap();
		Ok(scripted
			.get(&container.name)
			.map(|lines| {
				lines
					.iter()
					.filter(|(after, _)| *after <= elapsed)
					.map(|(_, line)| format!("{line}\n"))
					.collect()
			})
			.unwrap_or_default())
	}
}
