// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::{join, join_all};
use parking_lot::Mutex;
use regex::Regex;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::ContainerManagerConfig;
use crate::error::{ContainerError, ContainerResult, RuntimeError};
use crate::runtime::ContainerRuntime;
use crate::types::{ContainerCleanupReport, ContainerFailure, ContainerHandle, ContainerSpec};

/// A name is `Starting` from the claim until the handle is running. `id` is
/// set once the runtime has created the container; `settled` resolves when
/// the starter is done with it.
enum Slot {
	Starting {
		generation: u64,
		id: Option<String>,
		settled: oneshot::Receiver<()>,
	},
	Running(ContainerHandle),
}

#[derive(Default)]
struct Tracked {
	slots: HashMap<String, Slot>,
	next_generation: u64,
}

/// Starts, observes and tears down auxiliary containers.
///
/// Every container this manager started is tracked by name until it is
/// stopped or [`cleanup`](Self::cleanup) runs.
pub struct LocalContainerManager {
	runtime: Arc<dyn ContainerRuntime>,
	config: ContainerManagerConfig,
	tracked: Mutex<Tracked>,
}

impl LocalContainerManager {
	pub fn new(runtime: Arc<dyn ContainerRuntime>, config: ContainerManagerConfig) -> Self {
		Self {
			runtime,
			config,
			tracked: Mutex::new(Tracked::default()),
		}
	}

	/// Pull (if needed), create and start a container.
	///
	/// If this future is dropped after the runtime created the container, the
	/// name stays tracked so that [`stop_container`](Self::stop_container) or
	/// [`cleanup`](Self::cleanup) can remove it.
	#[instrument(skip(self, spec), fields(name = %spec.name, image = %spec.image))]
	pub async fn start_container(&self, spec: ContainerSpec) -> ContainerResult<ContainerHandle> {
		let mut claim = self.claim(&spec.name)?;
		let start_error = |message: String| ContainerError::Start {
			name: spec.name.clone(),
			message,
		};

		self
			.runtime
			.ensure_image(&spec.image)
			.await
			.map_err(|e| start_error(e.to_string()))?;

		let id = match self.runtime.create_container(&spec).await {
			Ok(id) => id,
			Err(RuntimeError::Conflict { .. }) => {
				return Err(start_error(
					"a container with this name already exists in the runtime".into(),
				))
			}
			Err(e) => return Err(start_error(e.to_string())),
		};

		if !claim.record_id(&id) {
			self.discard(&id).await;
			return Err(start_error("stopped while starting".into()));
		}

		if let Err(e) = self.runtime.start_container(&id).await {
			if self.discard(&id).await {
				claim.forget_id();
			}
			return Err(start_error(e.to_string()));
		}

		let handle = ContainerHandle {
			name: spec.name.clone(),
			id,
			image: spec.image.clone(),
			ports: spec.ports.clone(),
			env: spec.env.clone(),
			started_at: Utc::now(),
		};

		if !claim.fulfil(handle.clone()) {
			if let Err(e) = self.stop_and_remove(&handle.id).await {
				warn!(id = %handle.id, error = %e, "Failed to remove withdrawn container");
			}
			return Err(start_error("stopped while starting".into()));
		}

		info!(id = %handle.id, ports = ?handle.ports, "Container started");
		Ok(handle)
	}

	/// Stop and remove a tracked container.
	///
	/// Returns `false` if the name is not tracked. A container that the
	/// runtime no longer knows counts as stopped. A container that is still
	/// starting is withdrawn, and this waits until it is gone from the runtime.
	#[instrument(skip(self))]
	pub async fn stop_container(&self, name: &str) -> ContainerResult<bool> {
		let slot = self.tracked.lock().slots.remove(name);
		let stop_error = |e: RuntimeError| ContainerError::Stop {
			name: name.to_string(),
			message: e.to_string(),
		};
		match slot {
			None => Ok(false),
			Some(Slot::Starting { id, settled, .. }) => {
				let _ = settled.await;
				if let Some(id) = id {
					self.stop_and_remove(&id).await.map_err(stop_error)?;
				}
				info!("Withdrew container that was still starting");
				Ok(true)
			}
			Some(Slot::Running(handle)) => {
				self.stop_and_remove(&handle.id).await.map_err(stop_error)?;
				info!(id = %handle.id, "Container stopped");
				Ok(true)
			}
		}
	}

	/// Current stdout and stderr of a tracked container.
	pub async fn get_container_logs(&self, name: &str) -> ContainerResult<String> {
		let id = self.running_id(name)?;
		self
			.runtime
			.logs(&id)
			.await
			.map_err(|e| ContainerError::Logs {
				name: name.to_string(),
				message: e.to_string(),
			})
	}

	/// Poll the logs of `name` until `pattern` matches or `timeout` passes.
	///
	/// Returns `Ok(false)` on timeout. Log read failures are retried until the
	/// deadline.
	#[instrument(skip(self))]
	pub async fn wait_for_container_log(
		&self,
		name: &str,
		pattern: &str,
		timeout: Duration,
	) -> ContainerResult<bool> {
		let regex = Regex::new(pattern).map_err(|e| ContainerError::InvalidPattern {
			pattern: pattern.to_string(),
			message: e.to_string(),
		})?;
		self.running_id(name)?;

		let deadline = Instant::now() + timeout;
		loop {
			let read = tokio::time::timeout_at(deadline, self.get_container_logs(name)).await;
			let read = match read {
				Ok(read) => read,
				Err(_) => {
					debug!("Log read still pending at deadline");
					return Ok(false);
				}
			};
			match read {
				Ok(logs) if regex.is_match(&logs) => {
					debug!("Log pattern matched");
					return Ok(true);
				}
				Ok(_) => {}
				Err(e @ ContainerError::NotFound { .. }) => return Err(e),
				Err(e) => debug!(error = %e, "Log read failed, retrying"),
			}

			let now = Instant::now();
			if now >= deadline {
				debug!("Log pattern not seen before deadline");
				return Ok(false);
			}
			tokio::time::sleep_until((now + self.config.log_poll_interval).min(deadline)).await;
		}
	}

	/// Like [`wait_for_container_log`](Self::wait_for_container_log), but a
	/// timeout is an error.
	pub async fn require_container_log(
		&self,
		name: &str,
		pattern: &str,
		timeout: Duration,
	) -> ContainerResult<()> {
		if self.wait_for_container_log(name, pattern, timeout).await? {
			Ok(())
		} else {
			Err(ContainerError::TimeoutExceeded {
				name: name.to_string(),
				pattern: pattern.to_string(),
				timeout,
			})
		}
	}

	/// Stop every tracked container. Never fails; errors are reported.
	///
	/// Starts still in flight are withdrawn and waited for. Any container the
	/// runtime already created for them is removed and reported as stopped.
	#[instrument(skip(self))]
	pub async fn cleanup(&self) -> ContainerCleanupReport {
		let drained: Vec<(String, Slot)> = self.tracked.lock().slots.drain().collect();

		let mut report = ContainerCleanupReport::default();
		let mut stopping = Vec::new();
		let mut pending = Vec::new();
		for (name, slot) in drained {
			match slot {
				Slot::Starting {
					id: Some(id),
					settled,
					..
				} => stopping.push((name, id, Some(settled))),
				Slot::Starting { settled, .. } => {
					report.withdrawn.push(name);
					pending.push(settled);
				}
				Slot::Running(handle) => stopping.push((name, handle.id, None)),
			}
		}

		let stops = join_all(stopping.into_iter().map(|(name, id, settled)| async move {
			if let Some(settled) = settled {
				let _ = settled.await;
			}
			let result = self.stop_and_remove(&id).await;
			(name, result)
		}));
		let (results, _) = join(stops, join_all(pending)).await;

		for (name, result) in results {
			match result {
				Ok(()) => report.stopped.push(name),
				Err(e) => {
					warn!(name = %name, error = %e, "Failed to stop container");
					report.failures.push(ContainerFailure {
						name,
						message: e.to_string(),
					});
				}
			}
		}

		report.stopped.sort();
		report.withdrawn.sort();
		report.failures.sort_by(|a, b| a.name.cmp(&b.name));
		info!(
			stopped = report.stopped.len(),
			failed = report.failures.len(),
			"Container cleanup complete"
		);
		report
	}

	pub fn list_containers(&self) -> Vec<ContainerHandle> {
		let tracked = self.tracked.lock();
		let mut handles: Vec<ContainerHandle> = tracked
			.slots
			.values()
			.filter_map(|slot| match slot {
				Slot::Running(handle) => Some(handle.clone()),
				Slot::Starting { .. } => None,
			})
			.collect();
		handles.sort_by(|a, b| a.name.cmp(&b.name));
		handles
	}

	/// Number of tracked names, including containers still starting.
	pub fn tracked_containers(&self) -> usize {
		self.tracked.lock().slots.len()
	}

	pub fn container(&self, name: &str) -> Option<ContainerHandle> {
		match self.tracked.lock().slots.get(name) {
			Some(Slot::Running(handle)) => Some(handle.clone()),
			_ => None,
		}
	}

	fn running_id(&self, name: &str) -> ContainerResult<String> {
		match self.tracked.lock().slots.get(name) {
			Some(Slot::Running(handle)) => Ok(handle.id.clone()),
			_ => Err(ContainerError::NotFound {
				name: name.to_string(),
			}),
		}
	}

	fn claim(&self, name: &str) -> ContainerResult<Claim<'_>> {
		let mut tracked = self.tracked.lock();
		if tracked.slots.contains_key(name) {
			return Err(ContainerError::NameInUse {
				name: name.to_string(),
			});
		}
		tracked.next_generation += 1;
		let generation = tracked.next_generation;
		let (tx, settled) = oneshot::channel();
		tracked.slots.insert(
			name.to_string(),
			Slot::Starting {
				generation,
				id: None,
				settled,
			},
		);
		Ok(Claim {
			manager: self,
			name: name.to_string(),
			generation,
			_settled: tx,
			armed: true,
		})
	}

	async fn stop_and_remove(&self, id: &str) -> Result<(), RuntimeError> {
		match self.runtime.stop_container(id, self.config.stop_timeout).await {
			Ok(()) | Err(RuntimeError::NotFound { .. }) => {}
			Err(e) => return Err(e),
		}
		match self.runtime.remove_container(id).await {
			Ok(()) | Err(RuntimeError::NotFound { .. }) => Ok(()),
			Err(e) => Err(e),
		}
	}

	/// Best-effort removal of a container that never became running.
	async fn discard(&self, id: &str) -> bool {
		match self.runtime.remove_container(id).await {
			Ok(()) | Err(RuntimeError::NotFound { .. }) => true,
			Err(e) => {
				warn!(id = %id, error = %e, "Failed to remove container after failed start");
				false
			}
		}
	}
}

/// Name reservation held while a container is starting.
///
/// Dropping the claim settles the slot. A dropped claim whose container was
/// already created leaves the slot behind with its id.
struct Claim<'a> {
	manager: &'a LocalContainerManager,
	name: String,
	generation: u64,
	_settled: oneshot::Sender<()>,
	armed: bool,
}

impl Claim<'_> {
	fn ours<'s>(&self, slots: &'s mut HashMap<String, Slot>) -> Option<&'s mut Option<String>> {
		match slots.get_mut(&self.name) {
			Some(Slot::Starting { generation, id, .. }) if *generation == self.generation => Some(id),
			_ => None,
		}
	}

	/// Remember the runtime id. Returns `false` if the reservation was
	/// withdrawn before the container was created.
	fn record_id(&self, id: &str) -> bool {
		let mut tracked = self.manager.tracked.lock();
		match self.ours(&mut tracked.slots) {
			Some(slot_id) => {
				*slot_id = Some(id.to_string());
				true
			}
			None => false,
		}
	}

	/// The container is gone from the runtime again.
	fn forget_id(&self) {
		let mut tracked = self.manager.tracked.lock();
		if let Some(slot_id) = self.ours(&mut tracked.slots) {
			*slot_id = None;
		}
	}

	/// Replace the reservation with the running handle. Returns `false` if
	/// the reservation was withdrawn in the meantime.
	fn fulfil(&mut self, handle: ContainerHandle) -> bool {
		self.armed = false;
		let mut tracked = self.manager.tracked.lock();
		if self.ours(&mut tracked.slots).is_none() {
			return false;
		}
		tracked.slots.insert(self.name.clone(), Slot::Running(handle));
		true
	}
}

impl Drop for Claim<'_> {
	fn drop(&mut self) {
		if !self.armed {
			return;
		}
		let mut tracked = self.manager.tracked.lock();
		match self.ours(&mut tracked.slots) {
			Some(Some(id)) => {
				warn!(name = %self.name, id = %id, "Start abandoned, container left for cleanup");
			}
			Some(None) => {
				tracked.slots.remove(&self.name);
			}
			None => {}
		}
	}
}
