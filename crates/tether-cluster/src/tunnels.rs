// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Bookkeeping for port-forward tunnels.
//!
//! A key moves through `Requested` (reserved, channel being established) to
//! `Active` (registry owns the channel). Every transition happens under one
//! mutex that is never held across an await, so reserve, activate, take and
//! drain are the serialization points for a key.
//!
//! Whoever removes a `Requested` slot gets its `settled` receiver. It
//! resolves once the opener has let go of its channel, so stopping a pending
//! tunnel can wait until the local port is free again.

use std::collections::HashMap;

use parking_lot::Mutex;
use tether_k8s::{ForwardChannel, K8sError};
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{ClusterError, ClusterResult};
use crate::types::{TunnelHandle, TunnelKey, TunnelStatus};

/// A tunnel whose channel is owned by the registry.
pub(crate) struct ActiveTunnel {
	handle: TunnelHandle,
	channel: Box<dyn ForwardChannel>,
}

impl ActiveTunnel {
	/// Close the channel and return the final handle alongside the outcome.
	pub(crate) async fn close(mut self) -> (TunnelHandle, Result<(), K8sError>) {
		let result = self.channel.close().await;
		self.handle.status = TunnelStatus::Stopped;
		(self.handle, result)
	}
}

pub(crate) enum Slot {
	Requested {
		generation: u64,
		settled: oneshot::Receiver<()>,
	},
	Active(ActiveTunnel),
}

/// A channel whose reservation was withdrawn while it was being opened.
pub(crate) struct Withdrawn {
	channel: Box<dyn ForwardChannel>,
	settled: Option<oneshot::Sender<()>>,
}

impl Withdrawn {
	/// Close the channel, then wake whoever withdrew the reservation.
	pub(crate) async fn close(self) -> Result<(), K8sError> {
		let Withdrawn {
			mut channel,
			settled,
		} = self;
		let result = channel.close().await;
		drop(settled);
		result
	}
}

#[derive(Default)]
struct RegistryState {
	slots: HashMap<TunnelKey, Slot>,
	next_generation: u64,
}

#[derive(Default)]
pub(crate) struct TunnelRegistry {
	state: Mutex<RegistryState>,
}

impl TunnelRegistry {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	/// Reserve `key`. Fails if any slot, pending or active, already exists.
	pub(crate) fn reserve(&self, key: TunnelKey) -> ClusterResult<Reservation<'_>> {
		let mut state = self.state.lock();
		if state.slots.contains_key(&key) {
			return Err(ClusterError::TunnelAlreadyOpen { key });
		}
		state.next_generation += 1;
		let generation = state.next_generation;
		let (tx, settled) = oneshot::channel();
		state.slots.insert(
			key.clone(),
			Slot::Requested {
				generation,
				settled,
			},
		);
		debug!(tunnel = %key, generation, "Reserved tunnel");

		Ok(Reservation {
			registry: self,
			key,
			generation,
			settled: Some(tx),
			armed: true,
		})
	}

	/// Remove whatever occupies `key`.
	pub(crate) fn take(&self, key: &TunnelKey) -> Option<Slot> {
		self.state.lock().slots.remove(key)
	}

	/// Remove every slot, reservations included.
	pub(crate) fn drain(&self) -> Vec<(TunnelKey, Slot)> {
		self.state.lock().slots.drain().collect()
	}

	pub(crate) fn get(&self, key: &TunnelKey) -> Option<TunnelHandle> {
		match self.state.lock().slots.get(key) {
			Some(Slot::Active(tunnel)) => Some(tunnel.handle.clone()),
			_ => None,
		}
	}

	/// Handles of all active tunnels, ordered by key.
	pub(crate) fn snapshot(&self) -> Vec<TunnelHandle> {
		let state = self.state.lock();
		let mut handles: Vec<TunnelHandle> = state
			.slots
			.values()
			.filter_map(|slot| match slot {
				Slot::Active(tunnel) => Some(tunnel.handle.clone()),
				Slot::Requested { .. } => None,
			})
			.collect();
		handles.sort_by(|a, b| a.key().cmp(&b.key()));
		handles
	}

	/// Number of tracked keys, reservations included.
	pub(crate) fn len(&self) -> usize {
		self.state.lock().slots.len()
	}

	fn release(&self, key: &TunnelKey, generation: u64) {
		let mut state = self.state.lock();
		if matches!(state.slots.get(key), Some(Slot::Requested { generation: g, .. }) if *g == generation)
		{
			state.slots.remove(key);
			debug!(tunnel = %key, generation, "Released tunnel reservation");
		}
	}
}

/// Claim on a key while its channel is being established.
///
/// Dropping an unactivated reservation releases the key, provided it still
/// belongs to this reservation. The `settled` sender is dropped with it.
pub(crate) struct Reservation<'a> {
	registry: &'a TunnelRegistry,
	key: TunnelKey,
	generation: u64,
	settled: Option<oneshot::Sender<()>>,
	armed: bool,
}

impl Reservation<'_> {
	pub(crate) fn key(&self) -> &TunnelKey {
		&self.key
	}

	/// Hand the channel to the registry.
	///
	/// If the reservation was withdrawn in the meantime the channel is given
	/// back as [`Withdrawn`] and the caller must close it.
	pub(crate) fn activate(
		mut self,
		handle: TunnelHandle,
		channel: Box<dyn ForwardChannel>,
	) -> Result<TunnelHandle, Withdrawn> {
		self.armed = false;
		let mut state = self.registry.state.lock();
		let still_ours = matches!(
			state.slots.get(&self.key),
			Some(Slot::Requested { generation, .. }) if *generation == self.generation
		);
		if !still_ours {
			debug!(tunnel = %self.key, generation = self.generation, "Reservation withdrawn before activation");
			return Err(Withdrawn {
				channel,
				settled: self.settled.take(),
			});
		}

		state.slots.insert(
			self.key.clone(),
			Slot::Active(ActiveTunnel {
				handle: handle.clone(),
				channel,
			}),
		);
		Ok(handle)
	}
}

impl Drop for Reservation<'_> {
	fn drop(&mut self) {
		if self.armed {
			self.registry.release(&self.key, self.generation);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use chrono::Utc;
	use std::net::SocketAddr;
	use std::sync::atomic::{AtomicBool, Ordering};
	use std::sync::Arc;

	struct TestChannel {
		addr: SocketAddr,
		closed: Arc<AtomicBool>,
	}

	#[async_trait]
	impl ForwardChannel for TestChannel {
		fn local_addr(&self) -> SocketAddr {
			self.addr
		}

		async fn close(&mut self) -> Result<(), K8sError> {
			self.closed.store(true, Ordering::SeqCst);
			Ok(())
		}
	}

	fn channel(port: u16) -> (Box<dyn ForwardChannel>, Arc<AtomicBool>) {
		let closed = Arc::new(AtomicBool::new(false));
		let channel = TestChannel {
			addr: SocketAddr::from(([127, 0, 0, 1], port)),
			closed: closed.clone(),
		};
		(Box::new(channel), closed)
	}

	fn handle(key: &TunnelKey) -> TunnelHandle {
		TunnelHandle {
			pod_name: key.pod_name.clone(),
			namespace: "default".into(),
			local_port: key.local_port,
			pod_port: 80,
			local_addr: SocketAddr::from(([127, 0, 0, 1], key.local_port)),
			opened_at: Utc::now(),
			status: TunnelStatus::Active,
		}
	}

	#[test]
	fn test_reserve_rejects_duplicate_key() {
		let registry = TunnelRegistry::new();
		let key = TunnelKey::new("web-0", 8080);
		let _held = registry.reserve(key.clone()).unwrap();
		let err = registry.reserve(key).err().unwrap();
		assert!(matches!(err, ClusterError::TunnelAlreadyOpen { .. }));
	}

	#[test]
	fn test_dropped_reservation_releases_key() {
		let registry = TunnelRegistry::new();
		let key = TunnelKey::new("web-0", 8080);
		drop(registry.reserve(key.clone()).unwrap());
		assert_eq!(registry.len(), 0);
		assert!(registry.reserve(key).is_ok());
	}

	#[test]
	fn test_activate_registers_channel() {
		let registry = TunnelRegistry::new();
		let key = TunnelKey::new("web-0", 8080);
		let reservation = registry.reserve(key.clone()).unwrap();
		let (channel, _closed) = channel(8080);

		let handle = reservation.activate(handle(&key), channel).ok().unwrap();
		assert_eq!(handle.key(), key);
		assert!(registry.get(&key).is_some());
		assert_eq!(registry.snapshot().len(), 1);
	}

	#[test]
	fn test_activate_after_withdraw_returns_channel() {
		let registry = TunnelRegistry::new();
		let key = TunnelKey::new("web-0", 8080);
		let reservation = registry.reserve(key.clone()).unwrap();

		assert!(matches!(
			registry.take(&key),
			Some(Slot::Requested { .. })
		));

		let (channel, _closed) = channel(8080);
		assert!(reservation.activate(handle(&key), channel).is_err());
		assert_eq!(registry.len(), 0);
	}

	#[test]
	fn test_stale_reservation_does_not_touch_newer_one() {
		let registry = TunnelRegistry::new();
		let key = TunnelKey::new("web-0", 8080);

		let stale = registry.reserve(key.clone()).unwrap();
		registry.take(&key);
		let fresh = registry.reserve(key.clone()).unwrap();

		let (channel, _closed) = channel(8080);
		assert!(stale.activate(handle(&key), channel).is_err());
		assert_eq!(registry.len(), 1);

		let (channel, _closed) = self::channel(8080);
		assert!(fresh.activate(handle(&key), channel).is_ok());
		assert!(registry.get(&key).is_some());
	}

	#[test]
	fn test_drain_empties_registry() {
		let registry = TunnelRegistry::new();
		let active = TunnelKey::new("web-0", 8080);
		let pending = TunnelKey::new("web-1", 8081);

		let reservation = registry.reserve(active.clone()).unwrap();
		let (channel, _closed) = channel(8080);
		reservation.activate(handle(&active), channel).ok().unwrap();
		let _pending = registry.reserve(pending).unwrap();

		let drained = registry.drain();
		assert_eq!(drained.len(), 2);
		assert_eq!(registry.len(), 0);
	}

	#[tokio::test]
	async fn test_withdrawn_slot_settles_once_channel_is_closed() {
		use tokio::sync::oneshot::error::TryRecvError;

		let registry = TunnelRegistry::new();
		let key = TunnelKey::new("web-0", 8080);
		let reservation = registry.reserve(key.clone()).unwrap();

		let Some(Slot::Requested { mut settled, .. }) = registry.take(&key) else {
			panic!("expected pending slot");
		};
		let (channel, closed) = channel(8080);
		let withdrawn = reservation.activate(handle(&key), channel).err().unwrap();
		assert!(matches!(settled.try_recv(), Err(TryRecvError::Empty)));

		withdrawn.close().await.unwrap();
		assert!(closed.load(Ordering::SeqCst));
		assert!(matches!(settled.try_recv(), Err(TryRecvError::Closed)));
	}

	#[test]
	fn test_failed_open_settles_withdrawn_slot() {
		use tokio::sync::oneshot::error::TryRecvError;

		let registry = TunnelRegistry::new();
		let key = TunnelKey::new("web-0", 8080);
		let reservation = registry.reserve(key.clone()).unwrap();

		let Some(Slot::Requested { mut settled, .. }) = registry.take(&key) else {
			panic!("expected pending slot");
		};
		drop(reservation);
		assert!(matches!(settled.try_recv(), Err(TryRecvError::Closed)));
	}

	#[tokio::test]
	async fn test_close_marks_handle_stopped() {
		let registry = TunnelRegistry::new();
		let key = TunnelKey::new("web-0", 8080);
		let reservation = registry.reserve(key.clone()).unwrap();
		let (channel, closed) = channel(8080);
		reservation.activate(handle(&key), channel).ok().unwrap();

		let Some(Slot::Active(tunnel)) = registry.take(&key) else {
			panic!("expected active slot");
		};
		let (handle, result) = tunnel.close().await;
		assert!(result.is_ok());
		assert_eq!(handle.status, TunnelStatus::Stopped);
		assert!(closed.load(Ordering::SeqCst));
	}
}
