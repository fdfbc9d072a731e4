// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Local TCP listener bridged to a pod port through the K8s portforward API.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use kube::Api;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::ForwardChannel;
use crate::error::K8sError;
use crate::types::Pod;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// A running port forward owned by exactly one caller.
///
/// Every accepted connection gets its own upstream portforward session on a
/// task in the accept loop's `JoinSet`, so cancelling the loop tears down all
/// of them.
pub struct PortForward {
	pod_name: String,
	pod_port: u16,
	local_addr: SocketAddr,
	cancel: CancellationToken,
	task: Option<JoinHandle<()>>,
}

impl PortForward {
	/// Bind `127.0.0.1:local_port` and start forwarding to `pod_port`.
	pub(crate) async fn bind(
		pods: Api<Pod>,
		pod_name: &str,
		local_port: u16,
		pod_port: u16,
	) -> Result<Self, K8sError> {
		let listener = bind_local(local_port).await?;
		let local_addr = listener.local_addr().map_err(|e| K8sError::ForwardError {
			message: e.to_string(),
		})?;

		let cancel = CancellationToken::new();
		let task = tokio::spawn(accept_loop(
			listener,
			pods,
			pod_name.to_string(),
			pod_port,
			cancel.clone(),
		));

		info!(
			pod = %pod_name,
			%local_addr,
			pod_port,
			"Port forward listening"
		);

		Ok(Self {
			pod_name: pod_name.to_string(),
			pod_port,
			local_addr,
			cancel,
			task: Some(task),
		})
	}
}

#[async_trait]
impl ForwardChannel for PortForward {
	fn local_addr(&self) -> SocketAddr {
		self.local_addr
	}

	async fn close(&mut self) -> Result<(), K8sError> {
		self.cancel.cancel();
		if let Some(task) = self.task.take() {
			task.await.map_err(|e| K8sError::ForwardError {
				message: format!("forward task for pod {} failed: {e}", self.pod_name),
			})?;
			info!(
				pod = %self.pod_name,
				local_addr = %self.local_addr,
				pod_port = self.pod_port,
				"Port forward closed"
			);
		}
		Ok(())
	}
}

impl Drop for PortForward {
	fn drop(&mut self) {
		self.cancel.cancel();
	}
}

/// Bind the loopback listener, reporting a taken port as `PortInUse`.
pub(crate) async fn bind_local(local_port: u16) -> Result<TcpListener, K8sError> {
	TcpListener::bind((Ipv4Addr::LOCALHOST, local_port))
		.await
		.map_err(|e| match e.kind() {
			std::io::ErrorKind::AddrInUse => K8sError::PortInUse { port: local_port },
			_ => K8sError::ForwardError {
				message: format!("failed to bind 127.0.0.1:{local_port}: {e}"),
			},
		})
}

async fn accept_loop(
	listener: TcpListener,
	pods: Api<Pod>,
	pod_name: String,
	pod_port: u16,
	cancel: CancellationToken,
) {
	let mut connections = JoinSet::new();

	loop {
		tokio::select! {
			_ = cancel.cancelled() => break,
			accepted = listener.accept() => match accepted {
				Ok((socket, peer)) => {
					debug!(%peer, pod = %pod_name, pod_port, "Accepted forwarded connection");
					connections.spawn(forward_connection(
						socket,
						pods.clone(),
						pod_name.clone(),
						pod_port,
						cancel.child_token(),
					));
				}
				Err(e) => {
					warn!(pod = %pod_name, error = %e, "Accept failed on forwarded port");
					tokio::time::sleep(ACCEPT_BACKOFF).await;
				}
			},
			Some(joined) = connections.join_next(), if !connections.is_empty() => {
				if let Err(e) = joined {
					warn!(pod = %pod_name, error = %e, "Forwarded connection task failed");
				}
			}
		}
	}

	connections.shutdown().await;
	debug!(pod = %pod_name, pod_port, "Accept loop stopped");
}

async fn forward_connection(
	mut socket: TcpStream,
	pods: Api<Pod>,
	pod_name: String,
	pod_port: u16,
	cancel: CancellationToken,
) {
	let mut forwarder = match pods.portforward(&pod_name, &[pod_port]).await {
		Ok(forwarder) => forwarder,
		Err(e) => {
			warn!(pod = %pod_name, pod_port, error = %e, "Failed to start portforward session");
			return;
		}
	};

	let Some(mut upstream) = forwarder.take_stream(pod_port) else {
		warn!(pod = %pod_name, pod_port, "Portforward session has no stream for port");
		forwarder.abort();
		return;
	};

	tokio::select! {
		_ = cancel.cancelled() => {
			debug!(pod = %pod_name, pod_port, "Forwarded connection cancelled");
		}
		result = tokio::io::copy_bidirectional(&mut socket, &mut upstream) => match result {
			Ok((to_pod, from_pod)) => {
				debug!(pod = %pod_name, to_pod, from_pod, "Forwarded connection finished");
			}
			Err(e) => {
				debug!(pod = %pod_name, error = %e, "Forwarded connection ended with error");
			}
		}
	}

	drop(upstream);
	forwarder.abort();
}
