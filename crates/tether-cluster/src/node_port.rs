// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};
use tether_k8s::{IntOrString, Service, ServicePort, ServiceSpec};

use crate::error::{ClusterError, ClusterResult};

/// Inclusive range of NodePorts the cluster will accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePortRange {
	pub min: u16,
	pub max: u16,
}

impl NodePortRange {
	pub const DEFAULT_MIN: u16 = 30000;
	pub const DEFAULT_MAX: u16 = 32767;

	pub fn new(min: u16, max: u16) -> Self {
		Self { min, max }
	}

	pub fn contains(&self, port: u16) -> bool {
		(self.min..=self.max).contains(&port)
	}

	pub fn check(&self, port: u16) -> ClusterResult<()> {
		if self.contains(port) {
			Ok(())
		} else {
			Err(ClusterError::NodePortOutOfRange {
				node_port: port,
				min: self.min,
				max: self.max,
			})
		}
	}
}

impl Default for NodePortRange {
	fn default() -> Self {
		Self::new(Self::DEFAULT_MIN, Self::DEFAULT_MAX)
	}
}

/// Switch `service` to type NodePort and bind `port` to `node_port`.
///
/// An existing entry for `port` is updated in place; otherwise a new TCP
/// entry named `tcp-<port>` is appended.
pub(crate) fn apply_node_port(service: &mut Service, port: u16, target_port: u16, node_port: u16) {
	let spec = service.spec.get_or_insert_with(ServiceSpec::default);
	spec.type_ = Some("NodePort".to_string());

	let ports = spec.ports.get_or_insert_with(Vec::new);
	match ports.iter_mut().find(|p| p.port == i32::from(port)) {
		Some(existing) => {
			existing.target_port = Some(IntOrString::Int(i32::from(target_port)));
			existing.node_port = Some(i32::from(node_port));
		}
		None => ports.push(ServicePort {
			name: Some(format!("tcp-{port}")),
			port: i32::from(port),
			target_port: Some(IntOrString::Int(i32::from(target_port))),
			node_port: Some(i32::from(node_port)),
			protocol: Some("TCP".to_string()),
			..Default::default()
		}),
	}
}
