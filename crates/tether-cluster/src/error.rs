// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::fmt;
use std::path::PathBuf;

use tether_k8s::K8sError;
use thiserror::Error;

use crate::types::TunnelKey;

pub type ClusterResult<T> = Result<T, ClusterError>;

/// Errors raised by the cluster resource manager.
#[derive(Error, Debug)]
pub enum ClusterError {
	#[error("Invalid manifest: {message}")]
	Manifest { message: String },

	#[error("Failed to read manifest {path}: {source}")]
	ManifestRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("{kind} already exists: {name}")]
	AlreadyExists { kind: String, name: String },

	#[error("{kind} not found: {name}")]
	NotFound { kind: String, name: String },

	#[error("NodePort {node_port} is outside the allowed range {min}-{max}")]
	NodePortOutOfRange { node_port: u16, min: u16, max: u16 },

	#[error("Local port {port} is already in use")]
	PortInUse { port: u16 },

	#[error("Cluster API error: {message}")]
	Backend { message: String },

	#[error("Pod not found: {name}")]
	PodNotFound { name: String },

	#[error("Exec failed: {message}")]
	Exec { message: String },

	#[error("Tunnel already open: {key}")]
	TunnelAlreadyOpen { key: TunnelKey },

	#[error("Tunnel {key} was stopped before it finished opening")]
	TunnelWithdrawn { key: TunnelKey },

	#[error("Failed to close tunnel {key}: {message}")]
	TunnelClose { key: TunnelKey, message: String },

	#[error("Timed out after {seconds}s waiting for {what}")]
	Timeout { what: String, seconds: u64 },
}

/// Coarse classification of [`ClusterError`] for callers that branch on kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	Manifest,
	Cluster,
	PodNotFound,
	Exec,
	TunnelAlreadyOpen,
	TimeoutExceeded,
}

impl fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			ErrorKind::Manifest => "manifest",
			ErrorKind::Cluster => "cluster",
			ErrorKind::PodNotFound => "pod_not_found",
			ErrorKind::Exec => "exec",
			ErrorKind::TunnelAlreadyOpen => "tunnel_already_open",
			ErrorKind::TimeoutExceeded => "timeout_exceeded",
		};
		f.write_str(s)
	}
}

impl ClusterError {
	pub fn kind(&self) -> ErrorKind {
		match self {
			ClusterError::Manifest { .. } | ClusterError::ManifestRead { .. } => ErrorKind::Manifest,
			ClusterError::AlreadyExists { .. }
			| ClusterError::NotFound { .. }
			| ClusterError::NodePortOutOfRange { .. }
			| ClusterError::PortInUse { .. }
			| ClusterError::Backend { .. }
			| ClusterError::TunnelWithdrawn { .. }
			| ClusterError::TunnelClose { .. } => ErrorKind::Cluster,
			ClusterError::PodNotFound { .. } => ErrorKind::PodNotFound,
			ClusterError::Exec { .. } => ErrorKind::Exec,
			ClusterError::TunnelAlreadyOpen { .. } => ErrorKind::TunnelAlreadyOpen,
			ClusterError::Timeout { .. } => ErrorKind::TimeoutExceeded,
		}
	}
}

impl From<K8sError> for ClusterError {
	fn from(err: K8sError) -> Self {
		match err {
			K8sError::AlreadyExists { kind, name } => ClusterError::AlreadyExists { kind, name },
			K8sError::NotFound { kind, name } => ClusterError::NotFound { kind, name },
			K8sError::PodNotFound { name } => ClusterError::PodNotFound { name },
			K8sError::ExecError { message } => ClusterError::Exec { message },
			K8sError::PortInUse { port } => ClusterError::PortInUse { port },
			other @ (K8sError::ApiError { .. }
			| K8sError::Invalid { .. }
			| K8sError::ForwardError { .. }
			| K8sError::ConfigError { .. }) => ClusterError::Backend {
				message: other.to_string(),
			},
		}
	}
}
