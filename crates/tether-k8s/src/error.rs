// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use thiserror::Error;

/// Result type alias for K8s operations.
pub type K8sResult<T> = Result<T, K8sError>;

/// Errors that can occur during K8s operations.
#[derive(Error, Debug)]
pub enum K8sError {
	#[error("K8s API error: {message}")]
	ApiError { message: String },

	#[error("{kind} already exists: {name}")]
	AlreadyExists { kind: String, name: String },

	#[error("{kind} not found: {name}")]
	NotFound { kind: String, name: String },

	#[error("{kind} {name} rejected: {message}")]
	Invalid {
		kind: String,
		name: String,
		message: String,
	},

	#[error("Pod not found: {name}")]
	PodNotFound { name: String },

	#[error("Exec error: {message}")]
	ExecError { message: String },

	#[error("Port forward error: {message}")]
	ForwardError { message: String },

	#[error("Local port {port} is already in use")]
	PortInUse { port: u16 },

	#[error("Kubeconfig error: {message}")]
	ConfigError { message: String },
}

impl From<kube::Error> for K8sError {
	fn from(err: kube::Error) -> Self {
		K8sError::ApiError {
			message: err.to_string(),
		}
	}
}

/// Classify a kube error for a named object of the given kind.
///
/// 404 becomes `NotFound`, 409 `AlreadyExists` and 422 `Invalid`, so callers
/// can tell "nothing there" and "name taken" apart from other rejections.
pub(crate) fn classify(err: kube::Error, kind: &str, name: &str) -> K8sError {
	match err {
		kube::Error::Api(ref resp) if resp.code == 404 => K8sError::NotFound {
			kind: kind.to_string(),
			name: name.to_string(),
		},
		kube::Error::Api(ref resp) if resp.code == 409 => K8sError::AlreadyExists {
			kind: kind.to_string(),
			name: name.to_string(),
		},
		kube::Error::Api(resp) if resp.code == 422 => K8sError::Invalid {
			kind: kind.to_string(),
			name: name.to_string(),
			message: resp.message,
		},
		e => e.into(),
	}
}
