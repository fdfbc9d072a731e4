// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::fmt;
use std::time::Duration;

use thiserror::Error;

pub type ContainerResult<T> = Result<T, ContainerError>;

/// Errors reported by a [`crate::ContainerRuntime`].
#[derive(Error, Debug)]
pub enum RuntimeError {
	#[error("No such container: {id}")]
	NotFound { id: String },

	#[error("Container name already in use: {name}")]
	Conflict { name: String },

	#[error("Failed to pull image {image}: {message}")]
	ImagePull { image: String, message: String },

	#[error("Docker API error: {message}")]
	Api { message: String },

	#[error("Failed to connect to Docker: {message}")]
	Connection { message: String },
}

/// Errors raised by the local container manager.
#[derive(Error, Debug)]
pub enum ContainerError {
	#[error("Container name already in use: {name}")]
	NameInUse { name: String },

	#[error("Failed to start container {name}: {message}")]
	Start { name: String, message: String },

	#[error("Container not tracked: {name}")]
	NotFound { name: String },

	#[error("Failed to stop container {name}: {message}")]
	Stop { name: String, message: String },

	#[error("Failed to read logs of {name}: {message}")]
	Logs { name: String, message: String },

	#[error("Invalid log pattern {pattern:?}: {message}")]
	InvalidPattern { pattern: String, message: String },

	#[error("Timed out after {timeout:?} waiting for {pattern:?} in logs of {name}")]
	TimeoutExceeded {
		name: String,
		pattern: String,
		timeout: Duration,
	},

	#[error(transparent)]
	Runtime(#[from] RuntimeError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	Start,
	NotFound,
	Stop,
	Logs,
	InvalidPattern,
	TimeoutExceeded,
	Runtime,
}

impl fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			ErrorKind::Start => "start",
			ErrorKind::NotFound => "not_found",
			ErrorKind::Stop => "stop",
			ErrorKind::Logs => "logs",
			ErrorKind::InvalidPattern => "invalid_pattern",
			ErrorKind::TimeoutExceeded => "timeout_exceeded",
			ErrorKind::Runtime => "runtime",
		};
		f.write_str(s)
	}
}

impl ContainerError {
	pub fn kind(&self) -> ErrorKind {
		match self {
			ContainerError::NameInUse { .. } | ContainerError::Start { .. } => ErrorKind::Start,
			ContainerError::NotFound { .. } => ErrorKind::NotFound,
			ContainerError::Stop { .. } => ErrorKind::Stop,
			ContainerError::Logs { .. } => ErrorKind::Logs,
			ContainerError::InvalidPattern { .. } => ErrorKind::InvalidPattern,
			ContainerError::TimeoutExceeded { .. } => ErrorKind::TimeoutExceeded,
			ContainerError::Runtime(_) => ErrorKind::Runtime,
		}
	}
}
