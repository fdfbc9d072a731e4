// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Local container runtime section.

use serde::{Deserialize, Serialize};

pub const DEFAULT_STOP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_LOG_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_LOG_WAIT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ContainersConfigLayer {
	pub docker_host: Option<String>,
	pub stop_timeout_secs: Option<u64>,
	pub log_poll_interval_ms: Option<u64>,
	pub log_wait_timeout_secs: Option<u64>,
}

impl ContainersConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.docker_host.is_some() {
			self.docker_host = other.docker_host;
		}
		if other.stop_timeout_secs.is_some() {
			self.stop_timeout_secs = other.stop_timeout_secs;
		}
		if other.log_poll_interval_ms.is_some() {
			self.log_poll_interval_ms = other.log_poll_interval_ms;
		}
		if other.log_wait_timeout_secs.is_some() {
			self.log_wait_timeout_secs = other.log_wait_timeout_secs;
		}
	}

	pub fn finalize(self) -> ContainersConfig {
		ContainersConfig {
			docker_host: self.docker_host,
			stop_timeout_secs: self.stop_timeout_secs.unwrap_or(DEFAULT_STOP_TIMEOUT_SECS),
			log_poll_interval_ms: self
				.log_poll_interval_ms
				.unwrap_or(DEFAULT_LOG_POLL_INTERVAL_MS),
			log_wait_timeout_secs: self
				.log_wait_timeout_secs
				.unwrap_or(DEFAULT_LOG_WAIT_TIMEOUT_SECS),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContainersConfig {
	/// Docker endpoint; the runtime's local defaults when unset.
	pub docker_host: Option<String>,
	pub stop_timeout_secs: u64,
	pub log_poll_interval_ms: u64,
	/// Timeout for a plan's `wait_for_log` when the plan gives none.
	pub log_wait_timeout_secs: u64,
}

impl Default for ContainersConfig {
	fn default() -> Self {
		ContainersConfigLayer::default().finalize()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = ContainersConfig::default();
		assert!(config.docker_host.is_none());
		assert_eq!(config.stop_timeout_secs, 10);
		assert_eq!(config.log_poll_interval_ms, 500);
		assert_eq!(config.log_wait_timeout_secs, 60);
	}

	#[test]
	fn test_merge_keeps_base_when_other_empty() {
		let mut base = ContainersConfigLayer {
			docker_host: Some("unix:///run/user/1000/podman/podman.sock".into()),
			..Default::default()
		};
		base.merge(ContainersConfigLayer::default());
		assert_eq!(
			base.docker_host.as_deref(),
			Some("unix:///run/user/1000/podman/podman.sock")
		);
	}
}
