// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ContainerManagerConfig {
	/// Grace period given to a container before it is killed on stop.
	pub stop_timeout: Duration,
	pub log_poll_interval: Duration,
}

impl Default for ContainerManagerConfig {
	fn default() -> Self {
		Self {
			stop_timeout: Duration::from_secs(10),
			log_poll_interval: Duration::from_millis(500),
		}
	}
}
