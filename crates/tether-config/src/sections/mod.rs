// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections for tether.

pub mod cluster;
pub mod containers;
pub mod logging;

pub use cluster::{ClusterConfig, ClusterConfigLayer};
pub use containers::{ContainersConfig, ContainersConfigLayer};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
