// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Cluster resource lifecycle for tether.
//!
//! [`ClusterResourceManager`] creates and deletes workload objects, runs
//! commands in pods, exposes services on NodePorts and keeps track of every
//! port-forward tunnel it opened so that all of them can be torn down
//! deterministically.

mod config;
mod error;
mod manager;
mod manifest;
mod node_port;
mod tunnels;
mod types;

pub use config::ClusterManagerConfig;
pub use error::{ClusterError, ClusterResult, ErrorKind};
pub use manager::ClusterResourceManager;
pub use manifest::{load_manifest, parse_manifest, ManifestSource};
pub use node_port::NodePortRange;
pub use types::{
	CommandResult, DeleteOutcome, ResourceKind, ResourceRef, TunnelCleanupReport, TunnelFailure,
	TunnelHandle, TunnelKey, TunnelStatus,
};
