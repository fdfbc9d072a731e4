// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Auxiliary containers for tether.
//!
//! This crate provides:
//! - A trait-based container runtime abstraction for testability
//! - A Docker implementation using bollard
//! - [`LocalContainerManager`], which tracks every container it started and
//!   can wait on their logs

mod config;
mod docker;
mod error;
mod manager;
mod runtime;
mod types;

pub use config::ContainerManagerConfig;
pub use docker::DockerRuntime;
pub use error::{ContainerError, ContainerResult, ErrorKind, RuntimeError};
pub use manager::LocalContainerManager;
pub use runtime::ContainerRuntime;
pub use types::{ContainerCleanupReport, ContainerFailure, ContainerHandle, ContainerSpec};
