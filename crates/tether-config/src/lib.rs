// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered configuration for tether.
//!
//! Sources, lowest to highest precedence:
//! - built-in defaults
//! - a TOML file (`$XDG_CONFIG_HOME/tether/config.toml`, or `--config PATH`)
//! - `TETHER_*` environment variables
//!
//! ```ignore
//! let config = tether_config::load_config()?;
//! println!("namespace: {}", config.cluster.namespace);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::TetherConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved tether configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TetherConfig {
	pub cluster: ClusterConfig,
	pub containers: ContainersConfig,
	pub logging: LoggingConfig,
}

/// Load configuration from defaults, the user config file and the environment.
pub fn load_config() -> Result<TetherConfig, ConfigError> {
	let mut sources: Vec<Box<dyn ConfigSource>> = vec![Box::new(DefaultsSource), Box::new(EnvSource)];
	if let Some(user) = TomlSource::user() {
		sources.push(Box::new(user));
	}
	load_from_sources(sources)
}

/// Load configuration with an explicit config file, which must exist.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<TetherConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::required(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<TetherConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = TetherConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

/// Finalize a merged layer into resolved config.
pub fn finalize(layer: TetherConfigLayer) -> Result<TetherConfig, ConfigError> {
	let cluster = layer.cluster.unwrap_or_default().finalize();
	let containers = layer.containers.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	validate_config(&cluster, &containers)?;

	info!(
		namespace = %cluster.namespace,
		context = cluster.context.as_deref().unwrap_or("<current>"),
		node_ports = %format!("{}-{}", cluster.node_port_min, cluster.node_port_max),
		docker_host = containers.docker_host.as_deref().unwrap_or("<local>"),
		"Configuration loaded"
	);

	Ok(TetherConfig {
		cluster,
		containers,
		logging,
	})
}

/// Validate cross-field configuration rules.
fn validate_config(cluster: &ClusterConfig, containers: &ContainersConfig) -> Result<(), ConfigError> {
	if cluster.node_port_min > cluster.node_port_max {
		return Err(ConfigError::Validation(format!(
			"node_port_min ({}) is greater than node_port_max ({})",
			cluster.node_port_min, cluster.node_port_max
		)));
	}
	if cluster.pod_poll_interval_ms == 0 {
		return Err(ConfigError::Validation(
			"pod_poll_interval_ms must be greater than zero".to_string(),
		));
	}
	if containers.log_poll_interval_ms == 0 {
		return Err(ConfigError::Validation(
			"log_poll_interval_ms must be greater than zero".to_string(),
		));
	}
	Ok(())
}
