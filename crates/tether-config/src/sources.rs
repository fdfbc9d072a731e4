// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::TetherConfigLayer;
use crate::sections::{ClusterConfigLayer, ContainersConfigLayer, LogFormat, LoggingConfigLayer};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<TetherConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<TetherConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(TetherConfigLayer::default())
	}
}

/// TOML file configuration source.
///
/// A missing file is not an error unless the path was given explicitly.
pub struct TomlSource {
	path: PathBuf,
	required: bool,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			required: false,
		}
	}

	/// A file the user asked for by name; it must exist.
	pub fn required(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			required: true,
		}
	}

	/// `$XDG_CONFIG_HOME/tether/config.toml` (or the platform equivalent).
	pub fn user() -> Option<Self> {
		dirs::config_dir().map(|dir| Self::new(dir.join("tether").join("config.toml")))
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<TetherConfigLayer, ConfigError> {
		if !self.required && !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(TetherConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: TetherConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: TETHER_<FIELD>, e.g. `TETHER_NAMESPACE`, `TETHER_DOCKER_HOST`.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<TetherConfigLayer, ConfigError> {
		debug!("loading environment variables");
		layer_from_env(&|name: &str| std::env::var(name).ok())
	}
}

type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Build a layer from variables resolved through `lookup`.
pub(crate) fn layer_from_env(lookup: Lookup<'_>) -> Result<TetherConfigLayer, ConfigError> {
	Ok(TetherConfigLayer {
		cluster: Some(load_cluster_from_env(lookup)?),
		containers: Some(load_containers_from_env(lookup)?),
		logging: Some(load_logging_from_env(lookup)?),
	})
}

fn env_var(lookup: Lookup<'_>, name: &str) -> Option<String> {
	lookup(name).filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(
	lookup: Lookup<'_>,
	name: &str,
	type_name: &str,
) -> Result<Option<T>, ConfigError> {
	match env_var(lookup, name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid {type_name} value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_u16(lookup: Lookup<'_>, name: &str) -> Result<Option<u16>, ConfigError> {
	env_parse(lookup, name, "u16")
}

fn env_u64(lookup: Lookup<'_>, name: &str) -> Result<Option<u64>, ConfigError> {
	env_parse(lookup, name, "u64")
}

fn load_cluster_from_env(lookup: Lookup<'_>) -> Result<ClusterConfigLayer, ConfigError> {
	Ok(ClusterConfigLayer {
		kubeconfig: env_var(lookup, "TETHER_KUBECONFIG").map(PathBuf::from),
		context: env_var(lookup, "TETHER_CONTEXT"),
		namespace: env_var(lookup, "TETHER_NAMESPACE"),
		node_port_min: env_u16(lookup, "TETHER_NODE_PORT_MIN")?,
		node_port_max: env_u16(lookup, "TETHER_NODE_PORT_MAX")?,
		delete_grace_period_secs: env_u64(lookup, "TETHER_DELETE_GRACE_PERIOD_SECS")?,
		pod_ready_timeout_secs: env_u64(lookup, "TETHER_POD_READY_TIMEOUT_SECS")?,
		pod_poll_interval_ms: env_u64(lookup, "TETHER_POD_POLL_INTERVAL_MS")?,
	})
}

fn load_containers_from_env(lookup: Lookup<'_>) -> Result<ContainersConfigLayer, ConfigError> {
	Ok(ContainersConfigLayer {
		docker_host: env_var(lookup, "TETHER_DOCKER_HOST"),
		stop_timeout_secs: env_u64(lookup, "TETHER_CONTAINER_STOP_TIMEOUT_SECS")?,
		log_poll_interval_ms: env_u64(lookup, "TETHER_LOG_POLL_INTERVAL_MS")?,
		log_wait_timeout_secs: env_u64(lookup, "TETHER_LOG_WAIT_TIMEOUT_SECS")?,
	})
}

fn load_logging_from_env(lookup: Lookup<'_>) -> Result<LoggingConfigLayer, ConfigError> {
	let format = match env_var(lookup, "TETHER_LOG_FORMAT") {
		Some(v) => match v.to_lowercase().as_str() {
			"pretty" | "text" => Some(LogFormat::Pretty),
			"json" => Some(LogFormat::Json),
			_ => {
				return Err(ConfigError::InvalidValue {
					key: "TETHER_LOG_FORMAT".to_string(),
					message: format!("expected 'pretty' or 'json', got '{v}'"),
				})
			}
		},
		None => None,
	};

	Ok(LoggingConfigLayer {
		level: env_var(lookup, "TETHER_LOG_LEVEL"),
		format,
	})
}
