// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Kubernetes YAML manifests, read from disk or given inline.

use std::path::{Path, PathBuf};

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::de::DeserializeOwned;

use crate::error::{ClusterError, ClusterResult};

/// Where a manifest comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
	Path(PathBuf),
	Inline(String),
}

impl ManifestSource {
	pub fn path(path: impl AsRef<Path>) -> Self {
		ManifestSource::Path(path.as_ref().to_path_buf())
	}

	pub fn inline(yaml: impl Into<String>) -> Self {
		ManifestSource::Inline(yaml.into())
	}

	pub fn read(&self) -> ClusterResult<String> {
		match self {
			ManifestSource::Path(path) => {
				std::fs::read_to_string(path).map_err(|source| ClusterError::ManifestRead {
					path: path.clone(),
					source,
				})
			}
			ManifestSource::Inline(yaml) => Ok(yaml.clone()),
		}
	}
}

/// Parse a single-document manifest into a typed object.
///
/// `apiVersion` and `kind` are checked by the k8s-openapi deserializer;
/// additionally the object must carry a `metadata.name`.
pub fn parse_manifest<K>(yaml: &str) -> ClusterResult<K>
where
	K: DeserializeOwned + k8s_openapi::Resource + k8s_openapi::Metadata<Ty = ObjectMeta>,
{
	if yaml.trim().is_empty() {
		return Err(ClusterError::Manifest {
			message: "manifest is empty".into(),
		});
	}

	let object: K = serde_yaml::from_str(yaml).map_err(|e| ClusterError::Manifest {
		message: format!("expected {}: {e}", K::KIND),
	})?;

	match object.metadata().name.as_deref() {
		Some(name) if !name.is_empty() => Ok(object),
		_ => Err(ClusterError::Manifest {
			message: format!("{} manifest has no metadata.name", K::KIND),
		}),
	}
}

/// Read and parse a manifest from `source`.
pub fn load_manifest<K>(source: &ManifestSource) -> ClusterResult<K>
where
	K: DeserializeOwned + k8s_openapi::Resource + k8s_openapi::Metadata<Ty = ObjectMeta>,
{
	let yaml = source.read()?;
	parse_manifest(&yaml)
}
