//! Host configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file is a valid configuration:
//!
//! ```toml
//! [tiles]
//! default = "wifi,bt,cell,airplane"
//! fallback = "default"
//!
//! [capabilities]
//! network_kinds = ["wifi", "mobile"]
//! multi_session_mode = "dsda"
//!
//! [worker]
//! mailbox_capacity = 16
//! shutdown_timeout_ms = 1000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::capability::{MultiSessionMode, NetworkKind};

/// Default spec list used to expand `default` and fill in missing tiles.
pub const DEFAULT_TILES: &str = "wifi,bt,inversion,cell,airplane,rotation,flashlight,location,cast,hotspot";

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("failed to read {}: {error}", .path.display())]
	Io { path: PathBuf, error: std::io::Error },
	#[error("TOML parse error{}: {message}", .path.as_ref().map(|p| format!(" in {}", p.display())).unwrap_or_default())]
	Parse { path: Option<PathBuf>, message: String },
	#[error("invalid configuration: {0}")]
	Invalid(String),
}

/// Complete host configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
	pub tiles: TileLists,
	pub capabilities: CapabilityConfig,
	pub worker: WorkerConfig,
}

/// Static spec lists.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TileLists {
	/// Expanded in place of `default`; missing entries are appended.
	pub default: String,
	/// Used when a principal has no stored value.
	pub fallback: String,
}

impl Default for TileLists {
	fn default() -> Self {
		Self {
			default: DEFAULT_TILES.to_string(),
			fallback: tilehost_spec::DEFAULT_SENTINEL.to_string(),
		}
	}
}

/// Device capabilities consulted by the tile factory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CapabilityConfig {
	pub network_kinds: Vec<NetworkKind>,
	pub multi_session_mode: Option<MultiSessionMode>,
}

impl Default for CapabilityConfig {
	fn default() -> Self {
		Self {
			network_kinds: vec![NetworkKind::Wifi, NetworkKind::Mobile, NetworkKind::Bluetooth],
			multi_session_mode: None,
		}
	}
}

/// Reconciliation worker tuning.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerConfig {
	pub mailbox_capacity: usize,
	pub shutdown_timeout_ms: u64,
}

impl WorkerConfig {
	pub fn shutdown_timeout(&self) -> Duration {
		Duration::from_millis(self.shutdown_timeout_ms)
	}
}

impl Default for WorkerConfig {
	fn default() -> Self {
		Self {
			mailbox_capacity: 16,
			shutdown_timeout_ms: 1000,
		}
	}
}

impl HostConfig {
	fn validate(self) -> Result<Self, ConfigError> {
		if self.worker.mailbox_capacity == 0 {
			return Err(ConfigError::Invalid("worker.mailbox_capacity must be > 0".to_string()));
		}
		Ok(self)
	}
}

/// Parses and validates a configuration document.
pub fn load_config_str(content: &str) -> Result<HostConfig, ConfigError> {
	parse(content, None)
}

/// Reads, parses, and validates a configuration file.
pub fn load_config(path: impl AsRef<Path>) -> Result<HostConfig, ConfigError> {
	let path = path.as_ref();
	let content = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
		path: path.to_path_buf(),
		error,
	})?;
	parse(&content, Some(path))
}

fn parse(content: &str, path: Option<&Path>) -> Result<HostConfig, ConfigError> {
	let config: HostConfig = toml::from_str(content).map_err(|err| ConfigError::Parse {
		path: path.map(Path::to_path_buf),
		message: err.to_string(),
	})?;
	config.validate()
}
