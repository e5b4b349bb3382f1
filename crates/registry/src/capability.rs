//! Device capability queries used to gate optional tiles.

use std::fmt;

use serde::Deserialize;

use crate::config::CapabilityConfig;

/// Network transport a tile may depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkKind {
	Wifi,
	Mobile,
	Bluetooth,
	Ethernet,
}

impl NetworkKind {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Wifi => "wifi",
			Self::Mobile => "mobile",
			Self::Bluetooth => "bluetooth",
			Self::Ethernet => "ethernet",
		}
	}
}

impl fmt::Display for NetworkKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Multi-subscription operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MultiSessionMode {
	/// Dual sessions, one active at a time.
	Dsds,
	/// Dual sessions, both active.
	Dsda,
	/// Triple sessions, one active at a time.
	Tsts,
}

impl MultiSessionMode {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Dsds => "dsds",
			Self::Dsda => "dsda",
			Self::Tsts => "tsts",
		}
	}
}

impl fmt::Display for MultiSessionMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Answers capability questions for the factory. Lookups must not block.
pub trait CapabilityProbe: Send + Sync {
	fn is_network_kind_supported(&self, kind: NetworkKind) -> bool;

	fn is_multi_session_mode_active(&self, mode: MultiSessionMode) -> bool;
}

/// Fixed capability set, usually built from [`CapabilityConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticCapabilities {
	network_kinds: Vec<NetworkKind>,
	multi_session_mode: Option<MultiSessionMode>,
}

impl StaticCapabilities {
	pub fn new(network_kinds: impl IntoIterator<Item = NetworkKind>, multi_session_mode: Option<MultiSessionMode>) -> Self {
		let mut kinds = Vec::new();
		for kind in network_kinds {
			if !kinds.contains(&kind) {
				kinds.push(kind);
			}
		}
		Self {
			network_kinds: kinds,
			multi_session_mode,
		}
	}

	pub fn from_config(config: &CapabilityConfig) -> Self {
		Self::new(config.network_kinds.iter().copied(), config.multi_session_mode)
	}
}

impl CapabilityProbe for StaticCapabilities {
	fn is_network_kind_supported(&self, kind: NetworkKind) -> bool {
		self.network_kinds.contains(&kind)
	}

	fn is_multi_session_mode_active(&self, mode: MultiSessionMode) -> bool {
		self.multi_session_mode == Some(mode)
	}
}
