use tilehost_spec::TileSpec;

use crate::factory::Requirement;

/// Failure to build a tile from its spec.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FactoryError {
	/// No table entry matches the spec.
	#[error("unknown tile spec '{0}'")]
	UnknownIdentifier(TileSpec),
	/// An entry matches but its requirement is not met on this device.
	#[error("tile spec '{spec}' is not supported: requires {requirement}")]
	UnsupportedIdentifier { spec: TileSpec, requirement: Requirement },
	/// A prefix entry matched but the payload is missing or unterminated.
	#[error("malformed tile spec '{spec}': {reason}")]
	MalformedIdentifier { spec: TileSpec, reason: &'static str },
	/// The constructor panicked or otherwise failed.
	#[error("tile '{spec}' failed to construct: {message}")]
	ConstructionFailed { spec: TileSpec, message: String },
}

impl FactoryError {
	pub fn spec(&self) -> &TileSpec {
		match self {
			Self::UnknownIdentifier(spec)
			| Self::UnsupportedIdentifier { spec, .. }
			| Self::MalformedIdentifier { spec, .. }
			| Self::ConstructionFailed { spec, .. } => spec,
		}
	}
}

/// Registry operation rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
	#[error("tile registry has been disposed")]
	Disposed,
}

/// Failure while a tile releases its resources.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComponentError {
	#[error("failed to release {resource}: {message}")]
	Release { resource: &'static str, message: String },
}
