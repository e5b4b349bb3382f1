//! Interfaces to the external settings layer.

use std::sync::Arc;

use tilehost_spec::{TileSpec, parse_spec_list};

use crate::config::TileLists;
use crate::principal::PrincipalId;

/// Raw per-principal spec list storage.
pub trait SpecSource: Send + Sync {
	/// Stored spec list for `principal`, `None` when unset.
	fn load(&self, principal: PrincipalId) -> Option<String>;
}

/// Callback run on whatever thread observed the change. Must not block.
pub type ChangeListener = Arc<dyn Fn() + Send + Sync>;

/// Token returned by [`ChangeSource::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Registration(u64);

impl Registration {
	pub const fn new(id: u64) -> Self {
		Self(id)
	}

	pub const fn id(self) -> u64 {
		self.0
	}
}

/// Notifies listeners when a principal's spec list changes.
pub trait ChangeSource: Send + Sync {
	fn register(&self, principal: PrincipalId, listener: ChangeListener) -> Registration;

	/// Unregistering an unknown or already removed registration is a no-op.
	fn unregister(&self, registration: Registration);
}

/// Reads and parses the desired spec list for a principal.
#[derive(Clone)]
pub struct SpecLoader {
	source: Arc<dyn SpecSource>,
	lists: TileLists,
}

impl SpecLoader {
	pub fn new(source: Arc<dyn SpecSource>, lists: TileLists) -> Self {
		Self { source, lists }
	}

	/// Stored list for `principal`, or the fallback list when unset.
	pub fn raw(&self, principal: PrincipalId) -> String {
		match self.source.load(principal) {
			Some(raw) => raw,
			None => {
				tracing::debug!(principal = %principal, "registry.specs.fallback");
				self.lists.fallback.clone()
			}
		}
	}

	pub fn load(&self, principal: PrincipalId) -> Vec<TileSpec> {
		let raw = self.raw(principal);
		let specs = parse_spec_list(&raw, &self.lists.default);
		tracing::debug!(principal = %principal, raw = %raw, count = specs.len(), "registry.specs.load");
		specs
	}
}
