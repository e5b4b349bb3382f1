//! Builtin tile components.
//!
//! Tile behavior (radios, sensors, intents) lives outside this crate; the
//! builtins here carry identity and lifecycle state only.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tilehost_spec::TileSpec;

use crate::component::Component;
use crate::error::ComponentError;
use crate::principal::PrincipalId;

#[derive(Debug, Default)]
struct TileState {
	destroyed: AtomicBool,
	principal: Mutex<Option<PrincipalId>>,
}

impl TileState {
	fn release(&self, spec: &TileSpec) {
		if self.destroyed.swap(true, Ordering::AcqRel) {
			tracing::trace!(spec = %spec, "tile.destroy.repeat");
			return;
		}
		tracing::trace!(spec = %spec, "tile.destroy");
	}

	fn switch(&self, spec: &TileSpec, principal: PrincipalId) {
		if self.destroyed.load(Ordering::Acquire) {
			return;
		}
		*self.principal.lock() = Some(principal);
		tracing::trace!(spec = %spec, principal = %principal, "tile.principal");
	}
}

/// Fixed-name tile from the builtin table.
#[derive(Debug)]
pub struct BuiltinTile {
	spec: TileSpec,
	label: &'static str,
	state: TileState,
}

impl BuiltinTile {
	pub fn new(spec: TileSpec, label: &'static str) -> Self {
		Self {
			spec,
			label,
			state: TileState::default(),
		}
	}

	pub fn is_destroyed(&self) -> bool {
		self.state.destroyed.load(Ordering::Acquire)
	}

	/// Principal seen by the last switch, if any.
	pub fn principal(&self) -> Option<PrincipalId> {
		*self.state.principal.lock()
	}
}

impl Component for BuiltinTile {
	fn spec(&self) -> &TileSpec {
		&self.spec
	}

	fn label(&self) -> &str {
		self.label
	}

	fn destroy(&self) -> Result<(), ComponentError> {
		self.state.release(&self.spec);
		Ok(())
	}

	fn on_principal_changed(&self, principal: PrincipalId) {
		self.state.switch(&self.spec, principal);
	}
}

/// Tile that fires a broadcast action, spelled `intent(<action>)`.
#[derive(Debug)]
pub struct IntentTile {
	spec: TileSpec,
	action: String,
	state: TileState,
}

impl IntentTile {
	pub fn new(spec: TileSpec, action: impl Into<String>) -> Self {
		Self {
			spec,
			action: action.into(),
			state: TileState::default(),
		}
	}

	pub fn action(&self) -> &str {
		&self.action
	}

	pub fn is_destroyed(&self) -> bool {
		self.state.destroyed.load(Ordering::Acquire)
	}
}

impl Component for IntentTile {
	fn spec(&self) -> &TileSpec {
		&self.spec
	}

	fn label(&self) -> &str {
		&self.action
	}

	fn destroy(&self) -> Result<(), ComponentError> {
		self.state.release(&self.spec);
		Ok(())
	}

	fn on_principal_changed(&self, principal: PrincipalId) {
		self.state.switch(&self.spec, principal);
	}
}
