use tilehost_spec::TileSpec;

use crate::error::ComponentError;
use crate::principal::PrincipalId;

/// Live tile instance owned by the [`Registry`](crate::Registry).
///
/// The registry calls [`destroy`](Component::destroy) at most once per
/// instance, but implementations keep it idempotent since a snapshot reader
/// may still hold the `Arc` after removal.
pub trait Component: Send + Sync + 'static {
	/// Spec this instance was created for.
	fn spec(&self) -> &TileSpec;

	/// Human-readable name.
	fn label(&self) -> &str;

	/// Releases the tile's resources.
	fn destroy(&self) -> Result<(), ComponentError>;

	/// Called after a principal switch for every instance that survived it.
	fn on_principal_changed(&self, principal: PrincipalId);
}
