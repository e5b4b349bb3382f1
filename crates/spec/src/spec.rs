use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Opaque identifier naming a requested tile kind.
///
/// Cloning is a reference count bump, so specs can key maps and travel
/// through snapshots freely.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileSpec(Arc<str>);

impl TileSpec {
	/// Creates a spec from an already trimmed token.
	pub fn new(spec: impl AsRef<str>) -> Self {
		Self(Arc::from(spec.as_ref()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Returns the payload of a parameterized spec shaped `<prefix><payload><suffix>`.
	///
	/// `TileSpec::new("intent(a.b)").parameter("intent(", ")")` yields `Some("a.b")`.
	/// Returns `None` when the prefix or suffix is missing; an empty payload is
	/// returned as `Some("")` so callers can report it precisely.
	pub fn parameter(&self, prefix: &str, suffix: &str) -> Option<&str> {
		self.0.strip_prefix(prefix)?.strip_suffix(suffix)
	}
}

impl fmt::Debug for TileSpec {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(&*self.0, f)
	}
}

impl fmt::Display for TileSpec {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl Borrow<str> for TileSpec {
	fn borrow(&self) -> &str {
		&self.0
	}
}

impl AsRef<str> for TileSpec {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

impl From<&str> for TileSpec {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}

impl From<String> for TileSpec {
	fn from(value: String) -> Self {
		Self(Arc::from(value))
	}
}

impl PartialEq<str> for TileSpec {
	fn eq(&self, other: &str) -> bool {
		&*self.0 == other
	}
}

impl PartialEq<&str> for TileSpec {
	fn eq(&self, other: &&str) -> bool {
		&*self.0 == *other
	}
}
