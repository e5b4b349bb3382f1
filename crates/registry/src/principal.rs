use std::fmt;

/// Active user or session id. Principal 0 is the system default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PrincipalId(pub u32);

impl PrincipalId {
	pub const SYSTEM: Self = Self(0);

	pub const fn get(self) -> u32 {
		self.0
	}
}

impl fmt::Display for PrincipalId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<u32> for PrincipalId {
	fn from(id: u32) -> Self {
		Self(id)
	}
}
