use std::fmt;

/// Scheduling class attached to spawned worker tasks for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// Answers a caller that is waiting on the result.
	Interactive,
	/// Reconciliation and other deferrable upkeep.
	Background,
}

impl TaskClass {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Interactive => "interactive",
			Self::Background => "background",
		}
	}
}

impl fmt::Display for TaskClass {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
