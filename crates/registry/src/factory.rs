//! Spec-to-tile dispatch.
//!
//! [`TileTable`] is an ordered list of [`TileEntry`] values fixed at
//! construction. Lookup walks the entries in order and the first matcher
//! that accepts the spec decides the outcome, so exact names must precede
//! any prefix that could shadow them.

use std::fmt;
use std::sync::Arc;

use tilehost_spec::TileSpec;

use crate::capability::{CapabilityProbe, MultiSessionMode, NetworkKind};
use crate::component::Component;
use crate::error::FactoryError;
use crate::tiles::{BuiltinTile, IntentTile};

/// Builds tile instances from specs.
pub trait ComponentFactory: Send + Sync {
	fn create(&self, spec: &TileSpec, probe: &dyn CapabilityProbe) -> Result<Arc<dyn Component>, FactoryError>;
}

/// Constructor stored in a [`TileEntry`].
pub type Constructor = Arc<dyn Fn(&TileSpec) -> Result<Arc<dyn Component>, FactoryError> + Send + Sync>;

/// Spec shape accepted by an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
	Exact(&'static str),
	Prefix(&'static str),
}

impl Matcher {
	pub fn matches(self, spec: &str) -> bool {
		match self {
			Self::Exact(name) => spec == name,
			Self::Prefix(prefix) => spec.starts_with(prefix),
		}
	}
}

/// Activation predicate evaluated against the [`CapabilityProbe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Requirement {
	#[default]
	Always,
	NetworkKind(NetworkKind),
	MultiSessionMode(MultiSessionMode),
}

impl Requirement {
	pub fn is_met(self, probe: &dyn CapabilityProbe) -> bool {
		match self {
			Self::Always => true,
			Self::NetworkKind(kind) => probe.is_network_kind_supported(kind),
			Self::MultiSessionMode(mode) => probe.is_multi_session_mode_active(mode),
		}
	}
}

impl fmt::Display for Requirement {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Always => f.write_str("nothing"),
			Self::NetworkKind(kind) => write!(f, "{kind} networking"),
			Self::MultiSessionMode(mode) => write!(f, "{mode} multi-session mode"),
		}
	}
}

/// One row of the dispatch table.
#[derive(Clone)]
pub struct TileEntry {
	matcher: Matcher,
	requirement: Requirement,
	construct: Constructor,
}

impl TileEntry {
	pub fn new(
		matcher: Matcher,
		construct: impl Fn(&TileSpec) -> Result<Arc<dyn Component>, FactoryError> + Send + Sync + 'static,
	) -> Self {
		Self {
			matcher,
			requirement: Requirement::Always,
			construct: Arc::new(construct),
		}
	}

	pub fn exact(
		name: &'static str,
		construct: impl Fn(&TileSpec) -> Result<Arc<dyn Component>, FactoryError> + Send + Sync + 'static,
	) -> Self {
		Self::new(Matcher::Exact(name), construct)
	}

	pub fn prefix(
		prefix: &'static str,
		construct: impl Fn(&TileSpec) -> Result<Arc<dyn Component>, FactoryError> + Send + Sync + 'static,
	) -> Self {
		Self::new(Matcher::Prefix(prefix), construct)
	}

	#[must_use]
	pub fn requires(mut self, requirement: Requirement) -> Self {
		self.requirement = requirement;
		self
	}

	pub fn matcher(&self) -> Matcher {
		self.matcher
	}

	pub fn requirement(&self) -> Requirement {
		self.requirement
	}
}

impl fmt::Debug for TileEntry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TileEntry")
			.field("matcher", &self.matcher)
			.field("requirement", &self.requirement)
			.finish_non_exhaustive()
	}
}

/// Fixed-name builtins in lookup order: spec, label, requirement.
const BUILTINS: &[(&str, &str, Requirement)] = &[
	("wifi", "Wi-Fi", Requirement::Always),
	("bt", "Bluetooth", Requirement::Always),
	("inversion", "Invert colors", Requirement::Always),
	("cell", "Mobile network", Requirement::Always),
	("airplane", "Airplane mode", Requirement::Always),
	("rotation", "Auto-rotate", Requirement::Always),
	("flashlight", "Flashlight", Requirement::Always),
	("location", "Location", Requirement::Always),
	("cast", "Cast screen", Requirement::Always),
	("hotspot", "Hotspot", Requirement::Always),
	("immersive", "Immersive mode", Requirement::Always),
	("livedisplay", "LiveDisplay", Requirement::Always),
	("notifications", "Notifications", Requirement::Always),
	("data", "Mobile data", Requirement::NetworkKind(NetworkKind::Mobile)),
	("roaming", "Roaming", Requirement::Always),
	("dds", "Data subscription", Requirement::MultiSessionMode(MultiSessionMode::Dsda)),
	("apn", "Access point names", Requirement::Always),
];

const INTENT_PREFIX: &str = "intent(";
const INTENT_SUFFIX: &str = ")";

fn intent_tile(spec: &TileSpec) -> Result<Arc<dyn Component>, FactoryError> {
	let malformed = |reason| FactoryError::MalformedIdentifier { spec: spec.clone(), reason };
	let action = spec.parameter(INTENT_PREFIX, INTENT_SUFFIX).ok_or_else(|| malformed("missing closing ')'"))?;
	let action = action.trim();
	if action.is_empty() {
		return Err(malformed("empty action"));
	}
	Ok(Arc::new(IntentTile::new(spec.clone(), action)))
}

/// Closed, ordered tile dispatch table.
#[derive(Debug, Clone)]
pub struct TileTable {
	entries: Vec<TileEntry>,
}

impl TileTable {
	pub fn new(entries: impl IntoIterator<Item = TileEntry>) -> Self {
		Self {
			entries: entries.into_iter().collect(),
		}
	}

	/// The builtin tiles followed by the `intent(...)` prefix entry.
	pub fn builtin() -> Self {
		let fixed = BUILTINS.iter().map(|&(name, label, requirement)| {
			TileEntry::exact(name, move |spec| Ok(Arc::new(BuiltinTile::new(spec.clone(), label)) as Arc<dyn Component>))
				.requires(requirement)
		});
		Self::new(fixed.chain([TileEntry::prefix(INTENT_PREFIX, intent_tile)]))
	}

	pub fn entries(&self) -> &[TileEntry] {
		&self.entries
	}

	/// First entry whose matcher accepts `spec`.
	pub fn lookup(&self, spec: &str) -> Option<&TileEntry> {
		self.entries.iter().find(|entry| entry.matcher.matches(spec))
	}
}

impl Default for TileTable {
	fn default() -> Self {
		Self::builtin()
	}
}

impl ComponentFactory for TileTable {
	fn create(&self, spec: &TileSpec, probe: &dyn CapabilityProbe) -> Result<Arc<dyn Component>, FactoryError> {
		let entry = self
			.lookup(spec.as_str())
			.ok_or_else(|| FactoryError::UnknownIdentifier(spec.clone()))?;
		if !entry.requirement.is_met(probe) {
			return Err(FactoryError::UnsupportedIdentifier {
				spec: spec.clone(),
				requirement: entry.requirement,
			});
		}
		(entry.construct)(spec)
	}
}
