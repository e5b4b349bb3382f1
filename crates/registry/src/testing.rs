//! Instrumented tiles and factory shared by the registry and host tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tilehost_spec::TileSpec;

use crate::capability::{CapabilityProbe, StaticCapabilities};
use crate::component::Component;
use crate::config::TileLists;
use crate::error::{ComponentError, FactoryError};
use crate::factory::ComponentFactory;
use crate::principal::PrincipalId;
use crate::registry::Registry;
use crate::source::{SpecLoader, SpecSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DestroyMode {
	Succeed,
	Fail,
	Panic,
}

pub(crate) struct TestTile {
	spec: TileSpec,
	mode: DestroyMode,
	destroys: AtomicUsize,
	principals: Mutex<Vec<PrincipalId>>,
}

impl TestTile {
	pub(crate) fn destroys(&self) -> usize {
		self.destroys.load(Ordering::SeqCst)
	}

	pub(crate) fn principals(&self) -> Vec<PrincipalId> {
		self.principals.lock().clone()
	}
}

impl Component for TestTile {
	fn spec(&self) -> &TileSpec {
		&self.spec
	}

	fn label(&self) -> &str {
		self.spec.as_str()
	}

	fn destroy(&self) -> Result<(), ComponentError> {
		self.destroys.fetch_add(1, Ordering::SeqCst);
		match self.mode {
			DestroyMode::Succeed => Ok(()),
			DestroyMode::Fail => Err(ComponentError::Release {
				resource: "test handle",
				message: "refused".to_string(),
			}),
			DestroyMode::Panic => panic!("destroy exploded"),
		}
	}

	fn on_principal_changed(&self, principal: PrincipalId) {
		self.principals.lock().push(principal);
	}
}

/// Factory that accepts any spec and remembers every instance it built.
#[derive(Default)]
pub(crate) struct TestFactory {
	rejected: Vec<&'static str>,
	panicking: Vec<&'static str>,
	destroy_modes: Vec<(&'static str, DestroyMode)>,
	built: Mutex<Vec<Arc<TestTile>>>,
}

impl TestFactory {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	/// Specs the factory refuses with `UnknownIdentifier`.
	pub(crate) fn rejecting(mut self, specs: &[&'static str]) -> Self {
		self.rejected.extend_from_slice(specs);
		self
	}

	/// Specs whose construction panics.
	pub(crate) fn panicking(mut self, specs: &[&'static str]) -> Self {
		self.panicking.extend_from_slice(specs);
		self
	}

	pub(crate) fn destroy_mode(mut self, spec: &'static str, mode: DestroyMode) -> Self {
		self.destroy_modes.push((spec, mode));
		self
	}

	/// Every instance built for `spec`, oldest first.
	pub(crate) fn instances(&self, spec: &str) -> Vec<Arc<TestTile>> {
		self.built.lock().iter().filter(|tile| tile.spec == *spec).cloned().collect()
	}

	pub(crate) fn only(&self, spec: &str) -> Arc<TestTile> {
		let mut instances = self.instances(spec);
		assert_eq!(instances.len(), 1, "expected exactly one instance of {spec}");
		instances.remove(0)
	}

	pub(crate) fn build_count(&self) -> usize {
		self.built.lock().len()
	}

	pub(crate) fn all(&self) -> Vec<Arc<TestTile>> {
		self.built.lock().clone()
	}
}

impl ComponentFactory for TestFactory {
	fn create(&self, spec: &TileSpec, _probe: &dyn CapabilityProbe) -> Result<Arc<dyn Component>, FactoryError> {
		if self.rejected.contains(&spec.as_str()) {
			return Err(FactoryError::UnknownIdentifier(spec.clone()));
		}
		if self.panicking.contains(&spec.as_str()) {
			panic!("constructor exploded");
		}
		let mode = self
			.destroy_modes
			.iter()
			.find(|(name, _)| *name == spec.as_str())
			.map_or(DestroyMode::Succeed, |&(_, mode)| mode);
		let tile = Arc::new(TestTile {
			spec: spec.clone(),
			mode,
			destroys: AtomicUsize::new(0),
			principals: Mutex::new(Vec::new()),
		});
		self.built.lock().push(Arc::clone(&tile));
		Ok(tile)
	}
}

pub(crate) fn specs(list: &[&str]) -> Vec<TileSpec> {
	list.iter().map(TileSpec::new).collect()
}

pub(crate) fn lists(default: &str, fallback: &str) -> TileLists {
	TileLists {
		default: default.to_string(),
		fallback: fallback.to_string(),
	}
}

/// Registry over `factory` with no default tiles and an empty fallback.
pub(crate) fn registry(factory: &Arc<TestFactory>, source: Arc<dyn SpecSource>) -> Registry {
	Registry::new(
		Arc::clone(factory) as Arc<dyn ComponentFactory>,
		Arc::new(StaticCapabilities::default()),
		SpecLoader::new(source, lists("", "")),
		PrincipalId::SYSTEM,
	)
}

/// Asserts two component handles point at the same instance.
pub(crate) fn same(a: &Arc<dyn Component>, b: &Arc<dyn Component>) -> bool {
	Arc::ptr_eq(a, b)
}
