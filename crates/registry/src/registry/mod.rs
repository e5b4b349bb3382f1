//! Reconciling tile registry with atomic snapshot publication.
//!
//! # Role
//!
//! Holds the live tile set. Writers are serialized by an internal mutex;
//! readers load the current [`TileSnapshot`] through `ArcSwap` and never
//! block on a running reconciliation.
//!
//! # Invariants
//!
//! - A spec present before and after a reconciliation maps to the same
//!   instance (`Arc::ptr_eq`).
//! - Removed instances are destroyed only after the snapshot that drops
//!   them is published, and at most once.
//! - Nothing is published and no callback fires when the ordered spec
//!   sequence is unchanged.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};

use arc_swap::ArcSwap;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use tilehost_spec::TileSpec;

use crate::capability::CapabilityProbe;
use crate::component::Component;
use crate::error::{FactoryError, RegistryError};
use crate::factory::ComponentFactory;
use crate::principal::PrincipalId;
use crate::source::SpecLoader;


/// Published, immutable view of the live tiles in configuration order.
#[derive(Clone, Default)]
pub struct TileSnapshot {
	generation: u64,
	tiles: IndexMap<TileSpec, Arc<dyn Component>>,
}

impl TileSnapshot {
	/// Bumped on every publication; the initial empty snapshot is 0.
	pub fn generation(&self) -> u64 {
		self.generation
	}

	pub fn len(&self) -> usize {
		self.tiles.len()
	}

	pub fn is_empty(&self) -> bool {
		self.tiles.is_empty()
	}

	pub fn get(&self, spec: &str) -> Option<&Arc<dyn Component>> {
		self.tiles.get(spec)
	}

	pub fn contains(&self, spec: &str) -> bool {
		self.tiles.contains_key(spec)
	}

	pub fn specs(&self) -> impl ExactSizeIterator<Item = &TileSpec> {
		self.tiles.keys()
	}

	pub fn iter(&self) -> impl ExactSizeIterator<Item = (&TileSpec, &Arc<dyn Component>)> {
		self.tiles.iter()
	}

	pub fn components(&self) -> Vec<Arc<dyn Component>> {
		self.tiles.values().cloned().collect()
	}
}

impl fmt::Debug for TileSnapshot {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TileSnapshot")
			.field("generation", &self.generation)
			.field("specs", &self.tiles.keys().collect::<Vec<_>>())
			.finish()
	}
}

/// Lifecycle of a [`Registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RegistryPhase {
	/// No reconciliation has run yet.
	Uninitialized = 0,
	Active = 1,
	/// Terminal; every write operation fails.
	Disposed = 2,
}

impl RegistryPhase {
	fn from_u8(raw: u8) -> Self {
		match raw {
			0 => Self::Uninitialized,
			1 => Self::Active,
			_ => Self::Disposed,
		}
	}
}

/// Outcome of one reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
	/// Whether a new snapshot was published.
	pub changed: bool,
	/// Generation current after the reconciliation.
	pub generation: u64,
	pub created: Vec<TileSpec>,
	pub destroyed: Vec<TileSpec>,
	pub failed: Vec<FactoryError>,
}

/// Invoked once per published change, on the reconciling thread.
///
/// The callback must not call back into [`Registry`] write operations.
pub type ChangeCallback = Arc<dyn Fn(&TileSnapshot) + Send + Sync>;

/// Reconciles desired tile specs against live tile instances.
pub struct Registry {
	factory: Arc<dyn ComponentFactory>,
	probe: Arc<dyn CapabilityProbe>,
	loader: SpecLoader,
	snap: ArcSwap<TileSnapshot>,
	/// Serializes every write operation.
	writer: Mutex<()>,
	/// Written under `writer`, readable without it.
	phase: AtomicU8,
	principal: AtomicU32,
	callback: RwLock<Option<ChangeCallback>>,
}

impl Registry {
	pub fn new(
		factory: Arc<dyn ComponentFactory>,
		probe: Arc<dyn CapabilityProbe>,
		loader: SpecLoader,
		principal: PrincipalId,
	) -> Self {
		Self {
			factory,
			probe,
			loader,
			snap: ArcSwap::from_pointee(TileSnapshot::default()),
			writer: Mutex::new(()),
			phase: AtomicU8::new(RegistryPhase::Uninitialized as u8),
			principal: AtomicU32::new(principal.get()),
			callback: RwLock::new(None),
		}
	}

	pub fn phase(&self) -> RegistryPhase {
		RegistryPhase::from_u8(self.phase.load(Ordering::Acquire))
	}

	pub fn principal(&self) -> PrincipalId {
		PrincipalId(self.principal.load(Ordering::Acquire))
	}

	fn set_phase(&self, phase: RegistryPhase) {
		self.phase.store(phase as u8, Ordering::Release);
	}

	fn ensure_live(&self) -> Result<(), RegistryError> {
		match self.phase() {
			RegistryPhase::Disposed => Err(RegistryError::Disposed),
			_ => Ok(()),
		}
	}

	/// Current published snapshot.
	pub fn snapshot(&self) -> Arc<TileSnapshot> {
		self.snap.load_full()
	}

	/// Live instances in configuration order.
	pub fn components(&self) -> Vec<Arc<dyn Component>> {
		self.snap.load().components()
	}

	pub fn specs(&self) -> Vec<TileSpec> {
		self.snap.load().specs().cloned().collect()
	}

	pub fn set_change_callback(&self, callback: impl Fn(&TileSnapshot) + Send + Sync + 'static) {
		*self.callback.write() = Some(Arc::new(callback));
	}

	pub fn clear_change_callback(&self) {
		*self.callback.write() = None;
	}

	/// Reconciles the live set against `desired`.
	pub fn reconcile(&self, desired: &[TileSpec]) -> Result<ReconcileReport, RegistryError> {
		let _writer = self.writer.lock();
		self.ensure_live()?;
		Ok(self.reconcile_locked(desired))
	}

	/// Reloads the spec list for the current principal and reconciles.
	pub fn recreate(&self) -> Result<ReconcileReport, RegistryError> {
		let _writer = self.writer.lock();
		self.ensure_live()?;
		let desired = self.loader.load(self.principal());
		Ok(self.reconcile_locked(&desired))
	}

	/// Switches principal, reconciles against its list, then informs every
	/// surviving instance in configuration order.
	pub fn on_principal_changed(&self, principal: PrincipalId) -> Result<ReconcileReport, RegistryError> {
		let _writer = self.writer.lock();
		self.ensure_live()?;
		tracing::debug!(from = %self.principal(), to = %principal, "registry.principal.switch");
		self.principal.store(principal.get(), Ordering::Release);
		let desired = self.loader.load(principal);
		let report = self.reconcile_locked(&desired);

		let snap = self.snap.load_full();
		for (spec, tile) in snap.iter() {
			if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| tile.on_principal_changed(principal))) {
				tracing::warn!(spec = %spec, panic = %panic_message(payload.as_ref()), "registry.tile.principal_panicked");
			}
		}
		Ok(report)
	}

	/// Publishes an empty snapshot, destroys every instance, and enters
	/// [`RegistryPhase::Disposed`]. Repeated calls are no-ops.
	pub fn dispose(&self) {
		let _writer = self.writer.lock();
		if self.phase() == RegistryPhase::Disposed {
			return;
		}
		self.set_phase(RegistryPhase::Disposed);

		let generation = self.snap.load().generation + 1;
		let old = self.snap.swap(Arc::new(TileSnapshot {
			generation,
			tiles: IndexMap::new(),
		}));
		for (spec, tile) in old.iter() {
			destroy_tile(spec, tile);
		}
		tracing::debug!(destroyed = old.len(), "registry.dispose");
	}

	fn reconcile_locked(&self, desired: &[TileSpec]) -> ReconcileReport {
		let current = self.snap.load_full();
		let mut tiles: IndexMap<TileSpec, Arc<dyn Component>> = IndexMap::with_capacity(desired.len());
		let mut report = ReconcileReport {
			generation: current.generation,
			..ReconcileReport::default()
		};

		for spec in desired {
			if tiles.contains_key(spec) {
				continue;
			}
			if let Some(existing) = current.tiles.get(spec) {
				tiles.insert(spec.clone(), Arc::clone(existing));
				continue;
			}
			match self.create_tile(spec) {
				Ok(tile) => {
					tracing::debug!(spec = %spec, "registry.tile.create");
					tiles.insert(spec.clone(), tile);
					report.created.push(spec.clone());
				}
				Err(err) => {
					tracing::warn!(spec = %spec, error = %err, "registry.tile.create_failed");
					report.failed.push(err);
				}
			}
		}
		self.set_phase(RegistryPhase::Active);

		// Equal sequences imply every tile was reused, so nothing new leaks.
		if current.tiles.keys().eq(tiles.keys()) {
			tracing::trace!(generation = current.generation, "registry.reconcile.unchanged");
			return report;
		}

		let removed: Vec<(TileSpec, Arc<dyn Component>)> = current
			.iter()
			.filter(|(spec, _)| !tiles.contains_key(*spec))
			.map(|(spec, tile)| (spec.clone(), Arc::clone(tile)))
			.collect();

		let next = Arc::new(TileSnapshot {
			generation: current.generation + 1,
			tiles,
		});
		self.snap.store(Arc::clone(&next));

		for (spec, tile) in &removed {
			destroy_tile(spec, tile);
			report.destroyed.push(spec.clone());
		}

		report.changed = true;
		report.generation = next.generation;
		tracing::debug!(
			generation = next.generation,
			tiles = next.len(),
			created = report.created.len(),
			destroyed = report.destroyed.len(),
			failed = report.failed.len(),
			"registry.reconcile.published"
		);

		let callback = self.callback.read().clone();
		if let Some(callback) = callback
			&& let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(next.as_ref())))
		{
			tracing::warn!(generation = next.generation, panic = %panic_message(payload.as_ref()), "registry.callback_panicked");
		}
		report
	}

	fn create_tile(&self, spec: &TileSpec) -> Result<Arc<dyn Component>, FactoryError> {
		let probe = &*self.probe;
		match panic::catch_unwind(AssertUnwindSafe(|| self.factory.create(spec, probe))) {
			Ok(result) => result,
			Err(payload) => Err(FactoryError::ConstructionFailed {
				spec: spec.clone(),
				message: panic_message(payload.as_ref()),
			}),
		}
	}
}

fn destroy_tile(spec: &TileSpec, tile: &Arc<dyn Component>) {
	match panic::catch_unwind(AssertUnwindSafe(|| tile.destroy())) {
		Ok(Ok(())) => tracing::debug!(spec = %spec, "registry.tile.destroy"),
		Ok(Err(err)) => tracing::warn!(spec = %spec, error = %err, "registry.tile.destroy_failed"),
		Err(payload) => {
			tracing::warn!(spec = %spec, panic = %panic_message(payload.as_ref()), "registry.tile.destroy_panicked");
		}
	}
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(msg) = payload.downcast_ref::<&str>() {
		(*msg).to_string()
	} else if let Some(msg) = payload.downcast_ref::<String>() {
		msg.clone()
	} else {
		"non-string panic payload".to_string()
	}
}
