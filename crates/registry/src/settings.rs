use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use crate::principal::PrincipalId;
use crate::source::{ChangeListener, ChangeSource, Registration, SpecSource};

struct ListenerSlot {
	registration: Registration,
	principal: PrincipalId,
	listener: ChangeListener,
}

/// In-memory per-principal spec list store.
///
/// Writes notify only the listeners registered for the written principal.
/// Listeners run on the writing thread after all locks are released.
#[derive(Default)]
pub struct SettingsStore {
	values: RwLock<FxHashMap<PrincipalId, String>>,
	listeners: Mutex<Vec<ListenerSlot>>,
	next_id: AtomicU64,
}

impl SettingsStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, principal: PrincipalId) -> Option<String> {
		self.values.read().get(&principal).cloned()
	}

	pub fn put(&self, principal: PrincipalId, value: impl Into<String>) {
		let value = value.into();
		tracing::debug!(principal = %principal, value = %value, "settings.put");
		self.values.write().insert(principal, value);
		self.notify(principal);
	}

	/// Removes the stored value. Listeners fire only if a value existed.
	pub fn clear(&self, principal: PrincipalId) {
		let removed = self.values.write().remove(&principal).is_some();
		if removed {
			tracing::debug!(principal = %principal, "settings.clear");
			self.notify(principal);
		}
	}

	pub fn listener_count(&self) -> usize {
		self.listeners.lock().len()
	}

	fn notify(&self, principal: PrincipalId) {
		let listeners: Vec<ChangeListener> = self
			.listeners
			.lock()
			.iter()
			.filter(|slot| slot.principal == principal)
			.map(|slot| ChangeListener::clone(&slot.listener))
			.collect();
		for listener in listeners {
			listener();
		}
	}
}

impl SpecSource for SettingsStore {
	fn load(&self, principal: PrincipalId) -> Option<String> {
		self.get(principal)
	}
}

impl ChangeSource for SettingsStore {
	fn register(&self, principal: PrincipalId, listener: ChangeListener) -> Registration {
		let registration = Registration::new(self.next_id.fetch_add(1, Ordering::Relaxed));
		self.listeners.lock().push(ListenerSlot {
			registration,
			principal,
			listener,
		});
		tracing::trace!(principal = %principal, id = registration.id(), "settings.register");
		registration
	}

	fn unregister(&self, registration: Registration) {
		self.listeners.lock().retain(|slot| slot.registration != registration);
		tracing::trace!(id = registration.id(), "settings.unregister");
	}
}
