//! Tile host: registry, serialized reconciliation worker, settings observer.
//!
//! Every trigger (settings change, principal switch, explicit recreate) is
//! a command on one actor mailbox, so reconciliations never overlap and the
//! notifying thread never blocks. Queued `Recreate` commands coalesce.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tilehost_spec::TileSpec;
use tilehost_worker::{
	Actor, ActorContext, ActorHandle, ActorPort, ActorSpec, ActorStopped, Delivery, EventReceiver, Flow, ShutdownReport, TaskClass, TrySendError,
	spawn_actor,
};
use tokio::sync::oneshot;

use crate::capability::{CapabilityProbe, StaticCapabilities};
use crate::component::Component;
use crate::config::HostConfig;
use crate::factory::{ComponentFactory, TileTable};
use crate::principal::PrincipalId;
use crate::registry::{Registry, TileSnapshot};
use crate::source::{ChangeSource, Registration, SpecLoader, SpecSource};


/// Collaborators and settings for [`TileHost::start`].
pub struct HostParts {
	pub config: HostConfig,
	pub principal: PrincipalId,
	pub specs: Arc<dyn SpecSource>,
	pub changes: Arc<dyn ChangeSource>,
	pub factory: Arc<dyn ComponentFactory>,
	pub probe: Arc<dyn CapabilityProbe>,
}

impl HostParts {
	/// Builtin tile table and capabilities from `config`, with one store
	/// acting as both spec source and change source.
	pub fn new<S>(config: HostConfig, principal: PrincipalId, store: Arc<S>) -> Self
	where
		S: SpecSource + ChangeSource + 'static,
	{
		let probe = Arc::new(StaticCapabilities::from_config(&config.capabilities));
		Self {
			config,
			principal,
			specs: Arc::clone(&store) as Arc<dyn SpecSource>,
			changes: store,
			factory: Arc::new(TileTable::builtin()),
			probe,
		}
	}
}

/// Events broadcast by the host worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
	/// A reconciliation published a new snapshot.
	TilesChanged { generation: u64, specs: Vec<TileSpec> },
	/// The principal switch finished and the observer follows the new principal.
	PrincipalSwitched(PrincipalId),
}

/// Host operation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
	#[error("tile host worker has stopped")]
	WorkerStopped,
}

impl From<ActorStopped> for HostError {
	fn from(_: ActorStopped) -> Self {
		Self::WorkerStopped
	}
}

impl From<oneshot::error::RecvError> for HostError {
	fn from(_: oneshot::error::RecvError) -> Self {
		Self::WorkerStopped
	}
}

enum HostCmd {
	Recreate,
	SwitchPrincipal(PrincipalId),
	Flush(oneshot::Sender<()>),
}

impl HostCmd {
	fn coalesces(a: &Self, b: &Self) -> bool {
		matches!((a, b), (Self::Recreate, Self::Recreate))
	}
}

/// Keeps one change-source registration pointed at the worker mailbox.
struct Observer {
	changes: Arc<dyn ChangeSource>,
	port: ActorPort<HostCmd>,
	state: Mutex<Following>,
}

#[derive(Default)]
struct Following {
	registration: Option<Registration>,
	stopped: bool,
}

impl Observer {
	/// Registers for `principal`, dropping any previous registration first.
	/// Does nothing once stopped.
	fn follow(&self, principal: PrincipalId) {
		let mut state = self.state.lock();
		if state.stopped {
			tracing::debug!(principal = %principal, "host.observer.follow_after_stop");
			return;
		}
		if let Some(old) = state.registration.take() {
			self.changes.unregister(old);
		}
		let port = self.port.clone();
		let listener = Arc::new(move || request(&port, principal));
		state.registration = Some(self.changes.register(principal, listener));
		tracing::debug!(principal = %principal, "host.observer.follow");
	}

	fn stop(&self) {
		let mut state = self.state.lock();
		state.stopped = true;
		if let Some(old) = state.registration.take() {
			self.changes.unregister(old);
			tracing::debug!("host.observer.stop");
		}
	}
}

fn request(port: &ActorPort<HostCmd>, principal: PrincipalId) {
	match port.try_send(HostCmd::Recreate) {
		Ok(Delivery::Queued) => tracing::trace!(principal = %principal, "host.recreate.queued"),
		Ok(Delivery::Merged) => tracing::trace!(principal = %principal, "host.recreate.merged"),
		// Queued commands already reload the spec list.
		Err(TrySendError::Full) => tracing::debug!(principal = %principal, "host.recreate.dropped_full"),
		Err(err) => tracing::debug!(principal = %principal, error = %err, "host.recreate.rejected"),
	}
}

struct HostActor {
	registry: Arc<Registry>,
	observer: Arc<Mutex<Option<Arc<Observer>>>>,
}

impl HostActor {
	fn published(&self, ctx: &ActorContext<HostEvent>, generation: u64) {
		ctx.emit(HostEvent::TilesChanged {
			generation,
			specs: self.registry.specs(),
		});
	}
}

#[async_trait]
impl Actor for HostActor {
	type Command = HostCmd;
	type Event = HostEvent;

	async fn handle(&mut self, cmd: HostCmd, ctx: &mut ActorContext<HostEvent>) -> Result<Flow, String> {
		match cmd {
			HostCmd::Recreate => {
				let report = self.registry.recreate().map_err(|err| err.to_string())?;
				if report.changed {
					self.published(ctx, report.generation);
				}
			}
			HostCmd::SwitchPrincipal(principal) => {
				// Follow first so a write landing during the reload queues another one.
				let observer = self.observer.lock().clone();
				if let Some(observer) = observer {
					observer.follow(principal);
				}
				let report = self.registry.on_principal_changed(principal).map_err(|err| err.to_string())?;
				ctx.emit(HostEvent::PrincipalSwitched(principal));
				if report.changed {
					self.published(ctx, report.generation);
				}
			}
			HostCmd::Flush(done) => {
				let _ = done.send(());
			}
		}
		Ok(Flow::Continue)
	}
}

/// Running tile host.
///
/// Dropping the host without [`shutdown`](Self::shutdown) cancels the
/// worker and disposes the registry.
pub struct TileHost {
	registry: Arc<Registry>,
	observer: Arc<Observer>,
	actor: ActorHandle<HostCmd, HostEvent>,
	config: HostConfig,
}

impl TileHost {
	/// Spawns the worker, registers the observer for `parts.principal`,
	/// then queues the initial reconciliation.
	pub fn start(parts: HostParts) -> Self {
		let HostParts {
			config,
			principal,
			specs,
			changes,
			factory,
			probe,
		} = parts;

		let loader = SpecLoader::new(specs, config.tiles.clone());
		let registry = Arc::new(Registry::new(factory, probe, loader, principal));
		let slot = Arc::new(Mutex::new(None));
		let actor = spawn_actor(
			ActorSpec::new(
				"tilehost.reconcile",
				TaskClass::Background,
				HostActor {
					registry: Arc::clone(&registry),
					observer: Arc::clone(&slot),
				},
			)
			.capacity(config.worker.mailbox_capacity)
			.coalesce(HostCmd::coalesces),
		);

		let observer = Arc::new(Observer {
			changes,
			port: actor.port(),
			state: Mutex::new(Following::default()),
		});
		*slot.lock() = Some(Arc::clone(&observer));
		observer.follow(principal);
		request(&actor.port(), principal);
		tracing::debug!(principal = %principal, "host.start");

		Self {
			registry,
			observer,
			actor,
			config,
		}
	}

	pub fn registry(&self) -> &Arc<Registry> {
		&self.registry
	}

	/// Live tiles in configuration order.
	pub fn tiles(&self) -> Vec<Arc<dyn Component>> {
		self.registry.components()
	}

	pub fn specs(&self) -> Vec<TileSpec> {
		self.registry.specs()
	}

	pub fn snapshot(&self) -> Arc<TileSnapshot> {
		self.registry.snapshot()
	}

	pub fn principal(&self) -> PrincipalId {
		self.registry.principal()
	}

	/// Runs on the worker after each published change.
	pub fn set_change_callback(&self, callback: impl Fn(&TileSnapshot) + Send + Sync + 'static) {
		self.registry.set_change_callback(callback);
	}

	pub fn subscribe(&self) -> EventReceiver<HostEvent> {
		self.actor.subscribe()
	}

	/// Queues a reload of the current principal's list. Never blocks.
	pub fn request_recreate(&self) {
		request(&self.actor.port(), self.principal());
	}

	/// Queues a principal switch.
	pub async fn switch_principal(&self, principal: PrincipalId) -> Result<(), HostError> {
		self.actor.send(HostCmd::SwitchPrincipal(principal)).await?;
		Ok(())
	}

	/// Resolves once every command queued before it has been handled.
	pub async fn flush(&self) -> Result<(), HostError> {
		let (done, wait) = oneshot::channel();
		self.actor.send(HostCmd::Flush(done)).await?;
		Ok(wait.await?)
	}

	/// Stops observing, drains the worker (forced after the configured
	/// timeout), and disposes the registry.
	pub async fn shutdown(&self) -> ShutdownReport {
		self.observer.stop();
		let report = self.actor.drain_or_abort(self.config.worker.shutdown_timeout()).await;
		self.registry.dispose();
		tracing::debug!(exit = ?report.exit(), "host.shutdown");
		report
	}
}

impl Drop for TileHost {
	fn drop(&mut self) {
		self.observer.stop();
		self.actor.cancel();
		self.registry.dispose();
	}
}
