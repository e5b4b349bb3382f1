use std::fmt;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::context::{Actor, ActorContext, ActorSpec, ExitReason, Flow};
use super::join::Joiner;
use crate::mailbox::{self, Delivery, MailboxReceiver, MailboxSender, TrySendError};
use crate::EventReceiver;

/// How [`ActorHandle::shutdown`] stops the actor.
#[derive(Debug, Clone, Copy)]
pub enum ShutdownMode {
	/// Cancel now; queued commands are dropped.
	Abort,
	/// Close the mailbox and wait up to `timeout` for the queue to drain.
	Drain { timeout: Duration },
}

/// Result of a shutdown request.
#[derive(Debug, Clone)]
pub struct ShutdownReport {
	completed: bool,
	exit: Option<ExitReason>,
}

impl ShutdownReport {
	/// Whether the task has ended.
	pub fn completed(&self) -> bool {
		self.completed
	}

	pub fn exit(&self) -> Option<&ExitReason> {
		self.exit.as_ref()
	}
}

/// The actor no longer accepts commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorStopped;

impl fmt::Display for ActorStopped {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("actor has stopped")
	}
}

impl std::error::Error for ActorStopped {}

/// Send-only view of an actor's mailbox.
pub struct ActorPort<C> {
	tx: MailboxSender<C>,
}

impl<C> Clone for ActorPort<C> {
	fn clone(&self) -> Self {
		Self { tx: self.tx.clone() }
	}
}

impl<C> ActorPort<C> {
	/// Never blocks; callable from any thread.
	pub fn try_send(&self, cmd: C) -> Result<Delivery, TrySendError> {
		self.tx.try_send(cmd)
	}

	pub async fn send(&self, cmd: C) -> Result<Delivery, ActorStopped> {
		self.tx.send(cmd).await.map_err(|_| ActorStopped)
	}

	pub fn is_closed(&self) -> bool {
		self.tx.is_closed()
	}
}

/// Owner of a running actor. Dropping it cancels the actor.
pub struct ActorHandle<C: Send + 'static, E: Clone + Send + 'static> {
	name: String,
	tx: MailboxSender<C>,
	events: broadcast::Sender<E>,
	cancel: CancellationToken,
	joiner: Joiner,
}

impl<C: Send + 'static, E: Clone + Send + 'static> ActorHandle<C, E> {
	pub fn subscribe(&self) -> EventReceiver<E> {
		self.events.subscribe()
	}

	pub fn port(&self) -> ActorPort<C> {
		ActorPort { tx: self.tx.clone() }
	}

	/// Sends, waiting for mailbox room.
	pub async fn send(&self, cmd: C) -> Result<Delivery, ActorStopped> {
		self.tx.send(cmd).await.map_err(|_| ActorStopped)
	}

	pub fn try_send(&self, cmd: C) -> Result<Delivery, TrySendError> {
		self.tx.try_send(cmd)
	}

	/// Cancels the actor and closes its mailbox without waiting.
	pub fn cancel(&self) {
		self.cancel.cancel();
		self.tx.close();
	}

	/// Exit reason, once a shutdown has joined the task.
	pub fn exit(&self) -> Option<ExitReason> {
		self.joiner.exit()
	}

	pub async fn shutdown(&self, mode: ShutdownMode) -> ShutdownReport {
		let completed = match mode {
			ShutdownMode::Abort => {
				self.cancel();
				self.joiner.join().await;
				true
			}
			ShutdownMode::Drain { timeout } => {
				self.tx.close();
				self.joiner.join_within(timeout).await
			}
		};
		ShutdownReport {
			completed,
			exit: self.joiner.exit(),
		}
	}

	/// Drains within `timeout`, aborting if the queue does not empty in time.
	pub async fn drain_or_abort(&self, timeout: Duration) -> ShutdownReport {
		let report = self.shutdown(ShutdownMode::Drain { timeout }).await;
		if report.completed() {
			return report;
		}
		tracing::warn!(actor = %self.name, timeout_ms = timeout.as_millis() as u64, "worker.actor.drain_timeout");
		self.shutdown(ShutdownMode::Abort).await
	}
}

impl<C: Send + 'static, E: Clone + Send + 'static> Drop for ActorHandle<C, E> {
	fn drop(&mut self) {
		self.cancel();
	}
}

/// Starts `spec.actor` on the worker runtime.
pub fn spawn_actor<A: Actor>(spec: ActorSpec<A>) -> ActorHandle<A::Command, A::Event> {
	let ActorSpec {
		name,
		class,
		actor,
		capacity,
		event_capacity,
		merge,
	} = spec;

	let (tx, rx) = mailbox::channel_with(capacity, merge);
	let (events, _) = broadcast::channel(event_capacity);
	let cancel = CancellationToken::new();
	let ctx = ActorContext::new(events.clone(), cancel.child_token());

	let label = name.clone();
	let task = crate::spawn(class, async move {
		let exit = run(actor, rx, ctx).await;
		tracing::debug!(actor = %label, class = class.as_str(), exit = ?exit, "worker.actor.exit");
		exit
	});

	ActorHandle {
		name,
		tx,
		events,
		cancel,
		joiner: Joiner::new(task),
	}
}

async fn run<A: Actor>(mut actor: A, rx: MailboxReceiver<A::Command>, mut ctx: ActorContext<A::Event>) -> ExitReason {
	let cancel = ctx.cancellation();

	tokio::select! {
		biased;
		_ = cancel.cancelled() => return ExitReason::Cancelled,
		started = actor.started(&mut ctx) => {
			if let Err(err) = started {
				return ExitReason::StartFailed(err);
			}
		}
	}

	let exit = loop {
		let next = tokio::select! {
			biased;
			_ = cancel.cancelled() => None,
			cmd = rx.recv() => Some(cmd),
		};
		let cmd = match next {
			None => break ExitReason::Cancelled,
			Some(None) => break ExitReason::Drained,
			Some(Some(cmd)) => cmd,
		};

		// Cancellation only lands at the handler's await points.
		let handled = tokio::select! {
			biased;
			_ = cancel.cancelled() => None,
			flow = actor.handle(cmd, &mut ctx) => Some(flow),
		};
		match handled {
			None => break ExitReason::Cancelled,
			Some(Ok(Flow::Continue)) => {}
			Some(Ok(Flow::Stop)) => break ExitReason::Stopped,
			Some(Err(err)) => break ExitReason::Failed(err),
		}
	};

	actor.stopped(&mut ctx).await;
	exit
}
