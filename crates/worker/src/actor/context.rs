use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::TaskClass;
use crate::mailbox::MergeFn;

/// What the actor loop does after a handled command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
	Continue,
	Stop,
}

/// Why an actor task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExitReason {
	/// A handler returned [`Flow::Stop`].
	Stopped,
	/// The mailbox was closed and every queued command handled.
	Drained,
	Cancelled,
	StartFailed(String),
	/// A handler returned an error.
	Failed(String),
	Panicked,
	/// The task could not be joined for another reason.
	Aborted(String),
}

impl ExitReason {
	pub fn is_failure(&self) -> bool {
		matches!(self, Self::StartFailed(_) | Self::Failed(_) | Self::Panicked | Self::Aborted(_))
	}

	pub fn detail(&self) -> Option<&str> {
		match self {
			Self::StartFailed(detail) | Self::Failed(detail) | Self::Aborted(detail) => Some(detail),
			_ => None,
		}
	}
}

/// State machine driven one command at a time by the worker.
#[async_trait]
pub trait Actor: Send + 'static {
	type Command: Send + 'static;
	type Event: Clone + Send + 'static;

	async fn started(&mut self, _ctx: &mut ActorContext<Self::Event>) -> Result<(), String> {
		Ok(())
	}

	/// Runs once after the loop ends, whatever the reason.
	async fn stopped(&mut self, _ctx: &mut ActorContext<Self::Event>) {}

	async fn handle(&mut self, cmd: Self::Command, ctx: &mut ActorContext<Self::Event>) -> Result<Flow, String>;
}

/// Handed to every [`Actor`] hook.
pub struct ActorContext<E> {
	events: broadcast::Sender<E>,
	cancel: CancellationToken,
}

impl<E: Clone + Send + 'static> ActorContext<E> {
	pub(crate) fn new(events: broadcast::Sender<E>, cancel: CancellationToken) -> Self {
		Self { events, cancel }
	}

	/// Broadcasts to current subscribers; dropped when there are none.
	pub fn emit(&self, event: E) {
		let _ = self.events.send(event);
	}

	pub(crate) fn cancellation(&self) -> CancellationToken {
		self.cancel.clone()
	}
}

/// Spawn parameters for one actor.
pub struct ActorSpec<A: Actor> {
	pub(crate) name: String,
	pub(crate) class: TaskClass,
	pub(crate) actor: A,
	pub(crate) capacity: usize,
	pub(crate) event_capacity: usize,
	pub(crate) merge: Option<Box<MergeFn<A::Command>>>,
}

impl<A: Actor> ActorSpec<A> {
	pub fn new(name: impl Into<String>, class: TaskClass, actor: A) -> Self {
		Self {
			name: name.into(),
			class,
			actor,
			capacity: 64,
			event_capacity: 64,
			merge: None,
		}
	}

	/// Mailbox capacity. Zero is raised to one.
	#[must_use]
	pub fn capacity(mut self, capacity: usize) -> Self {
		self.capacity = capacity.max(1);
		self
	}

	/// Merges a new command into a queued one when `same` holds.
	#[must_use]
	pub fn coalesce(mut self, same: impl Fn(&A::Command, &A::Command) -> bool + Send + Sync + 'static) -> Self {
		self.merge = Some(Box::new(same));
		self
	}
}
