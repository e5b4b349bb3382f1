//! Worker runtime primitives for the tile host.
//!
//! Reconciliation triggers arrive from arbitrary threads (settings observers,
//! principal switches, shutdown). This crate funnels them into one actor task
//! per host so that exactly one reconciliation runs at a time:
//!
//! * [`channel`] and [`coalescing_channel`]: bounded mailboxes whose
//!   `try_send` is callable from synchronous code.
//! * [`spawn_actor`]: runs an [`Actor`] on the shared runtime and returns an
//!   [`ActorHandle`] for sending, subscribing, and shutdown.

mod actor;
mod class;
mod mailbox;
mod spawn;

pub use actor::{
	Actor, ActorContext, ActorHandle, ActorPort, ActorSpec, ActorStopped, ExitReason, Flow, ShutdownMode, ShutdownReport, spawn_actor,
};
pub use class::TaskClass;
pub use mailbox::{Delivery, MailboxReceiver, MailboxSender, TrySendError, channel, coalescing_channel};
pub use spawn::spawn;

/// Subscription to an actor's events.
pub type EventReceiver<E> = tokio::sync::broadcast::Receiver<E>;
