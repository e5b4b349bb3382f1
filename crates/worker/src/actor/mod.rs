//! Single-task actors.
//!
//! An actor owns its state and handles one command at a time from its
//! mailbox, so commands from many producers are serialized without the actor
//! locking anything itself.

mod context;
mod handle;
mod join;

#[cfg(test)]
mod tests;

pub use context::{Actor, ActorContext, ActorSpec, ExitReason, Flow};
pub use handle::{ActorHandle, ActorPort, ActorStopped, ShutdownMode, ShutdownReport, spawn_actor};
