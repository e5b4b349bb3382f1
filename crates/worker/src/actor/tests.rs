use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::*;
use crate::{Delivery, TaskClass, TrySendError};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Cmd {
	Refresh,
	Apply(u32),
	Quit,
}

/// Echoes commands as events; `Quit` stops the loop.
struct Echo;

#[async_trait]
impl Actor for Echo {
	type Command = Cmd;
	type Event = Cmd;

	async fn handle(&mut self, cmd: Cmd, ctx: &mut ActorContext<Cmd>) -> Result<Flow, String> {
		let flow = if cmd == Cmd::Quit { Flow::Stop } else { Flow::Continue };
		ctx.emit(cmd);
		Ok(flow)
	}
}

#[tokio::test]
async fn handled_commands_are_broadcast_in_order() {
	let handle = spawn_actor(ActorSpec::new("echo", TaskClass::Interactive, Echo));
	let mut events = handle.subscribe();
	for cmd in [Cmd::Apply(1), Cmd::Refresh, Cmd::Quit] {
		let _ = handle.send(cmd).await;
	}

	assert_eq!(events.recv().await.ok(), Some(Cmd::Apply(1)));
	assert_eq!(events.recv().await.ok(), Some(Cmd::Refresh));
	assert_eq!(events.recv().await.ok(), Some(Cmd::Quit));

	let report = handle.shutdown(ShutdownMode::Drain { timeout: Duration::from_secs(1) }).await;
	assert!(report.completed());
	assert_eq!(report.exit(), Some(&ExitReason::Stopped));
}

struct Rejects;

#[async_trait]
impl Actor for Rejects {
	type Command = Cmd;
	type Event = ();

	async fn handle(&mut self, cmd: Cmd, _ctx: &mut ActorContext<()>) -> Result<Flow, String> {
		Err(format!("cannot handle {cmd:?}"))
	}
}

#[tokio::test]
async fn handler_error_ends_the_actor() {
	let handle = spawn_actor(ActorSpec::new("rejects", TaskClass::Background, Rejects));
	let _ = handle.send(Cmd::Apply(3)).await;

	let report = handle.shutdown(ShutdownMode::Drain { timeout: Duration::from_secs(1) }).await;
	let exit = report.exit().cloned().expect("joined");
	assert_eq!(exit, ExitReason::Failed("cannot handle Apply(3)".to_string()));
	assert_eq!(exit.detail(), Some("cannot handle Apply(3)"));
	assert!(exit.is_failure());
	assert!(handle.port().is_closed());
}

#[tokio::test]
async fn ended_actor_rejects_commands_without_shutdown() {
	let handle = spawn_actor(ActorSpec::new("rejects", TaskClass::Background, Rejects));
	let port = handle.port();
	let _ = handle.send(Cmd::Apply(1)).await;

	let closed = tokio::time::timeout(Duration::from_secs(1), async {
		while !port.is_closed() {
			tokio::time::sleep(Duration::from_millis(5)).await;
		}
	})
	.await;
	assert!(closed.is_ok(), "mailbox closes once the loop ends");
	assert_eq!(handle.send(Cmd::Refresh).await, Err(ActorStopped));
	assert_eq!(handle.try_send(Cmd::Refresh), Err(TrySendError::Closed));
}

struct NeverStarts;

#[async_trait]
impl Actor for NeverStarts {
	type Command = Cmd;
	type Event = ();

	async fn started(&mut self, _ctx: &mut ActorContext<()>) -> Result<(), String> {
		Err("missing backend".to_string())
	}

	async fn handle(&mut self, _cmd: Cmd, _ctx: &mut ActorContext<()>) -> Result<Flow, String> {
		Ok(Flow::Continue)
	}
}

#[tokio::test]
async fn start_failure_is_reported() {
	let handle = spawn_actor(ActorSpec::new("never-starts", TaskClass::Background, NeverStarts));
	let report = handle.shutdown(ShutdownMode::Drain { timeout: Duration::from_secs(1) }).await;
	assert_eq!(report.exit(), Some(&ExitReason::StartFailed("missing backend".to_string())));
	assert_eq!(handle.exit(), Some(ExitReason::StartFailed("missing backend".to_string())));
}

/// Parks on a gate before its first command, then counts and echoes.
struct Gated {
	gate: Option<oneshot::Receiver<()>>,
	handled: Arc<AtomicUsize>,
	stops: Arc<AtomicUsize>,
}

#[async_trait]
impl Actor for Gated {
	type Command = Cmd;
	type Event = Cmd;

	async fn stopped(&mut self, _ctx: &mut ActorContext<Cmd>) {
		self.stops.fetch_add(1, Ordering::SeqCst);
	}

	async fn handle(&mut self, cmd: Cmd, ctx: &mut ActorContext<Cmd>) -> Result<Flow, String> {
		if let Some(gate) = self.gate.take() {
			let _ = gate.await;
		}
		self.handled.fetch_add(1, Ordering::SeqCst);
		ctx.emit(cmd);
		Ok(Flow::Continue)
	}
}

struct GatedProbe {
	open: oneshot::Sender<()>,
	handled: Arc<AtomicUsize>,
	stops: Arc<AtomicUsize>,
}

fn gated() -> (Gated, GatedProbe) {
	let (open, gate) = oneshot::channel();
	let handled = Arc::new(AtomicUsize::new(0));
	let stops = Arc::new(AtomicUsize::new(0));
	let actor = Gated {
		gate: Some(gate),
		handled: Arc::clone(&handled),
		stops: Arc::clone(&stops),
	};
	(actor, GatedProbe { open, handled, stops })
}

#[tokio::test]
async fn queued_refreshes_coalesce_behind_a_busy_handler() {
	let (actor, probe) = gated();
	let spec = ActorSpec::new("coalesce", TaskClass::Background, actor).coalesce(|a, b| *a == Cmd::Refresh && *b == Cmd::Refresh);
	let handle = spawn_actor(spec);
	let mut events = handle.subscribe();

	assert_eq!(handle.try_send(Cmd::Apply(0)), Ok(Delivery::Queued));
	tokio::time::sleep(Duration::from_millis(10)).await;
	assert_eq!(handle.try_send(Cmd::Refresh), Ok(Delivery::Queued));
	assert_eq!(handle.try_send(Cmd::Refresh), Ok(Delivery::Merged));
	assert_eq!(handle.try_send(Cmd::Apply(1)), Ok(Delivery::Queued));
	assert_eq!(handle.try_send(Cmd::Refresh), Ok(Delivery::Merged));
	let _ = probe.open.send(());

	assert_eq!(events.recv().await.ok(), Some(Cmd::Apply(0)));
	assert_eq!(events.recv().await.ok(), Some(Cmd::Refresh));
	assert_eq!(events.recv().await.ok(), Some(Cmd::Apply(1)));

	let report = handle.drain_or_abort(Duration::from_secs(1)).await;
	assert_eq!(report.exit(), Some(&ExitReason::Drained));
	assert_eq!(probe.handled.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn drain_handles_queue_then_runs_stop_hook() {
	let (actor, probe) = gated();
	let handle = spawn_actor(ActorSpec::new("drain", TaskClass::Background, actor));
	for n in 0..3 {
		let _ = handle.send(Cmd::Apply(n)).await;
	}
	let _ = probe.open.send(());

	let report = handle.shutdown(ShutdownMode::Drain { timeout: Duration::from_secs(1) }).await;
	assert!(report.completed());
	assert_eq!(report.exit(), Some(&ExitReason::Drained));
	assert_eq!(probe.handled.load(Ordering::SeqCst), 3);
	assert_eq!(probe.stops.load(Ordering::SeqCst), 1);
	assert_eq!(handle.try_send(Cmd::Refresh), Err(TrySendError::Closed));
	assert_eq!(handle.send(Cmd::Refresh).await, Err(ActorStopped));
}

#[tokio::test]
async fn stuck_handler_is_aborted_after_drain_timeout() {
	let (actor, probe) = gated();
	let handle = spawn_actor(ActorSpec::new("stuck", TaskClass::Background, actor));
	let _ = handle.send(Cmd::Refresh).await;
	tokio::time::sleep(Duration::from_millis(10)).await;

	let report = handle.drain_or_abort(Duration::from_millis(20)).await;
	assert!(report.completed());
	assert_eq!(report.exit(), Some(&ExitReason::Cancelled));
	assert_eq!(probe.handled.load(Ordering::SeqCst), 0);
	assert_eq!(probe.stops.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn port_accepts_commands_from_plain_threads() {
	let handle = spawn_actor(ActorSpec::new("port", TaskClass::Background, Echo));
	let mut events = handle.subscribe();
	let port = handle.port();

	std::thread::spawn(move || port.try_send(Cmd::Apply(7)))
		.join()
		.expect("sender thread")
		.expect("mailbox open");

	assert_eq!(events.recv().await.ok(), Some(Cmd::Apply(7)));
	let report = handle.shutdown(ShutdownMode::Abort).await;
	assert!(report.completed());
	assert!(handle.port().is_closed());
}
