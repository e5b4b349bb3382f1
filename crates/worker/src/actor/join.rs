use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::{JoinError, JoinHandle};

use super::context::ExitReason;

/// Joins the actor task once and remembers how it ended.
///
/// Concurrent joiners queue on the async lock; whoever holds it polls the
/// task. A timed-out join leaves the handle in place for a later attempt.
pub(super) struct Joiner {
	task: tokio::sync::Mutex<Option<JoinHandle<ExitReason>>>,
	exit: Mutex<Option<ExitReason>>,
}

impl Joiner {
	pub(super) fn new(task: JoinHandle<ExitReason>) -> Self {
		Self {
			task: tokio::sync::Mutex::new(Some(task)),
			exit: Mutex::new(None),
		}
	}

	pub(super) fn exit(&self) -> Option<ExitReason> {
		self.exit.lock().clone()
	}

	pub(super) async fn join(&self) {
		let mut task = self.task.lock().await;
		if let Some(handle) = task.as_mut() {
			let result = handle.await;
			*task = None;
			*self.exit.lock() = Some(classify(result));
		}
	}

	/// Returns `false` when the task is still running after `timeout`.
	pub(super) async fn join_within(&self, timeout: Duration) -> bool {
		tokio::time::timeout(timeout, self.join()).await.is_ok()
	}
}

fn classify(result: Result<ExitReason, JoinError>) -> ExitReason {
	match result {
		Ok(reason) => reason,
		Err(err) if err.is_panic() => ExitReason::Panicked,
		Err(err) if err.is_cancelled() => ExitReason::Cancelled,
		Err(err) => ExitReason::Aborted(err.to_string()),
	}
}
