use std::future::Future;
use std::sync::OnceLock;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;

use crate::TaskClass;

static FALLBACK: OnceLock<Runtime> = OnceLock::new();

/// Runtime for new tasks: the caller's when inside one, otherwise a shared
/// single-thread-pool runtime built on first use.
fn worker_runtime() -> Handle {
	Handle::try_current().unwrap_or_else(|_| {
		FALLBACK
			.get_or_init(|| {
				Builder::new_multi_thread()
					.worker_threads(1)
					.thread_name("tilehost-worker")
					.enable_all()
					.build()
					.expect("tilehost-worker runtime")
			})
			.handle()
			.clone()
	})
}

/// Spawns `fut` on the worker runtime.
pub fn spawn<F>(class: TaskClass, fut: F) -> JoinHandle<F::Output>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	tracing::trace!(class = class.as_str(), "worker.spawn");
	worker_runtime().spawn(fut)
}
