//! Bounded multi-producer, single-consumer command queue.
//!
//! The queue lives behind a short synchronous lock, so [`MailboxSender::try_send`]
//! works from plain threads and from inside listener callbacks without a
//! runtime. A coalescing mailbox merges a new message into an equivalent one
//! that is still queued, which keeps bursts of identical triggers from piling
//! up behind a slow consumer.

use std::collections::VecDeque;
use std::fmt;
use std::pin::pin;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

/// How a message was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
	/// Appended at the back of the queue.
	Queued,
	/// Replaced an equivalent message, which keeps its queue slot.
	Merged,
}

/// Non-blocking send failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrySendError {
	Closed,
	/// Queue at capacity and nothing to merge with.
	Full,
}

impl fmt::Display for TrySendError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Closed => f.write_str("mailbox closed"),
			Self::Full => f.write_str("mailbox full"),
		}
	}
}

impl std::error::Error for TrySendError {}

pub(crate) type MergeFn<T> = dyn Fn(&T, &T) -> bool + Send + Sync;

struct Queue<T> {
	items: VecDeque<T>,
	closed: bool,
}

struct Shared<T> {
	capacity: usize,
	merge: Option<Box<MergeFn<T>>>,
	queue: Mutex<Queue<T>>,
	readable: Notify,
	writable: Notify,
}

impl<T> Shared<T> {
	/// Places `msg` under the merge rule, handing it back on failure.
	fn offer(&self, msg: T) -> Result<Delivery, (TrySendError, T)> {
		let mut queue = self.queue.lock();
		if queue.closed {
			return Err((TrySendError::Closed, msg));
		}

		let full = queue.items.len() >= self.capacity;
		let slot = match &self.merge {
			Some(same) => queue.items.iter_mut().find(|queued| same(queued, &msg)),
			None => None,
		};
		let delivery = match slot {
			Some(slot) => {
				*slot = msg;
				Delivery::Merged
			}
			None if full => return Err((TrySendError::Full, msg)),
			None => {
				queue.items.push_back(msg);
				Delivery::Queued
			}
		};
		drop(queue);
		self.readable.notify_one();
		Ok(delivery)
	}
}

/// Producer half. Cheap to clone.
pub struct MailboxSender<T> {
	shared: Arc<Shared<T>>,
}

/// Consumer half.
pub struct MailboxReceiver<T> {
	shared: Arc<Shared<T>>,
}

impl<T> Clone for MailboxSender<T> {
	fn clone(&self) -> Self {
		Self {
			shared: Arc::clone(&self.shared),
		}
	}
}

pub(crate) fn channel_with<T>(capacity: usize, merge: Option<Box<MergeFn<T>>>) -> (MailboxSender<T>, MailboxReceiver<T>) {
	assert!(capacity > 0, "mailbox capacity must be > 0");
	let shared = Arc::new(Shared {
		capacity,
		merge,
		queue: Mutex::new(Queue {
			items: VecDeque::with_capacity(capacity),
			closed: false,
		}),
		readable: Notify::new(),
		writable: Notify::new(),
	});
	(
		MailboxSender {
			shared: Arc::clone(&shared),
		},
		MailboxReceiver { shared },
	)
}

/// Bounded FIFO mailbox.
///
/// # Panics
///
/// Panics if `capacity` is zero.
pub fn channel<T>(capacity: usize) -> (MailboxSender<T>, MailboxReceiver<T>) {
	channel_with(capacity, None)
}

/// Bounded mailbox whose messages merge into a queued message for which
/// `same` returns true. A full mailbox still accepts merges.
///
/// # Panics
///
/// Panics if `capacity` is zero.
pub fn coalescing_channel<T>(
	capacity: usize,
	same: impl Fn(&T, &T) -> bool + Send + Sync + 'static,
) -> (MailboxSender<T>, MailboxReceiver<T>) {
	channel_with(capacity, Some(Box::new(same)))
}

impl<T> MailboxSender<T> {
	pub fn try_send(&self, msg: T) -> Result<Delivery, TrySendError> {
		self.shared.offer(msg).map_err(|(err, _)| err)
	}

	/// Sends, waiting while the queue is full. Fails only once closed.
	pub async fn send(&self, mut msg: T) -> Result<Delivery, TrySendError> {
		loop {
			// Armed before the capacity check so a concurrent pop still wakes us.
			let mut writable = pin!(self.shared.writable.notified());
			writable.as_mut().enable();

			msg = match self.shared.offer(msg) {
				Err((TrySendError::Full, msg)) => msg,
				done => return done.map_err(|(err, _)| err),
			};
			writable.await;
		}
	}

	/// Rejects further sends. Already queued messages are still delivered.
	pub fn close(&self) {
		self.shared.queue.lock().closed = true;
		self.shared.readable.notify_waiters();
		self.shared.writable.notify_waiters();
	}

	pub fn is_closed(&self) -> bool {
		self.shared.queue.lock().closed
	}

	pub fn len(&self) -> usize {
		self.shared.queue.lock().items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn capacity(&self) -> usize {
		self.shared.capacity
	}
}

impl<T> MailboxReceiver<T> {
	/// Next message in queue order; `None` once closed and drained.
	pub async fn recv(&self) -> Option<T> {
		loop {
			let mut readable = pin!(self.shared.readable.notified());
			readable.as_mut().enable();

			let popped = {
				let mut queue = self.shared.queue.lock();
				match queue.items.pop_front() {
					Some(msg) => Some(msg),
					None if queue.closed => return None,
					None => None,
				}
			};
			if let Some(msg) = popped {
				self.shared.writable.notify_one();
				return Some(msg);
			}
			readable.await;
		}
	}

	pub fn len(&self) -> usize {
		self.shared.queue.lock().items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

/// Closes the mailbox and discards whatever is still queued, so senders and
/// anyone awaiting a reply carried in a message see the consumer is gone.
impl<T> Drop for MailboxReceiver<T> {
	fn drop(&mut self) {
		let orphaned = {
			let mut queue = self.shared.queue.lock();
			queue.closed = true;
			std::mem::take(&mut queue.items)
		};
		self.shared.writable.notify_waiters();
		drop(orphaned);
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use super::*;

	#[derive(Debug, Clone, PartialEq, Eq)]
	enum Trigger {
		Reload { origin: &'static str },
		Switch(u32),
	}

	fn reloads_merge(a: &Trigger, b: &Trigger) -> bool {
		matches!((a, b), (Trigger::Reload { .. }, Trigger::Reload { .. }))
	}

	#[tokio::test]
	async fn full_queue_rejects_try_send_and_drains_after_close() {
		let (tx, rx) = channel(2);
		assert_eq!(tx.try_send(Trigger::Switch(1)), Ok(Delivery::Queued));
		assert_eq!(tx.try_send(Trigger::Switch(2)), Ok(Delivery::Queued));
		assert_eq!(tx.try_send(Trigger::Switch(3)), Err(TrySendError::Full));
		assert_eq!(tx.capacity(), 2);

		tx.close();
		assert_eq!(rx.recv().await, Some(Trigger::Switch(1)));
		assert_eq!(rx.recv().await, Some(Trigger::Switch(2)));
		assert_eq!(rx.recv().await, None);
	}

	#[tokio::test]
	async fn blocked_send_resumes_after_a_pop() {
		let (tx, rx) = channel(1);
		let _ = tx.send(Trigger::Switch(1)).await;

		let waiting = tx.clone();
		let pending = tokio::spawn(async move { waiting.send(Trigger::Switch(2)).await });
		tokio::time::sleep(Duration::from_millis(10)).await;
		assert!(!pending.is_finished());

		assert_eq!(rx.recv().await, Some(Trigger::Switch(1)));
		let sent = tokio::time::timeout(Duration::from_millis(500), pending)
			.await
			.expect("pop frees a slot")
			.expect("send task");
		assert_eq!(sent, Ok(Delivery::Queued));
		assert_eq!(rx.recv().await, Some(Trigger::Switch(2)));
	}

	#[tokio::test]
	async fn merged_message_keeps_its_slot() {
		let (tx, rx) = coalescing_channel(4, reloads_merge);
		let _ = tx.try_send(Trigger::Reload { origin: "settings" });
		let _ = tx.try_send(Trigger::Switch(7));
		assert_eq!(tx.try_send(Trigger::Reload { origin: "explicit" }), Ok(Delivery::Merged));
		assert_eq!(tx.len(), 2);

		tx.close();
		assert_eq!(rx.recv().await, Some(Trigger::Reload { origin: "explicit" }));
		assert_eq!(rx.recv().await, Some(Trigger::Switch(7)));
		assert_eq!(rx.recv().await, None);
	}

	#[tokio::test]
	async fn full_coalescing_queue_still_merges() {
		let (tx, rx) = coalescing_channel(2, reloads_merge);
		let _ = tx.try_send(Trigger::Switch(1));
		let _ = tx.try_send(Trigger::Reload { origin: "a" });
		assert_eq!(tx.try_send(Trigger::Reload { origin: "b" }), Ok(Delivery::Merged));
		assert_eq!(tx.try_send(Trigger::Switch(2)), Err(TrySendError::Full));

		tx.close();
		assert_eq!(rx.recv().await, Some(Trigger::Switch(1)));
		assert_eq!(rx.recv().await, Some(Trigger::Reload { origin: "b" }));
	}

	#[tokio::test]
	async fn popped_messages_do_not_absorb_new_ones() {
		let (tx, rx) = coalescing_channel(4, reloads_merge);
		let _ = tx.try_send(Trigger::Reload { origin: "first" });
		assert_eq!(rx.recv().await, Some(Trigger::Reload { origin: "first" }));
		assert_eq!(tx.try_send(Trigger::Reload { origin: "second" }), Ok(Delivery::Queued));
		assert_eq!(rx.len(), 1);
	}

	#[tokio::test]
	async fn closed_mailbox_rejects_every_send() {
		let (tx, rx) = channel::<u32>(4);
		tx.close();
		assert!(tx.is_closed());
		assert_eq!(tx.try_send(1), Err(TrySendError::Closed));
		assert_eq!(tx.send(2).await, Err(TrySendError::Closed));
		assert_eq!(rx.recv().await, None);
		assert!(rx.is_empty());
	}

	#[tokio::test]
	async fn close_wakes_a_waiting_receiver() {
		let (tx, rx) = channel::<u32>(1);
		let waiting = tokio::spawn(async move { rx.recv().await });
		tokio::time::sleep(Duration::from_millis(10)).await;
		tx.close();

		let received = tokio::time::timeout(Duration::from_millis(500), waiting)
			.await
			.expect("close wakes the receiver")
			.expect("recv task");
		assert_eq!(received, None);
	}

	#[tokio::test]
	async fn dropped_receiver_closes_and_releases_queued() {
		let (tx, rx) = channel::<tokio::sync::oneshot::Sender<()>>(1);
		let (reply, answered) = tokio::sync::oneshot::channel();
		let _ = tx.try_send(reply);

		let (late, _) = tokio::sync::oneshot::channel();
		let blocked = tx.clone();
		let pending = tokio::spawn(async move { blocked.send(late).await.map(|_| ()) });
		tokio::time::sleep(Duration::from_millis(10)).await;

		drop(rx);
		assert!(tx.is_closed());
		assert!(tx.is_empty());
		assert!(answered.await.is_err());
		let resumed = tokio::time::timeout(Duration::from_millis(500), pending)
			.await
			.expect("drop wakes the blocked sender")
			.expect("send task");
		assert_eq!(resumed, Err(TrySendError::Closed));
	}

	#[test]
	fn plain_threads_can_send() {
		let (tx, _rx) = coalescing_channel(8, |a: &u32, b: &u32| a % 4 == b % 4);
		let threads: Vec<_> = (0..4u32)
			.map(|t| {
				let tx = tx.clone();
				std::thread::spawn(move || {
					for i in 0..16 {
						let _ = tx.try_send(t * 16 + i);
					}
				})
			})
			.collect();
		for thread in threads {
			thread.join().expect("sender thread");
		}
		// Four residues modulo four, each merged into one slot.
		assert_eq!(tx.len(), 4);
	}
}
