use std::{
	fmt,
	future::Future,
	panic::AssertUnwindSafe,
	pin::Pin,
	task::{Context, Poll},
};

use futures::{future::BoxFuture, FutureExt};
use tokio::sync::oneshot;
use tracing::{error, trace};
use uuid::Uuid;

use super::error::{DispatchError, QueueError};

pub type OperationId = Uuid;

/// A queued operation with its output type erased, so the queue can hold any mix of them.
pub(crate) trait Operation: Send {
	fn id(&self) -> OperationId;

	/// Turns the operation into the future to spawn. The future reports the outcome to the
	/// operation's handle and never fails itself.
	fn start(self: Box<Self>) -> BoxFuture<'static, ()>;

	fn reject(self: Box<Self>, error: QueueError);
}

pub(crate) struct TypedOperation<F, T, E> {
	id: OperationId,
	fut: F,
	done_tx: oneshot::Sender<Result<T, DispatchError<E>>>,
}

impl<F, T, E> TypedOperation<F, T, E>
where
	F: Future<Output = Result<T, E>> + Send + 'static,
	T: Send + 'static,
	E: Send + 'static,
{
	pub(crate) fn new(fut: F) -> (Self, OperationHandle<T, E>) {
		let id = Uuid::new_v4();
		let (done_tx, done_rx) = oneshot::channel();

		(Self { id, fut, done_tx }, OperationHandle { id, done_rx })
	}
}

impl<F, T, E> Operation for TypedOperation<F, T, E>
where
	F: Future<Output = Result<T, E>> + Send + 'static,
	T: Send + 'static,
	E: Send + 'static,
{
	fn id(&self) -> OperationId {
		self.id
	}

	fn start(self: Box<Self>) -> BoxFuture<'static, ()> {
		let Self { id, fut, done_tx } = *self;

		async move {
			let res = match AssertUnwindSafe(fut).catch_unwind().await {
				Ok(Ok(out)) => Ok(out),
				Ok(Err(e)) => Err(DispatchError::Operation(e)),
				Err(_) => {
					error!(%id, "Operation unexpectedly panicked;");
					Err(DispatchError::Queue(QueueError::Panicked))
				}
			};

			if done_tx.send(res).is_err() {
				trace!(%id, "Operation finished but its handle was dropped;");
			}
		}
		.boxed()
	}

	fn reject(self: Box<Self>, error: QueueError) {
		if self.done_tx.send(Err(DispatchError::Queue(error))).is_err() {
			trace!(id = %self.id, %error, "Operation rejected but its handle was dropped;");
		}
	}
}

/// Resolves with the result of a submitted operation.
///
/// Dropping the handle does not cancel the operation, the queue still runs it.
pub struct OperationHandle<T, E> {
	id: OperationId,
	done_rx: oneshot::Receiver<Result<T, DispatchError<E>>>,
}

impl<T, E> OperationHandle<T, E> {
	#[must_use]
	pub const fn id(&self) -> OperationId {
		self.id
	}
}

impl<T, E> fmt::Debug for OperationHandle<T, E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("OperationHandle")
			.field("id", &self.id)
			.finish_non_exhaustive()
	}
}

impl<T, E> Future for OperationHandle<T, E> {
	type Output = Result<T, DispatchError<E>>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		// The sender only goes away without reporting when the queue itself was dropped with
		// this operation still pending.
		Pin::new(&mut self.done_rx)
			.poll(cx)
			.map(|res| res.unwrap_or(Err(DispatchError::Queue(QueueError::Stopped))))
	}
}
