use std::{
	collections::{HashSet, VecDeque},
	future::Future,
	pin::pin,
	sync::{Arc, Weak},
	time::Duration,
};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::{
	spawn,
	sync::Notify,
	task::JoinHandle,
	time::{interval, Instant, MissedTickBehavior},
};
use tracing::{debug, trace};

use super::{
	config::QueueConfig,
	error::{ConfigError, QueueError},
	operation::{Operation, OperationHandle, OperationId, TypedOperation},
	window::{RateWindow, WindowStatus},
};

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStatus {
	pub pending: usize,
	pub in_flight: usize,
	pub done: bool,
	pub stopped: bool,
	pub paused: bool,
	pub window: WindowStatus,
}

struct State {
	pending: VecDeque<Box<dyn Operation>>,
	in_flight: HashSet<OperationId>,
	window: RateWindow,
	done: bool,
	stopped: bool,
	paused: bool,
}

impl State {
	fn is_drained(&self) -> bool {
		self.pending.is_empty() && self.in_flight.is_empty()
	}

	fn can_admit(&self, max_concurrent: usize) -> bool {
		!self.stopped && !self.paused && self.in_flight.len() < max_concurrent
	}
}

struct Inner {
	config: QueueConfig,
	state: Mutex<State>,
	drained: Notify,
}

impl Inner {
	/// Starts as many pending operations as both throttles allow right now.
	fn admit(this: &Arc<Self>) {
		let to_start = {
			let mut state = this.state.lock();
			let now = Instant::now();
			let mut to_start = Vec::new();

			while !state.pending.is_empty()
				&& state.can_admit(this.config.max_concurrent)
				&& state.window.try_start(now)
			{
				if let Some(operation) = state.pending.pop_front() {
					state.in_flight.insert(operation.id());
					to_start.push(operation);
				}
			}

			to_start
		};

		for operation in to_start {
			let id = operation.id();
			let fut = operation.start();
			let inner = Arc::clone(this);

			trace!(%id, "Starting operation;");

			spawn(async move {
				fut.await;
				Self::finish(&inner, id);
			});
		}
	}

	fn finish(this: &Arc<Self>, id: OperationId) {
		let drained = {
			let mut state = this.state.lock();
			state.in_flight.remove(&id);
			state.is_drained()
		};

		trace!(%id, "Operation finished;");

		if drained {
			this.drained.notify_waiters();
		} else {
			Self::admit(this);
		}
	}

	/// Takes every pending operation out of the queue and rejects it with `error`.
	fn reject_pending(&self, error: QueueError) -> usize {
		let rejected = self.state.lock().pending.drain(..).collect::<Vec<_>>();
		let count = rejected.len();

		for operation in rejected {
			operation.reject(error);
		}

		count
	}
}

/// A bounded, rate-limited executor with a completion barrier.
///
/// Must be created inside a Tokio runtime, the queue spawns its admission ticker and every
/// started operation on it. Dropping the queue stops it.
pub struct DispatchQueue {
	inner: Arc<Inner>,
	ticker: JoinHandle<()>,
}

impl DispatchQueue {
	pub fn new(config: QueueConfig) -> Result<Self, ConfigError> {
		config.validate()?;

		let inner = Arc::new(Inner {
			config,
			state: Mutex::new(State {
				pending: VecDeque::new(),
				in_flight: HashSet::new(),
				window: RateWindow::new(&config, Instant::now()),
				done: false,
				stopped: false,
				paused: false,
			}),
			drained: Notify::new(),
		});

		let ticker = spawn(run_ticker(Arc::downgrade(&inner), config));

		Ok(Self { inner, ticker })
	}

	#[must_use]
	pub fn config(&self) -> &QueueConfig {
		&self.inner.config
	}

	/// Enqueues `operation` and returns a handle to its result.
	///
	/// On a queue already marked done or stopped the returned handle is resolved right away
	/// with [`QueueError::Done`] or [`QueueError::Stopped`] and nothing is enqueued.
	pub fn submit<F, T, E>(&self, operation: F) -> OperationHandle<T, E>
	where
		F: Future<Output = Result<T, E>> + Send + 'static,
		T: Send + 'static,
		E: Send + 'static,
	{
		let (operation, handle) = TypedOperation::new(operation);
		let operation: Box<dyn Operation> = Box::new(operation);

		let rejection = {
			let mut state = self.inner.state.lock();
			if state.done {
				Some((operation, QueueError::Done))
			} else if state.stopped {
				Some((operation, QueueError::Stopped))
			} else {
				state.pending.push_back(operation);
				None
			}
		};

		if let Some((operation, error)) = rejection {
			debug!(id = %handle.id(), %error, "Rejected operation submission;");
			operation.reject(error);
		} else {
			Inner::admit(&self.inner);
		}

		handle
	}

	/// Closes the queue for new submissions.
	///
	/// The returned future resolves once nothing is pending or in flight anymore, or with
	/// [`QueueError::Stopped`] if the queue is stopped before that.
	pub fn mark_done(&self) -> impl Future<Output = Result<(), QueueError>> + Send + 'static {
		self.inner.state.lock().done = true;

		let inner = Arc::clone(&self.inner);

		async move {
			loop {
				let mut notified = pin!(inner.drained.notified());
				// Registered before checking, so a notification between the check and the
				// await is not lost.
				notified.as_mut().enable();

				{
					let state = inner.state.lock();
					if state.stopped {
						return Err(QueueError::Stopped);
					}
					if state.is_drained() {
						return Ok(());
					}
				}

				notified.await;
			}
		}
	}

	/// Rejects every pending operation and stops admitting new starts. In-flight operations
	/// keep running and still report to their handles.
	pub fn stop(&self) {
		{
			let mut state = self.inner.state.lock();
			if state.stopped {
				return;
			}
			state.stopped = true;
		}

		let rejected = self.inner.reject_pending(QueueError::Stopped);
		self.ticker.abort();
		self.inner.drained.notify_waiters();

		debug!(rejected, "Dispatch queue stopped;");
	}

	/// Suspends admission. Nothing is rejected; pending operations wait for [`Self::resume`].
	pub fn pause(&self) {
		self.inner.state.lock().paused = true;
	}

	pub fn resume(&self) {
		self.inner.state.lock().paused = false;
		Inner::admit(&self.inner);
	}

	/// Rejects every pending operation with [`QueueError::Cleared`], leaving the queue open.
	pub fn clear(&self) {
		let rejected = self.inner.reject_pending(QueueError::Cleared);

		if self.inner.state.lock().is_drained() {
			self.inner.drained.notify_waiters();
		}

		debug!(rejected, "Dispatch queue cleared;");
	}

	#[must_use]
	pub fn status(&self) -> QueueStatus {
		let mut state = self.inner.state.lock();

		QueueStatus {
			pending: state.pending.len(),
			in_flight: state.in_flight.len(),
			done: state.done,
			stopped: state.stopped,
			paused: state.paused,
			window: state.window.status(Instant::now()),
		}
	}
}

impl Drop for DispatchQueue {
	fn drop(&mut self) {
		self.stop();
	}
}

async fn run_ticker(inner: Weak<Inner>, config: QueueConfig) {
	let mut ticker = interval(config.tick().max(Duration::from_millis(1)));
	ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

	loop {
		ticker.tick().await;

		let Some(inner) = inner.upgrade() else {
			break;
		};

		{
			let state = inner.state.lock();
			if state.stopped || (state.done && state.is_drained()) {
				break;
			}
		}

		Inner::admit(&inner);
	}

	trace!("Dispatch queue ticker finished;");
}
