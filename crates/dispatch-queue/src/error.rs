use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
	#[error("queue was marked done and accepts no more operations")]
	Done,
	#[error("queue was stopped before the operation started")]
	Stopped,
	#[error("queue was cleared before the operation started")]
	Cleared,
	#[error("operation panicked")]
	Panicked,
}

/// A [`QueueConfig`](crate::QueueConfig) under which the queue could never make progress.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
	#[error("queue would never admit an operation <max_concurrent=0>")]
	ZeroConcurrency,
	#[error("rate window would never admit an operation <max_per_window=0>")]
	ZeroWindowBudget,
	#[error("rate window must last at least a second <window_seconds=0>")]
	ZeroWindow,
}

#[derive(Debug, Error)]
pub enum DispatchError<E> {
	#[error(transparent)]
	Queue(#[from] QueueError),
	#[error("operation failed: {0}")]
	Operation(E),
}

impl<E> DispatchError<E> {
	/// The operation's own error, if it ran and failed.
	pub fn into_operation_error(self) -> Option<E> {
		match self {
			Self::Operation(e) => Some(e),
			Self::Queue(_) => None,
		}
	}
}
