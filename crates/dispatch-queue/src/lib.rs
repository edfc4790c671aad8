//!
//! # Dispatch Queue
//!
//! A bounded, rate-limited executor for asynchronous operations, used by the sync engine to
//! push local changes to a remote without flooding it.
//!
//! Two throttles apply independently:
//! - at most `max_concurrent` operations are in flight at once;
//! - at most `max_per_window` operations start within each rate window (60 seconds by default),
//!   counted with a fixed window that resets once it elapses. With `even_spacing` enabled
//!   starts are also spread out evenly over the window.
//!
//! Every submitted operation gets an [`OperationHandle`], a future resolving with the
//! operation's own result. Failures and panics stay isolated to the operation that caused them.
//! [`DispatchQueue::mark_done`] closes the queue and returns a future that resolves once every
//! submitted operation has finished.
//!
//! ## Basic example
//!
//! ```
//! use xs_dispatch_queue::{DispatchQueue, QueueConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let queue = DispatchQueue::new(QueueConfig::default()).expect("default config is valid");
//!
//! let handle = queue.submit(async { Ok::<_, std::io::Error>(21 * 2) });
//!
//! queue.mark_done().await.expect("queue was not stopped");
//!
//! assert_eq!(handle.await.expect("operation succeeded"), 42);
//! # }
//! ```

#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod config;
mod error;
mod operation;
mod queue;
mod window;

pub use config::QueueConfig;
pub use error::{ConfigError, DispatchError, QueueError};
pub use operation::{OperationHandle, OperationId};
pub use queue::{DispatchQueue, QueueStatus};
pub use window::WindowStatus;
