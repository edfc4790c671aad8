//! Offline-first synchronization engine.
//!
//! For every synced table a [`SyncEngine`] pulls remote deltas, reads the local write journal,
//! sorts every touched object into exactly one [`Category`], merges conflicts field by field,
//! pushes local-origin work through a rate-limited dispatch queue and applies the net result to
//! the local store in one transaction. A [`Scheduler`] triggers cycles for tables that are due.

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

pub mod classify;
mod config;
mod dispatch;
mod engine;
mod error;
pub mod merge;
mod report;
mod scheduler;

pub use classify::{classify, Category, Classification, Intent, JournalGroup, Resolution};
pub use config::EngineConfig;
pub use engine::{SyncEngine, SyncEvent};
pub use error::Error;
pub use report::{CategoryCounts, PushFailure, SyncReport};
pub use scheduler::{CycleHandle, Scheduler, SchedulerHandle, DEFAULT_SCHEDULER_TICK};

pub use xs_dispatch_queue::{ConfigError, QueueConfig};
pub use xs_sync as sync;
