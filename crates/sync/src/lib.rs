//! Shared vocabulary of the offline-first sync engine.
//!
//! This crate holds the data model every other crate speaks: local and remote records, the
//! write journal and the interceptor stores use to fill it, per-table configuration and
//! metadata, and the contracts the engine requires from its two external collaborators, the
//! local store and the remote adapter.

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

pub mod journal;
pub mod mapping;
pub mod record;
pub mod remote;
pub mod store;
pub mod table;

pub use journal::{
	Change, Journal, JournalEntry, JournalInterceptor, Method, Mutation, Sequence, WriteOrigin,
};
pub use mapping::{from_fields, to_fields, MappingError, TableMapping};
pub use record::{diff, fold, FieldMap, LocalId, LocalRecord, RemoteId, RemoteRecord};
pub use remote::{RemoteAdapter, RemoteError, RemoteKeyAssignment};
pub use store::{LocalStore, RecordUpdate, StoreError, SyncWriteBatch};
pub use table::{
	Direction, LastSync, SyncMode, SyncStatus, SyncTable, TableSyncConfig, TableSyncMetadata,
};

pub use serde_json::Value;
