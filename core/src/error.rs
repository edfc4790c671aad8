use xs_dispatch_queue::{ConfigError, QueueError};
use xs_sync::{RemoteError, StoreError};

use thiserror::Error;

use super::classify::Category;

#[derive(Debug, Error)]
pub enum Error {
	#[error("pull failed <table='{table}'>: {source}")]
	Pull {
		table: String,
		#[source]
		source: RemoteError,
	},
	#[error("local store error: {0}")]
	Store(#[from] StoreError),
	#[error("classification invariant violated <object='{object}'>: {categories:?}")]
	ClassificationInvariant {
		object: String,
		categories: Vec<Category>,
	},
	#[error("a sync cycle is already running <table='{0}'>")]
	AlreadySyncing(String),
	#[error("table is not configured for sync <table='{0}'>")]
	UnknownTable(String),
	#[error(transparent)]
	Queue(#[from] QueueError),
	#[error("invalid dispatch queue config: {0}")]
	QueueConfig(#[from] ConfigError),
}
