use async_trait::async_trait;
use thiserror::Error;

use super::{
	journal::Journal,
	record::{FieldMap, LocalId, LocalRecord, RemoteId, RemoteRecord},
	table::{SyncTable, TableSyncMetadata},
};

#[derive(Debug, Error)]
pub enum StoreError {
	#[error("record not found <table='{table}', id='{id}'>")]
	NotFound { table: String, id: LocalId },
	#[error("local transaction failed: {0}")]
	Transaction(String),
	#[error("journal append failed, mutation rolled back: {0}")]
	Journal(String),
	#[error(transparent)]
	Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordUpdate {
	pub id: LocalId,
	pub changes: FieldMap,
}

/// Everything a sync cycle writes locally, applied by the store as one transaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncWriteBatch {
	pub inserts: Vec<RemoteRecord>,
	pub updates: Vec<RecordUpdate>,
	pub deletes: Vec<LocalId>,
}

impl SyncWriteBatch {
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.inserts.len() + self.updates.len() + self.deletes.len()
	}
}

/// The local replica as the engine sees it.
///
/// Hosts own the actual storage; the engine only needs lookups over the minimal candidate
/// set, a single all-or-nothing write per cycle, and a place to keep per-table metadata.
#[async_trait]
pub trait LocalStore<T: SyncTable>: Journal<T> {
	async fn find_by_ids(&self, table: T, ids: &[LocalId]) -> Result<Vec<LocalRecord>, StoreError>;

	async fn find_by_remote_ids(
		&self,
		table: T,
		remote_ids: &[RemoteId],
	) -> Result<Vec<LocalRecord>, StoreError>;

	/// Commits `batch` in one transaction flagged as sync-originated, so none of its writes
	/// reach the journal. Inserts whose `remote_id` already exists locally update that record
	/// instead. Returns the ids of the inserted records, in batch order.
	async fn apply_sync_batch(
		&self,
		table: T,
		batch: SyncWriteBatch,
	) -> Result<Vec<LocalId>, StoreError>;

	async fn load_metadata(&self, table: T) -> Result<Option<TableSyncMetadata>, StoreError>;

	async fn save_metadata(&self, table: T, metadata: &TableSyncMetadata) -> Result<(), StoreError>;
}
