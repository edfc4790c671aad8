//! Local store wrappers that fail on demand

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use xs_core::sync::{
	Change, Journal, JournalEntry, LocalId, LocalRecord, LocalStore, RemoteId, Sequence,
	StoreError, SyncWriteBatch, TableSyncMetadata,
};
use xs_memory_store::MemoryStore;

use super::Table;

/// Delegates to a [`MemoryStore`] but can fail the sync transaction.
#[derive(Debug)]
pub struct FlakyStore {
	pub inner: MemoryStore<Table>,
	fail_apply: AtomicBool,
}

impl FlakyStore {
	pub fn new(inner: MemoryStore<Table>) -> Self {
		Self {
			inner,
			fail_apply: AtomicBool::new(false),
		}
	}

	pub fn fail_apply(&self, fail: bool) {
		self.fail_apply.store(fail, Ordering::SeqCst);
	}
}

#[async_trait]
impl Journal<Table> for FlakyStore {
	async fn record(
		&self,
		table: Table,
		object_id: LocalId,
		change: Change,
	) -> Result<JournalEntry<Table>, StoreError> {
		self.inner.record(table, object_id, change).await
	}

	async fn read_pending(&self, table: Table) -> Result<Vec<JournalEntry<Table>>, StoreError> {
		self.inner.read_pending(table).await
	}

	async fn purge(&self, table: Table, sequences: &[Sequence]) -> Result<(), StoreError> {
		self.inner.purge(table, sequences).await
	}
}

#[async_trait]
impl LocalStore<Table> for FlakyStore {
	async fn find_by_ids(&self, table: Table, ids: &[LocalId]) -> Result<Vec<LocalRecord>, StoreError> {
		self.inner.find_by_ids(table, ids).await
	}

	async fn find_by_remote_ids(
		&self,
		table: Table,
		remote_ids: &[RemoteId],
	) -> Result<Vec<LocalRecord>, StoreError> {
		self.inner.find_by_remote_ids(table, remote_ids).await
	}

	async fn apply_sync_batch(
		&self,
		table: Table,
		batch: SyncWriteBatch,
	) -> Result<Vec<LocalId>, StoreError> {
		if self.fail_apply.load(Ordering::SeqCst) {
			return Err(StoreError::Transaction("disk I/O error".to_string()));
		}

		self.inner.apply_sync_batch(table, batch).await
	}

	async fn load_metadata(&self, table: Table) -> Result<Option<TableSyncMetadata>, StoreError> {
		self.inner.load_metadata(table).await
	}

	async fn save_metadata(&self, table: Table, metadata: &TableSyncMetadata) -> Result<(), StoreError> {
		self.inner.save_metadata(table, metadata).await
	}
}
