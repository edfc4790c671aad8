use std::{collections::HashMap, fmt};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, instrument, trace, warn};
use xs_sync::{
	Change, FieldMap, Journal, JournalEntry, JournalInterceptor, LocalId, LocalRecord, LocalStore,
	Mutation, RemoteId, Sequence, StoreError, SyncTable, SyncWriteBatch, TableSyncConfig,
	TableSyncMetadata, WriteOrigin,
};

use super::snapshot::{find_by_remote_id, Tables};

pub struct MemoryStore<T: SyncTable> {
	interceptor: JournalInterceptor<T>,
	tables: Mutex<Tables<T>>,
}

impl<T: SyncTable> fmt::Debug for MemoryStore<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MemoryStore")
			.field("interceptor", &self.interceptor)
			.finish_non_exhaustive()
	}
}

impl<T: SyncTable> MemoryStore<T> {
	#[must_use]
	pub fn new(interceptor: JournalInterceptor<T>) -> Self {
		Self {
			interceptor,
			tables: Mutex::new(Tables::default()),
		}
	}

	/// A store journaling every table of `configs` that pushes local changes.
	#[must_use]
	pub fn for_tables(configs: &HashMap<T, TableSyncConfig>) -> Self {
		Self::new(JournalInterceptor::from_configs(configs))
	}

	/// Restores a store from [`MemoryStore::snapshot`] output.
	pub fn restore(interceptor: JournalInterceptor<T>, snapshot: &str) -> Result<Self, StoreError> {
		Ok(Self {
			interceptor,
			tables: Mutex::new(serde_json::from_str(snapshot)?),
		})
	}

	/// Serializes rows, pending journal and sync metadata.
	pub fn snapshot(&self) -> Result<String, StoreError> {
		serde_json::to_string(&*self.tables.lock()).map_err(Into::into)
	}

	/// Inserts a record written by the host application, journaling it when the table is
	/// journaled.
	pub fn insert(&self, table: T, fields: FieldMap) -> Result<LocalRecord, StoreError> {
		self.insert_with(WriteOrigin::Local, table, fields)
	}

	/// Inserts records that already mirror the remote, without journaling them.
	pub fn seed(
		&self,
		table: T,
		records: impl IntoIterator<Item = FieldMap>,
	) -> Result<Vec<LocalRecord>, StoreError> {
		records
			.into_iter()
			.map(|fields| self.insert_with(WriteOrigin::Sync, table, fields))
			.collect()
	}

	fn insert_with(
		&self,
		origin: WriteOrigin,
		table: T,
		fields: FieldMap,
	) -> Result<LocalRecord, StoreError> {
		let mut tables = self.tables.lock();

		let change = self
			.interceptor
			.intercept(origin, table, Mutation::Create { fields: &fields });

		let id = tables.allocate_id(table);
		let record = LocalRecord::from_fields(id, fields);

		if let Some(change) = change {
			append(&mut tables, table, id, change);
		}

		tables
			.rows
			.entry(table)
			.or_default()
			.insert(id, record.clone());

		Ok(record)
	}

	/// Applies a host update to an existing record, journaling the touched fields.
	pub fn update(&self, table: T, id: LocalId, changes: FieldMap) -> Result<LocalRecord, StoreError> {
		let mut tables = self.tables.lock();

		let current = tables
			.rows
			.get(&table)
			.and_then(|rows| rows.get(&id))
			.cloned()
			.ok_or_else(|| not_found(table, id))?;

		if let Some(change) = self.interceptor.intercept(
			WriteOrigin::Local,
			table,
			Mutation::Update {
				current: &current,
				changes: &changes,
			},
		) {
			append(&mut tables, table, id, change);
		}

		let mut updated = current;
		updated.apply(&changes);

		tables
			.rows
			.entry(table)
			.or_default()
			.insert(id, updated.clone());

		Ok(updated)
	}

	/// Removes a record right away. The journal keeps the full removed record so the next
	/// sync can still delete its remote counterpart.
	pub fn delete(&self, table: T, id: LocalId) -> Result<LocalRecord, StoreError> {
		let mut tables = self.tables.lock();

		let current = tables
			.rows
			.get_mut(&table)
			.and_then(|rows| rows.remove(&id))
			.ok_or_else(|| not_found(table, id))?;

		if let Some(change) = self.interceptor.intercept(
			WriteOrigin::Local,
			table,
			Mutation::Delete { current: &current },
		) {
			append(&mut tables, table, id, change);
		}

		Ok(current)
	}

	#[must_use]
	pub fn get(&self, table: T, id: LocalId) -> Option<LocalRecord> {
		self.tables
			.lock()
			.rows
			.get(&table)
			.and_then(|rows| rows.get(&id))
			.cloned()
	}

	#[must_use]
	pub fn get_by_remote_id(&self, table: T, remote_id: &str) -> Option<LocalRecord> {
		let remote_id = remote_id.to_owned();

		self.tables
			.lock()
			.rows
			.get(&table)
			.and_then(|rows| find_by_remote_id(rows, &remote_id))
			.cloned()
	}

	/// Every record of `table`, ordered by local id.
	#[must_use]
	pub fn all(&self, table: T) -> Vec<LocalRecord> {
		self.tables
			.lock()
			.rows
			.get(&table)
			.map(|rows| rows.values().cloned().collect())
			.unwrap_or_default()
	}

	#[must_use]
	pub fn pending_count(&self, table: T) -> usize {
		self.tables
			.lock()
			.journal
			.values()
			.filter(|entry| entry.table == table)
			.count()
	}
}

fn append<T: SyncTable>(tables: &mut Tables<T>, table: T, object_id: LocalId, change: Change) -> Sequence {
	let sequence = tables.allocate_sequence();
	let entry = JournalEntry {
		sequence,
		object_id,
		table,
		change,
	};

	trace!(%entry, "Journaled local write;");

	tables.journal.insert(sequence, entry);

	sequence
}

fn not_found<T: SyncTable>(table: T, id: LocalId) -> StoreError {
	StoreError::NotFound {
		table: table.name(),
		id,
	}
}

#[async_trait]
impl<T: SyncTable> Journal<T> for MemoryStore<T> {
	async fn record(
		&self,
		table: T,
		object_id: LocalId,
		change: Change,
	) -> Result<JournalEntry<T>, StoreError> {
		let mut tables = self.tables.lock();
		let sequence = append(&mut tables, table, object_id, change);

		tables
			.journal
			.get(&sequence)
			.cloned()
			.ok_or_else(|| StoreError::Journal(format!("entry {sequence} vanished after append")))
	}

	async fn read_pending(&self, table: T) -> Result<Vec<JournalEntry<T>>, StoreError> {
		Ok(self
			.tables
			.lock()
			.journal
			.values()
			.filter(|entry| entry.table == table)
			.cloned()
			.collect())
	}

	async fn purge(&self, table: T, sequences: &[Sequence]) -> Result<(), StoreError> {
		let mut tables = self.tables.lock();

		let mut purged = 0;
		for sequence in sequences {
			if tables
				.journal
				.get(sequence)
				.is_some_and(|entry| entry.table == table)
			{
				tables.journal.remove(sequence);
				purged += 1;
			}
		}

		debug!(%table, purged, "Purged journal entries;");

		Ok(())
	}
}

#[async_trait]
impl<T: SyncTable> LocalStore<T> for MemoryStore<T> {
	async fn find_by_ids(&self, table: T, ids: &[LocalId]) -> Result<Vec<LocalRecord>, StoreError> {
		let tables = self.tables.lock();

		Ok(tables
			.rows
			.get(&table)
			.map(|rows| ids.iter().filter_map(|id| rows.get(id)).cloned().collect())
			.unwrap_or_default())
	}

	async fn find_by_remote_ids(
		&self,
		table: T,
		remote_ids: &[RemoteId],
	) -> Result<Vec<LocalRecord>, StoreError> {
		let tables = self.tables.lock();

		Ok(tables
			.rows
			.get(&table)
			.map(|rows| {
				rows.values()
					.filter(|record| {
						record
							.remote_id
							.as_ref()
							.is_some_and(|remote_id| remote_ids.contains(remote_id))
					})
					.cloned()
					.collect()
			})
			.unwrap_or_default())
	}

	#[instrument(skip(self, batch), fields(inserts = batch.inserts.len(), updates = batch.updates.len(), deletes = batch.deletes.len()))]
	async fn apply_sync_batch(
		&self,
		table: T,
		batch: SyncWriteBatch,
	) -> Result<Vec<LocalId>, StoreError> {
		let mut tables = self.tables.lock();

		// Work on a copy of the table and swap it in at the end, so nothing is visible
		// unless the whole batch went through.
		let mut rows = tables.rows.get(&table).cloned().unwrap_or_default();
		let mut inserted = Vec::with_capacity(batch.inserts.len());

		for remote in batch.inserts {
			if let Some(existing) = find_by_remote_id(&rows, &remote.remote_id).map(|r| r.id) {
				if let Some(record) = rows.get_mut(&existing) {
					record.apply(&remote.fields);
				}
				inserted.push(existing);
				continue;
			}

			let id = tables.allocate_id(table);
			rows.insert(
				id,
				LocalRecord {
					id,
					remote_id: Some(remote.remote_id),
					fields: remote.fields,
				},
			);
			inserted.push(id);
		}

		for update in batch.updates {
			if let Some(record) = rows.get_mut(&update.id) {
				record.apply(&update.changes);
			} else {
				warn!(%table, id = update.id, "Skipping sync update for a record deleted meanwhile;");
			}
		}

		for id in batch.deletes {
			rows.remove(&id);
		}

		tables.rows.insert(table, rows);

		Ok(inserted)
	}

	async fn load_metadata(&self, table: T) -> Result<Option<TableSyncMetadata>, StoreError> {
		Ok(self.tables.lock().metadata.get(&table).copied())
	}

	async fn save_metadata(&self, table: T, metadata: &TableSyncMetadata) -> Result<(), StoreError> {
		self.tables.lock().metadata.insert(table, *metadata);

		Ok(())
	}
}
