use std::{
	collections::{BTreeMap, HashMap, HashSet},
	fmt,
	sync::Arc,
};

use chrono::Utc;
use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, trace, warn};
use uuid::Uuid;
use xs_sync::{
	record::REMOTE_ID_FIELD, Change, FieldMap, Journal, JournalEntry, LastSync, LocalId,
	LocalRecord, LocalStore, RecordUpdate, RemoteAdapter, RemoteRecord, Sequence, SyncStatus,
	SyncTable, SyncWriteBatch, TableSyncConfig, TableSyncMetadata, Value,
};

use super::{
	classify::{classify, Classification, Conflict, DeletedLocal, NewLocal, Resolution, UpdatedLocal},
	config::EngineConfig,
	dispatch::{Dispatcher, PushOutcome, PushResult},
	error::Error,
	merge,
	report::{CategoryCounts, PushFailure, SyncReport},
};

const EVENTS_CAPACITY: usize = 64;

/// Lifecycle notifications, so hosts can surface "last sync failed" without polling.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncEvent<T> {
	Started { table: T, cycle_id: Uuid },
	Completed { report: SyncReport<T> },
	Failed { table: T, cycle_id: Uuid, error: String },
}

/// Marks a table as having a cycle in flight until dropped.
struct CycleGuard<'a, T: SyncTable> {
	in_flight: &'a Mutex<HashSet<T>>,
	table: T,
}

impl<'a, T: SyncTable> CycleGuard<'a, T> {
	fn acquire(in_flight: &'a Mutex<HashSet<T>>, table: T) -> Option<Self> {
		let inserted = in_flight.lock().insert(table);

		// A refused guard must never be built, its drop would clear the running cycle's mark.
		inserted.then(|| Self { in_flight, table })
	}
}

impl<T: SyncTable> Drop for CycleGuard<'_, T> {
	fn drop(&mut self) {
		self.in_flight.lock().remove(&self.table);
	}
}

/// Per-table sync orchestration over a local store and a remote adapter.
///
/// Cycles for different tables may run concurrently; a table never has two overlapping
/// cycles. Metadata is persisted through the store only when a cycle completes.
pub struct SyncEngine<T: SyncTable, S, R> {
	store: Arc<S>,
	remote: Arc<R>,
	config: EngineConfig<T>,
	metadata: Mutex<HashMap<T, TableSyncMetadata>>,
	in_flight: Mutex<HashSet<T>>,
	events: broadcast::Sender<SyncEvent<T>>,
}

impl<T: SyncTable, S, R> fmt::Debug for SyncEngine<T, S, R> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SyncEngine")
			.field("tables", &self.config.table_names())
			.field("in_flight", &*self.in_flight.lock())
			.finish_non_exhaustive()
	}
}

impl<T, S, R> SyncEngine<T, S, R>
where
	T: SyncTable,
	S: LocalStore<T> + 'static,
	R: RemoteAdapter<T> + 'static,
{
	/// Builds an engine, loading the persisted metadata of every configured table. Tables
	/// without metadata start out as never synced.
	pub async fn new(store: Arc<S>, remote: Arc<R>, config: EngineConfig<T>) -> Result<Self, Error> {
		config.queue.validate()?;

		let mut metadata = HashMap::with_capacity(config.tables.len());

		for table in config.table_names() {
			let mut loaded = store.load_metadata(table).await?.unwrap_or_default();
			// A cycle interrupted by a restart never finished.
			if loaded.status == SyncStatus::Syncing {
				loaded.status = SyncStatus::Idle;
			}
			metadata.insert(table, loaded);
		}

		let (events, _) = broadcast::channel(EVENTS_CAPACITY);

		Ok(Self {
			store,
			remote,
			config,
			metadata: Mutex::new(metadata),
			in_flight: Mutex::new(HashSet::new()),
			events,
		})
	}

	#[must_use]
	pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent<T>> {
		self.events.subscribe()
	}

	#[must_use]
	pub fn tables(&self) -> Vec<T> {
		self.config.table_names()
	}

	#[must_use]
	pub fn table_config(&self, table: T) -> Option<&TableSyncConfig> {
		self.config.tables.get(&table)
	}

	#[must_use]
	pub fn metadata(&self, table: T) -> Option<TableSyncMetadata> {
		self.metadata.lock().get(&table).copied()
	}

	#[must_use]
	pub fn is_syncing(&self, table: T) -> bool {
		self.in_flight.lock().contains(&table)
	}

	#[must_use]
	pub const fn store(&self) -> &Arc<S> {
		&self.store
	}

	/// Runs one cycle for every configured table, concurrently, manual tables included.
	pub async fn sync_all(&self) -> Vec<(T, Result<SyncReport<T>, Error>)> {
		join_all(
			self.config
				.table_names()
				.into_iter()
				.map(|table| async move { (table, self.sync_table(table).await) }),
		)
		.await
	}

	/// Runs one full cycle for `table`: pull, classify, push, apply, purge, mark synced.
	///
	/// On error nothing is marked synced and no journal entry is purged, so the next cycle
	/// starts over from the same `last_sync`.
	#[instrument(skip(self), fields(%table))]
	pub async fn sync_table(&self, table: T) -> Result<SyncReport<T>, Error> {
		let config = *self
			.config
			.tables
			.get(&table)
			.ok_or_else(|| Error::UnknownTable(table.name()))?;

		let _guard = CycleGuard::acquire(&self.in_flight, table)
			.ok_or_else(|| Error::AlreadySyncing(table.name()))?;

		let cycle_id = Uuid::new_v4();
		let previous = self.begin(table);

		info!(%cycle_id, last_sync = ?previous.last_sync, "Sync cycle started;");
		self.emit(SyncEvent::Started { table, cycle_id });

		match self.run_cycle(cycle_id, table, config, previous.last_sync).await {
			Ok(report) => {
				info!(
					%cycle_id,
					counts = ?report.counts,
					pushes = report.pushes,
					failures = report.failures.len(),
					"Sync cycle completed;"
				);
				self.emit(SyncEvent::Completed {
					report: report.clone(),
				});

				Ok(report)
			}

			Err(e) => {
				self.metadata.lock().insert(table, previous);

				error!(%cycle_id, ?e, "Sync cycle failed;");
				self.emit(SyncEvent::Failed {
					table,
					cycle_id,
					error: e.to_string(),
				});

				Err(e)
			}
		}
	}

	/// Flags `table` as syncing in memory and returns the metadata it had before.
	fn begin(&self, table: T) -> TableSyncMetadata {
		let mut metadata = self.metadata.lock();
		let entry = metadata.entry(table).or_default();
		let previous = *entry;
		entry.status = SyncStatus::Syncing;

		previous
	}

	fn emit(&self, event: SyncEvent<T>) {
		if self.events.send(event).is_err() {
			trace!("No subscribers for sync events;");
		}
	}

	async fn run_cycle(
		&self,
		cycle_id: Uuid,
		table: T,
		config: TableSyncConfig,
		last_sync: LastSync,
	) -> Result<SyncReport<T>, Error> {
		let started_at = Utc::now();

		let remote_delta = if config.direction.pulls() {
			self.remote
				.pull(table, last_sync.since())
				.await
				.map_err(|source| Error::Pull {
					table: table.name(),
					source,
				})?
		} else {
			Vec::new()
		};

		let journal = if config.direction.pushes() {
			self.store.read_pending(table).await?
		} else {
			Vec::new()
		};

		debug!(
			pulled = remote_delta.len(),
			pending = journal.len(),
			"Loaded remote delta and pending journal;"
		);

		let candidates = self.load_candidates(table, &remote_delta, &journal).await?;
		let classification = classify(remote_delta, journal, candidates)?;
		let counts = CategoryCounts::from(&classification);

		debug!(?counts, "Classified touched objects;");

		let Plan {
			mut batch,
			mut purge,
			dispatcher,
			mut merges,
		} = self.plan(table, classification)?;

		let pushes = dispatcher.len();
		let mut failures = Vec::new();
		let mut rebased = Vec::new();

		for PushResult {
			object_id,
			method,
			sequences,
			outcome,
		} in dispatcher.finish().await?
		{
			match outcome {
				Ok(PushOutcome::Created(assignment)) => {
					let mut changes = assignment.changes;
					changes.insert(
						REMOTE_ID_FIELD.to_owned(),
						Value::String(assignment.remote_id),
					);
					batch.updates.push(RecordUpdate {
						id: object_id,
						changes,
					});
					purge.extend(sequences);
				}
				Ok(PushOutcome::Acknowledged) => purge.extend(sequences),
				Err(message) => {
					// The merged fields are written locally regardless, so the pending entries
					// must describe the merge and not the local edits alone.
					if let Some((old_data, new_data)) = merges.remove(&object_id) {
						rebased.push((object_id, Change::Update { old_data, new_data }));
						purge.extend(sequences);
					}

					failures.push(PushFailure {
						object_id,
						method,
						message,
					});
				}
			}
		}

		if !batch.is_empty() {
			self.store.apply_sync_batch(table, batch).await?;
		}

		// Only once the apply committed, a failed apply must leave the journal untouched.
		for (object_id, change) in rebased {
			let entry = self.store.record(table, object_id, change).await?;
			debug!(%entry, "Rebased unpushed conflict merge onto the journal;");
		}

		if !purge.is_empty() {
			purge.sort_unstable();
			self.store.purge(table, &purge).await?;
		}

		let metadata = TableSyncMetadata::synced_at(started_at);
		self.store.save_metadata(table, &metadata).await?;
		self.metadata.lock().insert(table, metadata);

		Ok(SyncReport {
			cycle_id,
			table,
			counts,
			pushes,
			failures,
			purged: purge.len(),
			synced_at: started_at,
		})
	}

	/// Minimal set of local records the cycle can touch: everything the journal names, deleted
	/// records as their journaled snapshot, and everything matching a pulled remote id.
	async fn load_candidates(
		&self,
		table: T,
		remote_delta: &[RemoteRecord],
		journal: &[JournalEntry<T>],
	) -> Result<Vec<LocalRecord>, Error> {
		let mut candidates = BTreeMap::new();

		if !journal.is_empty() {
			let mut ids = journal.iter().map(|entry| entry.object_id).collect::<Vec<_>>();
			ids.sort_unstable();
			ids.dedup();

			for record in self.store.find_by_ids(table, &ids).await? {
				candidates.insert(record.id, record);
			}

			for snapshot in journal
				.iter()
				.filter_map(|entry| entry.change.deleted_record())
			{
				candidates
					.entry(snapshot.id)
					.or_insert_with(|| snapshot.clone());
			}
		}

		if !remote_delta.is_empty() {
			let remote_ids = remote_delta
				.iter()
				.map(|remote| remote.remote_id.clone())
				.collect::<Vec<_>>();

			for record in self.store.find_by_remote_ids(table, &remote_ids).await? {
				candidates.entry(record.id).or_insert(record);
			}
		}

		Ok(candidates.into_values().collect())
	}

	/// Turns a classification into the local write batch, the pushes to dispatch, and the
	/// journal entries that are settled without any push.
	fn plan(&self, table: T, classification: Classification<T>) -> Result<Plan<T, R>, Error> {
		let Classification {
			new_local,
			new_remote,
			updated_local,
			updated_remote,
			deleted_local,
			conflicts,
		} = classification;

		let template = self.config.templates.get(&table);
		let mut batch = SyncWriteBatch {
			inserts: new_remote
				.into_iter()
				.map(|remote| remote.with_template(template))
				.collect(),
			updates: updated_remote
				.into_iter()
				.filter(|update| !update.changes.is_empty())
				.collect(),
			deletes: Vec::new(),
		};
		let mut purge = Vec::new();
		let mut merges = HashMap::new();
		let mut dispatcher = Dispatcher::new(table, Arc::clone(&self.remote), self.config.queue)?;

		for NewLocal { local, data, group } in new_local {
			dispatcher.push_create(local, data, group.sequences());
		}

		for UpdatedLocal {
			local,
			changes,
			deleted,
			group,
		} in updated_local
		{
			if deleted {
				// Never reached the remote, so there is nothing to tell it.
				batch.deletes.push(local.id);
				purge.extend(group.sequences());
			} else if local.is_linked() {
				dispatcher.push_update(local, changes, group.sequences());
			} else {
				warn!(object_id = local.id, "Local update on a record never linked to the remote, nothing to push;");
				purge.extend(group.sequences());
			}
		}

		for DeletedLocal { snapshot, group } in deleted_local {
			batch.deletes.push(snapshot.id);
			dispatcher.push_delete(snapshot, group.sequences());
		}

		for Conflict {
			local,
			resolution,
			group,
			..
		} in conflicts
		{
			match resolution {
				Resolution::Merge(merged) => {
					let baseline = merge::baseline(&local, &group);
					let old_data = merged
						.keys()
						.map(|field| {
							let value = baseline.get(field).cloned().unwrap_or(Value::Null);
							(field.clone(), value)
						})
						.collect::<FieldMap>();

					merges.insert(local.id, (old_data, merged.clone()));
					batch.updates.push(RecordUpdate {
						id: local.id,
						changes: merged.clone(),
					});
					dispatcher.push_update(local, merged, group.sequences());
				}
				Resolution::Delete => {
					batch.deletes.push(local.id);
					dispatcher.push_delete(local, group.sequences());
				}
			}
		}

		Ok(Plan {
			batch,
			purge,
			dispatcher,
			merges,
		})
	}
}

struct Plan<T, R> {
	batch: SyncWriteBatch,
	purge: Vec<Sequence>,
	dispatcher: Dispatcher<T, R>,
	/// Baseline and merged fields of every conflict pushed as an update.
	merges: HashMap<LocalId, (FieldMap, FieldMap)>,
}
