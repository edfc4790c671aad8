use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use xs_sync::{
	JournalEntry, LocalId, LocalRecord, RemoteId, Sequence, SyncTable, TableSyncMetadata,
};

pub(crate) type Rows = BTreeMap<LocalId, LocalRecord>;

/// Everything the store holds. Serialized as-is for snapshots.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(bound = "T: SyncTable")]
pub(crate) struct Tables<T> {
	pub(crate) rows: BTreeMap<T, Rows>,
	pub(crate) next_ids: BTreeMap<T, LocalId>,
	pub(crate) journal: BTreeMap<Sequence, JournalEntry<T>>,
	pub(crate) next_sequence: Sequence,
	pub(crate) metadata: BTreeMap<T, TableSyncMetadata>,
}

impl<T: SyncTable> Default for Tables<T> {
	fn default() -> Self {
		Self {
			rows: BTreeMap::new(),
			next_ids: BTreeMap::new(),
			journal: BTreeMap::new(),
			next_sequence: 1,
			metadata: BTreeMap::new(),
		}
	}
}

impl<T: SyncTable> Tables<T> {
	pub(crate) fn allocate_id(&mut self, table: T) -> LocalId {
		let next = self.next_ids.entry(table).or_insert(1);
		let id = *next;
		*next += 1;
		id
	}

	pub(crate) fn allocate_sequence(&mut self) -> Sequence {
		let sequence = self.next_sequence;
		self.next_sequence += 1;
		sequence
	}
}

pub(crate) fn find_by_remote_id<'a>(rows: &'a Rows, remote_id: &RemoteId) -> Option<&'a LocalRecord> {
	rows.values()
		.find(|record| record.remote_id.as_ref() == Some(remote_id))
}
