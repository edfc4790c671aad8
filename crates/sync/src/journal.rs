use std::{collections::HashSet, fmt};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::trace;

use super::{
	record::{FieldMap, LocalId, LocalRecord, ID_FIELD},
	store::StoreError,
	table::{SyncTable, TableSyncConfig},
};

/// Monotonic position of an entry in the journal, shared by every table of a store.
pub type Sequence = u64;

#[derive(Serialize, Deserialize, Display, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Method {
	Create,
	Update,
	Delete,
}

/// What a single local mutation did to one object.
///
/// Each variant carries exactly the snapshots its method allows: a create has no prior state,
/// an update remembers only the fields it touched, and a delete keeps the whole record it
/// removed so a later push can still name its remote counterpart.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum Change {
	Create {
		new_data: FieldMap,
	},
	Update {
		old_data: FieldMap,
		new_data: FieldMap,
	},
	Delete {
		old_data: LocalRecord,
	},
}

impl Change {
	#[must_use]
	pub const fn method(&self) -> Method {
		match self {
			Self::Create { .. } => Method::Create,
			Self::Update { .. } => Method::Update,
			Self::Delete { .. } => Method::Delete,
		}
	}

	/// Pre-mutation field values. For deletes these are the removed record's fields.
	#[must_use]
	pub const fn old_data(&self) -> Option<&FieldMap> {
		match self {
			Self::Create { .. } => None,
			Self::Update { old_data, .. } => Some(old_data),
			Self::Delete { old_data } => Some(&old_data.fields),
		}
	}

	#[must_use]
	pub const fn new_data(&self) -> Option<&FieldMap> {
		match self {
			Self::Create { new_data } | Self::Update { new_data, .. } => Some(new_data),
			Self::Delete { .. } => None,
		}
	}

	/// The full record as it stood right before a delete.
	#[must_use]
	pub const fn deleted_record(&self) -> Option<&LocalRecord> {
		match self {
			Self::Delete { old_data } => Some(old_data),
			Self::Create { .. } | Self::Update { .. } => None,
		}
	}
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct JournalEntry<T> {
	pub sequence: Sequence,
	pub object_id: LocalId,
	pub table: T,
	pub change: Change,
}

impl<T: fmt::Display> fmt::Display for JournalEntry<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"<seq={}, table='{}', object={}, method={}>",
			self.sequence,
			self.table,
			self.object_id,
			self.change.method()
		)
	}
}

/// Append-only log of local mutations, readable per table and purgeable by sequence.
///
/// Stores that record entries through [`Journal::record`] outside of a mutation must make sure
/// the write it describes shares its transaction; stores that journal through a
/// [`JournalInterceptor`] get that for free.
#[async_trait]
pub trait Journal<T: SyncTable>: Send + Sync {
	async fn record(
		&self,
		table: T,
		object_id: LocalId,
		change: Change,
	) -> Result<JournalEntry<T>, StoreError>;

	/// Every pending entry for `table`, oldest first.
	async fn read_pending(&self, table: T) -> Result<Vec<JournalEntry<T>>, StoreError>;

	async fn purge(&self, table: T, sequences: &[Sequence]) -> Result<(), StoreError>;
}

/// Who is writing to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOrigin {
	/// The host application. These writes are journaled.
	Local,
	/// The sync engine applying a cycle's result. Never journaled.
	Sync,
}

/// A write about to be committed, described with the state it is applied to.
#[derive(Debug, Clone, Copy)]
pub enum Mutation<'a> {
	Create {
		fields: &'a FieldMap,
	},
	Update {
		current: &'a LocalRecord,
		changes: &'a FieldMap,
	},
	Delete {
		current: &'a LocalRecord,
	},
}

/// Decides which writes land in the journal and what they record.
///
/// Stores call [`JournalInterceptor::intercept`] inside the transaction of every mutation and
/// append the returned change alongside it; if the append fails the mutation must fail too.
#[derive(Debug, Clone)]
pub struct JournalInterceptor<T> {
	journaled: HashSet<T>,
}

impl<T: SyncTable> JournalInterceptor<T> {
	pub fn new(tables: impl IntoIterator<Item = T>) -> Self {
		Self {
			journaled: tables.into_iter().collect(),
		}
	}

	/// Journals every configured table that can push local changes. Read-only tables never
	/// send anything upstream, so there is nothing to record for them.
	pub fn from_configs<'a>(configs: impl IntoIterator<Item = (&'a T, &'a TableSyncConfig)>) -> Self {
		Self::new(
			configs
				.into_iter()
				.filter(|(_, config)| config.direction.pushes())
				.map(|(table, _)| *table),
		)
	}

	#[must_use]
	pub fn is_journaled(&self, table: T) -> bool {
		self.journaled.contains(&table)
	}

	/// The change to append for `mutation`, or `None` when the write must not be journaled.
	#[must_use]
	pub fn intercept(&self, origin: WriteOrigin, table: T, mutation: Mutation<'_>) -> Option<Change> {
		if origin == WriteOrigin::Sync || !self.is_journaled(table) {
			return None;
		}

		let change = match mutation {
			Mutation::Create { fields } => {
				let mut new_data = fields.clone();
				new_data.remove(ID_FIELD);
				Change::Create { new_data }
			}

			Mutation::Update { current, changes } => {
				let mut new_data = changes.clone();
				new_data.remove(ID_FIELD);
				if new_data.is_empty() {
					return None;
				}

				let old_data = new_data
					.keys()
					.map(|field| (field.clone(), current.value_of(field)))
					.collect();

				Change::Update { old_data, new_data }
			}

			Mutation::Delete { current } => Change::Delete {
				old_data: current.clone(),
			},
		};

		trace!(%table, method = %change.method(), "Intercepted local write;");

		Some(change)
	}
}
