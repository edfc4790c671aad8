//! Sorting of everything touched since the last cycle into mutually exclusive categories.

use std::{
	collections::{hash_map::Entry, BTreeMap, HashMap},
	fmt,
};

use serde::Serialize;
use strum::Display;
use tracing::{debug, warn};
use xs_sync::{
	diff, fold,
	record::{ID_FIELD, REMOTE_ID_FIELD},
	FieldMap, JournalEntry, LocalId, LocalRecord, Method, RecordUpdate, RemoteId, RemoteRecord,
	Sequence, SyncTable,
};

use super::{error::Error, merge};

#[derive(Serialize, Display, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Category {
	NewLocal,
	NewRemote,
	UpdatedLocal,
	UpdatedRemote,
	DeletedLocal,
	Conflict,
}

/// Net local intent of one object's pending journal entries.
#[derive(Display, Debug, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum Intent {
	Create,
	Update,
	Delete,
}

/// Pending journal entries of one object, in sequence order.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalGroup<T> {
	pub object_id: LocalId,
	pub entries: Vec<JournalEntry<T>>,
}

impl<T: SyncTable> JournalGroup<T> {
	/// Groups `entries` by object, each group ordered by sequence.
	#[must_use]
	pub fn group(mut entries: Vec<JournalEntry<T>>) -> BTreeMap<LocalId, Self> {
		entries.sort_by_key(|entry| entry.sequence);

		let mut groups = BTreeMap::<LocalId, Self>::new();
		for entry in entries {
			groups
				.entry(entry.object_id)
				.or_insert_with(|| Self {
					object_id: entry.object_id,
					entries: Vec::new(),
				})
				.entries
				.push(entry);
		}

		groups
	}

	/// A delete anywhere in the group wins, then a create, otherwise it is an update.
	#[must_use]
	pub fn intent(&self) -> Intent {
		let has = |method| self.entries.iter().any(|entry| entry.change.method() == method);

		if has(Method::Delete) {
			Intent::Delete
		} else if has(Method::Create) {
			Intent::Create
		} else {
			Intent::Update
		}
	}

	/// Fold of every `new_data` in the group: the net field values written locally.
	#[must_use]
	pub fn payload(&self) -> FieldMap {
		fold(self.entries.iter().filter_map(|entry| entry.change.new_data()))
	}

	/// The record as it stood right before the group's last delete.
	#[must_use]
	pub fn deleted_record(&self) -> Option<&LocalRecord> {
		self.entries
			.iter()
			.rev()
			.find_map(|entry| entry.change.deleted_record())
	}

	#[must_use]
	pub fn sequences(&self) -> Vec<Sequence> {
		self.entries.iter().map(|entry| entry.sequence).collect()
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewLocal<T> {
	pub local: LocalRecord,
	/// Create payload without `id` or `remote_id`, neither exists remotely yet.
	pub data: FieldMap,
	pub group: JournalGroup<T>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdatedLocal<T> {
	pub local: LocalRecord,
	pub changes: FieldMap,
	/// Deleted locally before it ever reached the remote.
	pub deleted: bool,
	pub group: JournalGroup<T>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeletedLocal<T> {
	/// Full record as it stood before the delete, carrying its `remote_id`.
	pub snapshot: LocalRecord,
	pub group: JournalGroup<T>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
	/// Written locally and pushed as an update.
	Merge(FieldMap),
	/// The object was deleted locally; the delete is pushed and nothing is written back.
	Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Conflict<T> {
	pub local: LocalRecord,
	pub remote: RemoteRecord,
	pub resolution: Resolution,
	pub group: JournalGroup<T>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification<T> {
	pub new_local: Vec<NewLocal<T>>,
	pub new_remote: Vec<RemoteRecord>,
	pub updated_local: Vec<UpdatedLocal<T>>,
	pub updated_remote: Vec<RecordUpdate>,
	pub deleted_local: Vec<DeletedLocal<T>>,
	pub conflicts: Vec<Conflict<T>>,
}

impl<T> Default for Classification<T> {
	fn default() -> Self {
		Self {
			new_local: Vec::new(),
			new_remote: Vec::new(),
			updated_local: Vec::new(),
			updated_remote: Vec::new(),
			deleted_local: Vec::new(),
			conflicts: Vec::new(),
		}
	}
}

impl<T> Classification<T> {
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.new_local.is_empty()
			&& self.new_remote.is_empty()
			&& self.updated_local.is_empty()
			&& self.updated_remote.is_empty()
			&& self.deleted_local.is_empty()
			&& self.conflicts.is_empty()
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ObjectKey {
	Local(LocalId),
	Remote(RemoteId),
}

impl fmt::Display for ObjectKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Local(id) => write!(f, "local:{id}"),
			Self::Remote(remote_id) => write!(f, "remote:{remote_id}"),
		}
	}
}

#[derive(Default)]
struct Assignments(HashMap<ObjectKey, Category>);

impl Assignments {
	fn assign(&mut self, key: ObjectKey, category: Category) -> Result<(), Error> {
		match self.0.entry(key) {
			Entry::Vacant(entry) => {
				entry.insert(category);
				Ok(())
			}
			Entry::Occupied(entry) => Err(Error::ClassificationInvariant {
				object: entry.key().to_string(),
				categories: vec![*entry.get(), category],
			}),
		}
	}

	fn ensure_covered(&self, object_id: LocalId) -> Result<(), Error> {
		if self.0.contains_key(&ObjectKey::Local(object_id)) {
			Ok(())
		} else {
			Err(Error::ClassificationInvariant {
				object: ObjectKey::Local(object_id).to_string(),
				categories: Vec::new(),
			})
		}
	}
}

/// Partitions a cycle's inputs into the six categories.
///
/// `candidates` must hold every local record named by the journal (deleted ones as their
/// pre-delete snapshot) plus every local record whose `remote_id` shows up in `remote_delta`.
/// Every object referenced by either side lands in exactly one category; anything else is an
/// [`Error::ClassificationInvariant`].
pub fn classify<T: SyncTable>(
	remote_delta: Vec<RemoteRecord>,
	journal: Vec<JournalEntry<T>>,
	candidates: Vec<LocalRecord>,
) -> Result<Classification<T>, Error> {
	let mut groups = JournalGroup::group(journal);
	let journaled = groups.keys().copied().collect::<Vec<_>>();

	let by_id = candidates
		.into_iter()
		.map(|record| (record.id, record))
		.collect::<BTreeMap<_, _>>();

	// Lowest local id wins should two records ever share a remote id.
	let mut by_remote_id = HashMap::<&str, &LocalRecord>::new();
	for record in by_id.values() {
		if let Some(remote_id) = &record.remote_id {
			by_remote_id.entry(remote_id.as_str()).or_insert(record);
		}
	}

	let mut classification = Classification::default();
	let mut assignments = Assignments::default();

	for remote in dedup_by_remote_id(remote_delta) {
		let Some(local) = by_remote_id.get(remote.remote_id.as_str()).copied() else {
			assignments.assign(ObjectKey::Remote(remote.remote_id.clone()), Category::NewRemote)?;
			classification.new_remote.push(remote);
			continue;
		};

		if let Some(group) = groups.remove(&local.id) {
			assignments.assign(ObjectKey::Local(local.id), Category::Conflict)?;

			let resolution = match group.intent() {
				Intent::Delete => Resolution::Delete,
				Intent::Create | Intent::Update => {
					Resolution::Merge(merge::resolve(local, &group, &remote))
				}
			};

			classification.conflicts.push(Conflict {
				local: local.clone(),
				remote,
				resolution,
				group,
			});
		} else {
			assignments.assign(ObjectKey::Local(local.id), Category::UpdatedRemote)?;

			classification.updated_remote.push(RecordUpdate {
				id: local.id,
				changes: diff(&local.fields, &remote.fields),
			});
		}
	}

	for (object_id, group) in groups {
		match group.intent() {
			Intent::Create => {
				let mut data = group.payload();
				data.remove(ID_FIELD);
				data.remove(REMOTE_ID_FIELD);

				let local = by_id
					.get(&object_id)
					.cloned()
					.unwrap_or_else(|| missing_record(object_id, &data));

				assignments.assign(ObjectKey::Local(object_id), Category::NewLocal)?;
				classification.new_local.push(NewLocal { local, data, group });
			}

			Intent::Delete => {
				let snapshot = group
					.deleted_record()
					.cloned()
					.or_else(|| by_id.get(&object_id).cloned())
					.unwrap_or_else(|| missing_record(object_id, &FieldMap::new()));

				if snapshot.is_linked() {
					assignments.assign(ObjectKey::Local(object_id), Category::DeletedLocal)?;
					classification
						.deleted_local
						.push(DeletedLocal { snapshot, group });
				} else {
					assignments.assign(ObjectKey::Local(object_id), Category::UpdatedLocal)?;
					classification.updated_local.push(UpdatedLocal {
						local: snapshot,
						changes: FieldMap::new(),
						deleted: true,
						group,
					});
				}
			}

			Intent::Update => {
				let changes = group.payload();
				let local = by_id
					.get(&object_id)
					.cloned()
					.unwrap_or_else(|| missing_record(object_id, &changes));

				assignments.assign(ObjectKey::Local(object_id), Category::UpdatedLocal)?;
				classification.updated_local.push(UpdatedLocal {
					local,
					changes,
					deleted: false,
					group,
				});
			}
		}
	}

	for object_id in journaled {
		assignments.ensure_covered(object_id)?;
	}

	Ok(classification)
}

/// Keeps the last occurrence of every remote id, in first-seen order.
fn dedup_by_remote_id(remote_delta: Vec<RemoteRecord>) -> Vec<RemoteRecord> {
	let mut positions = HashMap::<RemoteId, usize>::with_capacity(remote_delta.len());
	let mut deduped = Vec::<RemoteRecord>::with_capacity(remote_delta.len());

	for remote in remote_delta {
		if let Some(&position) = positions.get(&remote.remote_id) {
			debug!(remote_id = %remote.remote_id, "Remote delta repeats a record, keeping the latest;");
			deduped[position] = remote;
		} else {
			positions.insert(remote.remote_id.clone(), deduped.len());
			deduped.push(remote);
		}
	}

	deduped
}

fn missing_record(object_id: LocalId, fields: &FieldMap) -> LocalRecord {
	warn!(object_id, "Journaled object is missing from the store, using its journaled fields;");
	LocalRecord::from_fields(object_id, fields.clone())
}
