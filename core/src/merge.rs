//! Field-level three-way merge for objects changed on both sides.
//!
//! A field the remote changed takes the remote value, a field only the local side changed keeps
//! the local value. Timestamps play no part.

use std::iter;

use xs_sync::{diff, fold, FieldMap, LocalRecord, RemoteRecord, SyncTable};

use super::classify::JournalGroup;

/// The object as it stood before any of the group's edits: the current fields, overwritten
/// newest to oldest with each entry's `old_data`.
#[must_use]
pub fn baseline<T: SyncTable>(current: &LocalRecord, group: &JournalGroup<T>) -> FieldMap {
	let mut baseline = current.fields.clone();

	for old_data in group
		.entries
		.iter()
		.rev()
		.filter_map(|entry| entry.change.old_data())
	{
		baseline.extend(old_data.iter().map(|(field, value)| (field.clone(), value.clone())));
	}

	baseline
}

/// Merged fields for a conflict, to be written locally and pushed as an update.
#[must_use]
pub fn resolve<T: SyncTable>(
	current: &LocalRecord,
	group: &JournalGroup<T>,
	remote: &RemoteRecord,
) -> FieldMap {
	let remote_only = diff(&baseline(current, group), &remote.fields);

	fold(
		group
			.entries
			.iter()
			.filter_map(|entry| entry.change.new_data())
			.chain(iter::once(&remote_only)),
	)
}
