use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;
use xs_sync::{LocalId, Method};

use super::classify::Classification;

#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryCounts {
	pub new_local: usize,
	pub new_remote: usize,
	pub updated_local: usize,
	pub updated_remote: usize,
	pub deleted_local: usize,
	pub conflicts: usize,
}

impl<T> From<&Classification<T>> for CategoryCounts {
	fn from(classification: &Classification<T>) -> Self {
		Self {
			new_local: classification.new_local.len(),
			new_remote: classification.new_remote.len(),
			updated_local: classification.updated_local.len(),
			updated_remote: classification.updated_remote.len(),
			deleted_local: classification.deleted_local.len(),
			conflicts: classification.conflicts.len(),
		}
	}
}

/// A push that failed this cycle. Its journal entries stay pending for the next one.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PushFailure {
	pub object_id: LocalId,
	pub method: Method,
	pub message: String,
}

/// Outcome of one successful cycle for one table.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SyncReport<T> {
	pub cycle_id: Uuid,
	pub table: T,
	pub counts: CategoryCounts,
	pub pushes: usize,
	pub failures: Vec<PushFailure>,
	/// Journal entries purged after the local apply committed.
	pub purged: usize,
	pub synced_at: DateTime<Utc>,
}

impl<T> SyncReport<T> {
	#[must_use]
	pub fn is_clean(&self) -> bool {
		self.failures.is_empty()
	}
}
