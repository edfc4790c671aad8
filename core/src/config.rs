use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use xs_dispatch_queue::QueueConfig;
use xs_sync::{FieldMap, SyncTable, TableSyncConfig};

/// Everything a [`SyncEngine`](crate::SyncEngine) needs, supplied once at construction.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(bound = "T: SyncTable")]
pub struct EngineConfig<T> {
	pub tables: HashMap<T, TableSyncConfig>,
	/// Defaults stamped onto records pulled for the first time, e.g. a foreign key.
	#[serde(default)]
	pub templates: HashMap<T, FieldMap>,
	#[serde(default)]
	pub queue: QueueConfig,
}

impl<T: SyncTable> Default for EngineConfig<T> {
	fn default() -> Self {
		Self {
			tables: HashMap::new(),
			templates: HashMap::new(),
			queue: QueueConfig::default(),
		}
	}
}

impl<T: SyncTable> EngineConfig<T> {
	#[must_use]
	pub fn with_table(mut self, table: T, config: TableSyncConfig) -> Self {
		self.tables.insert(table, config);
		self
	}

	#[must_use]
	pub fn with_template(mut self, table: T, template: FieldMap) -> Self {
		self.templates.insert(table, template);
		self
	}

	#[must_use]
	pub const fn with_queue(mut self, queue: QueueConfig) -> Self {
		self.queue = queue;
		self
	}

	/// Configured tables in a stable order.
	#[must_use]
	pub fn table_names(&self) -> Vec<T> {
		let mut tables = self.tables.keys().copied().collect::<Vec<_>>();
		tables.sort_unstable();
		tables
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use pretty_assertions::assert_eq;
	use serde_json::json;
	use strum::Display;
	use xs_sync::{Direction, SyncMode};

	#[derive(
		Serialize, Deserialize, Display, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
	)]
	#[serde(rename_all = "snake_case")]
	enum Table {
		Issues,
		Labels,
	}

	impl SyncTable for Table {
		const ALL: &'static [Self] = &[Self::Issues, Self::Labels];
	}

	#[test]
	fn deserializes_from_json() {
		let config: EngineConfig<Table> = serde_json::from_value(json!({
			"tables": {
				"issues": {"mode": "auto", "sync_interval_seconds": 300, "direction": "rw"},
				"labels": {"mode": "manual", "direction": "read-only"}
			},
			"templates": {"issues": {"project_id": 7}},
			"queue": {"max_concurrent": 10}
		}))
		.expect("config deserializes");

		assert_eq!(config.table_names(), vec![Table::Issues, Table::Labels]);
		assert_eq!(
			config.tables[&Table::Labels],
			TableSyncConfig {
				mode: SyncMode::Manual,
				sync_interval_seconds: None,
				direction: Direction::ReadOnly,
			}
		);
		assert_eq!(config.templates[&Table::Issues]["project_id"], json!(7));
		assert_eq!(config.queue.max_concurrent, 10);
		assert_eq!(config.queue.max_per_window, 180);
	}
}
