//! Tables, records and engine setups shared by the sync scenarios.
//!
//! The store always starts with two issues that already mirror the remote ("31" and "32").

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use strum::Display;
use xs_core::{
	sync::{
		Direction, FieldMap, LocalRecord, RemoteRecord, SyncMode, SyncTable, TableSyncConfig,
		Value,
	},
	EngineConfig, SyncEngine,
};
use xs_memory_store::MemoryStore;

use super::MockRemote;

#[derive(
	Serialize, Deserialize, Display, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Table {
	Issues,
	Labels,
}

impl SyncTable for Table {
	const ALL: &'static [Self] = &[Self::Issues, Self::Labels];
}

pub type Engine = SyncEngine<Table, MemoryStore<Table>, MockRemote>;

pub fn fields(value: Value) -> FieldMap {
	match value {
		Value::Object(map) => map,
		_ => unreachable!("test fixtures are objects"),
	}
}

pub fn record(id: u64, value: Value) -> LocalRecord {
	LocalRecord::from_fields(id, fields(value))
}

pub fn auto(direction: Direction) -> TableSyncConfig {
	TableSyncConfig {
		mode: SyncMode::Auto,
		sync_interval_seconds: None,
		direction,
	}
}

pub fn issues_config() -> EngineConfig<Table> {
	EngineConfig::default().with_table(Table::Issues, auto(Direction::ReadWrite))
}

pub fn seed_issues(store: &MemoryStore<Table>) {
	store
		.seed(
			Table::Issues,
			[
				fields(json!({
					"title": "Issue 1",
					"description": "This is a new Issue",
					"priority": 1,
					"status": 0,
					"github_number": 1,
					"remote_id": "31"
				})),
				fields(json!({
					"title": "Issue 2",
					"description": "This is a new Issue",
					"priority": 1,
					"status": 0,
					"github_number": 2,
					"remote_id": "32"
				})),
			],
		)
		.expect("seeding succeeds");
}

/// A remote issue carrying every field, the way the issue tracker returns them.
pub fn remote_issue(remote_id: &str, title: &str, description: &str, github_number: u64) -> RemoteRecord {
	RemoteRecord::new(
		remote_id,
		fields(json!({
			"title": title,
			"description": description,
			"priority": 1,
			"status": 0,
			"github_number": github_number
		})),
	)
}

/// The two issues created remotely in the pull scenarios.
pub fn new_remote_issues() -> Vec<RemoteRecord> {
	vec![
		remote_issue("33", "Issue 3", "This is a new issue", 3),
		remote_issue("34", "Issue 4", "This is a new issue", 4),
	]
}

/// Creates "Issue 5" locally and edits issue 2 four times.
pub fn make_local_changes(store: &MemoryStore<Table>) {
	let created = store
		.insert(
			Table::Issues,
			fields(json!({
				"title": "Issue 5",
				"description": "This is a new Issue",
				"priority": 1,
				"status": 0
			})),
		)
		.expect("insert succeeds");
	assert_eq!(created.id, 3);

	for changes in [
		json!({"title": "Hey was geht ab"}),
		json!({"status": 1}),
		json!({"description": "Local Update", "priority": 2}),
		json!({"title": "Issue wurde local geupdatet"}),
	] {
		store
			.update(Table::Issues, 2, fields(changes))
			.expect("update succeeds");
	}
}

pub struct Setup {
	pub store: Arc<MemoryStore<Table>>,
	pub remote: Arc<MockRemote>,
	pub engine: Arc<Engine>,
}

pub async fn setup(config: EngineConfig<Table>) -> Setup {
	let store = Arc::new(MemoryStore::for_tables(&config.tables));
	seed_issues(&store);

	setup_with(store, config).await
}

pub async fn setup_with(store: Arc<MemoryStore<Table>>, config: EngineConfig<Table>) -> Setup {
	let remote = Arc::new(MockRemote::default());
	let engine = Arc::new(
		SyncEngine::new(Arc::clone(&store), Arc::clone(&remote), config)
			.await
			.expect("engine starts"),
	);

	Setup {
		store,
		remote,
		engine,
	}
}
