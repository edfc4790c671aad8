//! Mock remote adapter for sync integration tests

use std::{
	collections::{HashMap, HashSet},
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::Notify;
use xs_core::sync::{
	FieldMap, LocalId, LocalRecord, RemoteAdapter, RemoteError, RemoteId, RemoteKeyAssignment,
	RemoteRecord, Value,
};

use super::{
	fields,
	mapping::{decode, encode, encode_patch},
	Table,
};

/// Offset between a local id and the remote id the mock assigns on create.
pub const REMOTE_ID_OFFSET: u64 = 40;

#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
	Pull {
		table: Table,
		since: Option<DateTime<Utc>>,
	},
	Create {
		table: Table,
		object_id: LocalId,
		data: FieldMap,
	},
	Update {
		table: Table,
		remote_id: RemoteId,
		data: FieldMap,
	},
	Delete {
		table: Table,
		remote_id: RemoteId,
	},
}

/// Serves canned deltas per table and records every call made against it.
///
/// Records cross the boundary in the tracker's own shapes, mapped per table. Deltas are served
/// again on every pull, so the same remote changes can arrive twice.
#[derive(Debug, Default)]
pub struct MockRemote {
	deltas: Mutex<HashMap<Table, Vec<Value>>>,
	calls: Mutex<Vec<RemoteCall>>,
	payloads: Mutex<Vec<(Table, Value)>>,
	unreachable: AtomicBool,
	rejected: Mutex<HashSet<LocalId>>,
	pull_gate: Mutex<Option<Arc<Notify>>>,
}

impl MockRemote {
	pub fn set_delta(&self, table: Table, delta: Vec<RemoteRecord>) {
		let payloads = delta
			.into_iter()
			.map(|remote| {
				let local = LocalRecord {
					id: 0,
					remote_id: Some(remote.remote_id),
					fields: FieldMap::new(),
				};
				encode(table, &local, &remote.fields).expect("fixture maps onto the tracker shape")
			})
			.collect();

		self.deltas.lock().insert(table, payloads);
	}

	/// Tracker payloads sent by pushes, in the order they were sent.
	pub fn payloads(&self) -> Vec<(Table, Value)> {
		self.payloads.lock().clone()
	}

	pub fn set_unreachable(&self, unreachable: bool) {
		self.unreachable.store(unreachable, Ordering::SeqCst);
	}

	/// Every push for `object_id` gets rejected until [`MockRemote::accept`] is called.
	pub fn reject(&self, object_id: LocalId) {
		self.rejected.lock().insert(object_id);
	}

	pub fn accept(&self, object_id: LocalId) {
		self.rejected.lock().remove(&object_id);
	}

	/// Makes every following pull wait on the returned gate.
	pub fn hold_pulls(&self) -> Arc<Notify> {
		let gate = Arc::new(Notify::new());
		*self.pull_gate.lock() = Some(Arc::clone(&gate));
		gate
	}

	pub fn calls(&self) -> Vec<RemoteCall> {
		self.calls.lock().clone()
	}

	pub fn pulls(&self) -> Vec<Option<DateTime<Utc>>> {
		self.calls()
			.into_iter()
			.filter_map(|call| match call {
				RemoteCall::Pull { since, .. } => Some(since),
				_ => None,
			})
			.collect()
	}

	pub fn creates(&self) -> Vec<(LocalId, FieldMap)> {
		self.calls()
			.into_iter()
			.filter_map(|call| match call {
				RemoteCall::Create {
					object_id, data, ..
				} => Some((object_id, data)),
				_ => None,
			})
			.collect()
	}

	pub fn updates(&self) -> Vec<(RemoteId, FieldMap)> {
		self.calls()
			.into_iter()
			.filter_map(|call| match call {
				RemoteCall::Update {
					remote_id, data, ..
				} => Some((remote_id, data)),
				_ => None,
			})
			.collect()
	}

	pub fn deletes(&self) -> Vec<RemoteId> {
		self.calls()
			.into_iter()
			.filter_map(|call| match call {
				RemoteCall::Delete { remote_id, .. } => Some(remote_id),
				_ => None,
			})
			.collect()
	}

	fn check_rejected(&self, local: &LocalRecord) -> Result<(), RemoteError> {
		if self.rejected.lock().contains(&local.id) {
			return Err(RemoteError::Rejected(format!(
				"validation failed for <object_id='{}'>",
				local.id
			)));
		}

		Ok(())
	}

	fn remote_id_of(local: &LocalRecord) -> Result<RemoteId, RemoteError> {
		local
			.remote_id
			.clone()
			.ok_or_else(|| RemoteError::Rejected(format!("<object_id='{}'> has no remote id", local.id)))
	}
}

#[async_trait]
impl RemoteAdapter<Table> for MockRemote {
	async fn pull(
		&self,
		table: Table,
		since: Option<DateTime<Utc>>,
	) -> Result<Vec<RemoteRecord>, RemoteError> {
		self.calls.lock().push(RemoteCall::Pull { table, since });

		let gate = self.pull_gate.lock().clone();
		if let Some(gate) = gate {
			gate.notified().await;
		}

		if self.unreachable.load(Ordering::SeqCst) {
			return Err(RemoteError::Unreachable("connection refused".to_string()));
		}

		let payloads = self.deltas.lock().get(&table).cloned().unwrap_or_default();

		payloads
			.iter()
			.map(|payload| decode(table, payload).map_err(Into::into))
			.collect()
	}

	async fn push_create(
		&self,
		table: Table,
		local: &LocalRecord,
		data: &FieldMap,
	) -> Result<RemoteKeyAssignment, RemoteError> {
		self.calls.lock().push(RemoteCall::Create {
			table,
			object_id: local.id,
			data: data.clone(),
		});

		self.check_rejected(local)?;

		let payload = encode(table, local, data)?;
		self.payloads.lock().push((table, payload));

		let number = local.id + REMOTE_ID_OFFSET;

		Ok(RemoteKeyAssignment {
			remote_id: number.to_string(),
			changes: fields(json!({ "github_number": number })),
		})
	}

	async fn push_update(
		&self,
		table: Table,
		local: &LocalRecord,
		data: &FieldMap,
	) -> Result<(), RemoteError> {
		self.calls.lock().push(RemoteCall::Update {
			table,
			remote_id: Self::remote_id_of(local)?,
			data: data.clone(),
		});

		self.check_rejected(local)?;

		let payload = encode_patch(table, data)?;
		self.payloads.lock().push((table, payload));

		Ok(())
	}

	async fn push_delete(&self, table: Table, local: &LocalRecord) -> Result<(), RemoteError> {
		self.calls.lock().push(RemoteCall::Delete {
			table,
			remote_id: Self::remote_id_of(local)?,
		});

		self.check_rejected(local)
	}
}
