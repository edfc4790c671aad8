use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
	mapping::MappingError,
	record::{FieldMap, LocalRecord, RemoteId, RemoteRecord},
	table::SyncTable,
};

#[derive(Debug, Error)]
pub enum RemoteError {
	#[error("remote unreachable: {0}")]
	Unreachable(String),
	#[error("remote rejected the request: {0}")]
	Rejected(String),
	#[error("table is not served by this adapter: {0}")]
	UnknownTable(String),
	#[error(transparent)]
	Mapping(#[from] MappingError),
}

/// What the remote assigned to a freshly created record: its identity plus any fields it
/// derived on its own (numbers, timestamps, slugs), already mapped to local field names.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RemoteKeyAssignment {
	pub remote_id: RemoteId,
	#[serde(default)]
	pub changes: FieldMap,
}

/// Transport to the authoritative remote.
///
/// Retries and backoff are the adapter's business; every error returned here is final for the
/// current cycle.
#[async_trait]
pub trait RemoteAdapter<T: SyncTable>: Send + Sync {
	async fn pull(
		&self,
		table: T,
		since: Option<DateTime<Utc>>,
	) -> Result<Vec<RemoteRecord>, RemoteError>;

	async fn push_create(
		&self,
		table: T,
		local: &LocalRecord,
		data: &FieldMap,
	) -> Result<RemoteKeyAssignment, RemoteError>;

	async fn push_update(
		&self,
		table: T,
		local: &LocalRecord,
		data: &FieldMap,
	) -> Result<(), RemoteError>;

	async fn push_delete(&self, table: T, local: &LocalRecord) -> Result<(), RemoteError>;
}
