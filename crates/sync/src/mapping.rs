use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::{
	record::{FieldMap, LocalRecord, RemoteRecord},
	table::SyncTable,
};

#[derive(Debug, Error)]
pub enum MappingError {
	#[error("expected a JSON object, found: {0}")]
	NotAnObject(Value),
	#[error("remote shape is missing its identity")]
	MissingRemoteId,
	#[error(transparent)]
	Serde(#[from] serde_json::Error),
}

/// Serializes a typed shape into a field map.
pub fn to_fields<S: Serialize>(value: &S) -> Result<FieldMap, MappingError> {
	match serde_json::to_value(value)? {
		Value::Object(fields) => Ok(fields),
		other => Err(MappingError::NotAnObject(other)),
	}
}

/// Reads a typed shape back out of a field map.
pub fn from_fields<D: DeserializeOwned>(fields: &FieldMap) -> Result<D, MappingError> {
	serde_json::from_value(Value::Object(fields.clone())).map_err(Into::into)
}

/// Translation between one synced table's local field names and its remote representation.
///
/// Adapters implement this once per table variant and dispatch on the table enum, keeping
/// each table's remote shape typed instead of passing loose maps around.
pub trait TableMapping {
	type Table: SyncTable;
	/// Full remote representation, as pulled and as sent on create.
	type Remote: Serialize + DeserializeOwned + Send + Sync;
	/// Partial remote representation sent on update.
	type Patch: Serialize + Send + Sync;

	const TABLE: Self::Table;

	fn to_local(remote: Self::Remote) -> Result<RemoteRecord, MappingError>;

	fn to_remote(local: &LocalRecord, data: &FieldMap) -> Result<Self::Remote, MappingError>;

	fn to_patch(data: &FieldMap) -> Result<Self::Patch, MappingError>;
}
