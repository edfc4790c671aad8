//! Typed issue tracker shapes and their mapping onto local field names

use serde::{Deserialize, Serialize};
use xs_core::sync::{
	from_fields, to_fields, FieldMap, LocalRecord, MappingError, RemoteRecord, TableMapping, Value,
};

use super::Table;

/// Local field name to tracker field name, for fields the tracker names differently.
const ISSUE_RENAMES: &[(&str, &str)] = &[
	("description", "body"),
	("status", "state"),
	("github_number", "number"),
];

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerIssue {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub node_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub number: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub body: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub priority: Option<i64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub state: Option<i64>,
}

/// Only the fields that changed, never the identity.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerIssuePatch {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub body: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub priority: Option<i64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub state: Option<i64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerLabel {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub node_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
}

fn rename(fields: &FieldMap, renames: &[(&str, &str)], to_tracker: bool) -> FieldMap {
	fields
		.iter()
		.map(|(field, value)| {
			let field = field.as_str();
			let renamed = renames
				.iter()
				.find_map(|&(local, tracker)| {
					if to_tracker {
						(local == field).then_some(tracker)
					} else {
						(tracker == field).then_some(local)
					}
				})
				.unwrap_or(field);

			(renamed.to_string(), value.clone())
		})
		.collect()
}

fn into_remote_record<S: Serialize>(
	node_id: Option<String>,
	shape: &S,
	renames: &[(&str, &str)],
) -> Result<RemoteRecord, MappingError> {
	let remote_id = node_id.ok_or(MappingError::MissingRemoteId)?;
	let mut fields = rename(&to_fields(shape)?, renames, false);
	fields.remove("node_id");

	Ok(RemoteRecord::new(remote_id, fields))
}

pub struct IssueMapping;

impl TableMapping for IssueMapping {
	type Table = Table;
	type Remote = TrackerIssue;
	type Patch = TrackerIssuePatch;

	const TABLE: Table = Table::Issues;

	fn to_local(remote: TrackerIssue) -> Result<RemoteRecord, MappingError> {
		into_remote_record(remote.node_id.clone(), &remote, ISSUE_RENAMES)
	}

	fn to_remote(local: &LocalRecord, data: &FieldMap) -> Result<TrackerIssue, MappingError> {
		let mut issue = from_fields::<TrackerIssue>(&rename(data, ISSUE_RENAMES, true))?;
		issue.node_id.clone_from(&local.remote_id);

		Ok(issue)
	}

	fn to_patch(data: &FieldMap) -> Result<TrackerIssuePatch, MappingError> {
		from_fields(&rename(data, ISSUE_RENAMES, true))
	}
}

pub struct LabelMapping;

impl TableMapping for LabelMapping {
	type Table = Table;
	type Remote = TrackerLabel;
	type Patch = TrackerLabel;

	const TABLE: Table = Table::Labels;

	fn to_local(remote: TrackerLabel) -> Result<RemoteRecord, MappingError> {
		into_remote_record(remote.node_id.clone(), &remote, &[])
	}

	fn to_remote(local: &LocalRecord, data: &FieldMap) -> Result<TrackerLabel, MappingError> {
		let mut label = from_fields::<TrackerLabel>(data)?;
		label.node_id.clone_from(&local.remote_id);

		Ok(label)
	}

	fn to_patch(data: &FieldMap) -> Result<TrackerLabel, MappingError> {
		from_fields(data)
	}
}

/// Full tracker payload for a record of `table`.
pub fn encode(table: Table, local: &LocalRecord, data: &FieldMap) -> Result<Value, MappingError> {
	let fields = match table {
		Table::Issues => to_fields(&IssueMapping::to_remote(local, data)?)?,
		Table::Labels => to_fields(&LabelMapping::to_remote(local, data)?)?,
	};

	Ok(Value::Object(fields))
}

/// Partial tracker payload for an update of `table`.
pub fn encode_patch(table: Table, data: &FieldMap) -> Result<Value, MappingError> {
	let fields = match table {
		Table::Issues => to_fields(&IssueMapping::to_patch(data)?)?,
		Table::Labels => to_fields(&LabelMapping::to_patch(data)?)?,
	};

	Ok(Value::Object(fields))
}

pub fn decode(table: Table, payload: &Value) -> Result<RemoteRecord, MappingError> {
	let Value::Object(fields) = payload else {
		return Err(MappingError::NotAnObject(payload.clone()));
	};

	match table {
		Table::Issues => IssueMapping::to_local(from_fields(fields)?),
		Table::Labels => LabelMapping::to_local(from_fields(fields)?),
	}
}
