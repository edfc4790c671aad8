use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identity assigned to a record by the local store, stable for the record's whole lifetime.
pub type LocalId = u64;

/// Opaque identity of a record's counterpart on the remote system.
pub type RemoteId = String;

/// Table-specific fields of a record, keyed by field name.
pub type FieldMap = Map<String, Value>;

pub const ID_FIELD: &str = "id";
pub const REMOTE_ID_FIELD: &str = "remote_id";

/// A record as the local replica stores it.
///
/// `id` and `remote_id` are kept out of `fields`, so field-level diffs and folds only ever
/// see table data. Serialized, the three parts are flattened into a single object.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LocalRecord {
	pub id: LocalId,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub remote_id: Option<RemoteId>,
	#[serde(flatten)]
	pub fields: FieldMap,
}

impl LocalRecord {
	/// Builds a record out of a raw field map, lifting `remote_id` out of it and dropping any
	/// stray `id` key.
	#[must_use]
	pub fn from_fields(id: LocalId, mut fields: FieldMap) -> Self {
		fields.remove(ID_FIELD);
		let remote_id = fields
			.remove(REMOTE_ID_FIELD)
			.as_ref()
			.and_then(remote_id_from_value);

		Self {
			id,
			remote_id,
			fields,
		}
	}

	#[must_use]
	pub fn is_linked(&self) -> bool {
		self.remote_id.is_some()
	}

	/// Current value of `field`, reading `remote_id` from its dedicated slot. Missing fields
	/// read as `null`.
	#[must_use]
	pub fn value_of(&self, field: &str) -> Value {
		match field {
			ID_FIELD => Value::from(self.id),
			REMOTE_ID_FIELD => self
				.remote_id
				.as_ref()
				.map_or(Value::Null, |remote_id| Value::String(remote_id.clone())),
			_ => self.fields.get(field).cloned().unwrap_or(Value::Null),
		}
	}

	/// Merges a change set into this record. A `remote_id` key relinks the record, an `id`
	/// key is ignored since local identities never change.
	pub fn apply(&mut self, changes: &FieldMap) {
		for (field, value) in changes {
			match field.as_str() {
				ID_FIELD => {}
				REMOTE_ID_FIELD => self.remote_id = remote_id_from_value(value),
				_ => {
					self.fields.insert(field.clone(), value.clone());
				}
			}
		}
	}
}

/// A record as the remote side reports it, already mapped onto local field names.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RemoteRecord {
	pub remote_id: RemoteId,
	#[serde(flatten)]
	pub fields: FieldMap,
}

impl RemoteRecord {
	#[must_use]
	pub fn new(remote_id: impl Into<RemoteId>, fields: FieldMap) -> Self {
		let mut fields = fields;
		fields.remove(ID_FIELD);
		fields.remove(REMOTE_ID_FIELD);

		Self {
			remote_id: remote_id.into(),
			fields,
		}
	}

	/// Fields to insert locally: `template` first, this record's own fields on top.
	#[must_use]
	pub fn with_template(mut self, template: Option<&FieldMap>) -> Self {
		if let Some(template) = template {
			let mut merged = template.clone();
			merged.remove(ID_FIELD);
			merged.remove(REMOTE_ID_FIELD);
			merged.extend(self.fields);
			self.fields = merged;
		}

		self
	}
}

/// Remote ids are opaque strings, but adapters commonly hand us numeric ids straight out of
/// a JSON payload.
#[must_use]
pub fn remote_id_from_value(value: &Value) -> Option<RemoteId> {
	match value {
		Value::String(remote_id) => Some(remote_id.clone()),
		Value::Number(number) => Some(number.to_string()),
		_ => None,
	}
}

/// Every field of `other` whose value differs from the one in `base`. A field `base` does not
/// have at all counts as different.
#[must_use]
pub fn diff(base: &FieldMap, other: &FieldMap) -> FieldMap {
	other
		.iter()
		.filter(|(field, value)| base.get(field.as_str()) != Some(*value))
		.map(|(field, value)| (field.clone(), value.clone()))
		.collect()
}

/// Folds an ordered sequence of partial change sets into one net change set, later sets
/// overriding earlier ones field by field.
#[must_use]
pub fn fold<'a>(changes: impl IntoIterator<Item = &'a FieldMap>) -> FieldMap {
	changes
		.into_iter()
		.fold(FieldMap::new(), |mut acc, change| {
			acc.extend(change.iter().map(|(field, value)| (field.clone(), value.clone())));
			acc
		})
}
