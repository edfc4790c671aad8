use std::{fmt, hash::Hash, time::Duration};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use strum::Display;

/// Interval used for `auto` tables that do not configure one.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(300);

/// The closed set of tables a host keeps in sync.
///
/// Implemented by a fieldless enum, one variant per synced table, so every per-table map in
/// the engine is keyed by a compile-time known value instead of a free-form name.
pub trait SyncTable:
	Copy
	+ Eq
	+ Hash
	+ Ord
	+ fmt::Debug
	+ fmt::Display
	+ Serialize
	+ DeserializeOwned
	+ Send
	+ Sync
	+ 'static
{
	const ALL: &'static [Self];

	fn name(self) -> String {
		self.to_string()
	}
}

#[derive(Serialize, Deserialize, Display, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SyncMode {
	#[default]
	Auto,
	Manual,
}

#[derive(Serialize, Deserialize, Display, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Direction {
	#[serde(alias = "r")]
	ReadOnly,
	#[serde(alias = "w")]
	WriteOnly,
	#[default]
	#[serde(alias = "rw")]
	ReadWrite,
}

impl Direction {
	#[must_use]
	pub const fn pulls(self) -> bool {
		matches!(self, Self::ReadOnly | Self::ReadWrite)
	}

	#[must_use]
	pub const fn pushes(self) -> bool {
		matches!(self, Self::WriteOnly | Self::ReadWrite)
	}
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableSyncConfig {
	#[serde(default)]
	pub mode: SyncMode,
	#[serde(default, alias = "syncIntervalSeconds")]
	pub sync_interval_seconds: Option<u64>,
	#[serde(default)]
	pub direction: Direction,
}

impl TableSyncConfig {
	#[must_use]
	pub fn interval(&self) -> Duration {
		self.sync_interval_seconds
			.map_or(DEFAULT_SYNC_INTERVAL, Duration::from_secs)
	}
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LastSync {
	#[default]
	Never,
	At(DateTime<Utc>),
}

impl LastSync {
	/// Lower bound to pull from, if the table was ever synced.
	#[must_use]
	pub const fn since(self) -> Option<DateTime<Utc>> {
		match self {
			Self::Never => None,
			Self::At(at) => Some(at),
		}
	}
}

#[derive(Serialize, Deserialize, Display, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SyncStatus {
	#[default]
	Idle,
	Syncing,
	Synced,
}

/// Persisted per-table sync state. Only the engine writes it, at the end of a cycle.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableSyncMetadata {
	pub last_sync: LastSync,
	pub status: SyncStatus,
}

impl TableSyncMetadata {
	#[must_use]
	pub const fn synced_at(at: DateTime<Utc>) -> Self {
		Self {
			last_sync: LastSync::At(at),
			status: SyncStatus::Synced,
		}
	}

	/// Whether the scheduler should start a cycle for this table at `now`.
	///
	/// Manual tables and tables with a cycle in flight are never due; tables that never synced
	/// always are. A `last_sync` in the future (clock skew) is treated as not due yet.
	#[must_use]
	pub fn is_due(&self, config: &TableSyncConfig, now: DateTime<Utc>) -> bool {
		if config.mode == SyncMode::Manual || self.status == SyncStatus::Syncing {
			return false;
		}

		match self.last_sync {
			LastSync::Never => true,
			LastSync::At(at) => now
				.signed_duration_since(at)
				.to_std()
				.is_ok_and(|elapsed| elapsed >= config.interval()),
		}
	}
}
