use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// Throttles of a [`DispatchQueue`](crate::DispatchQueue).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct QueueConfig {
	/// Operations allowed in flight at the same time.
	pub max_concurrent: usize,
	/// Operation starts allowed per rate window.
	pub max_per_window: usize,
	pub window_seconds: u64,
	/// How often pending operations are reconsidered for admission.
	pub tick_millis: u64,
	/// Keep consecutive starts at least `window / max_per_window` apart.
	pub even_spacing: bool,
}

impl Default for QueueConfig {
	fn default() -> Self {
		Self {
			max_concurrent: 100,
			max_per_window: 180,
			window_seconds: 60,
			tick_millis: 100,
			even_spacing: false,
		}
	}
}

impl QueueConfig {
	/// Rejects throttles that would stall the queue forever or disable its rate cap.
	pub const fn validate(&self) -> Result<(), ConfigError> {
		if self.max_concurrent == 0 {
			return Err(ConfigError::ZeroConcurrency);
		}
		if self.max_per_window == 0 {
			return Err(ConfigError::ZeroWindowBudget);
		}
		if self.window_seconds == 0 {
			return Err(ConfigError::ZeroWindow);
		}

		Ok(())
	}

	#[must_use]
	pub const fn window(&self) -> Duration {
		Duration::from_secs(self.window_seconds)
	}

	#[must_use]
	pub const fn tick(&self) -> Duration {
		Duration::from_millis(self.tick_millis)
	}

	/// Minimum distance between two starts, when evenly spacing them.
	#[must_use]
	pub fn spacing(&self) -> Option<Duration> {
		(self.even_spacing && self.max_per_window > 0).then(|| {
			self.window()
				/ u32::try_from(self.max_per_window).unwrap_or(u32::MAX)
		})
	}
}
