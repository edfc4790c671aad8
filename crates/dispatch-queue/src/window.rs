use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use super::config::QueueConfig;

/// Fixed-window start counter. The count resets once a full window has elapsed since the
/// window opened, so bursts straddling a reset may briefly exceed the smooth rate.
#[derive(Debug)]
pub(crate) struct RateWindow {
	limit: usize,
	length: Duration,
	spacing: Option<Duration>,
	opened_at: Instant,
	started: usize,
	last_start: Option<Instant>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowStatus {
	/// Operations started since the current window opened.
	pub started: usize,
	pub limit: usize,
	/// Time left until the counter resets.
	pub resets_in: Duration,
}

impl RateWindow {
	pub(crate) fn new(config: &QueueConfig, now: Instant) -> Self {
		Self {
			limit: config.max_per_window,
			length: config.window(),
			spacing: config.spacing(),
			opened_at: now,
			started: 0,
			last_start: None,
		}
	}

	fn roll(&mut self, now: Instant) {
		if now.saturating_duration_since(self.opened_at) >= self.length {
			self.opened_at = now;
			self.started = 0;
		}
	}

	/// Claims a start slot at `now`, if the window and the spacing allow one.
	pub(crate) fn try_start(&mut self, now: Instant) -> bool {
		self.roll(now);

		if self.started >= self.limit {
			return false;
		}

		if let (Some(spacing), Some(last_start)) = (self.spacing, self.last_start) {
			if now.saturating_duration_since(last_start) < spacing {
				return false;
			}
		}

		self.started += 1;
		self.last_start = Some(now);

		true
	}

	pub(crate) fn status(&mut self, now: Instant) -> WindowStatus {
		self.roll(now);

		WindowStatus {
			started: self.started,
			limit: self.limit,
			resets_in: self
				.length
				.saturating_sub(now.saturating_duration_since(self.opened_at)),
		}
	}
}
