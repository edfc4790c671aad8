use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::{
	spawn,
	sync::{oneshot, watch},
	task::JoinHandle,
	time::{interval, MissedTickBehavior},
};
use tracing::{debug, info, trace};
use xs_sync::{LocalStore, RemoteAdapter, SyncMode, SyncTable};

use super::{engine::SyncEngine, error::Error, report::SyncReport};

pub const DEFAULT_SCHEDULER_TICK: Duration = Duration::from_secs(1);

pub type CycleHandle<T> = JoinHandle<Result<SyncReport<T>, Error>>;

/// Periodically starts cycles for automatic tables whose interval elapsed, while online.
pub struct Scheduler<T: SyncTable, S, R> {
	engine: Arc<SyncEngine<T, S, R>>,
	connectivity: watch::Receiver<bool>,
	period: Duration,
}

impl<T, S, R> Scheduler<T, S, R>
where
	T: SyncTable,
	S: LocalStore<T> + 'static,
	R: RemoteAdapter<T> + 'static,
{
	#[must_use]
	pub const fn new(engine: Arc<SyncEngine<T, S, R>>, connectivity: watch::Receiver<bool>) -> Self {
		Self {
			engine,
			connectivity,
			period: DEFAULT_SCHEDULER_TICK,
		}
	}

	#[must_use]
	pub const fn with_tick(mut self, period: Duration) -> Self {
		self.period = period;
		self
	}

	#[must_use]
	pub fn is_online(&self) -> bool {
		*self.connectivity.borrow()
	}

	/// Automatic tables due at `now` that have no cycle in flight.
	#[must_use]
	pub fn due_tables(&self, now: DateTime<Utc>) -> Vec<T> {
		self.engine
			.tables()
			.into_iter()
			.filter(|&table| {
				let (Some(config), Some(metadata)) =
					(self.engine.table_config(table), self.engine.metadata(table))
				else {
					return false;
				};

				config.mode == SyncMode::Auto
					&& !self.engine.is_syncing(table)
					&& metadata.is_due(config, now)
			})
			.collect()
	}

	/// One scheduling pass: spawns a cycle for every due table. Offline passes start nothing.
	pub fn tick(&self) -> Vec<(T, CycleHandle<T>)> {
		if !self.is_online() {
			trace!("Offline, skipping scheduling pass;");
			return Vec::new();
		}

		self.due_tables(Utc::now())
			.into_iter()
			.map(|table| {
				debug!(%table, "Table is due, starting sync cycle;");
				let engine = Arc::clone(&self.engine);
				(table, spawn(async move { engine.sync_table(table).await }))
			})
			.collect()
	}

	/// Runs scheduling passes every tick until the returned handle shuts it down.
	#[must_use]
	pub fn start(self) -> SchedulerHandle {
		let (stop_tx, mut stop_rx) = oneshot::channel();

		let task = spawn(async move {
			let mut timer = interval(self.period.max(Duration::from_millis(1)));
			timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

			info!(period = ?self.period, "Sync scheduler started;");

			loop {
				tokio::select! {
					_ = &mut stop_rx => break,
					_ = timer.tick() => {
						// Cycles report through the engine's events, their handles are not awaited.
						drop(self.tick());
					}
				}
			}

			info!("Sync scheduler stopped;");
		});

		SchedulerHandle { stop_tx, task }
	}
}

/// Stops a running [`Scheduler`]. Cycles already started run to completion.
#[derive(Debug)]
pub struct SchedulerHandle {
	stop_tx: oneshot::Sender<()>,
	task: JoinHandle<()>,
}

impl SchedulerHandle {
	pub async fn shutdown(self) {
		if self.stop_tx.send(()).is_err() {
			trace!("Scheduler already gone;");
		}

		if let Err(e) = self.task.await {
			debug!(?e, "Scheduler task ended abnormally;");
		}
	}
}
