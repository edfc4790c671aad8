use std::sync::Arc;

use tracing::{trace, warn};
use xs_dispatch_queue::{ConfigError, DispatchQueue, OperationHandle, QueueConfig, QueueError};
use xs_sync::{
	FieldMap, LocalId, LocalRecord, Method, RemoteAdapter, RemoteError, RemoteKeyAssignment,
	Sequence, SyncTable,
};

pub(crate) enum PushOutcome {
	Created(RemoteKeyAssignment),
	Acknowledged,
}

struct PendingPush {
	object_id: LocalId,
	method: Method,
	sequences: Vec<Sequence>,
	handle: OperationHandle<PushOutcome, RemoteError>,
}

pub(crate) struct PushResult {
	pub(crate) object_id: LocalId,
	pub(crate) method: Method,
	pub(crate) sequences: Vec<Sequence>,
	pub(crate) outcome: Result<PushOutcome, String>,
}

/// Pushes one cycle's local-origin work through its own dispatch queue.
pub(crate) struct Dispatcher<T, R> {
	table: T,
	remote: Arc<R>,
	queue: DispatchQueue,
	pending: Vec<PendingPush>,
}

impl<T: SyncTable, R: RemoteAdapter<T> + 'static> Dispatcher<T, R> {
	pub(crate) fn new(table: T, remote: Arc<R>, config: QueueConfig) -> Result<Self, ConfigError> {
		Ok(Self {
			table,
			remote,
			queue: DispatchQueue::new(config)?,
			pending: Vec::new(),
		})
	}

	pub(crate) fn push_create(&mut self, local: LocalRecord, data: FieldMap, sequences: Vec<Sequence>) {
		let (table, remote, object_id) = (self.table, Arc::clone(&self.remote), local.id);

		let handle = self.queue.submit(async move {
			remote
				.push_create(table, &local, &data)
				.await
				.map(PushOutcome::Created)
		});

		self.track(object_id, Method::Create, sequences, handle);
	}

	pub(crate) fn push_update(&mut self, local: LocalRecord, data: FieldMap, sequences: Vec<Sequence>) {
		let (table, remote, object_id) = (self.table, Arc::clone(&self.remote), local.id);

		let handle = self.queue.submit(async move {
			remote
				.push_update(table, &local, &data)
				.await
				.map(|()| PushOutcome::Acknowledged)
		});

		self.track(object_id, Method::Update, sequences, handle);
	}

	pub(crate) fn push_delete(&mut self, local: LocalRecord, sequences: Vec<Sequence>) {
		let (table, remote, object_id) = (self.table, Arc::clone(&self.remote), local.id);

		let handle = self.queue.submit(async move {
			remote
				.push_delete(table, &local)
				.await
				.map(|()| PushOutcome::Acknowledged)
		});

		self.track(object_id, Method::Delete, sequences, handle);
	}

	fn track(
		&mut self,
		object_id: LocalId,
		method: Method,
		sequences: Vec<Sequence>,
		handle: OperationHandle<PushOutcome, RemoteError>,
	) {
		trace!(table = %self.table, object_id, %method, "Queued push;");

		self.pending.push(PendingPush {
			object_id,
			method,
			sequences,
			handle,
		});
	}

	pub(crate) fn len(&self) -> usize {
		self.pending.len()
	}

	/// Waits for the queue to drain and collects every push's outcome. A failed push is
	/// reported in its result and never fails the whole batch.
	pub(crate) async fn finish(self) -> Result<Vec<PushResult>, QueueError> {
		let Self {
			table,
			queue,
			pending,
			..
		} = self;

		queue.mark_done().await?;

		let mut results = Vec::with_capacity(pending.len());
		for PendingPush {
			object_id,
			method,
			sequences,
			handle,
		} in pending
		{
			let outcome = handle.await.map_err(|e| {
				warn!(%table, object_id, %method, ?e, "Push failed, keeping its journal entries;");
				e.to_string()
			});

			results.push(PushResult {
				object_id,
				method,
				sequences,
				outcome,
			});
		}

		Ok(results)
	}
}
