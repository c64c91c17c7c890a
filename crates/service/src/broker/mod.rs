//! Queue broker: per-queue ready, delayed, and in-flight sets
//!
//! Every operation is linearizable on a single queue through that queue's
//! lock; operations on distinct queues do not contend. Reservations are
//! exclusive via opaque tokens with a lease expiry.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use jobq_types::jobs::{JobStatus, Placement};
use jobq_types::queues::QueueSizes;
use jobq_types::storage::JobStore;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Broker-level errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BrokerError {
	#[error("queue '{0}' is not registered")]
	UnknownQueue(String),
	#[error("stale or unknown reservation token for job '{id}' in queue '{queue}'")]
	BadToken { queue: String, id: String },
	#[error("store unavailable during recovery: {0}")]
	Recovery(String),
}

/// A successful reservation: the exclusive right to run one job until the
/// lease expires.
#[derive(Debug, Clone)]
pub struct ReservedJob {
	pub id: String,
	pub token: String,
	pub lease_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
struct ReadyEntry {
	priority: i32,
	seq: u64,
	id: String,
}

// Max-heap: higher priority first, then older enqueue sequence.
impl Ord for ReadyEntry {
	fn cmp(&self, other: &Self) -> Ordering {
		self.priority
			.cmp(&other.priority)
			.then_with(|| other.seq.cmp(&self.seq))
	}
}

impl PartialOrd for ReadyEntry {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

#[derive(Debug, Clone)]
struct Lease {
	token: String,
	expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct QueueState {
	// Lazily-deleted heap: entries whose id left `ready_ids` are skipped on pop.
	ready: BinaryHeap<ReadyEntry>,
	ready_ids: HashSet<String>,
	delayed: BTreeMap<(DateTime<Utc>, u64), (String, i32)>,
	delayed_ids: HashMap<String, (DateTime<Utc>, u64)>,
	in_flight: HashMap<String, Lease>,
	paused: bool,
	seq: u64,
}

impl QueueState {
	fn next_seq(&mut self) -> u64 {
		self.seq += 1;
		self.seq
	}

	fn placement_of(&self, id: &str) -> Option<Placement> {
		if self.ready_ids.contains(id) {
			Some(Placement::Waiting)
		} else if self.delayed_ids.contains_key(id) {
			Some(Placement::Delayed)
		} else if self.in_flight.contains_key(id) {
			Some(Placement::InFlight)
		} else {
			None
		}
	}

	fn push_ready(&mut self, id: String, priority: i32) {
		let seq = self.next_seq();
		self.ready_ids.insert(id.clone());
		self.ready.push(ReadyEntry { priority, seq, id });
	}

	fn push_delayed(&mut self, id: String, priority: i32, due: DateTime<Utc>) {
		let seq = self.next_seq();
		self.delayed_ids.insert(id.clone(), (due, seq));
		self.delayed.insert((due, seq), (id, priority));
	}

	fn pop_ready(&mut self) -> Option<ReadyEntry> {
		while let Some(entry) = self.ready.pop() {
			if self.ready_ids.remove(&entry.id) {
				return Some(entry);
			}
			// Entry was removed out of band; skip the stale heap node.
		}
		None
	}
}

/// Per-queue multiset organizing eligible work
///
/// Queues are registered at startup from the fixed registry; operations on
/// unknown queues fail with `UnknownQueue`.
#[derive(Default)]
pub struct QueueBroker {
	queues: DashMap<String, Arc<Mutex<QueueState>>>,
}

impl QueueBroker {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a queue; idempotent.
	pub fn register_queue(&self, name: impl Into<String>) {
		self.queues
			.entry(name.into())
			.or_insert_with(|| Arc::new(Mutex::new(QueueState::default())));
	}

	pub fn queue_names(&self) -> Vec<String> {
		let mut names: Vec<String> = self.queues.iter().map(|e| e.key().clone()).collect();
		names.sort();
		names
	}

	fn state(&self, queue: &str) -> Result<Arc<Mutex<QueueState>>, BrokerError> {
		self.queues
			.get(queue)
			.map(|e| Arc::clone(e.value()))
			.ok_or_else(|| BrokerError::UnknownQueue(queue.to_string()))
	}

	/// Place a job into `ready` or, when `delay_until` is in the future,
	/// into `delayed`. Idempotent on id: re-enqueueing a job already present
	/// in any set reports its existing placement.
	pub async fn enqueue(
		&self,
		queue: &str,
		id: &str,
		priority: i32,
		delay_until: Option<DateTime<Utc>>,
		now: DateTime<Utc>,
	) -> Result<Placement, BrokerError> {
		let state = self.state(queue)?;
		let mut state = state.lock().await;

		if let Some(existing) = state.placement_of(id) {
			return Ok(existing);
		}

		match delay_until {
			Some(due) if due > now => {
				state.push_delayed(id.to_string(), priority, due);
				Ok(Placement::Delayed)
			}
			_ => {
				state.push_ready(id.to_string(), priority);
				Ok(Placement::Waiting)
			}
		}
	}

	/// Atomically pop the highest-priority, oldest ready job and lease it.
	/// Returns `None` when the queue is empty or paused.
	pub async fn reserve(
		&self,
		queue: &str,
		lease: chrono::Duration,
		now: DateTime<Utc>,
	) -> Result<Option<ReservedJob>, BrokerError> {
		let state = self.state(queue)?;
		let mut state = state.lock().await;

		if state.paused {
			return Ok(None);
		}

		let Some(entry) = state.pop_ready() else {
			return Ok(None);
		};

		let token = Uuid::new_v4().to_string();
		let expires_at = now + lease;
		state.in_flight.insert(
			entry.id.clone(),
			Lease {
				token: token.clone(),
				expires_at,
			},
		);
		Ok(Some(ReservedJob {
			id: entry.id,
			token,
			lease_expires_at: expires_at,
		}))
	}

	/// Settle a reservation successfully.
	pub async fn ack(&self, queue: &str, id: &str, token: &str) -> Result<(), BrokerError> {
		let state = self.state(queue)?;
		let mut state = state.lock().await;
		match state.in_flight.get(id) {
			Some(lease) if lease.token == token => {
				state.in_flight.remove(id);
				Ok(())
			}
			_ => Err(BrokerError::BadToken {
				queue: queue.to_string(),
				id: id.to_string(),
			}),
		}
	}

	/// Settle a reservation as failed. With `requeue_at` the job re-enters
	/// `delayed`; without it the job leaves the broker entirely (the worker
	/// pool, not the broker, decides retry vs give-up).
	pub async fn nack(
		&self,
		queue: &str,
		id: &str,
		token: &str,
		requeue_at: Option<DateTime<Utc>>,
		priority: i32,
	) -> Result<(), BrokerError> {
		let state = self.state(queue)?;
		let mut state = state.lock().await;
		match state.in_flight.get(id) {
			Some(lease) if lease.token == token => {
				state.in_flight.remove(id);
				if let Some(due) = requeue_at {
					state.push_delayed(id.to_string(), priority, due);
				}
				Ok(())
			}
			_ => Err(BrokerError::BadToken {
				queue: queue.to_string(),
				id: id.to_string(),
			}),
		}
	}

	/// Remove a job from whichever set holds it; used by cancel.
	pub async fn remove(&self, queue: &str, id: &str) -> Result<bool, BrokerError> {
		let state = self.state(queue)?;
		let mut state = state.lock().await;

		if state.ready_ids.remove(id) {
			return Ok(true);
		}
		if let Some(key) = state.delayed_ids.remove(id) {
			state.delayed.remove(&key);
			return Ok(true);
		}
		Ok(state.in_flight.remove(id).is_some())
	}

	/// Move all delayed entries whose due time has arrived into `ready`.
	pub async fn promote_due(&self, queue: &str, now: DateTime<Utc>) -> Result<usize, BrokerError> {
		let state = self.state(queue)?;
		let mut state = state.lock().await;

		let due_keys: Vec<(DateTime<Utc>, u64)> = state
			.delayed
			.range(..=(now, u64::MAX))
			.map(|(key, _)| *key)
			.collect();

		let mut promoted = 0;
		for key in due_keys {
			if let Some((id, priority)) = state.delayed.remove(&key) {
				state.delayed_ids.remove(&id);
				state.push_ready(id, priority);
				promoted += 1;
			}
		}
		if promoted > 0 {
			debug!("promoted {} delayed jobs to ready in '{}'", promoted, queue);
		}
		Ok(promoted)
	}

	/// Collect and drop in-flight entries whose lease elapsed; the returned
	/// ids are candidates for stall handling.
	pub async fn reap_expired_leases(
		&self,
		queue: &str,
		now: DateTime<Utc>,
	) -> Result<Vec<String>, BrokerError> {
		let state = self.state(queue)?;
		let mut state = state.lock().await;

		let expired: Vec<String> = state
			.in_flight
			.iter()
			.filter(|(_, lease)| lease.expires_at <= now)
			.map(|(id, _)| id.clone())
			.collect();
		for id in &expired {
			state.in_flight.remove(id);
		}
		if !expired.is_empty() {
			warn!("reaped {} expired leases in '{}'", expired.len(), queue);
		}
		Ok(expired)
	}

	pub async fn sizes(&self, queue: &str) -> Result<QueueSizes, BrokerError> {
		let state = self.state(queue)?;
		let state = state.lock().await;
		Ok(QueueSizes {
			waiting: state.ready_ids.len(),
			active: state.in_flight.len(),
			delayed: state.delayed_ids.len(),
		})
	}

	/// Ids currently in one of the broker sets, in dispatch/due order.
	pub async fn peek(
		&self,
		queue: &str,
		status: JobStatus,
		limit: usize,
	) -> Result<Vec<String>, BrokerError> {
		let state = self.state(queue)?;
		let state = state.lock().await;
		let ids = match status {
			JobStatus::Waiting => {
				let mut entries: Vec<&ReadyEntry> = state
					.ready
					.iter()
					.filter(|e| state.ready_ids.contains(&e.id))
					.collect();
				entries.sort_by(|a, b| b.cmp(a));
				entries.into_iter().take(limit).map(|e| e.id.clone()).collect()
			}
			JobStatus::Active => state.in_flight.keys().take(limit).cloned().collect(),
			_ => state
				.delayed
				.values()
				.take(limit)
				.map(|(id, _)| id.clone())
				.collect(),
		};
		Ok(ids)
	}

	pub async fn placement(&self, queue: &str, id: &str) -> Result<Option<Placement>, BrokerError> {
		let state = self.state(queue)?;
		let state = state.lock().await;
		Ok(state.placement_of(id))
	}

	pub async fn set_paused(&self, queue: &str, paused: bool) -> Result<(), BrokerError> {
		let state = self.state(queue)?;
		let mut state = state.lock().await;
		state.paused = paused;
		Ok(())
	}

	pub async fn is_paused(&self, queue: &str) -> Result<bool, BrokerError> {
		let state = self.state(queue)?;
		let state = state.lock().await;
		Ok(state.paused)
	}

	/// Rebuild the runtime sets from the store after a restart.
	///
	/// Waiting jobs re-enter `ready` or `delayed`; jobs the store still has
	/// as `active` become in-flight entries with an already-expired lease so
	/// the next stall sweep retries or fails them.
	pub async fn recover_from_store(
		&self,
		store: &dyn JobStore,
		now: DateTime<Utc>,
	) -> Result<usize, BrokerError> {
		let jobs = store
			.jobs_since(None, DateTime::<Utc>::MIN_UTC)
			.await
			.map_err(|e| BrokerError::Recovery(e.to_string()))?;

		let mut recovered = 0;
		for job in jobs {
			if !self.queues.contains_key(&job.queue) {
				continue;
			}
			match job.status {
				JobStatus::Waiting | JobStatus::Stalled => {
					self.enqueue(&job.queue, &job.id, job.priority, job.delay_until, now)
						.await?;
					recovered += 1;
				}
				JobStatus::Active => {
					let state = self.state(&job.queue)?;
					let mut state = state.lock().await;
					state.in_flight.insert(
						job.id.clone(),
						Lease {
							token: Uuid::new_v4().to_string(),
							expires_at: now,
						},
					);
					recovered += 1;
				}
				_ => {}
			}
		}
		if recovered > 0 {
			info!("broker recovery re-seated {} jobs from the store", recovered);
		}
		Ok(recovered)
	}
}
