//! Per-queue worker pools

use chrono::Utc;
use futures::FutureExt;
use jobq_handlers::{HandlerInvocation, HandlerRegistry};
use jobq_types::jobs::{HandlerError, Job, JobPatch, JobStatus};
use jobq_types::storage::JobStore;
use rand::Rng;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::backoff::backoff_for;
use crate::broker::{QueueBroker, ReservedJob};

/// Dispatch knobs for one queue's pool.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
	pub queue: String,
	pub concurrency: usize,
	/// Base delay for the exponential retry backoff.
	pub retry_delay_ms: u64,
	pub backoff_ceiling_ms: u64,
	/// Per-attempt handler deadline.
	pub job_timeout_ms: u64,
	/// Slack added to the deadline when computing the broker lease.
	pub lease_grace_ms: u64,
	pub poll_interval: Duration,
	pub poll_jitter: Duration,
}

/// Bounded-concurrency executor for one queue
///
/// Each slot loops: reserve, transition the record to active, invoke the
/// registered handler, settle with the broker, and write the outcome. The
/// pool is the only component that writes to both the broker and the store
/// in the same logical step.
pub struct WorkerPool {
	config: Arc<WorkerPoolConfig>,
	store: Arc<dyn JobStore>,
	broker: Arc<QueueBroker>,
	registry: Arc<HandlerRegistry>,
}

impl WorkerPool {
	pub fn new(
		config: WorkerPoolConfig,
		store: Arc<dyn JobStore>,
		broker: Arc<QueueBroker>,
		registry: Arc<HandlerRegistry>,
	) -> Self {
		Self {
			config: Arc::new(config),
			store,
			broker,
			registry,
		}
	}

	/// Spawn the worker slots. They run until the shutdown signal flips.
	pub fn start(&self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
		let mut handles = Vec::with_capacity(self.config.concurrency);
		for slot in 1..=self.config.concurrency {
			let worker = Slot {
				slot,
				config: Arc::clone(&self.config),
				store: Arc::clone(&self.store),
				broker: Arc::clone(&self.broker),
				registry: Arc::clone(&self.registry),
			};
			let mut shutdown = shutdown.clone();
			info!("starting worker {}/{} for queue '{}'", slot, self.config.concurrency, self.config.queue);
			handles.push(tokio::spawn(async move { worker.run(&mut shutdown).await }));
		}
		handles
	}
}

struct Slot {
	slot: usize,
	config: Arc<WorkerPoolConfig>,
	store: Arc<dyn JobStore>,
	broker: Arc<QueueBroker>,
	registry: Arc<HandlerRegistry>,
}

impl Slot {
	fn sleep_with_jitter(&self) -> Duration {
		if self.config.poll_jitter.is_zero() {
			return self.config.poll_interval;
		}
		let jitter_ms = u64::try_from(self.config.poll_jitter.as_millis()).unwrap_or(u64::MAX);
		let random = rand::thread_rng().gen_range(0..=jitter_ms);
		self.config.poll_interval + Duration::from_millis(random)
	}

	async fn run(&self, shutdown: &mut watch::Receiver<bool>) {
		let queue = &self.config.queue;
		let lease = chrono::Duration::milliseconds(
			(self.config.job_timeout_ms + self.config.lease_grace_ms) as i64,
		);

		loop {
			if *shutdown.borrow() {
				break;
			}

			match self.broker.reserve(queue, lease, Utc::now()).await {
				Ok(Some(reserved)) => self.process(reserved).await,
				Ok(None) => {
					let pause = self.sleep_with_jitter();
					tokio::select! {
						_ = sleep(pause) => {}
						changed = shutdown.changed() => {
							// A closed channel means the process is going away
							if changed.is_err() {
								break;
							}
						}
					}
				}
				Err(err) => {
					error!("worker {} failed to reserve from '{}': {}", self.slot, queue, err);
					sleep(self.sleep_with_jitter()).await;
				}
			}
		}
		debug!("worker {} for queue '{}' stopped", self.slot, queue);
	}

	async fn process(&self, reserved: ReservedJob) {
		let queue = &self.config.queue;
		let now = Utc::now();

		let job = match self.store.get(&reserved.id).await {
			Ok(Some(job)) => job,
			Ok(None) => {
				// Record vanished between enqueue and reserve (purge race);
				// clear the reservation and move on.
				let _ = self.broker.ack(queue, &reserved.id, &reserved.token).await;
				return;
			}
			Err(err) => {
				warn!("store unavailable before dispatching '{}': {}", reserved.id, err);
				let requeue_at = now + chrono::Duration::from_std(self.config.poll_interval).unwrap_or_else(|_| chrono::Duration::seconds(1));
				let _ = self
					.broker
					.nack(queue, &reserved.id, &reserved.token, Some(requeue_at), 0)
					.await;
				return;
			}
		};

		let attempts = job.attempts + 1;
		let active_patch = JobPatch::default()
			.status(JobStatus::Active)
			.attempts(attempts)
			.started_at(now)
			.delay_until(None);
		if let Err(err) = self.store.update(&job.id, active_patch).await {
			// The record could not be marked active; back off and let the
			// job be re-dispatched later. Nothing is lost: the broker held
			// the in-flight token until this nack.
			warn!("store unavailable while activating '{}': {}", job.id, err);
			let backoff = backoff_for(attempts, self.config.retry_delay_ms, self.config.backoff_ceiling_ms);
			let requeue_at = now + chrono::Duration::from_std(backoff).unwrap_or_else(|_| chrono::Duration::seconds(1));
			let _ = self
				.broker
				.nack(queue, &job.id, &reserved.token, Some(requeue_at), job.priority)
				.await;
			return;
		}

		let Some(handler) = self.registry.handler(queue, &job.job_type) else {
			self.settle_failed(&job, attempts, &reserved, "no handler registered for this job type".to_string())
				.await;
			return;
		};
		let timeout_ms = self
			.registry
			.spec(queue, &job.job_type)
			.and_then(|s| s.timeout_ms)
			.unwrap_or(self.config.job_timeout_ms);

		let invocation = HandlerInvocation {
			job_id: job.id.clone(),
			queue: queue.clone(),
			job_type: job.job_type.clone(),
			payload: job.payload.clone(),
			owner: job.owner.clone(),
			attempt: attempts,
			timeout_ms,
		};

		debug!("worker {} running job '{}' (attempt {}/{})", self.slot, job.id, attempts, job.max_attempts);
		let started = std::time::Instant::now();
		let outcome = tokio::time::timeout(
			Duration::from_millis(timeout_ms),
			AssertUnwindSafe(handler.call(invocation)).catch_unwind(),
		)
		.await;

		match outcome {
			// Deadline exceeded: abandon the call and leave the lease to the
			// stall sweep. The record stays active with the attempt counted.
			Err(_) => {
				warn!(
					"worker {} abandoned job '{}' after {}ms; lease expires at {}",
					self.slot, job.id, timeout_ms, reserved.lease_expires_at
				);
			}
			Ok(Err(_panic)) => {
				error!("handler panicked while running job '{}'", job.id);
				self.settle_after_failure(
					&job,
					attempts,
					&reserved,
					HandlerError::Retriable("handler panicked".to_string()),
				)
				.await;
			}
			Ok(Ok(Ok(result))) => {
				let elapsed_ms = started.elapsed().as_millis() as u64;
				self.settle_completed(&job, attempts, &reserved, result, elapsed_ms).await;
			}
			Ok(Ok(Err(handler_error))) => {
				self.settle_after_failure(&job, attempts, &reserved, handler_error).await;
			}
		}
	}

	async fn settle_completed(
		&self,
		job: &Job,
		attempts: u32,
		reserved: &ReservedJob,
		result: serde_json::Value,
		elapsed_ms: u64,
	) {
		let queue = &self.config.queue;
		// Settle the token first: if the lease expired and the stall sweep
		// already reclaimed the job, this late completion must not win.
		if self.broker.ack(queue, &job.id, &reserved.token).await.is_err() {
			warn!("discarding late completion of job '{}': reservation expired", job.id);
			return;
		}

		let patch = JobPatch::default()
			.status(JobStatus::Completed)
			.attempts(attempts)
			.result(result)
			.clear_error()
			.completed_at(Utc::now())
			.processing_time_ms(elapsed_ms);
		if let Err(err) = self.store.update(&job.id, patch).await {
			error!("failed to record completion of job '{}': {}", job.id, err);
		} else {
			debug!("worker {} completed job '{}' in {}ms", self.slot, job.id, elapsed_ms);
		}
	}

	async fn settle_after_failure(
		&self,
		job: &Job,
		attempts: u32,
		reserved: &ReservedJob,
		handler_error: HandlerError,
	) {
		let exhausted = attempts >= job.max_attempts;
		if handler_error.is_fatal() || exhausted {
			self.settle_failed(job, attempts, reserved, handler_error.to_string()).await;
			return;
		}

		let queue = &self.config.queue;
		let backoff = backoff_for(attempts, self.config.retry_delay_ms, self.config.backoff_ceiling_ms);
		let requeue_at = Utc::now()
			+ chrono::Duration::from_std(backoff).unwrap_or_else(|_| chrono::Duration::seconds(1));

		if self
			.broker
			.nack(queue, &job.id, &reserved.token, Some(requeue_at), job.priority)
			.await
			.is_err()
		{
			warn!("discarding late failure of job '{}': reservation expired", job.id);
			return;
		}

		let patch = JobPatch::default()
			.status(JobStatus::Waiting)
			.attempts(attempts)
			.error(handler_error.to_string())
			.delay_until(Some(requeue_at));
		if let Err(err) = self.store.update(&job.id, patch).await {
			error!("failed to record retry state of job '{}': {}", job.id, err);
		} else {
			info!(
				"job '{}' failed attempt {}/{}; retrying in {:?}",
				job.id, attempts, job.max_attempts, backoff
			);
		}
	}

	async fn settle_failed(&self, job: &Job, attempts: u32, reserved: &ReservedJob, reason: String) {
		let queue = &self.config.queue;
		if self
			.broker
			.nack(queue, &job.id, &reserved.token, None, job.priority)
			.await
			.is_err()
		{
			warn!("discarding late terminal failure of job '{}': reservation expired", job.id);
			return;
		}

		let patch = JobPatch::default()
			.status(JobStatus::Failed)
			.attempts(attempts)
			.error(reason.clone())
			.failed_at(Utc::now());
		if let Err(err) = self.store.update(&job.id, patch).await {
			error!("failed to record terminal failure of job '{}': {}", job.id, err);
		} else {
			warn!("job '{}' failed terminally after {} attempts: {}", job.id, attempts, reason);
		}
	}
}
