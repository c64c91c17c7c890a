//! Wall-clock driver: periodic housekeeping and cron-fired submissions
//!
//! The scheduler is the only component that makes decisions from the wall
//! clock. It promotes due delayed jobs, sweeps expired leases, refreshes
//! queue aggregates, trims retention, and fires registered cron entries.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use jobq_types::auth::AuthContext;
use jobq_types::jobs::{JobError, JobPatch, JobResult, JobStatus, SubmitOptions, SubmitRequest};
use jobq_types::storage::JobStore;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backoff::backoff_for;
use crate::broker::QueueBroker;
use crate::control::JobSubmitter;
use crate::metrics::evaluate_health;
use crate::queues::QueueRegistry;

/// Tick intervals and policy knobs for the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
	pub promotion_interval: Duration,
	pub stall_sweep_interval: Duration,
	pub metrics_refresh_interval: Duration,
	pub retention_trim_interval: Duration,
	/// Timezone cron expressions are evaluated in.
	pub timezone: Tz,
	pub backoff_ceiling_ms: u64,
	/// Hard cutoff for terminal records.
	pub terminal_retention_days: i64,
}

impl Default for SchedulerConfig {
	fn default() -> Self {
		use jobq_types::constants::*;
		Self {
			promotion_interval: Duration::from_millis(DEFAULT_PROMOTION_INTERVAL_MS),
			stall_sweep_interval: Duration::from_millis(DEFAULT_STALL_SWEEP_INTERVAL_MS),
			metrics_refresh_interval: Duration::from_millis(DEFAULT_METRICS_REFRESH_INTERVAL_MS),
			retention_trim_interval: Duration::from_millis(DEFAULT_RETENTION_TRIM_INTERVAL_MS),
			timezone: chrono_tz::UTC,
			backoff_ceiling_ms: DEFAULT_BACKOFF_CEILING_MS,
			terminal_retention_days: DEFAULT_TERMINAL_RETENTION_DAYS,
		}
	}
}

#[derive(Debug, Clone)]
struct CronEntry {
	name: String,
	queue: String,
	job_type: String,
	payload: Value,
	expression: String,
	next_fire: DateTime<Utc>,
}

/// Public view of a registered cron entry.
#[derive(Debug, Clone, Serialize)]
pub struct CronEntryView {
	pub name: String,
	pub queue: String,
	#[serde(rename = "type")]
	pub job_type: String,
	pub expression: String,
	pub next_fire: DateTime<Utc>,
}

/// The scheduler
///
/// Each periodic task runs on its own timer with skipped missed ticks, so a
/// slow pass never stacks on itself. When the orchestrator is replicated,
/// exactly one replica may run these tasks.
pub struct Scheduler {
	store: Arc<dyn JobStore>,
	broker: Arc<QueueBroker>,
	queues: Arc<QueueRegistry>,
	submitter: Arc<dyn JobSubmitter>,
	crons: Arc<RwLock<HashMap<String, CronEntry>>>,
	cron_notify: Arc<Notify>,
	config: SchedulerConfig,
}

impl Scheduler {
	pub fn new(
		store: Arc<dyn JobStore>,
		broker: Arc<QueueBroker>,
		queues: Arc<QueueRegistry>,
		submitter: Arc<dyn JobSubmitter>,
		config: SchedulerConfig,
	) -> Self {
		Self {
			store,
			broker,
			queues,
			submitter,
			crons: Arc::new(RwLock::new(HashMap::new())),
			cron_notify: Arc::new(Notify::new()),
			config,
		}
	}

	/// Accept 5-field (minute-first) or 6-field (second-first) expressions;
	/// normalize to the 6-field form the parser expects.
	fn normalize_expression(expression: &str) -> Result<String, String> {
		let fields: Vec<&str> = expression.split_whitespace().collect();
		let normalized = match fields.len() {
			5 => format!("0 {}", fields.join(" ")),
			6 | 7 => fields.join(" "),
			n => return Err(format!("expected 5 or 6 fields, found {}", n)),
		};
		cron::Schedule::from_str(&normalized).map_err(|e| e.to_string())?;
		Ok(normalized)
	}

	fn next_fire(&self, expression: &str, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
		let schedule = cron::Schedule::from_str(expression).ok()?;
		schedule
			.after(&after.with_timezone(&self.config.timezone))
			.next()
			.map(|at| at.with_timezone(&Utc))
	}

	/// Register a recurring submission. Returns the entry name.
	///
	/// Two registrations of the same expression are independent entries;
	/// each fire submits a fresh job with a fresh id.
	pub async fn schedule_repeating(
		&self,
		name: Option<String>,
		queue: String,
		job_type: String,
		payload: Value,
		expression: &str,
	) -> JobResult<String> {
		let normalized =
			Self::normalize_expression(expression).map_err(|reason| JobError::InvalidCron {
				expression: expression.to_string(),
				reason,
			})?;

		let name = name.unwrap_or_else(|| format!("cron-{}-{}", job_type, Uuid::new_v4()));
		let next_fire = self
			.next_fire(&normalized, Utc::now())
			.ok_or_else(|| JobError::InvalidCron {
				expression: expression.to_string(),
				reason: "expression never fires".to_string(),
			})?;

		let mut crons = self.crons.write().await;
		if crons.contains_key(&name) {
			return Err(JobError::Duplicate(name));
		}
		crons.insert(
			name.clone(),
			CronEntry {
				name: name.clone(),
				queue,
				job_type,
				payload,
				expression: normalized,
				next_fire,
			},
		);
		drop(crons);

		self.cron_notify.notify_one();
		info!("registered cron entry '{}' (next fire {})", name, next_fire);
		Ok(name)
	}

	/// Stop future fires of an entry; already-submitted jobs are unaffected.
	pub async fn cancel_schedule(&self, name: &str) -> JobResult<()> {
		let mut crons = self.crons.write().await;
		if crons.remove(name).is_none() {
			return Err(JobError::NotTriggerable(name.to_string()));
		}
		info!("cancelled cron entry '{}'", name);
		Ok(())
	}

	/// Admin-only manual fire of a registered entry.
	pub async fn trigger(&self, name: &str, auth: &AuthContext) -> JobResult<String> {
		if !auth.is_admin {
			return Err(JobError::AdminRequired);
		}
		let entry = {
			let crons = self.crons.read().await;
			crons
				.get(name)
				.cloned()
				.ok_or_else(|| JobError::NotTriggerable(name.to_string()))?
		};
		self.fire(&entry).await
	}

	pub async fn list_schedules(&self) -> Vec<CronEntryView> {
		let crons = self.crons.read().await;
		let mut views: Vec<CronEntryView> = crons
			.values()
			.map(|entry| CronEntryView {
				name: entry.name.clone(),
				queue: entry.queue.clone(),
				job_type: entry.job_type.clone(),
				expression: entry.expression.clone(),
				next_fire: entry.next_fire,
			})
			.collect();
		views.sort_by(|a, b| a.name.cmp(&b.name));
		views
	}

	async fn fire(&self, entry: &CronEntry) -> JobResult<String> {
		let request = SubmitRequest {
			queue: entry.queue.clone(),
			job_type: entry.job_type.clone(),
			payload: entry.payload.clone(),
			options: SubmitOptions::default(),
		};
		let id = self.submitter.submit(request, &AuthContext::system()).await?;
		debug!("cron entry '{}' submitted job '{}'", entry.name, id);
		Ok(id)
	}

	/// Move due delayed jobs to ready on every queue.
	pub async fn run_promotion_once(&self, now: DateTime<Utc>) {
		for queue in self.broker.queue_names() {
			if let Err(err) = self.broker.promote_due(&queue, now).await {
				error!("delay promotion failed for '{}': {}", queue, err);
			}
		}
	}

	/// Reap expired leases and retry or terminally fail the stalled jobs.
	pub async fn run_stall_sweep_once(&self, now: DateTime<Utc>) {
		for queue in self.broker.queue_names() {
			let expired = match self.broker.reap_expired_leases(&queue, now).await {
				Ok(ids) => ids,
				Err(err) => {
					error!("stall sweep failed to reap '{}': {}", queue, err);
					continue;
				}
			};
			for id in expired {
				if let Err(err) = self.handle_stalled(&queue, &id, now).await {
					error!("stall handling failed for job '{}': {}", id, err);
				}
			}
		}
	}

	async fn handle_stalled(&self, queue: &str, id: &str, now: DateTime<Utc>) -> JobResult<()> {
		let Some(job) = self.store.get(id).await? else {
			return Ok(());
		};
		if job.status != JobStatus::Active {
			// The worker settled the job between expiry and the sweep.
			return Ok(());
		}

		if job.attempts < job.max_attempts {
			let base = self
				.queues
				.get(queue)
				.map(|d| d.configuration.retry_delay_ms)
				.unwrap_or(jobq_types::constants::DEFAULT_RETRY_DELAY_MS);
			let backoff = backoff_for(job.attempts, base, self.config.backoff_ceiling_ms);
			let requeue_at = now
				+ chrono::Duration::from_std(backoff).unwrap_or_else(|_| chrono::Duration::seconds(1));

			warn!(
				"job '{}' stalled on attempt {}/{}; requeueing for {}",
				id, job.attempts, job.max_attempts, requeue_at
			);
			self.store
				.update(
					id,
					JobPatch::default()
						.status(JobStatus::Waiting)
						.stalled_at(now)
						.error("stalled: lease expired")
						.delay_until(Some(requeue_at)),
				)
				.await?;
			self.broker
				.enqueue(queue, id, job.priority, Some(requeue_at), now)
				.await
				.map_err(|e| JobError::BrokerUnavailable(e.to_string()))?;
		} else {
			warn!("job '{}' stalled terminally after {} attempts", id, job.attempts);
			self.store
				.update(
					id,
					JobPatch::default()
						.status(JobStatus::Failed)
						.stalled_at(now)
						.failed_at(now)
						.error(format!(
							"stalled: lease expired after {} attempts",
							job.attempts
						)),
				)
				.await?;
		}
		Ok(())
	}

	/// Recompute per-queue aggregates and health from the last hour.
	pub async fn run_metrics_refresh_once(&self, now: DateTime<Utc>) {
		let since = now - chrono::Duration::minutes(jobq_types::constants::METRICS_WINDOW_MINUTES);
		for queue in self.queues.names() {
			let stats = match self.store.stats_for_queue(&queue, since).await {
				Ok(stats) => stats,
				Err(err) => {
					error!("metrics refresh failed for '{}': {}", queue, err);
					continue;
				}
			};
			let rate = stats.completed as f64
				/ jobq_types::constants::METRICS_WINDOW_MINUTES as f64;
			let avg = if stats.completed > 0 {
				stats.total_processing_time_ms as f64 / stats.completed as f64
			} else {
				0.0
			};
			let health = evaluate_health(stats.completed, stats.failed);
			self.queues
				.update_aggregates(&queue, rate, avg, stats.last_processed_at, health, now);
		}
	}

	/// Enforce per-queue retention caps and the hard terminal cutoff.
	pub async fn run_retention_once(&self, now: DateTime<Utc>) {
		for queue in self.queues.names() {
			let Some(descriptor) = self.queues.get(&queue) else {
				continue;
			};
			if let Err(err) = self
				.store
				.trim_retention(
					&queue,
					descriptor.configuration.retain_completed,
					descriptor.configuration.retain_failed,
				)
				.await
			{
				error!("retention trim failed for '{}': {}", queue, err);
			}
		}
		let cutoff = now - chrono::Duration::days(self.config.terminal_retention_days);
		match self.store.expire_older_than(cutoff).await {
			Ok(removed) if removed > 0 => {
				info!("expired {} terminal jobs older than {}", removed, cutoff)
			}
			Ok(_) => {}
			Err(err) => error!("terminal expiry failed: {}", err),
		}
	}

	/// Fire every cron entry that is due and advance its next fire time.
	async fn fire_due_crons(&self, now: DateTime<Utc>) {
		let due: Vec<CronEntry> = {
			let crons = self.crons.read().await;
			crons
				.values()
				.filter(|entry| entry.next_fire <= now)
				.cloned()
				.collect()
		};

		for entry in due {
			if let Err(err) = self.fire(&entry).await {
				error!("cron entry '{}' failed to submit: {}", entry.name, err);
			}
			let next = self.next_fire(&entry.expression, now);
			let mut crons = self.crons.write().await;
			match (crons.get_mut(&entry.name), next) {
				(Some(current), Some(next_fire)) => current.next_fire = next_fire,
				(Some(_), None) => {
					warn!("cron entry '{}' has no future fires; removing", entry.name);
					crons.remove(&entry.name);
				}
				// Cancelled while firing
				(None, _) => {}
			}
		}
	}

	async fn next_cron_wake(&self) -> Duration {
		let crons = self.crons.read().await;
		let Some(earliest) = crons.values().map(|e| e.next_fire).min() else {
			return Duration::from_secs(5);
		};
		let now = Utc::now();
		if earliest <= now {
			Duration::ZERO
		} else {
			(earliest - now).to_std().unwrap_or(Duration::from_secs(5))
		}
	}

	/// Spawn the periodic tasks and the cron loop; they run until the
	/// shutdown signal flips.
	pub fn start(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
		let mut handles = Vec::new();

		handles.push(Self::spawn_periodic(
			Arc::clone(&self),
			shutdown.clone(),
			self.config.promotion_interval,
			"delay promotion",
			|scheduler, now| async move { scheduler.run_promotion_once(now).await },
		));
		handles.push(Self::spawn_periodic(
			Arc::clone(&self),
			shutdown.clone(),
			self.config.stall_sweep_interval,
			"stall sweep",
			|scheduler, now| async move { scheduler.run_stall_sweep_once(now).await },
		));
		handles.push(Self::spawn_periodic(
			Arc::clone(&self),
			shutdown.clone(),
			self.config.metrics_refresh_interval,
			"metrics refresh",
			|scheduler, now| async move { scheduler.run_metrics_refresh_once(now).await },
		));
		handles.push(Self::spawn_periodic(
			Arc::clone(&self),
			shutdown.clone(),
			self.config.retention_trim_interval,
			"retention trim",
			|scheduler, now| async move { scheduler.run_retention_once(now).await },
		));

		let scheduler = Arc::clone(&self);
		let mut shutdown = shutdown;
		handles.push(tokio::spawn(async move {
			debug!("cron loop started");
			loop {
				if *shutdown.borrow() {
					break;
				}
				let wake = scheduler.next_cron_wake().await;
				tokio::select! {
					_ = tokio::time::sleep(wake) => {}
					_ = scheduler.cron_notify.notified() => {}
					changed = shutdown.changed() => {
						if changed.is_err() {
							break;
						}
						continue;
					}
				}
				scheduler.fire_due_crons(Utc::now()).await;
			}
			debug!("cron loop stopped");
		}));

		handles
	}

	fn spawn_periodic<F, Fut>(
		scheduler: Arc<Self>,
		mut shutdown: watch::Receiver<bool>,
		period: Duration,
		name: &'static str,
		task: F,
	) -> JoinHandle<()>
	where
		F: Fn(Arc<Scheduler>, DateTime<Utc>) -> Fut + Send + 'static,
		Fut: std::future::Future<Output = ()> + Send,
	{
		tokio::spawn(async move {
			let mut ticker = interval(period);
			ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
			debug!("{} task started (period {:?})", name, period);
			loop {
				tokio::select! {
					_ = ticker.tick() => {
						task(Arc::clone(&scheduler), Utc::now()).await;
					}
					changed = shutdown.changed() => {
						if changed.is_err() || *shutdown.borrow() {
							break;
						}
					}
				}
			}
			debug!("{} task stopped", name);
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use jobq_storage::MemoryJobStore;
	use jobq_types::jobs::Job;
	use jobq_types::queues::{QueueConfiguration, QueueDescriptor, QueueHealth};
	use serde_json::json;
	use tokio::sync::Mutex;

	const QUEUE: &str = "cleanup";

	#[derive(Default)]
	struct RecordingSubmitter {
		submissions: Mutex<Vec<SubmitRequest>>,
	}

	#[async_trait]
	impl JobSubmitter for RecordingSubmitter {
		async fn submit(&self, request: SubmitRequest, _auth: &AuthContext) -> JobResult<String> {
			let mut submissions = self.submissions.lock().await;
			submissions.push(request);
			Ok(format!("job-{}", submissions.len()))
		}
	}

	struct Fixture {
		scheduler: Arc<Scheduler>,
		store: Arc<MemoryJobStore>,
		broker: Arc<QueueBroker>,
		queues: Arc<QueueRegistry>,
		submitter: Arc<RecordingSubmitter>,
	}

	fn fixture() -> Fixture {
		let store = Arc::new(MemoryJobStore::new());
		let broker = Arc::new(QueueBroker::new());
		broker.register_queue(QUEUE);
		let queues = Arc::new(QueueRegistry::new());
		queues.insert(QueueDescriptor::new(
			QUEUE,
			"terminal-record cleanup",
			QueueConfiguration {
				retry_delay_ms: 100,
				..Default::default()
			},
		));
		let submitter = Arc::new(RecordingSubmitter::default());
		let scheduler = Arc::new(Scheduler::new(
			store.clone() as Arc<dyn JobStore>,
			broker.clone(),
			queues.clone(),
			submitter.clone() as Arc<dyn JobSubmitter>,
			SchedulerConfig::default(),
		));
		Fixture {
			scheduler,
			store,
			broker,
			queues,
			submitter,
		}
	}

	async fn seed_active_job(fixture: &Fixture, id: &str, attempts: u32, max_attempts: u32) {
		let now = Utc::now();
		let mut job = Job::new(
			id.to_string(),
			QUEUE.to_string(),
			"cleanup-expired-jobs".to_string(),
			json!({"older_than_days": 30}),
			None,
			&SubmitOptions {
				max_attempts: Some(max_attempts),
				..Default::default()
			},
			now,
		);
		JobPatch::default()
			.status(JobStatus::Active)
			.attempts(attempts)
			.started_at(now)
			.apply(&mut job);
		fixture.store.create(job).await.unwrap();

		fixture.broker.enqueue(QUEUE, id, 0, None, now).await.unwrap();
		fixture
			.broker
			.reserve(QUEUE, chrono::Duration::milliseconds(10), now)
			.await
			.unwrap()
			.unwrap();
	}

	#[test]
	fn five_field_expressions_are_normalized() {
		assert_eq!(
			Scheduler::normalize_expression("0 2 * * *").unwrap(),
			"0 0 2 * * *"
		);
		assert_eq!(
			Scheduler::normalize_expression("*/5 * * * * *").unwrap(),
			"*/5 * * * * *"
		);
		assert!(Scheduler::normalize_expression("not a cron").is_err());
		assert!(Scheduler::normalize_expression("99 * * * *").is_err());
	}

	#[tokio::test]
	async fn invalid_cron_is_rejected_at_registration() {
		let fixture = fixture();
		let err = fixture
			.scheduler
			.schedule_repeating(
				None,
				QUEUE.to_string(),
				"cleanup-expired-jobs".to_string(),
				json!({}),
				"whenever",
			)
			.await
			.unwrap_err();
		assert!(matches!(err, JobError::InvalidCron { .. }));
	}

	#[tokio::test]
	async fn same_expression_registers_independent_entries() {
		let fixture = fixture();
		let first = fixture
			.scheduler
			.schedule_repeating(
				None,
				QUEUE.to_string(),
				"cleanup-expired-jobs".to_string(),
				json!({"older_than_days": 30}),
				"0 2 * * *",
			)
			.await
			.unwrap();
		let second = fixture
			.scheduler
			.schedule_repeating(
				None,
				QUEUE.to_string(),
				"cleanup-expired-jobs".to_string(),
				json!({"older_than_days": 30}),
				"0 2 * * *",
			)
			.await
			.unwrap();
		assert_ne!(first, second);
		assert_eq!(fixture.scheduler.list_schedules().await.len(), 2);
	}

	#[tokio::test]
	async fn cancel_schedule_stops_future_fires() {
		let fixture = fixture();
		let name = fixture
			.scheduler
			.schedule_repeating(
				Some("nightly".to_string()),
				QUEUE.to_string(),
				"cleanup-expired-jobs".to_string(),
				json!({}),
				"0 2 * * *",
			)
			.await
			.unwrap();
		fixture.scheduler.cancel_schedule(&name).await.unwrap();
		assert!(fixture.scheduler.list_schedules().await.is_empty());
		assert!(matches!(
			fixture.scheduler.cancel_schedule(&name).await.unwrap_err(),
			JobError::NotTriggerable(_)
		));
	}

	#[tokio::test]
	async fn trigger_is_admin_only_and_submits_immediately() {
		let fixture = fixture();
		let name = fixture
			.scheduler
			.schedule_repeating(
				Some("nightly".to_string()),
				QUEUE.to_string(),
				"cleanup-expired-jobs".to_string(),
				json!({"older_than_days": 30}),
				"0 2 * * *",
			)
			.await
			.unwrap();

		assert!(matches!(
			fixture
				.scheduler
				.trigger(&name, &AuthContext::owner("u1"))
				.await
				.unwrap_err(),
			JobError::AdminRequired
		));

		fixture.scheduler.trigger(&name, &AuthContext::admin()).await.unwrap();
		let submissions = fixture.submitter.submissions.lock().await;
		assert_eq!(submissions.len(), 1);
		assert_eq!(submissions[0].queue, QUEUE);
		assert_eq!(submissions[0].payload["older_than_days"], 30);
	}

	#[tokio::test]
	async fn cron_loop_fires_due_entries() {
		let fixture = fixture();
		// Every second, seconds-resolution form
		fixture
			.scheduler
			.schedule_repeating(
				Some("tick".to_string()),
				QUEUE.to_string(),
				"cleanup-expired-jobs".to_string(),
				json!({}),
				"* * * * * *",
			)
			.await
			.unwrap();

		let (shutdown_tx, shutdown_rx) = watch::channel(false);
		let handles = fixture.scheduler.clone().start(shutdown_rx);
		tokio::time::sleep(Duration::from_millis(2_200)).await;
		shutdown_tx.send(true).unwrap();
		for handle in handles {
			handle.abort();
		}

		let submissions = fixture.submitter.submissions.lock().await;
		assert!(
			!submissions.is_empty(),
			"expected at least one cron fire in two seconds"
		);
	}

	#[tokio::test]
	async fn stall_sweep_requeues_jobs_with_attempts_left() {
		let fixture = fixture();
		seed_active_job(&fixture, "stalled-1", 1, 3).await;

		let later = Utc::now() + chrono::Duration::seconds(1);
		fixture.scheduler.run_stall_sweep_once(later).await;

		let job = fixture.store.get("stalled-1").await.unwrap().unwrap();
		assert_eq!(job.status, JobStatus::Waiting);
		assert!(job.stalled_at.is_some());
		assert!(job.delay_until.is_some());
		assert_eq!(fixture.broker.sizes(QUEUE).await.unwrap().delayed, 1);
	}

	#[tokio::test]
	async fn stall_sweep_fails_exhausted_jobs() {
		let fixture = fixture();
		seed_active_job(&fixture, "stalled-2", 3, 3).await;

		let later = Utc::now() + chrono::Duration::seconds(1);
		fixture.scheduler.run_stall_sweep_once(later).await;

		let job = fixture.store.get("stalled-2").await.unwrap().unwrap();
		assert_eq!(job.status, JobStatus::Failed);
		assert!(job.error.as_deref().unwrap_or_default().contains("stalled"));
		assert!(job.failed_at.is_some());
		let sizes = fixture.broker.sizes(QUEUE).await.unwrap();
		assert_eq!(sizes.waiting + sizes.active + sizes.delayed, 0);
	}

	#[tokio::test]
	async fn metrics_refresh_updates_descriptor_aggregates() {
		let fixture = fixture();
		let now = Utc::now();
		for i in 0..6 {
			let id = format!("done-{}", i);
			let mut job = Job::new(
				id.clone(),
				QUEUE.to_string(),
				"cleanup-expired-jobs".to_string(),
				json!({}),
				None,
				&SubmitOptions::default(),
				now,
			);
			JobPatch::default()
				.status(JobStatus::Completed)
				.completed_at(now)
				.processing_time_ms(50)
				.apply(&mut job);
			fixture.store.create(job).await.unwrap();
		}

		fixture.scheduler.run_metrics_refresh_once(now).await;

		let descriptor = fixture.queues.get(QUEUE).unwrap();
		assert!((descriptor.processing_rate_per_min - 0.1).abs() < 1e-9);
		assert!((descriptor.avg_processing_time_ms - 50.0).abs() < f64::EPSILON);
		assert_eq!(descriptor.health_status, QueueHealth::Healthy);
		assert!(descriptor.last_health_check.is_some());
		assert!(descriptor.last_processed_at.is_some());
	}

	#[tokio::test]
	async fn retention_trim_honors_the_queue_caps() {
		let fixture = fixture();
		let now = Utc::now();
		// Tighten the caps so the trim has work to do
		let mut descriptor = fixture.queues.get(QUEUE).unwrap();
		descriptor.configuration.retain_completed = 2;
		fixture.queues.update_configuration(QUEUE, descriptor.configuration.clone());

		for i in 0..5 {
			let id = format!("old-{}", i);
			let mut job = Job::new(
				id,
				QUEUE.to_string(),
				"cleanup-expired-jobs".to_string(),
				json!({}),
				None,
				&SubmitOptions::default(),
				now,
			);
			JobPatch::default()
				.status(JobStatus::Completed)
				.completed_at(now + chrono::Duration::seconds(i))
				.apply(&mut job);
			fixture.store.create(job).await.unwrap();
		}

		fixture.scheduler.run_retention_once(now).await;
		assert_eq!(fixture.store.count().await.unwrap(), 2);
	}
}
