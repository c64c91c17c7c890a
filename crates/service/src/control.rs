//! Control plane: administrative operations over the store and broker

use async_trait::async_trait;
use chrono::Utc;
use jobq_handlers::HandlerRegistry;
use jobq_types::auth::AuthContext;
use jobq_types::constants;
use jobq_types::jobs::{
	BulkCancelReport, CancelOutcome, Job, JobError, JobFilter, JobPatch, JobResult, JobStatus,
	JobView, Page, Placement, SubmitRequest,
};
use jobq_types::metrics::{HealthSummary, MetricsReport};
use jobq_types::queues::{QueueConfiguration, QueueDescriptor, QueueHealth, QueueSizes};
use jobq_types::storage::JobStore;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::broker::QueueBroker;
use crate::metrics::compute_metrics;
use crate::queues::QueueRegistry;

/// Narrow submission seam the scheduler fires cron entries through.
#[async_trait]
pub trait JobSubmitter: Send + Sync {
	async fn submit(&self, request: SubmitRequest, auth: &AuthContext) -> JobResult<String>;
}

/// A queue descriptor joined with its live broker sizes.
#[derive(Debug, Clone, Serialize)]
pub struct QueueListEntry {
	#[serde(flatten)]
	pub descriptor: QueueDescriptor,
	pub sizes: QueueSizes,
}

/// Per-type rollup inside a queue detail view.
#[derive(Debug, Clone, Serialize)]
pub struct TypeRollup {
	#[serde(rename = "type")]
	pub job_type: String,
	pub count: usize,
	pub avg_processing_time_ms: f64,
}

/// Queue descriptor, live sizes, recent jobs, and per-type rollup.
#[derive(Debug, Clone, Serialize)]
pub struct QueueDetail {
	#[serde(flatten)]
	pub descriptor: QueueDescriptor,
	pub sizes: QueueSizes,
	pub recent_jobs: Vec<JobView>,
	pub types: Vec<TypeRollup>,
}

/// The operations the HTTP adapter calls into
///
/// Authorization is explicit: every operation receives the resolved caller
/// identity, and non-admins may only touch jobs whose owner matches.
#[async_trait]
pub trait ControlPlaneApi: Send + Sync {
	async fn submit(&self, request: SubmitRequest, auth: &AuthContext) -> JobResult<String>;
	async fn inspect(&self, id: &str, auth: &AuthContext) -> JobResult<JobView>;
	async fn cancel(&self, id: &str, auth: &AuthContext) -> JobResult<CancelOutcome>;
	async fn retry(&self, id: &str, auth: &AuthContext) -> JobResult<String>;
	async fn bulk_cancel(&self, ids: &[String], auth: &AuthContext) -> JobResult<BulkCancelReport>;
	async fn list_jobs(
		&self,
		filter: JobFilter,
		page: Page,
		auth: &AuthContext,
	) -> JobResult<(Vec<JobView>, usize)>;
	async fn queue_list(&self, auth: &AuthContext) -> JobResult<Vec<QueueListEntry>>;
	async fn queue_detail(&self, name: &str, auth: &AuthContext) -> JobResult<QueueDetail>;
	async fn pause_queue(&self, name: &str, auth: &AuthContext) -> JobResult<QueueDescriptor>;
	async fn resume_queue(&self, name: &str, auth: &AuthContext) -> JobResult<QueueDescriptor>;
	async fn clean_queue(
		&self,
		name: &str,
		older_than_ms: u64,
		statuses: Option<Vec<JobStatus>>,
		auth: &AuthContext,
	) -> JobResult<usize>;
	async fn update_queue_config(
		&self,
		name: &str,
		configuration: QueueConfiguration,
		auth: &AuthContext,
	) -> JobResult<QueueDescriptor>;
	async fn metrics(
		&self,
		queue: Option<&str>,
		window_hours: u32,
		auth: &AuthContext,
	) -> JobResult<MetricsReport>;
	async fn health_summary(&self) -> JobResult<HealthSummary>;
}

/// Default control plane over the store, broker, and registries.
pub struct ControlPlane {
	store: Arc<dyn JobStore>,
	broker: Arc<QueueBroker>,
	handlers: Arc<HandlerRegistry>,
	queues: Arc<QueueRegistry>,
	payload_limit_bytes: usize,
}

impl ControlPlane {
	pub fn new(
		store: Arc<dyn JobStore>,
		broker: Arc<QueueBroker>,
		handlers: Arc<HandlerRegistry>,
		queues: Arc<QueueRegistry>,
	) -> Self {
		Self {
			store,
			broker,
			handlers,
			queues,
			payload_limit_bytes: constants::DEFAULT_PAYLOAD_LIMIT_BYTES,
		}
	}

	pub fn with_payload_limit(mut self, bytes: usize) -> Self {
		self.payload_limit_bytes = bytes;
		self
	}

	fn require_admin(auth: &AuthContext) -> JobResult<()> {
		if auth.is_admin {
			Ok(())
		} else {
			Err(JobError::AdminRequired)
		}
	}

	fn descriptor(&self, name: &str) -> JobResult<QueueDescriptor> {
		self.queues
			.get(name)
			.ok_or_else(|| JobError::QueueNotFound(name.to_string()))
	}

	async fn placement_of(&self, job: &Job) -> Placement {
		if job.is_terminal() {
			return Placement::Terminal;
		}
		match self.broker.placement(&job.queue, &job.id).await {
			Ok(Some(placement)) => placement,
			// Fall back to the record when the broker has no entry (e.g. a
			// just-reaped stall): derive the closest placement from status.
			_ => match job.status {
				JobStatus::Active => Placement::InFlight,
				_ if job.delay_until.map_or(false, |due| due > Utc::now()) => Placement::Delayed,
				_ => Placement::Waiting,
			},
		}
	}

	async fn view(&self, job: Job) -> JobView {
		let placement = self.placement_of(&job).await;
		JobView::from_job(job, placement)
	}

	/// One id's cancel decision; shared by single and bulk cancel.
	async fn cancel_one(&self, id: &str, auth: &AuthContext) -> CancelOutcome {
		let job = match self.store.get(id).await {
			Ok(Some(job)) => job,
			_ => return CancelOutcome::NotFound,
		};
		if !auth.may_access(job.owner.as_deref()) {
			return CancelOutcome::Forbidden;
		}
		match job.status {
			JobStatus::Active => CancelOutcome::RefusedActive,
			JobStatus::Completed | JobStatus::Failed => CancelOutcome::Skipped,
			JobStatus::Waiting | JobStatus::Stalled => {
				let _ = self.broker.remove(&job.queue, id).await;
				let patch = JobPatch::default()
					.status(JobStatus::Failed)
					.error("cancelled")
					.failed_at(Utc::now());
				match self.store.update(id, patch).await {
					Ok(_) => {
						info!("cancelled job '{}'", id);
						CancelOutcome::Cancelled
					}
					Err(_) => CancelOutcome::NotFound,
				}
			}
		}
	}

	async fn sizes_or_default(&self, queue: &str) -> QueueSizes {
		self.broker.sizes(queue).await.unwrap_or_default()
	}
}

#[async_trait]
impl ControlPlaneApi for ControlPlane {
	async fn submit(&self, request: SubmitRequest, auth: &AuthContext) -> JobResult<String> {
		let descriptor = self
			.queues
			.get(&request.queue)
			.ok_or_else(|| JobError::InvalidQueue(request.queue.clone()))?;

		if !self.handlers.contains(&request.queue, &request.job_type) {
			return Err(JobError::InvalidJobType {
				queue: request.queue.clone(),
				job_type: request.job_type.clone(),
			});
		}

		let size = serde_json::to_vec(&request.payload)
			.map(|bytes| bytes.len())
			.unwrap_or(usize::MAX);
		if size > self.payload_limit_bytes {
			return Err(JobError::PayloadTooLarge {
				size,
				limit: self.payload_limit_bytes,
			});
		}

		if let Some(spec) = self.handlers.spec(&request.queue, &request.job_type) {
			spec.validate_payload(&request.payload)
				.map_err(JobError::Validation)?;
		}

		if let Some(delay_ms) = request.options.delay_ms {
			if delay_ms > constants::MAX_DELAY_MS {
				return Err(JobError::InvalidDelay {
					delay_ms,
					max_ms: constants::MAX_DELAY_MS,
				});
			}
		}

		let now = Utc::now();
		let mut options = request.options.clone();
		if options.max_attempts.is_none() {
			options.max_attempts = Some(descriptor.configuration.retry_attempts);
		}
		let id = options
			.id
			.clone()
			.unwrap_or_else(|| Uuid::new_v4().to_string());

		let job = Job::new(
			id.clone(),
			request.queue.clone(),
			request.job_type.clone(),
			request.payload,
			auth.owner.clone(),
			&options,
			now,
		);
		let priority = job.priority;
		let delay_until = job.delay_until;

		// The record is created first; if the store is down the caller gets
		// the error synchronously and no phantom job exists.
		self.store.create(job).await?;
		self.broker
			.enqueue(&request.queue, &id, priority, delay_until, now)
			.await
			.map_err(|e| JobError::BrokerUnavailable(e.to_string()))?;

		debug!("submitted job '{}' to '{}/{}'", id, request.queue, request.job_type);
		Ok(id)
	}

	async fn inspect(&self, id: &str, auth: &AuthContext) -> JobResult<JobView> {
		let job = self
			.store
			.get(id)
			.await?
			.ok_or_else(|| JobError::NotFound(id.to_string()))?;
		if !auth.may_access(job.owner.as_deref()) {
			return Err(JobError::Forbidden);
		}
		Ok(self.view(job).await)
	}

	async fn cancel(&self, id: &str, auth: &AuthContext) -> JobResult<CancelOutcome> {
		match self.cancel_one(id, auth).await {
			CancelOutcome::NotFound => Err(JobError::NotFound(id.to_string())),
			CancelOutcome::Forbidden => Err(JobError::Forbidden),
			CancelOutcome::RefusedActive => Err(JobError::RefusedActive(id.to_string())),
			outcome => Ok(outcome),
		}
	}

	async fn retry(&self, id: &str, auth: &AuthContext) -> JobResult<String> {
		let job = self
			.store
			.get(id)
			.await?
			.ok_or_else(|| JobError::NotFound(id.to_string()))?;
		if !auth.may_access(job.owner.as_deref()) {
			return Err(JobError::Forbidden);
		}
		if job.status != JobStatus::Failed {
			return Err(JobError::NotRetriable(id.to_string()));
		}

		let now = Utc::now();
		let new_id = Uuid::new_v4().to_string();
		let mut replacement = Job::new(
			new_id.clone(),
			job.queue.clone(),
			job.job_type.clone(),
			job.payload.clone(),
			job.owner.clone(),
			&jobq_types::jobs::SubmitOptions {
				priority: Some(job.priority),
				max_attempts: Some(job.max_attempts),
				..Default::default()
			},
			now,
		);
		replacement.retried_from = Some(job.id.clone());

		self.store.create(replacement).await?;
		self.broker
			.enqueue(&job.queue, &new_id, job.priority, None, now)
			.await
			.map_err(|e| JobError::BrokerUnavailable(e.to_string()))?;
		// The original record is unchanged apart from the linkage.
		self.store
			.update(&job.id, JobPatch::default().retried_as(new_id.clone()))
			.await?;

		info!("retried failed job '{}' as '{}'", id, new_id);
		Ok(new_id)
	}

	async fn bulk_cancel(&self, ids: &[String], auth: &AuthContext) -> JobResult<BulkCancelReport> {
		let mut outcomes = Vec::with_capacity(ids.len());
		for id in ids {
			outcomes.push((id.clone(), self.cancel_one(id, auth).await));
		}
		Ok(BulkCancelReport { outcomes })
	}

	async fn list_jobs(
		&self,
		mut filter: JobFilter,
		page: Page,
		auth: &AuthContext,
	) -> JobResult<(Vec<JobView>, usize)> {
		if !auth.is_admin {
			let owner = auth.owner.clone().ok_or(JobError::AuthRequired)?;
			// Non-admins only ever see their own jobs.
			filter.owner = Some(owner);
		}
		let (jobs, total) = self.store.query(&filter, &page).await?;
		let mut views = Vec::with_capacity(jobs.len());
		for job in jobs {
			views.push(self.view(job).await);
		}
		Ok((views, total))
	}

	async fn queue_list(&self, auth: &AuthContext) -> JobResult<Vec<QueueListEntry>> {
		Self::require_admin(auth)?;
		let mut entries = Vec::new();
		for descriptor in self.queues.list() {
			let sizes = self.sizes_or_default(&descriptor.name).await;
			entries.push(QueueListEntry { descriptor, sizes });
		}
		Ok(entries)
	}

	async fn queue_detail(&self, name: &str, auth: &AuthContext) -> JobResult<QueueDetail> {
		Self::require_admin(auth)?;
		let descriptor = self.descriptor(name)?;
		let sizes = self.sizes_or_default(name).await;

		let filter = JobFilter {
			queue: Some(name.to_string()),
			..Default::default()
		};
		let (recent, _) = self
			.store
			.query(&filter, &Page { page: 1, page_size: 10 })
			.await?;
		let mut recent_jobs = Vec::with_capacity(recent.len());
		for job in recent {
			recent_jobs.push(self.view(job).await);
		}

		let since = Utc::now() - chrono::Duration::hours(24);
		let jobs = self.store.jobs_since(Some(name), since).await?;
		let mut rollup: HashMap<String, (usize, u64, usize)> = HashMap::new();
		for job in &jobs {
			let slot = rollup.entry(job.job_type.clone()).or_default();
			slot.0 += 1;
			if let Some(ms) = job.processing_time_ms {
				slot.1 += ms;
				slot.2 += 1;
			}
		}
		let mut types: Vec<TypeRollup> = rollup
			.into_iter()
			.map(|(job_type, (count, total_ms, timed))| TypeRollup {
				job_type,
				count,
				avg_processing_time_ms: if timed > 0 {
					total_ms as f64 / timed as f64
				} else {
					0.0
				},
			})
			.collect();
		types.sort_by(|a, b| a.job_type.cmp(&b.job_type));

		Ok(QueueDetail {
			descriptor,
			sizes,
			recent_jobs,
			types,
		})
	}

	async fn pause_queue(&self, name: &str, auth: &AuthContext) -> JobResult<QueueDescriptor> {
		Self::require_admin(auth)?;
		self.descriptor(name)?;
		self.broker
			.set_paused(name, true)
			.await
			.map_err(|e| JobError::BrokerUnavailable(e.to_string()))?;
		let descriptor = self
			.queues
			.set_active(name, false)
			.ok_or_else(|| JobError::QueueNotFound(name.to_string()))?;
		info!("paused queue '{}'", name);
		Ok(descriptor)
	}

	async fn resume_queue(&self, name: &str, auth: &AuthContext) -> JobResult<QueueDescriptor> {
		Self::require_admin(auth)?;
		self.descriptor(name)?;
		self.broker
			.set_paused(name, false)
			.await
			.map_err(|e| JobError::BrokerUnavailable(e.to_string()))?;
		let descriptor = self
			.queues
			.set_active(name, true)
			.ok_or_else(|| JobError::QueueNotFound(name.to_string()))?;
		info!("resumed queue '{}'", name);
		Ok(descriptor)
	}

	async fn clean_queue(
		&self,
		name: &str,
		older_than_ms: u64,
		statuses: Option<Vec<JobStatus>>,
		auth: &AuthContext,
	) -> JobResult<usize> {
		Self::require_admin(auth)?;
		self.descriptor(name)?;
		let cutoff = Utc::now() - chrono::Duration::milliseconds(older_than_ms as i64);
		let removed = self
			.store
			.clean_queue(name, cutoff, statuses.as_deref())
			.await?;
		info!("cleaned {} terminal jobs from '{}'", removed, name);
		Ok(removed)
	}

	async fn update_queue_config(
		&self,
		name: &str,
		configuration: QueueConfiguration,
		auth: &AuthContext,
	) -> JobResult<QueueDescriptor> {
		Self::require_admin(auth)?;
		self.descriptor(name)?;
		configuration.validate().map_err(JobError::InvalidConfig)?;
		// Worker-pool concurrency picks the new value up at the next
		// process start; retry and retention knobs apply immediately.
		self.queues
			.update_configuration(name, configuration)
			.ok_or_else(|| JobError::QueueNotFound(name.to_string()))
	}

	async fn metrics(
		&self,
		queue: Option<&str>,
		window_hours: u32,
		auth: &AuthContext,
	) -> JobResult<MetricsReport> {
		Self::require_admin(auth)?;
		if let Some(queue) = queue {
			self.descriptor(queue)?;
		}
		let window_hours = window_hours.clamp(1, 24 * 7);
		let now = Utc::now();
		let since = now - chrono::Duration::hours(window_hours as i64);
		let jobs = self.store.jobs_since(queue, since).await?;
		Ok(compute_metrics(&jobs, queue, window_hours, now))
	}

	async fn health_summary(&self) -> JobResult<HealthSummary> {
		let mut per_queue = HashMap::new();
		let mut overall = QueueHealth::Healthy;
		for descriptor in self.queues.list() {
			let health = descriptor.health_status;
			match (overall, health) {
				(_, QueueHealth::Error) => overall = QueueHealth::Error,
				(QueueHealth::Healthy, QueueHealth::Warning) => overall = QueueHealth::Warning,
				_ => {}
			}
			per_queue.insert(descriptor.name, health);
		}
		Ok(HealthSummary { overall, per_queue })
	}
}

#[async_trait]
impl JobSubmitter for ControlPlane {
	async fn submit(&self, request: SubmitRequest, auth: &AuthContext) -> JobResult<String> {
		ControlPlaneApi::submit(self, request, auth).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use jobq_handlers::{HandlerInvocation, JobHandler};
	use jobq_storage::MemoryJobStore;
	use jobq_types::jobs::SubmitOptions;
	use jobq_types::registry::JobTypeSpec;
	use serde_json::{json, Value};

	struct NoopHandler;

	#[async_trait]
	impl JobHandler for NoopHandler {
		async fn call(&self, _invocation: HandlerInvocation) -> Result<Value, jobq_types::jobs::HandlerError> {
			Ok(Value::Null)
		}
	}

	fn fixture() -> (ControlPlane, Arc<MemoryJobStore>, Arc<QueueBroker>) {
		let store = Arc::new(MemoryJobStore::new());
		let broker = Arc::new(QueueBroker::new());
		let queues = Arc::new(QueueRegistry::new());
		for name in ["notifications", "cleanup"] {
			broker.register_queue(name);
			queues.insert(QueueDescriptor::new(name, "", QueueConfiguration::default()));
		}

		let mut handlers = HandlerRegistry::new();
		handlers.register(
			"notifications",
			"send-notification",
			JobTypeSpec {
				url: "http://worker.internal/run".to_string(),
				method: Default::default(),
				headers: Default::default(),
				timeout_ms: None,
				required_fields: vec!["user".to_string()],
			},
			Arc::new(NoopHandler),
		);

		let control = ControlPlane::new(
			store.clone() as Arc<dyn JobStore>,
			broker.clone(),
			Arc::new(handlers),
			queues,
		);
		(control, store, broker)
	}

	fn request(delay_ms: Option<u64>) -> SubmitRequest {
		SubmitRequest {
			queue: "notifications".to_string(),
			job_type: "send-notification".to_string(),
			payload: json!({"user": "u1", "msg": "hi"}),
			options: SubmitOptions {
				delay_ms,
				..Default::default()
			},
		}
	}

	#[tokio::test]
	async fn submit_then_inspect_round_trips() {
		let (control, _, _) = fixture();
		let auth = AuthContext::owner("u1");

		let id = ControlPlaneApi::submit(&control, request(None), &auth).await.unwrap();
		let view = control.inspect(&id, &auth).await.unwrap();
		assert_eq!(view.queue, "notifications");
		assert_eq!(view.job_type, "send-notification");
		assert_eq!(view.payload["user"], "u1");
		assert_eq!(view.owner.as_deref(), Some("u1"));
		assert_eq!(view.status, JobStatus::Waiting);
		assert_eq!(view.placement, Placement::Waiting);
	}

	#[tokio::test]
	async fn submit_rejects_unknown_queue_and_type() {
		let (control, _, _) = fixture();
		let auth = AuthContext::owner("u1");

		let mut bad_queue = request(None);
		bad_queue.queue = "nope".to_string();
		assert!(matches!(
			ControlPlaneApi::submit(&control, bad_queue, &auth).await.unwrap_err(),
			JobError::InvalidQueue(_)
		));

		let mut bad_type = request(None);
		bad_type.job_type = "nope".to_string();
		assert!(matches!(
			ControlPlaneApi::submit(&control, bad_type, &auth).await.unwrap_err(),
			JobError::InvalidJobType { .. }
		));
	}

	#[tokio::test]
	async fn submit_validates_payload_against_required_fields() {
		let (control, _, _) = fixture();
		let auth = AuthContext::owner("u1");

		let mut missing = request(None);
		missing.payload = json!({"msg": "hi"});
		assert!(matches!(
			ControlPlaneApi::submit(&control, missing, &auth).await.unwrap_err(),
			JobError::Validation(_)
		));
	}

	#[tokio::test]
	async fn submit_rejects_oversized_payloads() {
		let (control, _, _) = fixture();
		let control = control.with_payload_limit(64);
		let auth = AuthContext::owner("u1");

		let mut big = request(None);
		big.payload = json!({"user": "u1", "blob": "x".repeat(256)});
		assert!(matches!(
			ControlPlaneApi::submit(&control, big, &auth).await.unwrap_err(),
			JobError::PayloadTooLarge { .. }
		));
	}

	#[tokio::test]
	async fn delay_bounds_are_enforced() {
		let (control, _, broker) = fixture();
		let auth = AuthContext::owner("u1");

		let over = constants::MAX_DELAY_MS + 1;
		assert!(matches!(
			ControlPlaneApi::submit(&control, request(Some(over)), &auth).await.unwrap_err(),
			JobError::InvalidDelay { .. }
		));

		// Zero delay is immediately ready
		let id = ControlPlaneApi::submit(&control, request(Some(0)), &auth).await.unwrap();
		assert_eq!(
			broker.placement("notifications", &id).await.unwrap(),
			Some(Placement::Waiting)
		);
	}

	#[tokio::test]
	async fn duplicate_caller_supplied_id_is_rejected() {
		let (control, _, _) = fixture();
		let auth = AuthContext::owner("u1");

		let mut first = request(None);
		first.options.id = Some("fixed".to_string());
		ControlPlaneApi::submit(&control, first.clone(), &auth).await.unwrap();
		assert!(matches!(
			ControlPlaneApi::submit(&control, first, &auth).await.unwrap_err(),
			JobError::Duplicate(_)
		));
	}

	#[tokio::test]
	async fn inspect_enforces_ownership() {
		let (control, _, _) = fixture();
		let id = ControlPlaneApi::submit(&control, request(None), &AuthContext::owner("u1"))
			.await
			.unwrap();

		assert!(matches!(
			control.inspect(&id, &AuthContext::owner("u2")).await.unwrap_err(),
			JobError::Forbidden
		));
		// Admins see everything
		assert!(control.inspect(&id, &AuthContext::admin()).await.is_ok());
	}

	#[tokio::test]
	async fn cancel_delayed_job_removes_it_from_the_broker() {
		let (control, store, broker) = fixture();
		let auth = AuthContext::owner("u1");

		let id = ControlPlaneApi::submit(&control, request(Some(60_000)), &auth).await.unwrap();
		assert_eq!(broker.sizes("notifications").await.unwrap().delayed, 1);

		let outcome = control.cancel(&id, &auth).await.unwrap();
		assert_eq!(outcome, CancelOutcome::Cancelled);
		assert_eq!(broker.sizes("notifications").await.unwrap().delayed, 0);

		let job = store.get(&id).await.unwrap().unwrap();
		assert_eq!(job.status, JobStatus::Failed);
		assert_eq!(job.error.as_deref(), Some("cancelled"));
	}

	#[tokio::test]
	async fn cancel_active_job_is_refused() {
		let (control, store, broker) = fixture();
		let auth = AuthContext::owner("u1");

		let id = ControlPlaneApi::submit(&control, request(None), &auth).await.unwrap();
		broker
			.reserve("notifications", chrono::Duration::seconds(30), Utc::now())
			.await
			.unwrap()
			.unwrap();
		store
			.update(&id, JobPatch::default().status(JobStatus::Active).started_at(Utc::now()))
			.await
			.unwrap();

		assert!(matches!(
			control.cancel(&id, &auth).await.unwrap_err(),
			JobError::RefusedActive(_)
		));
	}

	#[tokio::test]
	async fn bulk_cancel_partitions_outcomes() {
		let (control, store, broker) = fixture();
		let auth = AuthContext::owner("u1");

		let waiting = ControlPlaneApi::submit(&control, request(None), &auth).await.unwrap();
		let delayed = ControlPlaneApi::submit(&control, request(Some(60_000)), &auth).await.unwrap();
		let active = ControlPlaneApi::submit(&control, request(None), &auth).await.unwrap();
		// Reserve until `active` is in flight (FIFO pops `waiting` first)
		loop {
			let reserved = broker
				.reserve("notifications", chrono::Duration::seconds(30), Utc::now())
				.await
				.unwrap()
				.unwrap();
			if reserved.id == active {
				break;
			}
			broker.ack("notifications", &reserved.id, &reserved.token).await.unwrap();
		}
		store
			.update(&active, JobPatch::default().status(JobStatus::Active).started_at(Utc::now()))
			.await
			.unwrap();
		let done = ControlPlaneApi::submit(&control, request(None), &auth).await.unwrap();
		store
			.update(
				&done,
				JobPatch::default().status(JobStatus::Completed).completed_at(Utc::now()),
			)
			.await
			.unwrap();

		let ids = vec![
			waiting.clone(),
			delayed.clone(),
			active.clone(),
			done.clone(),
			"missing".to_string(),
		];
		let report = control.bulk_cancel(&ids, &auth).await.unwrap();
		let outcome_of = |id: &str| {
			report
				.outcomes
				.iter()
				.find(|(i, _)| i == id)
				.map(|(_, o)| *o)
				.unwrap()
		};
		assert_eq!(outcome_of(&waiting), CancelOutcome::Cancelled);
		assert_eq!(outcome_of(&delayed), CancelOutcome::Cancelled);
		assert_eq!(outcome_of(&active), CancelOutcome::RefusedActive);
		assert_eq!(outcome_of(&done), CancelOutcome::Skipped);
		assert_eq!(outcome_of("missing"), CancelOutcome::NotFound);
		assert_eq!(report.cancelled_count(), 2);
	}

	#[tokio::test]
	async fn retry_clones_the_job_with_linkage() {
		let (control, store, broker) = fixture();
		let auth = AuthContext::owner("u1");

		let id = ControlPlaneApi::submit(&control, request(None), &auth).await.unwrap();
		broker.remove("notifications", &id).await.unwrap();
		store
			.update(
				&id,
				JobPatch::default()
					.status(JobStatus::Failed)
					.error("worker returned 500")
					.failed_at(Utc::now()),
			)
			.await
			.unwrap();

		let new_id = control.retry(&id, &auth).await.unwrap();
		assert_ne!(new_id, id);

		let original = store.get(&id).await.unwrap().unwrap();
		assert_eq!(original.status, JobStatus::Failed);
		assert_eq!(original.retried_as.as_deref(), Some(new_id.as_str()));

		let replacement = store.get(&new_id).await.unwrap().unwrap();
		assert_eq!(replacement.status, JobStatus::Waiting);
		assert_eq!(replacement.attempts, 0);
		assert_eq!(replacement.retried_from.as_deref(), Some(id.as_str()));
		assert_eq!(replacement.payload, original.payload);

		// Retrying again yields an independent fresh id
		let another = control.retry(&id, &auth).await.unwrap();
		assert_ne!(another, new_id);
	}

	#[tokio::test]
	async fn retry_requires_a_failed_job() {
		let (control, _, _) = fixture();
		let auth = AuthContext::owner("u1");
		let id = ControlPlaneApi::submit(&control, request(None), &auth).await.unwrap();
		assert!(matches!(
			control.retry(&id, &auth).await.unwrap_err(),
			JobError::NotRetriable(_)
		));
	}

	#[tokio::test]
	async fn list_jobs_scopes_non_admins_to_their_owner() {
		let (control, _, _) = fixture();
		ControlPlaneApi::submit(&control, request(None), &AuthContext::owner("u1")).await.unwrap();
		ControlPlaneApi::submit(&control, request(None), &AuthContext::owner("u2")).await.unwrap();

		let (views, total) = control
			.list_jobs(JobFilter::default(), Page::default(), &AuthContext::owner("u1"))
			.await
			.unwrap();
		assert_eq!(total, 1);
		assert_eq!(views[0].owner.as_deref(), Some("u1"));

		let (_, admin_total) = control
			.list_jobs(JobFilter::default(), Page::default(), &AuthContext::admin())
			.await
			.unwrap();
		assert_eq!(admin_total, 2);
	}

	#[tokio::test]
	async fn queue_management_requires_admin() {
		let (control, _, _) = fixture();
		let auth = AuthContext::owner("u1");
		assert!(matches!(
			control.queue_list(&auth).await.unwrap_err(),
			JobError::AdminRequired
		));
		assert!(matches!(
			control.pause_queue("notifications", &auth).await.unwrap_err(),
			JobError::AdminRequired
		));
	}

	#[tokio::test]
	async fn pause_flips_descriptor_and_broker_state() {
		let (control, _, broker) = fixture();
		let admin = AuthContext::admin();

		let descriptor = control.pause_queue("notifications", &admin).await.unwrap();
		assert!(!descriptor.is_active);
		assert!(broker.is_paused("notifications").await.unwrap());

		let descriptor = control.resume_queue("notifications", &admin).await.unwrap();
		assert!(descriptor.is_active);
		assert!(!broker.is_paused("notifications").await.unwrap());
	}

	#[tokio::test]
	async fn update_queue_config_validates() {
		let (control, _, _) = fixture();
		let admin = AuthContext::admin();

		let bad = QueueConfiguration {
			concurrency: 0,
			..Default::default()
		};
		assert!(matches!(
			control.update_queue_config("notifications", bad, &admin).await.unwrap_err(),
			JobError::InvalidConfig(_)
		));

		let good = QueueConfiguration {
			concurrency: 8,
			..Default::default()
		};
		let descriptor = control
			.update_queue_config("notifications", good, &admin)
			.await
			.unwrap();
		assert_eq!(descriptor.configuration.concurrency, 8);
	}
}
