//! Core Job domain model and state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod errors;
pub mod request;
pub mod response;

pub use errors::{HandlerError, JobError, JobResult};
pub use request::{JobFilter, JobSort, Page, SubmitOptions, SubmitRequest};
pub use response::{BulkCancelReport, CancelOutcome, JobView};

/// Version stamped on every persisted job record so stores can migrate
/// the layout later.
pub const JOB_RECORD_VERSION: u16 = 1;

/// Core Job domain model
///
/// One record per submission. Created by the control plane, mutated only by
/// the worker pool (status, timings, attempts, result/error) and the
/// scheduler (stall sweep), removed only by retention or admin purge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
	pub id: String,
	pub queue: String,
	pub job_type: String,
	/// Opaque structured payload; stored unchanged.
	pub payload: Value,
	/// Producer identity, used for authorization and per-owner queries.
	pub owner: Option<String>,
	pub status: JobStatus,
	/// Larger values dispatch earlier within the same queue.
	pub priority: i32,
	pub attempts: u32,
	pub max_attempts: u32,
	/// The job is ineligible for reservation before this instant.
	pub delay_until: Option<DateTime<Utc>>,
	/// Present iff `status == Completed`.
	pub result: Option<Value>,
	/// Present when the last attempt failed or the job is terminal-failed.
	pub error: Option<String>,
	/// Duration of the most recent successful run.
	pub processing_time_ms: Option<u64>,
	/// Id of the replacement record created by an admin retry.
	pub retried_as: Option<String>,
	/// Id of the failed record this job was retried from.
	pub retried_from: Option<String>,
	pub created_at: DateTime<Utc>,
	pub started_at: Option<DateTime<Utc>>,
	pub completed_at: Option<DateTime<Utc>>,
	pub failed_at: Option<DateTime<Utc>>,
	pub stalled_at: Option<DateTime<Utc>>,
	pub record_version: u16,
}

/// Job lifecycle status
///
/// `Waiting` is the initial state; `Completed` and `Failed` are terminal.
/// `Stalled` marks an in-flight job whose lease expired; the stall sweep
/// either requeues it or fails it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
	Waiting,
	Active,
	Completed,
	Failed,
	Stalled,
}

impl JobStatus {
	pub fn is_terminal(&self) -> bool {
		matches!(self, JobStatus::Completed | JobStatus::Failed)
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			JobStatus::Waiting => "waiting",
			JobStatus::Active => "active",
			JobStatus::Completed => "completed",
			JobStatus::Failed => "failed",
			JobStatus::Stalled => "stalled",
		}
	}
}

impl std::str::FromStr for JobStatus {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"waiting" => Ok(JobStatus::Waiting),
			"active" => Ok(JobStatus::Active),
			"completed" => Ok(JobStatus::Completed),
			"failed" => Ok(JobStatus::Failed),
			"stalled" => Ok(JobStatus::Stalled),
			other => Err(format!("unknown job status '{}'", other)),
		}
	}
}

/// Where a job currently sits in the broker, merged into inspect views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
	Waiting,
	Delayed,
	InFlight,
	Terminal,
}

impl Job {
	/// Create a new job in `Waiting` with the given identity and options.
	pub fn new(
		id: String,
		queue: String,
		job_type: String,
		payload: Value,
		owner: Option<String>,
		options: &SubmitOptions,
		now: DateTime<Utc>,
	) -> Self {
		Self {
			id,
			queue,
			job_type,
			payload,
			owner,
			status: JobStatus::Waiting,
			priority: options.priority.unwrap_or(0),
			attempts: 0,
			max_attempts: options.max_attempts.unwrap_or(crate::constants::DEFAULT_MAX_ATTEMPTS),
			delay_until: options
				.delay_ms
				.map(|ms| now + chrono::Duration::milliseconds(ms as i64)),
			result: None,
			error: None,
			processing_time_ms: None,
			retried_as: None,
			retried_from: None,
			created_at: now,
			started_at: None,
			completed_at: None,
			failed_at: None,
			stalled_at: None,
			record_version: JOB_RECORD_VERSION,
		}
	}

	pub fn is_terminal(&self) -> bool {
		self.status.is_terminal()
	}
}

/// Restricted patch over the mutable job fields
///
/// Building a patch is the only way the worker pool and scheduler mutate a
/// record; immutable fields (id, queue, type, payload, owner, created_at)
/// have no counterpart here. `Some` means "set"; `None` means "leave as is".
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
	pub status: Option<JobStatus>,
	pub attempts: Option<u32>,
	pub delay_until: Option<Option<DateTime<Utc>>>,
	pub result: Option<Option<Value>>,
	pub error: Option<Option<String>>,
	pub processing_time_ms: Option<u64>,
	pub retried_as: Option<String>,
	pub started_at: Option<DateTime<Utc>>,
	pub completed_at: Option<DateTime<Utc>>,
	pub failed_at: Option<DateTime<Utc>>,
	pub stalled_at: Option<DateTime<Utc>>,
}

impl JobPatch {
	/// Apply this patch to a job record in place.
	pub fn apply(&self, job: &mut Job) {
		if let Some(status) = self.status {
			job.status = status;
		}
		if let Some(attempts) = self.attempts {
			job.attempts = attempts;
		}
		if let Some(ref delay_until) = self.delay_until {
			job.delay_until = *delay_until;
		}
		if let Some(ref result) = self.result {
			job.result = result.clone();
		}
		if let Some(ref error) = self.error {
			job.error = error.clone();
		}
		if let Some(ms) = self.processing_time_ms {
			job.processing_time_ms = Some(ms);
		}
		if let Some(ref retried_as) = self.retried_as {
			job.retried_as = Some(retried_as.clone());
		}
		if let Some(at) = self.started_at {
			job.started_at = Some(at);
		}
		if let Some(at) = self.completed_at {
			job.completed_at = Some(at);
		}
		if let Some(at) = self.failed_at {
			job.failed_at = Some(at);
		}
		if let Some(at) = self.stalled_at {
			job.stalled_at = Some(at);
		}
	}

	pub fn status(mut self, status: JobStatus) -> Self {
		self.status = Some(status);
		self
	}

	pub fn attempts(mut self, attempts: u32) -> Self {
		self.attempts = Some(attempts);
		self
	}

	pub fn delay_until(mut self, delay_until: Option<DateTime<Utc>>) -> Self {
		self.delay_until = Some(delay_until);
		self
	}

	pub fn result(mut self, result: Value) -> Self {
		self.result = Some(Some(result));
		self
	}

	pub fn error(mut self, error: impl Into<String>) -> Self {
		self.error = Some(Some(error.into()));
		self
	}

	pub fn clear_error(mut self) -> Self {
		self.error = Some(None);
		self
	}

	pub fn processing_time_ms(mut self, ms: u64) -> Self {
		self.processing_time_ms = Some(ms);
		self
	}

	pub fn retried_as(mut self, id: impl Into<String>) -> Self {
		self.retried_as = Some(id.into());
		self
	}

	pub fn started_at(mut self, at: DateTime<Utc>) -> Self {
		self.started_at = Some(at);
		self
	}

	pub fn completed_at(mut self, at: DateTime<Utc>) -> Self {
		self.completed_at = Some(at);
		self
	}

	pub fn failed_at(mut self, at: DateTime<Utc>) -> Self {
		self.failed_at = Some(at);
		self
	}

	pub fn stalled_at(mut self, at: DateTime<Utc>) -> Self {
		self.stalled_at = Some(at);
		self
	}
}
