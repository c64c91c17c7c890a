//! Job views returned by the control plane

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Job, JobStatus, Placement};

/// A job record merged with its live broker placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobView {
	pub id: String,
	pub queue: String,
	#[serde(rename = "type")]
	pub job_type: String,
	pub payload: Value,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub owner: Option<String>,
	pub status: JobStatus,
	pub placement: Placement,
	pub priority: i32,
	pub attempts: u32,
	pub max_attempts: u32,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub delay_until: Option<DateTime<Utc>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub processing_time_ms: Option<u64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub retried_as: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub retried_from: Option<String>,
	pub created_at: DateTime<Utc>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub started_at: Option<DateTime<Utc>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub completed_at: Option<DateTime<Utc>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub failed_at: Option<DateTime<Utc>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub stalled_at: Option<DateTime<Utc>>,
}

impl JobView {
	pub fn from_job(job: Job, placement: Placement) -> Self {
		Self {
			id: job.id,
			queue: job.queue,
			job_type: job.job_type,
			payload: job.payload,
			owner: job.owner,
			status: job.status,
			placement,
			priority: job.priority,
			attempts: job.attempts,
			max_attempts: job.max_attempts,
			delay_until: job.delay_until,
			result: job.result,
			error: job.error,
			processing_time_ms: job.processing_time_ms,
			retried_as: job.retried_as,
			retried_from: job.retried_from,
			created_at: job.created_at,
			started_at: job.started_at,
			completed_at: job.completed_at,
			failed_at: job.failed_at,
			stalled_at: job.stalled_at,
		}
	}
}

/// Per-id outcome of a cancel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelOutcome {
	/// The job was removed from the broker and marked failed/cancelled.
	Cancelled,
	/// The job is running; the handler call cannot be preempted.
	RefusedActive,
	/// The job was already terminal; nothing to do.
	Skipped,
	NotFound,
	Forbidden,
}

/// Outcome of a bulk-cancel call, one entry per requested id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkCancelReport {
	pub outcomes: Vec<(String, CancelOutcome)>,
}

impl BulkCancelReport {
	pub fn cancelled_count(&self) -> usize {
		self.outcomes
			.iter()
			.filter(|(_, o)| *o == CancelOutcome::Cancelled)
			.count()
	}
}
