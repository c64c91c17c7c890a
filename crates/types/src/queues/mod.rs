//! Queue descriptors and per-queue configuration

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One record per named queue
///
/// Created lazily on first use from configuration. The aggregate fields are
/// refreshed by the scheduler's metrics task; live counts are derived from
/// the broker and store on demand and must never drive dispatch decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueDescriptor {
	pub name: String,
	pub description: String,
	/// Pause flag; workers skip reservation while false.
	pub is_active: bool,
	pub configuration: QueueConfiguration,
	pub processing_rate_per_min: f64,
	pub avg_processing_time_ms: f64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub last_processed_at: Option<DateTime<Utc>>,
	pub health_status: QueueHealth,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub last_health_check: Option<DateTime<Utc>>,
}

impl QueueDescriptor {
	pub fn new(name: impl Into<String>, description: impl Into<String>, configuration: QueueConfiguration) -> Self {
		Self {
			name: name.into(),
			description: description.into(),
			is_active: true,
			configuration,
			processing_rate_per_min: 0.0,
			avg_processing_time_ms: 0.0,
			last_processed_at: None,
			health_status: QueueHealth::Healthy,
			last_health_check: None,
		}
	}
}

/// Dispatch and retention knobs for one queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfiguration {
	/// Number of concurrent worker slots.
	pub concurrency: usize,
	/// Default `max_attempts` for jobs submitted without an override.
	pub retry_attempts: u32,
	/// Base delay for the exponential retry backoff.
	pub retry_delay_ms: u64,
	/// How many recent completed jobs retention keeps.
	pub retain_completed: usize,
	/// How many recent failed jobs retention keeps.
	pub retain_failed: usize,
	/// Per-attempt handler deadline.
	pub job_timeout_ms: u64,
}

impl Default for QueueConfiguration {
	fn default() -> Self {
		Self {
			concurrency: crate::constants::DEFAULT_QUEUE_CONCURRENCY,
			retry_attempts: crate::constants::DEFAULT_MAX_ATTEMPTS,
			retry_delay_ms: crate::constants::DEFAULT_RETRY_DELAY_MS,
			retain_completed: crate::constants::DEFAULT_RETAIN_COMPLETED,
			retain_failed: crate::constants::DEFAULT_RETAIN_FAILED,
			job_timeout_ms: crate::constants::DEFAULT_JOB_TIMEOUT_MS,
		}
	}
}

impl QueueConfiguration {
	/// Reject configurations the worker pool cannot honor.
	pub fn validate(&self) -> Result<(), String> {
		if self.concurrency == 0 {
			return Err("concurrency must be at least 1".to_string());
		}
		if self.retry_attempts == 0 {
			return Err("retry_attempts must be at least 1".to_string());
		}
		if self.retry_delay_ms == 0 {
			return Err("retry_delay_ms must be positive".to_string());
		}
		if self.job_timeout_ms == 0 {
			return Err("job_timeout_ms must be positive".to_string());
		}
		Ok(())
	}
}

/// Health classification computed during metrics refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueHealth {
	Healthy,
	Warning,
	Error,
}

/// Live per-queue set sizes derived from the broker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSizes {
	pub waiting: usize,
	pub active: usize,
	pub delayed: usize,
}
