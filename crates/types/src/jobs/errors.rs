//! Error taxonomy for the orchestration core

use thiserror::Error;

/// Result type for control-plane operations
pub type JobResult<T> = Result<T, JobError>;

/// Errors surfaced by the control plane and its collaborators
///
/// Validation and authorization errors surface synchronously to the caller;
/// handler errors are absorbed into the job record and never appear here.
#[derive(Debug, Error)]
pub enum JobError {
	// Validation
	#[error("unknown queue '{0}'")]
	InvalidQueue(String),
	#[error("queue '{queue}' does not accept job type '{job_type}'")]
	InvalidJobType { queue: String, job_type: String },
	#[error("delay of {delay_ms}ms exceeds the maximum of {max_ms}ms")]
	InvalidDelay { delay_ms: u64, max_ms: u64 },
	#[error("invalid cron expression '{expression}': {reason}")]
	InvalidCron { expression: String, reason: String },
	#[error("payload of {size} bytes exceeds the limit of {limit} bytes")]
	PayloadTooLarge { size: usize, limit: usize },
	#[error("validation failed: {0}")]
	Validation(String),

	// Authorization
	#[error("authentication required")]
	AuthRequired,
	#[error("forbidden")]
	Forbidden,
	#[error("administrator privileges required")]
	AdminRequired,

	// State
	#[error("job '{0}' not found")]
	NotFound(String),
	#[error("job '{0}' already exists")]
	Duplicate(String),
	#[error("job '{0}' is active and cannot be cancelled")]
	RefusedActive(String),
	#[error("job '{0}' is not in a retriable state")]
	NotRetriable(String),
	#[error("no triggerable schedule named '{0}'")]
	NotTriggerable(String),
	#[error("queue '{0}' not found")]
	QueueNotFound(String),
	#[error("invalid queue configuration: {0}")]
	InvalidConfig(String),

	// Infrastructure
	#[error("job store unavailable: {0}")]
	StoreUnavailable(String),
	#[error("queue broker unavailable: {0}")]
	BrokerUnavailable(String),
}

impl JobError {
	/// Stable machine-readable code for the HTTP surface.
	pub fn code(&self) -> &'static str {
		match self {
			JobError::InvalidQueue(_) => "INVALID_QUEUE",
			JobError::InvalidJobType { .. } => "INVALID_JOB_TYPE",
			JobError::InvalidDelay { .. } => "INVALID_DELAY",
			JobError::InvalidCron { .. } => "INVALID_CRON",
			JobError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
			JobError::Validation(_) => "VALIDATION",
			JobError::AuthRequired => "AUTH_REQUIRED",
			JobError::Forbidden => "FORBIDDEN",
			JobError::AdminRequired => "ADMIN_REQUIRED",
			JobError::NotFound(_) => "NOT_FOUND",
			JobError::Duplicate(_) => "DUPLICATE",
			JobError::RefusedActive(_) => "REFUSED_ACTIVE",
			JobError::NotRetriable(_) => "NOT_RETRIABLE",
			JobError::NotTriggerable(_) => "NOT_TRIGGERABLE",
			JobError::QueueNotFound(_) => "QUEUE_NOT_FOUND",
			JobError::InvalidConfig(_) => "INVALID_CONFIG",
			JobError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
			JobError::BrokerUnavailable(_) => "BROKER_UNAVAILABLE",
		}
	}
}

impl From<crate::storage::StorageError> for JobError {
	fn from(err: crate::storage::StorageError) -> Self {
		match err {
			crate::storage::StorageError::NotFound { id } => JobError::NotFound(id),
			crate::storage::StorageError::Duplicate { id } => JobError::Duplicate(id),
			other => JobError::StoreUnavailable(other.to_string()),
		}
	}
}

/// Errors a job handler reports back to the worker pool
///
/// The retriable/fatal split drives the retry decision: a fatal error skips
/// the remaining attempts and goes straight to `failed`.
#[derive(Debug, Error)]
pub enum HandlerError {
	#[error("retriable handler failure: {0}")]
	Retriable(String),
	#[error("fatal handler failure: {0}")]
	Fatal(String),
	#[error("handler exceeded its {timeout_ms}ms deadline")]
	Timeout { timeout_ms: u64 },
}

impl HandlerError {
	pub fn is_fatal(&self) -> bool {
		matches!(self, HandlerError::Fatal(_))
	}
}
