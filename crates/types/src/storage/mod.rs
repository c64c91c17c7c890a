//! Storage traits for pluggable job-store implementations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::jobs::{Job, JobFilter, JobPatch, JobStatus, Page};

/// Storage error type
#[derive(Debug, Error)]
pub enum StorageError {
	#[error("record not found: {id}")]
	NotFound { id: String },
	#[error("record already exists: {id}")]
	Duplicate { id: String },
	#[error("storage unavailable: {message}")]
	Unavailable { message: String },
	#[error("storage operation failed: {message}")]
	Operation { message: String },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Group-by dimension for job aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateDimension {
	Status,
	Queue,
	JobType,
}

/// One group-by row: key, count, and mean processing time of the group.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
	pub key: String,
	pub count: usize,
	pub avg_processing_time_ms: f64,
}

/// Windowed per-queue statistics used by the metrics refresh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueWindowStats {
	pub completed: usize,
	pub failed: usize,
	pub total_processing_time_ms: u64,
	pub last_processed_at: Option<DateTime<Utc>>,
}

/// Authoritative persistent record of all jobs
///
/// Guarantees per-id linearizability for reads-after-writes; queries may be
/// eventually consistent with respect to in-flight worker updates.
#[async_trait]
pub trait JobStore: Send + Sync {
	/// Persist a new job; fails with `Duplicate` if the id exists.
	async fn create(&self, job: Job) -> StorageResult<()>;

	/// Fetch a job by id.
	async fn get(&self, id: &str) -> StorageResult<Option<Job>>;

	/// Apply a restricted patch atomically; fails with `NotFound`.
	async fn update(&self, id: &str, patch: JobPatch) -> StorageResult<Job>;

	/// Filtered, sorted, paginated query; returns the page and the total
	/// matching count.
	async fn query(&self, filter: &JobFilter, page: &Page) -> StorageResult<(Vec<Job>, usize)>;

	/// Group-by over the full store.
	async fn aggregate(&self, dimension: AggregateDimension) -> StorageResult<Vec<AggregateRow>>;

	/// Windowed statistics for one queue since `since`.
	async fn stats_for_queue(
		&self,
		queue: &str,
		since: DateTime<Utc>,
	) -> StorageResult<QueueWindowStats>;

	/// All jobs created since `since`, optionally restricted to a queue.
	/// Used by metrics bucketing.
	async fn jobs_since(
		&self,
		queue: Option<&str>,
		since: DateTime<Utc>,
	) -> StorageResult<Vec<Job>>;

	/// Keep the N most recent completed and M most recent failed jobs of a
	/// queue; delete older terminal records. Returns the removed count.
	async fn trim_retention(
		&self,
		queue: &str,
		keep_completed: usize,
		keep_failed: usize,
	) -> StorageResult<usize>;

	/// Hard-delete terminal jobs older than the cutoff.
	async fn expire_older_than(&self, cutoff: DateTime<Utc>) -> StorageResult<usize>;

	/// Hard-delete terminal jobs of one queue older than the cutoff,
	/// optionally restricted to specific statuses. Backs the admin clean
	/// operation.
	async fn clean_queue(
		&self,
		queue: &str,
		older_than: DateTime<Utc>,
		statuses: Option<&[JobStatus]>,
	) -> StorageResult<usize>;

	/// Total number of stored jobs.
	async fn count(&self) -> StorageResult<usize>;

	/// Whether the backing store is reachable.
	async fn health_check(&self) -> StorageResult<bool>;
}
