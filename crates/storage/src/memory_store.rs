//! In-memory job store implementation using DashMap

use crate::traits::{
	AggregateDimension, AggregateRow, JobStore, QueueWindowStats, StorageError, StorageResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use jobq_types::jobs::{Job, JobFilter, JobPatch, JobSort, JobStatus, Page};
use std::sync::Arc;
use tracing::debug;

/// In-memory store keyed by job id
///
/// Per-id updates are atomic through the map's entry lock, which gives the
/// CAS-equivalent write semantics the trait requires. Queries scan and are
/// eventually consistent with concurrent worker writes.
#[derive(Clone, Default)]
pub struct MemoryJobStore {
	jobs: Arc<DashMap<String, Job>>,
}

impl MemoryJobStore {
	pub fn new() -> Self {
		Self {
			jobs: Arc::new(DashMap::new()),
		}
	}

	fn matches(filter: &JobFilter, job: &Job) -> bool {
		if let Some(ref owner) = filter.owner {
			if job.owner.as_deref() != Some(owner.as_str()) {
				return false;
			}
		}
		if let Some(ref queue) = filter.queue {
			if &job.queue != queue {
				return false;
			}
		}
		if let Some(ref job_type) = filter.job_type {
			if &job.job_type != job_type {
				return false;
			}
		}
		if let Some(status) = filter.status {
			if job.status != status {
				return false;
			}
		}
		if let Some(after) = filter.created_after {
			if job.created_at < after {
				return false;
			}
		}
		if let Some(before) = filter.created_before {
			if job.created_at > before {
				return false;
			}
		}
		true
	}

	/// The instant a terminal record became terminal.
	fn terminal_at(job: &Job) -> Option<DateTime<Utc>> {
		match job.status {
			JobStatus::Completed => job.completed_at,
			JobStatus::Failed => job.failed_at,
			_ => None,
		}
	}
}

#[async_trait]
impl JobStore for MemoryJobStore {
	async fn create(&self, job: Job) -> StorageResult<()> {
		match self.jobs.entry(job.id.clone()) {
			dashmap::mapref::entry::Entry::Occupied(_) => Err(StorageError::Duplicate { id: job.id }),
			dashmap::mapref::entry::Entry::Vacant(slot) => {
				slot.insert(job);
				Ok(())
			}
		}
	}

	async fn get(&self, id: &str) -> StorageResult<Option<Job>> {
		Ok(self.jobs.get(id).map(|j| j.clone()))
	}

	async fn update(&self, id: &str, patch: JobPatch) -> StorageResult<Job> {
		let mut entry = self
			.jobs
			.get_mut(id)
			.ok_or_else(|| StorageError::NotFound { id: id.to_string() })?;
		patch.apply(entry.value_mut());
		Ok(entry.value().clone())
	}

	async fn query(&self, filter: &JobFilter, page: &Page) -> StorageResult<(Vec<Job>, usize)> {
		let mut matching: Vec<Job> = self
			.jobs
			.iter()
			.filter(|entry| Self::matches(filter, entry.value()))
			.map(|entry| entry.value().clone())
			.collect();

		match filter.sort {
			JobSort::CreatedAtDesc => {
				matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)))
			}
			JobSort::CreatedAtAsc => {
				matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
			}
		}

		let total = matching.len();
		let start = page.offset().min(total);
		let end = (start + page.limit()).min(total);
		Ok((matching[start..end].to_vec(), total))
	}

	async fn aggregate(&self, dimension: AggregateDimension) -> StorageResult<Vec<AggregateRow>> {
		let mut groups: std::collections::HashMap<String, (usize, u64, usize)> =
			std::collections::HashMap::new();

		for entry in self.jobs.iter() {
			let job = entry.value();
			let key = match dimension {
				AggregateDimension::Status => job.status.as_str().to_string(),
				AggregateDimension::Queue => job.queue.clone(),
				AggregateDimension::JobType => job.job_type.clone(),
			};
			let slot = groups.entry(key).or_default();
			slot.0 += 1;
			if let Some(ms) = job.processing_time_ms {
				slot.1 += ms;
				slot.2 += 1;
			}
		}

		let mut rows: Vec<AggregateRow> = groups
			.into_iter()
			.map(|(key, (count, total_ms, timed))| AggregateRow {
				key,
				count,
				avg_processing_time_ms: if timed > 0 {
					total_ms as f64 / timed as f64
				} else {
					0.0
				},
			})
			.collect();
		rows.sort_by(|a, b| a.key.cmp(&b.key));
		Ok(rows)
	}

	async fn stats_for_queue(
		&self,
		queue: &str,
		since: DateTime<Utc>,
	) -> StorageResult<QueueWindowStats> {
		let mut stats = QueueWindowStats::default();
		for entry in self.jobs.iter() {
			let job = entry.value();
			if job.queue != queue {
				continue;
			}
			match job.status {
				JobStatus::Completed => {
					if let Some(at) = job.completed_at {
						if at >= since {
							stats.completed += 1;
							stats.total_processing_time_ms += job.processing_time_ms.unwrap_or(0);
						}
						if stats.last_processed_at.map_or(true, |prev| at > prev) {
							stats.last_processed_at = Some(at);
						}
					}
				}
				JobStatus::Failed => {
					if job.failed_at.map_or(false, |at| at >= since) {
						stats.failed += 1;
					}
				}
				_ => {}
			}
		}
		Ok(stats)
	}

	async fn jobs_since(
		&self,
		queue: Option<&str>,
		since: DateTime<Utc>,
	) -> StorageResult<Vec<Job>> {
		Ok(self
			.jobs
			.iter()
			.filter(|entry| {
				let job = entry.value();
				job.created_at >= since && queue.map_or(true, |q| job.queue == q)
			})
			.map(|entry| entry.value().clone())
			.collect())
	}

	async fn trim_retention(
		&self,
		queue: &str,
		keep_completed: usize,
		keep_failed: usize,
	) -> StorageResult<usize> {
		let mut completed: Vec<(String, DateTime<Utc>)> = Vec::new();
		let mut failed: Vec<(String, DateTime<Utc>)> = Vec::new();

		for entry in self.jobs.iter() {
			let job = entry.value();
			if job.queue != queue {
				continue;
			}
			if let Some(at) = Self::terminal_at(job) {
				match job.status {
					JobStatus::Completed => completed.push((job.id.clone(), at)),
					JobStatus::Failed => failed.push((job.id.clone(), at)),
					_ => {}
				}
			}
		}

		// Newest first; everything past the cap is deleted
		completed.sort_by(|a, b| b.1.cmp(&a.1));
		failed.sort_by(|a, b| b.1.cmp(&a.1));

		let mut removed = 0;
		for (id, _) in completed.into_iter().skip(keep_completed) {
			if self.jobs.remove(&id).is_some() {
				removed += 1;
			}
		}
		for (id, _) in failed.into_iter().skip(keep_failed) {
			if self.jobs.remove(&id).is_some() {
				removed += 1;
			}
		}
		if removed > 0 {
			debug!("retention trim removed {} terminal jobs from '{}'", removed, queue);
		}
		Ok(removed)
	}

	async fn expire_older_than(&self, cutoff: DateTime<Utc>) -> StorageResult<usize> {
		let expired: Vec<String> = self
			.jobs
			.iter()
			.filter(|entry| {
				Self::terminal_at(entry.value()).map_or(false, |at| at < cutoff)
			})
			.map(|entry| entry.key().clone())
			.collect();

		let mut removed = 0;
		for id in expired {
			if self.jobs.remove(&id).is_some() {
				removed += 1;
			}
		}
		Ok(removed)
	}

	async fn clean_queue(
		&self,
		queue: &str,
		older_than: DateTime<Utc>,
		statuses: Option<&[JobStatus]>,
	) -> StorageResult<usize> {
		let targets: Vec<String> = self
			.jobs
			.iter()
			.filter(|entry| {
				let job = entry.value();
				if job.queue != queue || !job.is_terminal() {
					return false;
				}
				if let Some(wanted) = statuses {
					if !wanted.contains(&job.status) {
						return false;
					}
				}
				Self::terminal_at(job).map_or(false, |at| at < older_than)
			})
			.map(|entry| entry.key().clone())
			.collect();

		let mut removed = 0;
		for id in targets {
			if self.jobs.remove(&id).is_some() {
				removed += 1;
			}
		}
		Ok(removed)
	}

	async fn count(&self) -> StorageResult<usize> {
		Ok(self.jobs.len())
	}

	async fn health_check(&self) -> StorageResult<bool> {
		Ok(true)
	}
}
