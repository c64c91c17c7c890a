//! Metrics aggregation and queue health evaluation

use chrono::{DateTime, Utc};
use jobq_types::jobs::{Job, JobStatus};
use jobq_types::metrics::{HourlyBucket, MetricsReport, OverallMetrics};
use jobq_types::queues::QueueHealth;
use std::collections::BTreeMap;

/// Classify a queue from its failure/completion counts over the
/// observation window.
pub fn evaluate_health(completed: usize, failed: usize) -> QueueHealth {
	if failed > completed {
		QueueHealth::Error
	} else if failed > 10 && (failed as f64) > 0.1 * completed as f64 {
		QueueHealth::Warning
	} else {
		QueueHealth::Healthy
	}
}

fn truncate_to_hour(at: DateTime<Utc>) -> DateTime<Utc> {
	let ts = at.timestamp();
	let hour_start = ts - ts.rem_euclid(3600);
	DateTime::<Utc>::from_timestamp(hour_start, 0).unwrap_or(at)
}

/// Bucket jobs into hourly counts plus an overall rollup.
///
/// Submissions are attributed by `created_at`, completions by
/// `completed_at`, failures by `failed_at`.
pub fn compute_metrics(
	jobs: &[Job],
	queue: Option<&str>,
	window_hours: u32,
	now: DateTime<Utc>,
) -> MetricsReport {
	let window_start = truncate_to_hour(now - chrono::Duration::hours(window_hours as i64 - 1));

	// Pre-seed every hour of the window so dashboards see gaps as zeros.
	let mut buckets: BTreeMap<DateTime<Utc>, HourlyBucket> = BTreeMap::new();
	for offset in 0..window_hours {
		let hour = window_start + chrono::Duration::hours(offset as i64);
		buckets.insert(
			hour,
			HourlyBucket {
				hour,
				..Default::default()
			},
		);
	}

	let mut overall = OverallMetrics::default();
	let mut overall_time_ms: u64 = 0;

	for job in jobs {
		if let Some(queue) = queue {
			if job.queue != queue {
				continue;
			}
		}
		let created_hour = truncate_to_hour(job.created_at);
		if let Some(bucket) = buckets.get_mut(&created_hour) {
			bucket.submitted += 1;
		}
		overall.submitted += 1;

		match job.status {
			JobStatus::Completed => {
				if let Some(at) = job.completed_at {
					let ms = job.processing_time_ms.unwrap_or(0);
					if let Some(bucket) = buckets.get_mut(&truncate_to_hour(at)) {
						bucket.completed += 1;
						// Accumulate; averaged below once counts are final
						bucket.avg_processing_time_ms += ms as f64;
					}
					overall.completed += 1;
					overall_time_ms += ms;
				}
			}
			JobStatus::Failed => {
				if let Some(at) = job.failed_at {
					if let Some(bucket) = buckets.get_mut(&truncate_to_hour(at)) {
						bucket.failed += 1;
					}
					overall.failed += 1;
				}
			}
			_ => {}
		}
	}

	let mut hourly_buckets: Vec<HourlyBucket> = buckets.into_values().collect();
	for bucket in &mut hourly_buckets {
		if bucket.completed > 0 {
			bucket.avg_processing_time_ms /= bucket.completed as f64;
		}
	}
	if overall.completed > 0 {
		overall.avg_processing_time_ms = overall_time_ms as f64 / overall.completed as f64;
	}

	MetricsReport {
		queue: queue.map(|q| q.to_string()),
		window_hours,
		hourly_buckets,
		overall,
	}
}
