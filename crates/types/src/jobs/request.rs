//! Submission and query request shapes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::JobStatus;

/// A producer's submission of one unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
	pub queue: String,
	#[serde(rename = "type")]
	pub job_type: String,
	pub payload: Value,
	#[serde(default)]
	pub options: SubmitOptions,
}

/// Optional submission knobs; everything defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitOptions {
	/// Larger values dispatch earlier within the queue.
	pub priority: Option<i32>,
	pub max_attempts: Option<u32>,
	/// Delay before the job becomes dispatchable, bounded at seven days.
	pub delay_ms: Option<u64>,
	/// Caller-supplied id; collides with `DUPLICATE` if already used.
	pub id: Option<String>,
}

/// Filter for job queries; all fields combine conjunctively.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobFilter {
	pub owner: Option<String>,
	pub queue: Option<String>,
	#[serde(rename = "type")]
	pub job_type: Option<String>,
	pub status: Option<JobStatus>,
	pub created_after: Option<DateTime<Utc>>,
	pub created_before: Option<DateTime<Utc>>,
	#[serde(default)]
	pub sort: JobSort,
}

/// Sort order for job queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobSort {
	#[default]
	CreatedAtDesc,
	CreatedAtAsc,
}

/// Pagination window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Page {
	pub page: u32,
	pub page_size: u32,
}

impl Default for Page {
	fn default() -> Self {
		Self {
			page: 1,
			page_size: crate::constants::DEFAULT_PAGE_SIZE,
		}
	}
}

impl Page {
	/// Clamp to sane bounds and compute the slice offset.
	pub fn offset(&self) -> usize {
		let page = self.page.max(1);
		(page as usize - 1).saturating_mul(self.limit())
	}

	pub fn limit(&self) -> usize {
		self.page_size.clamp(1, crate::constants::MAX_PAGE_SIZE) as usize
	}
}
