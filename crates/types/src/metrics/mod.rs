//! Aggregated metrics and health views

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::queues::QueueHealth;

/// Counts for one hour of the observation window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HourlyBucket {
	pub hour: DateTime<Utc>,
	pub submitted: usize,
	pub completed: usize,
	pub failed: usize,
	pub avg_processing_time_ms: f64,
}

/// Rollup across the whole requested window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverallMetrics {
	pub submitted: usize,
	pub completed: usize,
	pub failed: usize,
	pub avg_processing_time_ms: f64,
}

/// Metrics report for one queue or the whole system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsReport {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub queue: Option<String>,
	pub window_hours: u32,
	pub hourly_buckets: Vec<HourlyBucket>,
	pub overall: OverallMetrics,
}

/// System-wide health rollup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSummary {
	pub overall: QueueHealth,
	pub per_queue: HashMap<String, QueueHealth>,
}
