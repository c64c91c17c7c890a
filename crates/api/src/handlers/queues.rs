//! Queue administration handlers

use axum::{
	extract::{Path, Query, State},
	response::Json,
	Extension,
};
use serde::Deserialize;
use tracing::info;

use crate::handlers::common::{error_response, ApiError};
use crate::state::AppState;
use jobq_service::{QueueDetail, QueueListEntry};
use jobq_types::auth::AuthContext;
use jobq_types::jobs::JobStatus;
use jobq_types::metrics::{HealthSummary, MetricsReport};
use jobq_types::queues::{QueueConfiguration, QueueDescriptor};

#[derive(Debug, Deserialize)]
pub struct CleanQuery {
	/// Terminal jobs older than this many milliseconds are removed.
	pub older_than_ms: u64,
	/// Optional status restriction: "completed" or "failed".
	pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MetricsQuery {
	pub queue: Option<String>,
	pub hours: Option<u32>,
}

/// GET /api/v1/queues - All queue descriptors with live sizes
pub async fn list_queues(
	State(state): State<AppState>,
	Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<QueueListEntry>>, ApiError> {
	let entries = state.control.queue_list(&auth).await.map_err(error_response)?;
	Ok(Json(entries))
}

/// GET /api/v1/queues/{name} - One queue with recent jobs and type rollup
pub async fn queue_detail(
	State(state): State<AppState>,
	Extension(auth): Extension<AuthContext>,
	Path(name): Path<String>,
) -> Result<Json<QueueDetail>, ApiError> {
	let detail = state
		.control
		.queue_detail(&name, &auth)
		.await
		.map_err(error_response)?;
	Ok(Json(detail))
}

/// POST /api/v1/queues/{name}/pause
pub async fn pause_queue(
	State(state): State<AppState>,
	Extension(auth): Extension<AuthContext>,
	Path(name): Path<String>,
) -> Result<Json<QueueDescriptor>, ApiError> {
	let descriptor = state
		.control
		.pause_queue(&name, &auth)
		.await
		.map_err(error_response)?;
	Ok(Json(descriptor))
}

/// POST /api/v1/queues/{name}/resume
pub async fn resume_queue(
	State(state): State<AppState>,
	Extension(auth): Extension<AuthContext>,
	Path(name): Path<String>,
) -> Result<Json<QueueDescriptor>, ApiError> {
	let descriptor = state
		.control
		.resume_queue(&name, &auth)
		.await
		.map_err(error_response)?;
	Ok(Json(descriptor))
}

/// POST /api/v1/queues/{name}/clean - Purge old terminal jobs
pub async fn clean_queue(
	State(state): State<AppState>,
	Extension(auth): Extension<AuthContext>,
	Path(name): Path<String>,
	Query(query): Query<CleanQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
	let statuses = match query.status.as_deref() {
		Some(raw) => {
			let status = raw
				.parse::<JobStatus>()
				.map_err(|e| error_response(jobq_types::jobs::JobError::Validation(e)))?;
			Some(vec![status])
		}
		None => None,
	};
	let removed = state
		.control
		.clean_queue(&name, query.older_than_ms, statuses, &auth)
		.await
		.map_err(error_response)?;
	info!("clean of '{}' removed {} jobs", name, removed);
	Ok(Json(serde_json::json!({ "removed": removed })))
}

/// PUT /api/v1/queues/{name}/config - Replace a queue's configuration
pub async fn update_queue_config(
	State(state): State<AppState>,
	Extension(auth): Extension<AuthContext>,
	Path(name): Path<String>,
	Json(configuration): Json<QueueConfiguration>,
) -> Result<Json<QueueDescriptor>, ApiError> {
	let descriptor = state
		.control
		.update_queue_config(&name, configuration, &auth)
		.await
		.map_err(error_response)?;
	Ok(Json(descriptor))
}

/// GET /api/v1/metrics - Hourly buckets and overall rollup
pub async fn metrics(
	State(state): State<AppState>,
	Extension(auth): Extension<AuthContext>,
	Query(query): Query<MetricsQuery>,
) -> Result<Json<MetricsReport>, ApiError> {
	let report = state
		.control
		.metrics(query.queue.as_deref(), query.hours.unwrap_or(24), &auth)
		.await
		.map_err(error_response)?;
	Ok(Json(report))
}

/// GET /api/v1/health-summary - Per-queue and overall health rollup
pub async fn health_summary(
	State(state): State<AppState>,
) -> Result<Json<HealthSummary>, ApiError> {
	let summary = state.control.health_summary().await.map_err(error_response)?;
	Ok(Json(summary))
}
