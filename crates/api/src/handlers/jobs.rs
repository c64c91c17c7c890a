//! Job submission and lifecycle handlers

use axum::{
	extract::{Path, Query, State},
	http::StatusCode,
	response::Json,
	Extension,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::handlers::common::{error_response, require_identity, ApiError};
use crate::pagination::effective;
use crate::state::AppState;
use jobq_types::auth::AuthContext;
use jobq_types::jobs::{CancelOutcome, JobFilter, JobStatus, JobView, Page, SubmitRequest};

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
	pub id: String,
}

#[derive(Debug, Serialize)]
pub struct JobListResponse {
	pub jobs: Vec<JobView>,
	pub total: usize,
	pub page: u32,
	pub page_size: u32,
}

#[derive(Debug, Deserialize)]
pub struct JobsQuery {
	pub queue: Option<String>,
	#[serde(rename = "type")]
	pub job_type: Option<String>,
	pub status: Option<String>,
	pub owner: Option<String>,
	pub page: Option<u32>,
	pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct BulkCancelRequest {
	pub ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BulkCancelEntry {
	pub id: String,
	pub outcome: CancelOutcome,
}

#[derive(Debug, Serialize)]
pub struct BulkCancelResponse {
	pub outcomes: Vec<BulkCancelEntry>,
	pub cancelled: usize,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
	pub id: String,
	pub outcome: CancelOutcome,
}

#[derive(Debug, Serialize)]
pub struct RetryResponse {
	pub id: String,
	pub retried_from: String,
}

/// POST /api/v1/jobs - Submit a job
pub async fn submit_job(
	State(state): State<AppState>,
	Extension(auth): Extension<AuthContext>,
	Json(request): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
	require_identity(&auth)?;
	info!(
		"received submission for '{}/{}'",
		request.queue, request.job_type
	);
	let id = state
		.control
		.submit(request, &auth)
		.await
		.map_err(error_response)?;
	Ok((StatusCode::CREATED, Json(SubmitResponse { id })))
}

/// GET /api/v1/jobs - List jobs visible to the caller
pub async fn list_jobs(
	State(state): State<AppState>,
	Extension(auth): Extension<AuthContext>,
	Query(query): Query<JobsQuery>,
) -> Result<Json<JobListResponse>, ApiError> {
	require_identity(&auth)?;

	let status = match query.status.as_deref() {
		Some(raw) => Some(raw.parse::<JobStatus>().map_err(|e| {
			error_response(jobq_types::jobs::JobError::Validation(e))
		})?),
		None => None,
	};
	let filter = JobFilter {
		owner: query.owner,
		queue: query.queue,
		job_type: query.job_type,
		status,
		..Default::default()
	};
	let (page, page_size) = effective(query.page, query.page_size);

	let (jobs, total) = state
		.control
		.list_jobs(filter, Page { page, page_size }, &auth)
		.await
		.map_err(error_response)?;
	Ok(Json(JobListResponse {
		jobs,
		total,
		page,
		page_size,
	}))
}

/// GET /api/v1/jobs/{id} - Inspect one job
pub async fn get_job(
	State(state): State<AppState>,
	Extension(auth): Extension<AuthContext>,
	Path(id): Path<String>,
) -> Result<Json<JobView>, ApiError> {
	require_identity(&auth)?;
	debug!("inspecting job '{}'", id);
	let view = state.control.inspect(&id, &auth).await.map_err(error_response)?;
	Ok(Json(view))
}

/// DELETE /api/v1/jobs/{id} - Cancel a waiting or delayed job
pub async fn cancel_job(
	State(state): State<AppState>,
	Extension(auth): Extension<AuthContext>,
	Path(id): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
	require_identity(&auth)?;
	let outcome = state.control.cancel(&id, &auth).await.map_err(error_response)?;
	Ok(Json(CancelResponse { id, outcome }))
}

/// POST /api/v1/jobs/{id}/retry - Clone a failed job under a fresh id
pub async fn retry_job(
	State(state): State<AppState>,
	Extension(auth): Extension<AuthContext>,
	Path(id): Path<String>,
) -> Result<Json<RetryResponse>, ApiError> {
	require_identity(&auth)?;
	let new_id = state.control.retry(&id, &auth).await.map_err(error_response)?;
	Ok(Json(RetryResponse {
		id: new_id,
		retried_from: id,
	}))
}

/// POST /api/v1/jobs/bulk-cancel - Cancel many jobs, reporting per-id outcomes
pub async fn bulk_cancel(
	State(state): State<AppState>,
	Extension(auth): Extension<AuthContext>,
	Json(request): Json<BulkCancelRequest>,
) -> Result<Json<BulkCancelResponse>, ApiError> {
	require_identity(&auth)?;
	let report = state
		.control
		.bulk_cancel(&request.ids, &auth)
		.await
		.map_err(error_response)?;
	let cancelled = report.cancelled_count();
	Ok(Json(BulkCancelResponse {
		outcomes: report
			.outcomes
			.into_iter()
			.map(|(id, outcome)| BulkCancelEntry { id, outcome })
			.collect(),
		cancelled,
	}))
}
