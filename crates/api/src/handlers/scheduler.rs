//! Delayed and recurring submission handlers

use axum::{
	extract::{Path, State},
	http::StatusCode,
	response::Json,
	Extension,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::handlers::common::{error_response, require_identity, ApiError};
use crate::state::AppState;
use jobq_service::CronEntryView;
use jobq_types::auth::AuthContext;
use jobq_types::jobs::{SubmitOptions, SubmitRequest};

#[derive(Debug, Deserialize)]
pub struct DelayedRequest {
	pub queue: String,
	#[serde(rename = "type")]
	pub job_type: String,
	pub payload: Value,
	pub delay_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct CronRequest {
	pub name: Option<String>,
	pub queue: String,
	#[serde(rename = "type")]
	pub job_type: String,
	pub payload: Value,
	pub cron: String,
}

#[derive(Debug, Serialize)]
pub struct CronResponse {
	pub name: String,
}

/// POST /api/v1/scheduler/delayed - Submit a job that becomes ready later
pub async fn schedule_delayed(
	State(state): State<AppState>,
	Extension(auth): Extension<AuthContext>,
	Json(request): Json<DelayedRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
	require_identity(&auth)?;
	let id = state
		.control
		.submit(
			SubmitRequest {
				queue: request.queue,
				job_type: request.job_type,
				payload: request.payload,
				options: SubmitOptions {
					delay_ms: Some(request.delay_ms),
					..Default::default()
				},
			},
			&auth,
		)
		.await
		.map_err(error_response)?;
	Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

/// POST /api/v1/scheduler/cron - Register a recurring submission
pub async fn register_cron(
	State(state): State<AppState>,
	Extension(auth): Extension<AuthContext>,
	Json(request): Json<CronRequest>,
) -> Result<(StatusCode, Json<CronResponse>), ApiError> {
	require_identity(&auth)?;
	let name = state
		.scheduler
		.schedule_repeating(
			request.name,
			request.queue,
			request.job_type,
			request.payload,
			&request.cron,
		)
		.await
		.map_err(error_response)?;
	Ok((StatusCode::CREATED, Json(CronResponse { name })))
}

/// GET /api/v1/scheduler/cron - List registered cron entries
pub async fn list_cron(
	State(state): State<AppState>,
	Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<CronEntryView>>, ApiError> {
	require_identity(&auth)?;
	Ok(Json(state.scheduler.list_schedules().await))
}

/// DELETE /api/v1/scheduler/cron/{name} - Stop future fires
pub async fn cancel_cron(
	State(state): State<AppState>,
	Extension(auth): Extension<AuthContext>,
	Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
	require_identity(&auth)?;
	state
		.scheduler
		.cancel_schedule(&name)
		.await
		.map_err(error_response)?;
	Ok(Json(serde_json::json!({ "name": name, "cancelled": true })))
}

/// POST /api/v1/scheduler/cron/{name}/trigger - Admin-only manual fire
pub async fn trigger_cron(
	State(state): State<AppState>,
	Extension(auth): Extension<AuthContext>,
	Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
	let id = state
		.scheduler
		.trigger(&name, &auth)
		.await
		.map_err(error_response)?;
	Ok(Json(serde_json::json!({ "id": id })))
}
