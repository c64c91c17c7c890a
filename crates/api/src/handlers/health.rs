//! Health check endpoints
//!
//! Liveness is static; readiness reports storage reachability and which
//! queues are paused.

use axum::{extract::State, http::StatusCode, response::Json};
use serde::Serialize;

use crate::state::AppState;

/// GET /health - Liveness probe
pub async fn health() -> &'static str {
	"OK"
}

/// Readiness response
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
	pub status: String,
	pub storage_healthy: bool,
	pub paused_queues: Vec<String>,
}

/// GET /ready - Readiness probe with storage and broker checks
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
	let storage_healthy = state.store.health_check().await.unwrap_or(false);

	let mut paused_queues = Vec::new();
	for queue in state.broker.queue_names() {
		if state.broker.is_paused(&queue).await.unwrap_or(false) {
			paused_queues.push(queue);
		}
	}

	let status = if storage_healthy { "ready" } else { "degraded" };
	let code = if storage_healthy {
		StatusCode::OK
	} else {
		StatusCode::SERVICE_UNAVAILABLE
	};
	(
		code,
		Json(ReadinessResponse {
			status: status.to_string(),
			storage_healthy,
			paused_queues,
		}),
	)
}
