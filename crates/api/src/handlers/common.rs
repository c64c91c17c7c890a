//! Shared handler plumbing: the error envelope and its status mapping

use axum::http::StatusCode;
use axum::response::Json;
use jobq_types::auth::AuthContext;
use jobq_types::jobs::JobError;
use serde::Serialize;

/// Uniform error envelope for every endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
	pub error: String,
	pub message: String,
	pub timestamp: i64,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map a core error onto its HTTP status and envelope.
pub fn error_response(err: JobError) -> ApiError {
	let status = match &err {
		JobError::InvalidQueue(_)
		| JobError::InvalidJobType { .. }
		| JobError::InvalidDelay { .. }
		| JobError::InvalidCron { .. }
		| JobError::Validation(_)
		| JobError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
		JobError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
		JobError::AuthRequired => StatusCode::UNAUTHORIZED,
		JobError::Forbidden | JobError::AdminRequired => StatusCode::FORBIDDEN,
		JobError::NotFound(_) | JobError::QueueNotFound(_) | JobError::NotTriggerable(_) => {
			StatusCode::NOT_FOUND
		}
		JobError::Duplicate(_) | JobError::RefusedActive(_) | JobError::NotRetriable(_) => {
			StatusCode::CONFLICT
		}
		JobError::StoreUnavailable(_) | JobError::BrokerUnavailable(_) => {
			StatusCode::SERVICE_UNAVAILABLE
		}
	};
	(
		status,
		Json(ErrorResponse {
			error: err.code().to_string(),
			message: err.to_string(),
			timestamp: chrono::Utc::now().timestamp(),
		}),
	)
}

/// Reject callers that presented neither an owner nor the admin key.
pub fn require_identity(auth: &AuthContext) -> Result<(), ApiError> {
	if auth.owner.is_none() && !auth.is_admin {
		return Err(error_response(JobError::AuthRequired));
	}
	Ok(())
}
