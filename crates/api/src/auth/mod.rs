//! Identity extraction middleware
//!
//! The HTTP adapter resolves the caller identity from headers and hands the
//! core an explicit `AuthContext`; ownership and admin checks happen in the
//! control plane, not here.

use axum::{extract::Request, extract::State, middleware::Next, response::Response};
use jobq_types::auth::AuthContext;
use tracing::debug;

use crate::state::AppState;

/// Header naming the producer identity.
pub const OWNER_HEADER: &str = "x-owner-id";
/// Header carrying the shared admin secret.
pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Resolve the caller identity and attach it to the request extensions.
pub async fn identity(
	State(state): State<AppState>,
	mut request: Request,
	next: Next,
) -> Response {
	let owner = request
		.headers()
		.get(OWNER_HEADER)
		.and_then(|v| v.to_str().ok())
		.filter(|v| !v.is_empty())
		.map(|v| v.to_string());

	let is_admin = match (&state.admin_key, request.headers().get(ADMIN_KEY_HEADER)) {
		(Some(expected), Some(presented)) => {
			presented.to_str().map(|v| v == expected).unwrap_or(false)
		}
		_ => false,
	};

	if is_admin {
		debug!("request authenticated as admin");
	}
	request
		.extensions_mut()
		.insert(AuthContext { owner, is_admin });
	next.run(request).await
}
