use axum::{
	middleware,
	routing::{delete, get, post, put},
	Router,
};
use tower::ServiceBuilder;
use tower_http::{
	compression::CompressionLayer,
	cors::CorsLayer,
	limit::RequestBodyLimitLayer,
	request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
	trace::TraceLayer,
};
use tracing::Level;

use crate::auth::identity;
use crate::handlers::{
	bulk_cancel, cancel_cron, cancel_job, clean_queue, get_job, health, health_summary, list_cron,
	list_jobs, list_queues, metrics, pause_queue, queue_detail, register_cron, ready, resume_queue,
	retry_job, schedule_delayed, submit_job, trigger_cron, update_queue_config,
};
use crate::state::AppState;

/// Body limit: the payload cap plus envelope slack.
const BODY_LIMIT_BYTES: usize = 1024 * 1024 + 16 * 1024;

pub fn create_router(state: AppState) -> Router {
	let cors = CorsLayer::permissive();
	let body_limit = RequestBodyLimitLayer::new(BODY_LIMIT_BYTES);
	let trace = TraceLayer::new_for_http()
		.make_span_with(|req: &axum::http::Request<_>| {
			let req_id = req
				.headers()
				.get("x-request-id")
				.and_then(|v| v.to_str().ok())
				.unwrap_or("-");
			tracing::info_span!(
				"http_request",
				method = %req.method(),
				uri = %req.uri(),
				req_id
			)
		})
		.on_request(tower_http::trace::DefaultOnRequest::new().level(Level::INFO))
		.on_response(
			tower_http::trace::DefaultOnResponse::new()
				.level(Level::INFO)
				.latency_unit(tower_http::LatencyUnit::Millis),
		);
	let req_id = ServiceBuilder::new()
		.layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
		.layer(PropagateRequestIdLayer::x_request_id());

	let router = Router::new()
		.route("/health", get(health))
		.route("/ready", get(ready))
		.route("/api/v1/jobs", post(submit_job).get(list_jobs))
		.route("/api/v1/jobs/bulk-cancel", post(bulk_cancel))
		.route("/api/v1/jobs/{id}", get(get_job).delete(cancel_job))
		.route("/api/v1/jobs/{id}/retry", post(retry_job))
		.route("/api/v1/queues", get(list_queues))
		.route("/api/v1/queues/{name}", get(queue_detail))
		.route("/api/v1/queues/{name}/pause", post(pause_queue))
		.route("/api/v1/queues/{name}/resume", post(resume_queue))
		.route("/api/v1/queues/{name}/clean", post(clean_queue))
		.route("/api/v1/queues/{name}/config", put(update_queue_config))
		.route("/api/v1/scheduler/delayed", post(schedule_delayed))
		.route("/api/v1/scheduler/cron", post(register_cron).get(list_cron))
		.route("/api/v1/scheduler/cron/{name}", delete(cancel_cron))
		.route("/api/v1/scheduler/cron/{name}/trigger", post(trigger_cron))
		.route("/api/v1/metrics", get(metrics))
		.route("/api/v1/health-summary", get(health_summary));

	router
		.layer(middleware::from_fn_with_state(state.clone(), identity))
		.layer(cors)
		.layer(CompressionLayer::new())
		.layer(trace)
		.layer(req_id)
		.layer(body_limit)
		.with_state(state)
}
